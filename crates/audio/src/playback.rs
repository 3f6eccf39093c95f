//! Module de lecture audio utilisant cpal
//!
//! Ce module implémente le trait AudioSink en utilisant la librairie cpal
//! pour jouer l'audio via les haut-parleurs ou casque.
//!
//! La lecture est pilotée par l'ordonnanceur : chaque frame arrive avec son
//! instant de départ. Le callback de sortie joue du silence jusqu'à cet
//! instant, puis les échantillons du morceau, sans jamais réordonner.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, SupportedStreamConfig};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::codec;
use crate::{AudioConfig, AudioError, AudioFrame, AudioResult, AudioSink};

/// Un morceau d'audio décodé avec son instant de départ
struct ScheduledChunk {
    /// Instant où le premier échantillon doit sortir
    start: Instant,

    /// Échantillons décodés en f32, consommés par le callback
    samples: VecDeque<f32>,
}

/// Implémentation de lecture audio avec cpal
///
/// # Architecture thread
///
/// L'ordonnanceur ajoute des morceaux horodatés via `render()`.
/// Le callback cpal (thread temps réel) consomme les morceaux dans l'ordre
/// et insère du silence tant que l'instant de départ du prochain morceau
/// n'est pas atteint.
pub struct CpalPlayback {
    /// Périphérique audio de sortie (haut-parleurs)
    device: Device,

    /// Configuration audio de notre application
    config: AudioConfig,

    /// Stream audio actif (None si arrêté)
    stream: Option<Stream>,

    /// File des morceaux en attente de lecture, partagée avec le callback
    pending: Arc<Mutex<VecDeque<ScheduledChunk>>>,

    /// État de la lecture
    is_playing: bool,

    /// Nom du périphérique pour debug
    device_name: String,

    /// Compteur de morceaux joués (statistiques)
    chunks_played: Arc<AtomicU64>,

    /// Compteur d'underruns (manque de données)
    underruns: Arc<AtomicU64>,
}

impl CpalPlayback {
    /// Crée une nouvelle instance de lecture
    ///
    /// Découvre le périphérique de sortie par défaut et prépare la
    /// configuration, mais ne démarre pas encore la lecture.
    ///
    /// # Erreurs
    /// - `AudioError::NoDeviceFound` si aucun haut-parleur n'est disponible
    /// - `AudioError::ConfigError` si la configuration n'est pas supportée
    pub fn new(config: AudioConfig) -> AudioResult<Self> {
        config.validate()?;

        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or(AudioError::NoDeviceFound)?;

        let device_name = device
            .description()
            .ok()
            .map(|desc| desc.name().to_string())
            .unwrap_or_else(|| "Périphérique inconnu".to_string());

        println!("🔊 Périphérique de lecture trouvé : {}", device_name);

        Ok(Self {
            device,
            config,
            stream: None,
            pending: Arc::new(Mutex::new(VecDeque::new())),
            is_playing: false,
            device_name,
            chunks_played: Arc::new(AtomicU64::new(0)),
            underruns: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Vérifie que la configuration audio est supportée par le périphérique
    fn validate_device(&self) -> AudioResult<SupportedStreamConfig> {
        let default_config = self.device.default_output_config().map_err(|e| {
            AudioError::ConfigError(format!("Impossible d'obtenir config par défaut: {}", e))
        })?;

        println!("📋 Config par défaut du périphérique de sortie :");
        println!("   Sample rate: {} Hz", default_config.sample_rate());
        println!("   Channels: {}", default_config.channels());
        println!("   Sample format: {:?}", default_config.sample_format());

        let supported_rates = self.device.supported_output_configs().map_err(|e| {
            AudioError::ConfigError(format!("Impossible d'obtenir configs supportées: {}", e))
        })?;

        let mut config_found = false;
        for supported_range in supported_rates {
            let min_rate = supported_range.min_sample_rate();
            let max_rate = supported_range.max_sample_rate();

            if self.config.sample_rate >= min_rate && self.config.sample_rate <= max_rate {
                config_found = true;
                break;
            }
        }

        if !config_found {
            return Err(AudioError::ConfigError(format!(
                "Sample rate {} Hz non supporté par le périphérique de sortie",
                self.config.sample_rate
            )));
        }

        Ok(default_config)
    }

    /// Construit et configure le stream audio de sortie
    fn build_stream(&mut self) -> AudioResult<Stream> {
        let device_config = self.validate_device()?;

        // Clone des variables nécessaires pour le callback
        let pending = Arc::clone(&self.pending);
        let chunks_played = Arc::clone(&self.chunks_played);
        let underruns = Arc::clone(&self.underruns);

        println!("🎵 Démarrage lecture : {} Hz mono", self.config.sample_rate);

        let stream_config = cpal::StreamConfig {
            channels: self.config.channels,
            sample_rate: self.config.sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };

        // Construit le stream selon le format d'échantillons natif
        let stream = match device_config.sample_format() {
            SampleFormat::F32 => self.device.build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    Self::fill_output(data, &pending, &chunks_played, &underruns, |s| s);
                },
                move |err| {
                    eprintln!("❌ Erreur stream audio sortie : {}", err);
                },
                None,
            )?,
            SampleFormat::I16 => self.device.build_output_stream(
                &stream_config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    Self::fill_output(data, &pending, &chunks_played, &underruns, |s| {
                        codec::encode_sample(s)
                    });
                },
                move |err| {
                    eprintln!("❌ Erreur stream audio sortie : {}", err);
                },
                None,
            )?,
            SampleFormat::U16 => self.device.build_output_stream(
                &stream_config,
                move |data: &mut [u16], _: &cpal::OutputCallbackInfo| {
                    Self::fill_output(data, &pending, &chunks_played, &underruns, |s| {
                        // f32 [-1.0, 1.0] vers u16 [0, 65535]
                        ((s + 1.0) * 0.5 * u16::MAX as f32) as u16
                    });
                },
                move |err| {
                    eprintln!("❌ Erreur stream audio sortie : {}", err);
                },
                None,
            )?,
            other => {
                return Err(AudioError::ConfigError(format!(
                    "Format d'échantillon non supporté : {:?}",
                    other
                )))
            }
        };

        Ok(stream)
    }

    /// Remplit le buffer de sortie depuis la file des morceaux horodatés
    ///
    /// Cette fonction est appelée par le callback audio (thread temps réel).
    /// Elle doit être très rapide et ne jamais bloquer : `try_lock` partout,
    /// silence en cas d'échec.
    fn fill_output<T>(
        output: &mut [T],
        pending: &Arc<Mutex<VecDeque<ScheduledChunk>>>,
        chunks_played: &AtomicU64,
        underruns: &AtomicU64,
        convert: impl Fn(f32) -> T,
    ) {
        let now = Instant::now();
        let mut produced = 0;

        if let Ok(mut queue) = pending.try_lock() {
            while produced < output.len() {
                let Some(chunk) = queue.front_mut() else {
                    break;
                };

                // Silence tant que l'instant de départ n'est pas atteint.
                // Les morceaux sont déjà dans l'ordre de lecture.
                if chunk.start > now {
                    break;
                }

                while produced < output.len() {
                    match chunk.samples.pop_front() {
                        Some(sample) => {
                            output[produced] = convert(sample);
                            produced += 1;
                        }
                        None => break,
                    }
                }

                if chunk.samples.is_empty() {
                    queue.pop_front();
                    chunks_played.fetch_add(1, Ordering::Relaxed);
                } else {
                    break;
                }
            }

            // Un morceau pas encore dû n'est pas un underrun : seul un
            // morceau entamé qui s'épuise en compte un
            if produced > 0 && produced < output.len() && queue.is_empty() {
                underruns.fetch_add(1, Ordering::Relaxed);
            }
        }

        // Complète avec du silence
        for slot in output.iter_mut().skip(produced) {
            *slot = convert(0.0);
        }
    }

    /// Statistiques de lecture : (morceaux joués, underruns)
    pub fn stats(&self) -> (u64, u64) {
        (
            self.chunks_played.load(Ordering::Relaxed),
            self.underruns.load(Ordering::Relaxed),
        )
    }
}

impl AudioSink for CpalPlayback {
    fn start(&mut self) -> AudioResult<()> {
        if self.is_playing {
            return Ok(()); // Déjà démarré
        }

        println!("🚀 Démarrage de la lecture audio...");

        let stream = self.build_stream()?;
        stream.play()?;

        self.stream = Some(stream);
        self.is_playing = true;

        println!("✅ Lecture audio démarrée");
        Ok(())
    }

    fn render(&mut self, frame: &AudioFrame, start: Instant) -> AudioResult<()> {
        let samples: VecDeque<f32> = codec::decode_frame(frame).into();

        let mut queue = self
            .pending
            .lock()
            .map_err(|_| AudioError::InitializationError("File de lecture corrompue".to_string()))?;
        queue.push_back(ScheduledChunk { start, samples });
        Ok(())
    }

    fn clear(&mut self) {
        if let Ok(mut queue) = self.pending.lock() {
            queue.clear();
        }
    }

    fn stop(&mut self) -> AudioResult<()> {
        if !self.is_playing {
            return Ok(()); // Déjà arrêté
        }

        println!("🛑 Arrêt de la lecture audio...");

        self.clear();
        if let Some(stream) = self.stream.take() {
            stream.pause()?;
        }

        self.is_playing = false;

        println!("✅ Lecture audio arrêtée");
        Ok(())
    }
}

// Nettoyage automatique du périphérique
impl Drop for CpalPlayback {
    fn drop(&mut self) {
        if self.is_playing {
            println!("🧹 Nettoyage automatique de la lecture audio");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playback_creation() {
        let config = AudioConfig::default();

        match CpalPlayback::new(config) {
            Ok(playback) => {
                assert!(!playback.is_playing);
                assert_eq!(playback.stats(), (0, 0));
            }
            Err(AudioError::NoDeviceFound) => {
                // Acceptable dans un environnement de test sans audio
                println!("⚠️  Pas de haut-parleur disponible pour le test");
            }
            Err(e) => panic!("Erreur inattendue: {}", e),
        }
    }

    #[test]
    fn test_render_queues_in_order() {
        // Teste la file sans périphérique réel
        if let Ok(mut playback) = CpalPlayback::new(AudioConfig::default()) {
            let now = Instant::now();
            let frame = AudioFrame::silence(480, 0);

            playback.render(&frame, now).unwrap();
            playback.render(&frame, now + frame.duration()).unwrap();

            let queue = playback.pending.lock().unwrap();
            assert_eq!(queue.len(), 2);
            assert!(queue[0].start <= queue[1].start);
        }
    }

    #[test]
    fn test_clear_empties_pending() {
        if let Ok(mut playback) = CpalPlayback::new(AudioConfig::default()) {
            let frame = AudioFrame::silence(480, 0);
            playback.render(&frame, Instant::now()).unwrap();
            playback.clear();
            assert!(playback.pending.lock().unwrap().is_empty());
        }
    }
}
