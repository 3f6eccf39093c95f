//! Module de capture audio utilisant cpal
//!
//! Ce module implémente le trait AudioCapture en utilisant la librairie cpal
//! (Cross-Platform Audio Library) pour capturer l'audio depuis le microphone.
//!
//! cpal est la librairie standard en Rust pour l'audio cross-platform.
//! Elle supporte Windows (WASAPI), macOS (CoreAudio), et Linux (ALSA/PulseAudio).

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, SupportedStreamConfig};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::codec;
use crate::{AudioCapture, AudioConfig, AudioError, AudioFrame, AudioResult, Sample};

/// Implémentation de capture audio avec cpal
///
/// Cette structure gère :
/// - La découverte du périphérique de capture (microphone)
/// - La configuration du stream audio
/// - L'encodage des échantillons du périphérique vers nos frames PCM16
/// - Le buffering des frames pour éviter de bloquer le callback
///
/// # Architecture thread
///
/// cpal fonctionne avec des callbacks. Quand des données audio arrivent,
/// cpal appelle notre fonction qui accumule les échantillons encodés.
/// Quand on a assez d'échantillons pour une frame (20ms), on l'envoie
/// via un channel async vers le reste du système. L'envoi est toujours
/// `try_send` : si la file est pleine, la frame la plus récente est
/// perdue et comptée, le callback ne bloque jamais.
pub struct CpalCapture {
    /// Périphérique audio d'entrée (microphone)
    device: Device,

    /// Configuration audio de notre application
    config: AudioConfig,

    /// Stream audio actif (None si arrêté)
    stream: Option<Stream>,

    /// Channel pour recevoir les frames depuis le callback cpal
    frame_receiver: Option<mpsc::Receiver<AudioFrame>>,

    /// Sender cloné dans le callback cpal
    frame_sender: mpsc::Sender<AudioFrame>,

    /// État de l'enregistrement
    is_recording: bool,

    /// Compteur de séquence pour les frames (partagé avec le callback)
    sequence_counter: Arc<AtomicU64>,

    /// Frames perdues faute de place dans la file
    dropped_counter: Arc<AtomicU64>,

    /// Nom du périphérique pour debug
    device_name: String,
}

impl CpalCapture {
    /// Crée une nouvelle instance de capture
    ///
    /// Cette fonction découvre automatiquement le périphérique d'entrée par défaut
    /// et prépare la configuration, mais ne démarre pas encore la capture.
    ///
    /// # Erreurs
    /// - `AudioError::NoDeviceFound` si aucun microphone n'est disponible
    /// - `AudioError::ConfigError` si la configuration n'est pas supportée
    pub fn new(config: AudioConfig) -> AudioResult<Self> {
        config.validate()?;

        // Obtient l'host audio par défaut du système
        let host = cpal::default_host();

        // Trouve le périphérique d'entrée par défaut
        let device = host
            .default_input_device()
            .ok_or(AudioError::NoDeviceFound)?;

        // Récupère la description du périphérique pour debug
        let device_name = device
            .description()
            .ok()
            .map(|desc| desc.name().to_string())
            .unwrap_or_else(|| "Périphérique inconnu".to_string());

        // Crée le channel pour communiquer entre le callback et async
        let (frame_sender, frame_receiver) = mpsc::channel(config.capture_queue_size);

        println!("🎤 Périphérique de capture trouvé : {}", device_name);

        Ok(Self {
            device,
            config,
            stream: None,
            frame_receiver: Some(frame_receiver),
            frame_sender,
            is_recording: false,
            sequence_counter: Arc::new(AtomicU64::new(0)),
            dropped_counter: Arc::new(AtomicU64::new(0)),
            device_name,
        })
    }

    /// Vérifie que la configuration audio est supportée par le périphérique
    ///
    /// La négociation de capacités a lieu une seule fois, au démarrage.
    /// Si le périphérique ne couvre pas 24 kHz, on échoue ici plutôt
    /// que de maintenir un second chemin de code.
    fn validate_device(&self) -> AudioResult<SupportedStreamConfig> {
        // Obtient la configuration par défaut du périphérique
        let default_config = self.device.default_input_config().map_err(|e| {
            AudioError::ConfigError(format!("Impossible d'obtenir config par défaut: {}", e))
        })?;

        println!("📋 Config par défaut du périphérique :");
        println!("   Sample rate: {} Hz", default_config.sample_rate());
        println!("   Channels: {}", default_config.channels());
        println!("   Sample format: {:?}", default_config.sample_format());

        // Vérifie que le périphérique supporte notre sample rate
        let supported_rates = self.device.supported_input_configs().map_err(|e| {
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
                "Sample rate {} Hz non supporté par le périphérique",
                self.config.sample_rate
            )));
        }

        println!("✅ Configuration du périphérique validée");

        Ok(default_config)
    }

    /// Construit et configure le stream audio
    fn build_stream(&mut self) -> AudioResult<Stream> {
        let device_config = self.validate_device()?;

        // Clone des variables nécessaires pour le callback
        let sender = self.frame_sender.clone();
        let samples_per_frame = self.config.samples_per_frame();
        let sequence_counter = Arc::clone(&self.sequence_counter);
        let dropped_counter = Arc::clone(&self.dropped_counter);

        println!("🎵 Démarrage capture :");
        println!("   Échantillons par frame : {}", samples_per_frame);
        println!("   Durée par frame : {}ms", self.config.frame_duration_ms);

        // On demande notre propre format (24 kHz mono), validé ci-dessus
        let stream_config = cpal::StreamConfig {
            channels: self.config.channels,
            sample_rate: self.config.sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };

        // Buffer pour accumuler les échantillons encodés
        let mut sample_buffer: Vec<Sample> = Vec::with_capacity(samples_per_frame);

        // Construit le stream selon le format d'échantillons natif
        let stream = match device_config.sample_format() {
            SampleFormat::F32 => self.device.build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    for &sample in data {
                        sample_buffer.push(codec::encode_sample(sample));
                        Self::flush_if_full(
                            &mut sample_buffer,
                            samples_per_frame,
                            &sender,
                            &sequence_counter,
                            &dropped_counter,
                        );
                    }
                },
                move |err| {
                    eprintln!("❌ Erreur stream audio : {}", err);
                },
                None,
            )?,
            SampleFormat::I16 => self.device.build_input_stream(
                &stream_config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    for &sample in data {
                        // Déjà en PCM16, aucune conversion nécessaire
                        sample_buffer.push(sample);
                        Self::flush_if_full(
                            &mut sample_buffer,
                            samples_per_frame,
                            &sender,
                            &sequence_counter,
                            &dropped_counter,
                        );
                    }
                },
                move |err| {
                    eprintln!("❌ Erreur stream audio : {}", err);
                },
                None,
            )?,
            SampleFormat::U16 => self.device.build_input_stream(
                &stream_config,
                move |data: &[u16], _: &cpal::InputCallbackInfo| {
                    for &sample in data {
                        // u16 [0, 65535] vers i16 [-32768, 32767]
                        sample_buffer.push((sample as i32 - 32768) as i16);
                        Self::flush_if_full(
                            &mut sample_buffer,
                            samples_per_frame,
                            &sender,
                            &sequence_counter,
                            &dropped_counter,
                        );
                    }
                },
                move |err| {
                    eprintln!("❌ Erreur stream audio : {}", err);
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

    /// Émet une frame quand le buffer du callback est plein
    ///
    /// Appelée dans le callback temps réel : doit rester très rapide
    /// et ne jamais bloquer.
    fn flush_if_full(
        sample_buffer: &mut Vec<Sample>,
        samples_per_frame: usize,
        sender: &mpsc::Sender<AudioFrame>,
        sequence_counter: &AtomicU64,
        dropped_counter: &AtomicU64,
    ) {
        if sample_buffer.len() < samples_per_frame {
            return;
        }

        let sequence = sequence_counter.fetch_add(1, Ordering::Relaxed);
        let frame = AudioFrame::new(sample_buffer.drain(..).collect(), sequence);

        // Envoie la frame (non-bloquant). Si la file est pleine, la frame
        // la plus récente est perdue : la latence prime sur la complétude.
        if sender.try_send(frame).is_err() {
            dropped_counter.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[async_trait]
impl AudioCapture for CpalCapture {
    async fn start(&mut self) -> AudioResult<()> {
        if self.is_recording {
            return Ok(()); // Déjà démarré
        }

        println!("🚀 Démarrage de la capture audio...");

        // Construit et démarre le stream
        let stream = self.build_stream()?;
        stream.play()?;

        self.stream = Some(stream);
        self.is_recording = true;

        println!("✅ Capture audio démarrée");
        Ok(())
    }

    async fn stop(&mut self) -> AudioResult<()> {
        if !self.is_recording {
            return Ok(()); // Déjà arrêté
        }

        println!("🛑 Arrêt de la capture audio...");

        // Arrête et libère le stream (le périphérique est rendu au système)
        if let Some(stream) = self.stream.take() {
            stream.pause()?;
        }

        self.is_recording = false;

        println!("✅ Capture audio arrêtée");
        Ok(())
    }

    async fn next_frame(&mut self) -> Option<AudioFrame> {
        match self.frame_receiver.as_mut() {
            Some(receiver) => receiver.recv().await,
            None => None,
        }
    }

    fn is_recording(&self) -> bool {
        self.is_recording
    }

    fn dropped_frames(&self) -> u64 {
        self.dropped_counter.load(Ordering::Relaxed)
    }

    fn device_info(&self) -> Option<String> {
        Some(self.device_name.clone())
    }
}

// Implémentation de Drop pour nettoyer proprement
impl Drop for CpalCapture {
    fn drop(&mut self) {
        if self.is_recording {
            println!("🧹 Nettoyage automatique de la capture audio");
            // Le stream est automatiquement arrêté quand il est dropped
        }
    }
}
