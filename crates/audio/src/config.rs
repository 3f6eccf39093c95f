//! Configuration du système audio
//!
//! Ce module centralise tous les paramètres audio : sample rate, taille des
//! frames, capacité des files d'attente. Le format est imposé par le service
//! distant : PCM16 mono à 24 000 Hz.

use crate::error::{AudioError, AudioResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fréquence d'échantillonnage imposée par le service vocal distant
pub const SAMPLE_RATE: u32 = 24_000;

/// Nombre de canaux : toujours mono
pub const CHANNELS: u16 = 1;

/// Configuration complète du système audio
///
/// Derive `Serialize`/`Deserialize` pour pouvoir sauvegarder/charger la config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Fréquence d'échantillonnage en Hz
    pub sample_rate: u32,

    /// Nombre de canaux audio (1 = mono)
    pub channels: u16,

    /// Durée d'une frame en millisecondes
    pub frame_duration_ms: u32,

    /// Capacité de la file entre le callback temps réel et le reste du
    /// système. Quand elle est pleine, la frame la plus récente est perdue :
    /// la latence prime sur la complétude.
    pub capture_queue_size: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            channels: CHANNELS,
            frame_duration_ms: 20,
            capture_queue_size: 32,
        }
    }
}

impl AudioConfig {
    /// Crée une nouvelle configuration avec validation
    pub fn new(frame_duration_ms: u32, capture_queue_size: usize) -> AudioResult<Self> {
        let config = Self {
            sample_rate: SAMPLE_RATE,
            channels: CHANNELS,
            frame_duration_ms,
            capture_queue_size,
        };
        config.validate()?;
        Ok(config)
    }

    /// Valide que la configuration est cohérente
    pub fn validate(&self) -> AudioResult<()> {
        if self.sample_rate != SAMPLE_RATE {
            return Err(AudioError::ConfigError(format!(
                "Sample rate invalide: {} (attendu: {})",
                self.sample_rate, SAMPLE_RATE
            )));
        }

        if self.channels != CHANNELS {
            return Err(AudioError::ConfigError(format!(
                "Nombre de canaux invalide: {} (attendu: mono)",
                self.channels
            )));
        }

        if self.frame_duration_ms == 0 || self.frame_duration_ms > 100 {
            return Err(AudioError::ConfigError(format!(
                "Durée de frame invalide: {}ms (doit être entre 1 et 100ms)",
                self.frame_duration_ms
            )));
        }

        if self.capture_queue_size == 0 {
            return Err(AudioError::ConfigError(
                "La file de capture doit avoir au moins 1 emplacement".to_string(),
            ));
        }

        Ok(())
    }

    /// Calcule le nombre d'échantillons par frame
    ///
    /// Exemple: 24000 Hz * 20ms / 1000 = 480 échantillons
    pub fn samples_per_frame(&self) -> usize {
        (self.sample_rate as usize * self.frame_duration_ms as usize) / 1000
    }

    /// Durée d'une frame sous forme de Duration
    pub fn frame_duration(&self) -> Duration {
        Duration::from_millis(self.frame_duration_ms as u64)
    }

    /// Configuration optimisée basse latence (frames courtes)
    pub fn low_latency() -> Self {
        Self {
            frame_duration_ms: 10,
            capture_queue_size: 16,
            ..Default::default()
        }
    }
}
