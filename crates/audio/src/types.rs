//! Types de base pour les données audio
//!
//! Ce module définit la structure AudioFrame qui représente
//! un petit morceau d'audio PCM16 mono avec ses métadonnées.

use crate::config::SAMPLE_RATE;
use crate::error::{AudioError, AudioResult};
use std::time::{Duration, Instant};

/// Un échantillon audio : PCM 16 bits signé
pub type Sample = i16;

/// Une frame audio : un petit morceau d'audio avec ses métadonnées
///
/// Les frames ne sont jamais réordonnées : le numéro de séquence permet
/// de vérifier l'ordre et de compter les pertes, pas de réordonner.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Les échantillons audio PCM16 mono
    pub samples: Vec<Sample>,

    /// Timestamp de création de la frame
    pub timestamp: Instant,

    /// Numéro de séquence croissant (détection de pertes)
    pub sequence_number: u64,
}

impl AudioFrame {
    /// Crée une nouvelle frame audio
    pub fn new(samples: Vec<Sample>, sequence_number: u64) -> Self {
        Self {
            samples,
            timestamp: Instant::now(),
            sequence_number,
        }
    }

    /// Crée une frame de silence d'une taille donnée
    pub fn silence(sample_count: usize, sequence_number: u64) -> Self {
        Self::new(vec![0; sample_count], sequence_number)
    }

    /// Durée de lecture de cette frame à 24 kHz mono
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / SAMPLE_RATE as f64)
    }

    /// Sérialise les échantillons en bytes little-endian (format réseau)
    ///
    /// La longueur résultante est toujours paire : 2 bytes par échantillon.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.samples.len() * 2);
        for sample in &self.samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        bytes
    }

    /// Reconstruit une frame depuis des bytes little-endian
    ///
    /// Une longueur impaire est un payload corrompu: on refuse la frame
    /// entière plutôt que de deviner l'alignement.
    pub fn from_le_bytes(bytes: &[u8], sequence_number: u64) -> AudioResult<Self> {
        if bytes.len() % 2 != 0 {
            return Err(AudioError::InvalidFrame(format!(
                "Longueur impaire: {} bytes",
                bytes.len()
            )));
        }

        let samples = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();

        Ok(Self::new(samples, sequence_number))
    }

    /// Vérifie si la frame ne contient que du silence
    pub fn is_silence(&self) -> bool {
        self.samples.iter().all(|&s| s == 0)
    }

    /// Calcule le niveau RMS de la frame (utile pour le debug)
    pub fn rms_level(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum_squares: f64 = self
            .samples
            .iter()
            .map(|&s| {
                let normalized = s as f64 / 32768.0;
                normalized * normalized
            })
            .sum();
        (sum_squares / self.samples.len() as f64).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_creation() {
        let frame = AudioFrame::new(vec![100, -200, 300], 42);
        assert_eq!(frame.samples.len(), 3);
        assert_eq!(frame.sequence_number, 42);
        assert!(!frame.is_silence());
    }

    #[test]
    fn test_silence_frame() {
        let frame = AudioFrame::silence(480, 0);
        assert_eq!(frame.samples.len(), 480);
        assert!(frame.is_silence());
        assert_eq!(frame.rms_level(), 0.0);
    }

    #[test]
    fn test_duration() {
        // 480 échantillons à 24 kHz = 20ms
        let frame = AudioFrame::silence(480, 0);
        assert_eq!(frame.duration(), Duration::from_millis(20));

        // 24000 échantillons = 1 seconde
        let frame = AudioFrame::silence(24_000, 1);
        assert_eq!(frame.duration(), Duration::from_secs(1));
    }

    #[test]
    fn test_le_bytes_roundtrip() {
        let frame = AudioFrame::new(vec![0, 1, -1, i16::MAX, i16::MIN], 7);
        let bytes = frame.to_le_bytes();
        // Toujours une longueur paire
        assert_eq!(bytes.len(), 10);

        let decoded = AudioFrame::from_le_bytes(&bytes, 7).unwrap();
        assert_eq!(decoded.samples, frame.samples);
    }

    #[test]
    fn test_odd_length_rejected() {
        let result = AudioFrame::from_le_bytes(&[1, 2, 3], 0);
        assert!(matches!(result, Err(AudioError::InvalidFrame(_))));
    }

    #[test]
    fn test_rms_level() {
        // Signal constant à mi-échelle
        let frame = AudioFrame::new(vec![16384; 480], 0);
        let rms = frame.rms_level();
        assert!((rms - 0.5).abs() < 0.01);
    }
}
