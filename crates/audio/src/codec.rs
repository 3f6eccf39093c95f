//! Codec PCM16 : conversion entre float (cpal) et i16 (réseau)
//!
//! Les périphériques audio travaillent souvent en f32 normalisé [-1.0, 1.0]
//! alors que le format réseau est du PCM 16 bits signé little-endian.
//! Ce module fait la conversion dans les deux sens.

use crate::types::{AudioFrame, Sample};

/// Encode un échantillon f32 [-1.0, 1.0] vers i16
///
/// Les valeurs hors plage sont saturées silencieusement vers les bornes
/// i16 : un signal trop fort est écrêté, jamais rejeté.
pub fn encode_sample(sample: f32) -> Sample {
    let scaled = (sample * 32768.0).round();
    scaled.clamp(i16::MIN as f32, i16::MAX as f32) as Sample
}

/// Décode un échantillon i16 vers f32 [-1.0, 1.0)
pub fn decode_sample(sample: Sample) -> f32 {
    sample as f32 / 32768.0
}

/// Encode un buffer f32 complet en échantillons PCM16
pub fn encode_frame(samples: &[f32]) -> Vec<Sample> {
    samples.iter().map(|&s| encode_sample(s)).collect()
}

/// Décode une frame PCM16 en buffer f32 prêt pour la sortie audio
pub fn decode_frame(frame: &AudioFrame) -> Vec<f32> {
    frame.samples.iter().map(|&s| decode_sample(s)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Un pas de quantification PCM16
    const QUANTIZATION_STEP: f32 = 1.0 / 32768.0;

    #[test]
    fn test_encode_basic() {
        assert_eq!(encode_sample(0.0), 0);
        assert_eq!(encode_sample(-1.0), i16::MIN);
        // 1.0 * 32768 dépasse i16::MAX, donc saturation
        assert_eq!(encode_sample(1.0), i16::MAX);
    }

    #[test]
    fn test_clipping_is_silent() {
        // Les valeurs hors plage sont écrêtées, pas rejetées
        assert_eq!(encode_sample(2.5), i16::MAX);
        assert_eq!(encode_sample(-3.0), i16::MIN);
    }

    #[test]
    fn test_roundtrip_within_one_quantization_step() {
        // Tout échantillon dans la plage nominale doit survivre à un
        // aller-retour encode/decode à un pas de quantification près
        let values = [
            0.0f32, 0.5, -0.5, 0.25, -0.25, 0.999, -0.999, 0.1234, -0.4321, 0.000031,
        ];
        for &original in &values {
            let decoded = decode_sample(encode_sample(original));
            assert!(
                (decoded - original).abs() <= QUANTIZATION_STEP,
                "aller-retour trop imprécis pour {original}: {decoded}"
            );
        }
    }

    #[test]
    fn test_encode_decode_frame() {
        let input = vec![0.0f32, 0.5, -0.5, 0.1];
        let encoded = encode_frame(&input);
        assert_eq!(encoded.len(), 4);

        let frame = AudioFrame::new(encoded, 0);
        let decoded = decode_frame(&frame);
        for (original, restored) in input.iter().zip(decoded.iter()) {
            assert!((original - restored).abs() <= QUANTIZATION_STEP);
        }
    }
}
