//! Crate audio - Chaîne audio du client vocal temps réel
//!
//! Ce crate gère toute la chaîne audio :
//! - Capture microphone avec cpal (PCM16 mono 24 kHz)
//! - Codec PCM16 (f32 <-> i16 little-endian)
//! - Ordonnancement de lecture sans trous
//! - Lecture audio avec cpal

pub mod config; // Configuration audio
pub mod types; // Types de données (AudioFrame, etc.)
pub mod traits; // Traits abstraits
pub mod codec; // Codec PCM16
pub mod capture; // Implémentation capture avec cpal
pub mod scheduler; // Ordonnanceur de lecture
pub mod playback; // Implémentation lecture avec cpal
pub mod error; // Gestion d'erreurs

// Réexports pour faciliter l'utilisation
pub use config::*;
pub use types::*;
pub use traits::*;
pub use error::*;

// Réexports des implémentations principales
pub use capture::CpalCapture;
pub use playback::CpalPlayback;
pub use scheduler::PlaybackScheduler;
