//! Gestion d'erreurs pour le système audio
//!
//! Ce module définit tous les types d'erreurs possibles dans notre système audio.
//! En Rust, nous utilisons le type Result<T, E> pour gérer les erreurs de façon explicite.

use thiserror::Error;

/// Énumération de toutes les erreurs possibles dans le système audio
///
/// `thiserror::Error` génère automatiquement l'implémentation du trait Error
/// et nous permet de définir des messages d'erreur avec `#[error("...")]`
#[derive(Error, Debug)]
pub enum AudioError {
    /// Aucun périphérique audio (microphone ou haut-parleurs) n'a été trouvé
    #[error("Aucun périphérique audio trouvé")]
    NoDeviceFound,

    /// L'accès au périphérique a été refusé par le système
    ///
    /// Erreur fatale pour cette session : l'utilisateur doit accorder
    /// l'accès au microphone, on ne réessaie jamais automatiquement.
    #[error("Accès au périphérique refusé: {0}")]
    PermissionDenied(String),

    /// Erreur lors de la configuration des paramètres audio (sample rate, etc.)
    #[error("Erreur de configuration audio: {0}")]
    ConfigError(String),

    /// Erreur provenant de la librairie cpal (Cross-Platform Audio Library)
    /// `#[from]` génère automatiquement une conversion depuis l'erreur cpal
    #[error("Erreur cpal: {0}")]
    CpalError(#[from] cpal::PlayStreamError),

    /// Frame audio invalide (longueur en bytes impaire, payload vide...)
    #[error("Frame audio invalide: {0}")]
    InvalidFrame(String),

    /// Le buffer audio est plein, une frame a dû être perdue
    #[error("Buffer overflow - frame perdue")]
    BufferOverflow,

    /// Le périphérique audio a été débranché pendant l'utilisation
    #[error("Périphérique audio déconnecté")]
    DeviceDisconnected,

    /// Erreur lors de l'initialisation d'un composant
    #[error("Erreur d'initialisation: {0}")]
    InitializationError(String),
}

/// Conversion des erreurs cpal::BuildStreamError
///
/// `DeviceNotAvailable` correspond à un refus d'accès (périphérique réservé
/// ou permission manquante) : cas fatal, pas de retry.
impl From<cpal::BuildStreamError> for AudioError {
    fn from(err: cpal::BuildStreamError) -> Self {
        match err {
            cpal::BuildStreamError::DeviceNotAvailable => {
                AudioError::PermissionDenied(format!("{err:?}"))
            }
            other => AudioError::ConfigError(format!("Erreur construction stream: {other:?}")),
        }
    }
}

/// Conversion des erreurs cpal::DefaultStreamConfigError
impl From<cpal::DefaultStreamConfigError> for AudioError {
    fn from(err: cpal::DefaultStreamConfigError) -> Self {
        AudioError::ConfigError(format!("Erreur config par défaut: {err:?}"))
    }
}

/// Conversion des erreurs cpal::PauseStreamError
impl From<cpal::PauseStreamError> for AudioError {
    fn from(err: cpal::PauseStreamError) -> Self {
        AudioError::ConfigError(format!("Erreur pause stream: {err:?}"))
    }
}

/// Type Result personnalisé pour notre crate
///
/// Au lieu d'écrire Result<T, AudioError> partout, on peut écrire AudioResult<T>
pub type AudioResult<T> = Result<T, AudioError>;
