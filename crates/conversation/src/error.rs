//! Gestion d'erreurs pour l'orchestration de conversation

use thiserror::Error;

/// Erreurs possibles de la machine à états de conversation
///
/// Les erreurs des couches inférieures sont converties automatiquement
/// grâce à `#[from]`, ce qui permet d'utiliser `?` partout.
#[derive(Error, Debug)]
pub enum ConversationError {
    /// Erreur de la chaîne audio (capture, lecture)
    #[error("Erreur audio: {0}")]
    Audio(#[from] audio::AudioError),

    /// Erreur de la couche réseau (négociation, transport)
    #[error("Erreur réseau: {0}")]
    Network(#[from] network::NetworkError),

    /// Opération invalide dans l'état courant
    #[error("Opération '{operation}' invalide dans l'état {state}")]
    InvalidState { operation: String, state: String },
}

/// Type Result personnalisé pour le crate conversation
pub type ConversationResult<T> = Result<T, ConversationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ConversationError::InvalidState {
            operation: "start".to_string(),
            state: "Terminated".to_string(),
        };
        assert!(error.to_string().contains("start"));
        assert!(error.to_string().contains("Terminated"));
    }

    #[test]
    fn test_error_conversion() {
        let network_error = network::NetworkError::ChannelClosed;
        let error: ConversationError = network_error.into();
        assert!(matches!(error, ConversationError::Network(_)));
    }
}
