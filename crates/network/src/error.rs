//! Gestion d'erreurs pour la couche réseau
//!
//! Même approche que le crate audio : une énumération thiserror par crate
//! et un alias Result. La taxonomie distingue les erreurs qui terminent la
//! session (connexion, quota) de celles qui se contentent d'ignorer un
//! message (protocole).

use thiserror::Error;

/// Énumération de toutes les erreurs possibles de la couche réseau
#[derive(Error, Debug)]
pub enum NetworkError {
    /// Échec de connexion au serveur
    ///
    /// Jamais de reconnexion automatique : l'utilisateur relance lui-même.
    #[error("Erreur de connexion: {0}")]
    ConnectionError(String),

    /// La négociation ou la connexion a dépassé le délai imparti
    #[error("Délai de connexion dépassé ({timeout_ms}ms)")]
    ConnectionTimeout { timeout_ms: u64 },

    /// Le quota de l'utilisateur est épuisé
    ///
    /// Variante distincte des erreurs génériques : la session se termine
    /// proprement et l'utilisateur reçoit le message du serveur.
    #[error("Quota épuisé: {message}")]
    QuotaExceeded { message: String },

    /// Message entrant malformé ou inconnu
    ///
    /// Non fatal : le message fautif est journalisé puis ignoré,
    /// la session continue.
    #[error("Erreur de protocole: {0}")]
    ProtocolError(String),

    /// Erreur WebSocket sous-jacente
    #[error("Erreur WebSocket: {0}")]
    WebSocketError(#[from] tokio_tungstenite::tungstenite::Error),

    /// Erreur HTTP lors de la négociation
    #[error("Erreur HTTP: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Erreur de sérialisation JSON
    #[error("Erreur de sérialisation: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Le canal interne vers la tâche d'écriture est fermé
    #[error("Canal de transport fermé")]
    ChannelClosed,
}

/// Type Result personnalisé pour le crate réseau
pub type NetworkResult<T> = Result<T, NetworkError>;
