//! État et cycle de vie d'une session de conversation
//!
//! La machine à états suit un chemin unique :
//! Idle → Connecting → Active → Stopping → Terminated
//! avec Error accessible depuis Connecting et Active.
//! Terminated et Error sont absorbants : aucune transition n'en sort,
//! et en particulier aucune reconnexion automatique.

use std::time::Instant;

/// État de la machine de conversation
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationState {
    /// Aucune session, prêt à démarrer
    Idle,

    /// Négociation et ouverture du transport en cours
    Connecting,

    /// Session vocale active (micro et lecture en marche)
    Active,

    /// Arrêt demandé, libération des ressources en cours
    Stopping,

    /// Session terminée proprement (état absorbant)
    Terminated,

    /// Session terminée sur erreur (état absorbant)
    Error { message: String },
}

impl ConversationState {
    /// Une session est en vie entre le début de la connexion et l'arrêt
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Connecting | Self::Active)
    }

    /// Les états absorbants : aucune transition n'en sort
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated | Self::Error { .. })
    }

    /// Description lisible de l'état
    pub fn description(&self) -> String {
        match self {
            Self::Idle => "inactif".to_string(),
            Self::Connecting => "connexion en cours".to_string(),
            Self::Active => "session active".to_string(),
            Self::Stopping => "arrêt en cours".to_string(),
            Self::Terminated => "terminé".to_string(),
            Self::Error { message } => format!("erreur: {}", message),
        }
    }
}

/// Une session de conversation (au plus une vivante par machine à états)
#[derive(Debug, Clone)]
pub struct ConversationSession {
    /// Identifiant attribué par le serveur (None avant VoiceStarted)
    pub session_id: Option<String>,

    /// État courant de la machine
    pub state: ConversationState,

    /// Instant de création de la session
    pub created_at: Instant,

    /// Langue demandée pour la session
    pub language: String,
}

impl ConversationSession {
    pub fn new(language: String) -> Self {
        Self {
            session_id: None,
            state: ConversationState::Idle,
            created_at: Instant::now(),
            language,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_classification() {
        assert!(!ConversationState::Idle.is_live());
        assert!(ConversationState::Connecting.is_live());
        assert!(ConversationState::Active.is_live());
        assert!(!ConversationState::Stopping.is_live());

        assert!(ConversationState::Terminated.is_terminal());
        assert!(ConversationState::Error {
            message: "x".to_string()
        }
        .is_terminal());
        assert!(!ConversationState::Active.is_terminal());
    }

    #[test]
    fn test_new_session_is_idle() {
        let session = ConversationSession::new("auto".to_string());
        assert_eq!(session.state, ConversationState::Idle);
        assert!(session.session_id.is_none());
        assert_eq!(session.language, "auto");
    }
}
