//! Crate conversation - Orchestration d'une session vocale
//!
//! Ce crate relie la chaîne audio et la couche réseau :
//! - Machine à états (Idle, Connecting, Active, Stopping, Terminated, Error)
//! - Routage des messages serveur vers l'ordonnanceur et l'interface
//! - Cycle de vie des ressources (micro, connexion) sur tous les chemins

pub mod conversation; // Machine à états principale
pub mod events; // Événements pour l'interface
pub mod session; // État et cycle de vie de session
pub mod error; // Gestion d'erreurs

// Réexports pour faciliter l'utilisation
pub use conversation::{ConversationConfig, ConversationHandle, VoiceConversation};
pub use error::*;
pub use events::ConversationEvent;
pub use session::{ConversationSession, ConversationState};
