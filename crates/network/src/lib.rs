//! Crate network - Transport temps réel vers le service vocal
//!
//! Ce crate gère toute la communication :
//! - Protocole JSON (messages client/serveur, audio en base64)
//! - Négociation de session HTTP
//! - Transport WebSocket avec tokio-tungstenite
//! - Session duplex (envoi non-bloquant, réception ordonnée)

pub mod protocol; // Messages du protocole JSON
pub mod negotiation; // Négociation HTTP de session
pub mod traits; // Traits abstraits (transport, connecteur)
pub mod transport; // Implémentations WebSocket et simulée
pub mod session; // Session duplex active
pub mod error; // Gestion d'erreurs

// Réexports pour faciliter l'utilisation
pub use error::*;
pub use negotiation::{HttpNegotiator, NegotiationResult, Negotiator};
pub use protocol::{ClientMessage, ServerMessage};
pub use session::{TransportSender, TransportSession};
pub use traits::{TransportConnector, VoiceTransport};
pub use transport::{SimulatedConnector, SimulatedTransport, WsConnector, WsTransport};
