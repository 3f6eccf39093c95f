//! Traits (interfaces) pour la couche réseau
//!
//! Le transport est abstrait derrière un trait pour que la machine d'états
//! et les tests puissent utiliser un transport simulé à la place d'une
//! vraie connexion WebSocket.

use async_trait::async_trait;

use crate::error::NetworkResult;
use crate::negotiation::NegotiationResult;
use crate::protocol::{ClientMessage, ServerMessage};

/// Connexion duplex vers le service vocal
#[async_trait]
pub trait VoiceTransport: Send {
    /// Envoie un message au serveur
    async fn send(&mut self, message: ClientMessage) -> NetworkResult<()>;

    /// Reçoit le prochain message du serveur
    ///
    /// - `Ok(Some(msg))` : un message, dans l'ordre d'arrivée
    /// - `Ok(None)` : la connexion est fermée
    /// - `Err(ProtocolError)` : message malformé, à journaliser puis ignorer
    async fn receive(&mut self) -> NetworkResult<Option<ServerMessage>>;

    /// Ferme la connexion (idempotent)
    async fn close(&mut self) -> NetworkResult<()>;
}

/// Fabrique de transports à partir d'un résultat de négociation
#[async_trait]
pub trait TransportConnector: Send + Sync {
    async fn connect(
        &self,
        negotiation: &NegotiationResult,
    ) -> NetworkResult<Box<dyn VoiceTransport>>;
}
