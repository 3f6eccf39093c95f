//! Transport WebSocket vers le service vocal
//!
//! Ce module implémente le trait VoiceTransport au-dessus de
//! tokio-tungstenite. Les messages sont du JSON en frames texte ; les
//! frames de contrôle (ping, pong) sont gérées silencieusement.
//!
//! Un transport simulé en mémoire est fourni pour les tests, avec perte
//! et latence injectables.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::{NetworkError, NetworkResult};
use crate::negotiation::NegotiationResult;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::traits::{TransportConnector, VoiceTransport};

/// Transport WebSocket réel
pub struct WsTransport {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    closed: bool,
}

impl WsTransport {
    /// Ouvre une connexion WebSocket vers l'URL négociée
    ///
    /// La poignée de main est la seule étape soumise à un timeout.
    /// Pas de reconnexion automatique : en cas d'échec, l'utilisateur
    /// relance lui-même.
    pub async fn connect(url: &str, connect_timeout: Duration) -> NetworkResult<Self> {
        println!("🔌 Connexion WebSocket vers {}", url);

        let (ws, _response) = timeout(connect_timeout, connect_async(url))
            .await
            .map_err(|_| NetworkError::ConnectionTimeout {
                timeout_ms: connect_timeout.as_millis() as u64,
            })??;

        println!("✅ Connexion WebSocket établie");

        Ok(Self { ws, closed: false })
    }
}

#[async_trait]
impl VoiceTransport for WsTransport {
    async fn send(&mut self, message: ClientMessage) -> NetworkResult<()> {
        let json = serde_json::to_string(&message)?;
        self.ws.send(Message::Text(json.into())).await?;
        Ok(())
    }

    async fn receive(&mut self) -> NetworkResult<Option<ServerMessage>> {
        loop {
            match self.ws.next().await {
                None => return Ok(None),
                Some(Err(e)) => return Err(NetworkError::WebSocketError(e)),
                Some(Ok(Message::Text(text))) => {
                    return match serde_json::from_str::<ServerMessage>(&text) {
                        Ok(message) => Ok(Some(message)),
                        Err(e) => Err(NetworkError::ProtocolError(format!(
                            "Message serveur invalide: {}",
                            e
                        ))),
                    };
                }
                Some(Ok(Message::Close(_))) => return Ok(None),
                // Frames de contrôle et binaires : ignorées, on continue
                Some(Ok(_)) => continue,
            }
        }
    }

    async fn close(&mut self) -> NetworkResult<()> {
        if self.closed {
            return Ok(()); // Déjà fermé
        }
        self.closed = true;

        // La connexion peut déjà être tombée côté serveur
        let _ = self.ws.close(None).await;
        Ok(())
    }
}

/// Connecteur WebSocket réel
pub struct WsConnector {
    connect_timeout: Duration,
}

impl WsConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl TransportConnector for WsConnector {
    async fn connect(
        &self,
        negotiation: &NegotiationResult,
    ) -> NetworkResult<Box<dyn VoiceTransport>> {
        let transport =
            WsTransport::connect(&negotiation.transport_url, self.connect_timeout).await?;
        Ok(Box::new(transport))
    }
}

/// Côté serveur d'un transport simulé
///
/// Les tests lisent ici ce que le client a envoyé et injectent les
/// messages que le serveur est censé produire.
pub struct SimulatedServer {
    /// Messages envoyés par le client, dans l'ordre
    pub sent: mpsc::UnboundedReceiver<ClientMessage>,

    /// Injection de messages serveur vers le client
    pub inject: mpsc::UnboundedSender<ServerMessage>,
}

/// Implémentation de transport simulé pour les tests
///
/// Files en mémoire à la place d'une vraie connexion, avec perte et
/// latence injectables pour tester le comportement sous conditions
/// dégradées.
pub struct SimulatedTransport {
    outbound: mpsc::UnboundedSender<ClientMessage>,
    inbound: mpsc::UnboundedReceiver<ServerMessage>,

    /// Paramètres de simulation
    loss_rate: f32,
    latency: Option<Duration>,

    closed: bool,
}

impl SimulatedTransport {
    /// Crée un transport simulé et son côté serveur
    pub fn pair() -> (Self, SimulatedServer) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();

        (
            Self {
                outbound: out_tx,
                inbound: in_rx,
                loss_rate: 0.0,
                latency: None,
                closed: false,
            },
            SimulatedServer {
                sent: out_rx,
                inject: in_tx,
            },
        )
    }

    /// Configure les conditions réseau simulées
    pub fn set_simulation_params(&mut self, loss_rate: f32, latency: Option<Duration>) {
        self.loss_rate = loss_rate;
        self.latency = latency;
    }
}

#[async_trait]
impl VoiceTransport for SimulatedTransport {
    async fn send(&mut self, message: ClientMessage) -> NetworkResult<()> {
        if self.closed {
            return Err(NetworkError::ConnectionError(
                "Transport simulé fermé".to_string(),
            ));
        }

        // Simulation de perte
        if self.loss_rate > 0.0 && fastrand::f32() < self.loss_rate {
            return Ok(());
        }

        // Simulation de latence
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        self.outbound
            .send(message)
            .map_err(|_| NetworkError::ConnectionError("Serveur simulé parti".to_string()))
    }

    async fn receive(&mut self) -> NetworkResult<Option<ServerMessage>> {
        if self.closed {
            return Ok(None);
        }
        Ok(self.inbound.recv().await)
    }

    async fn close(&mut self) -> NetworkResult<()> {
        self.closed = true;
        self.inbound.close();
        Ok(())
    }
}

/// Connecteur simulé : rend le transport préparé à la première connexion
pub struct SimulatedConnector {
    transport: std::sync::Mutex<Option<SimulatedTransport>>,
}

impl SimulatedConnector {
    pub fn new(transport: SimulatedTransport) -> Self {
        Self {
            transport: std::sync::Mutex::new(Some(transport)),
        }
    }
}

#[async_trait]
impl TransportConnector for SimulatedConnector {
    async fn connect(
        &self,
        _negotiation: &NegotiationResult,
    ) -> NetworkResult<Box<dyn VoiceTransport>> {
        let transport = self
            .transport
            .lock()
            .map_err(|_| NetworkError::ConnectionError("Connecteur simulé corrompu".to_string()))?
            .take()
            .ok_or_else(|| {
                NetworkError::ConnectionError("Transport simulé déjà consommé".to_string())
            })?;
        Ok(Box::new(transport))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simulated_transport_roundtrip() {
        let (mut transport, mut server) = SimulatedTransport::pair();

        transport
            .send(ClientMessage::StartVoice {
                language: "auto".to_string(),
            })
            .await
            .unwrap();

        let received = server.sent.recv().await.unwrap();
        assert_eq!(
            received,
            ClientMessage::StartVoice {
                language: "auto".to_string()
            }
        );

        server
            .inject
            .send(ServerMessage::VoiceStarted {
                session_id: "sim-1".to_string(),
            })
            .unwrap();

        let message = transport.receive().await.unwrap();
        assert_eq!(
            message,
            Some(ServerMessage::VoiceStarted {
                session_id: "sim-1".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_simulated_transport_full_loss() {
        let (mut transport, mut server) = SimulatedTransport::pair();
        transport.set_simulation_params(1.0, None);

        // Tous les envois sont perdus mais réussissent côté client
        transport.send(ClientMessage::StopVoice).await.unwrap();

        drop(transport);
        assert!(server.sent.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_closed_transport() {
        let (mut transport, _server) = SimulatedTransport::pair();

        transport.close().await.unwrap();
        // close est idempotent
        transport.close().await.unwrap();

        assert!(transport.receive().await.unwrap().is_none());
        assert!(transport.send(ClientMessage::StopVoice).await.is_err());
    }

    #[tokio::test]
    async fn test_server_disconnect_ends_stream() {
        let (mut transport, server) = SimulatedTransport::pair();

        // Le serveur disparaît : le flux entrant se termine
        drop(server);
        assert!(transport.receive().await.unwrap().is_none());
    }
}
