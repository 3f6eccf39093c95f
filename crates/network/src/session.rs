//! Session de transport : une connexion vocale active
//!
//! La session possède le transport et fait tourner une tâche unique qui
//! multiplexe les deux sens :
//! - les frames audio sortantes arrivent par un canal borné (`try_send`
//!   côté capture : le chemin temps réel ne bloque jamais)
//! - les messages serveur entrants sont relayés dans l'ordre d'arrivée
//!
//! Un message entrant malformé est journalisé puis ignoré, la session
//! continue. La fermeture est idempotente et sans reconnexion.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use audio::AudioFrame;

use crate::error::{NetworkError, NetworkResult};
use crate::protocol::{self, ClientMessage, ServerMessage};
use crate::traits::VoiceTransport;

/// Commandes envoyées à la tâche de transport
enum Outbound {
    /// Une frame audio à transmettre
    Frame(ClientMessage),

    /// Fermeture de la session (graceful = StopVoice puis Close)
    Close { graceful: bool },
}

/// Résultat d'une itération de la boucle de transport
enum Step {
    Outgoing(Option<Outbound>),
    Incoming(NetworkResult<Option<ServerMessage>>),
}

/// Handle d'envoi clonable, utilisable depuis la pompe de capture
///
/// `send_frame` est non-bloquant : si la file est pleine, la frame la
/// plus récente est perdue et comptée.
#[derive(Clone)]
pub struct TransportSender {
    outbound: mpsc::Sender<Outbound>,
    dropped: Arc<AtomicU64>,
}

impl TransportSender {
    /// Encode et met en file une frame audio
    pub fn send_frame(&self, frame: &AudioFrame) -> NetworkResult<()> {
        let message = ClientMessage::AudioData {
            audio: protocol::encode_audio(frame),
        };

        match self.outbound.try_send(Outbound::Frame(message)) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                // Latence avant complétude : la frame est abandonnée
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(NetworkError::ChannelClosed),
        }
    }

    /// Frames abandonnées faute de place dans la file d'envoi
    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Session de transport active
pub struct TransportSession {
    outbound: mpsc::Sender<Outbound>,
    inbound: Option<mpsc::Receiver<ServerMessage>>,
    dropped: Arc<AtomicU64>,
    task: Option<JoinHandle<()>>,
    closed: bool,
}

impl TransportSession {
    /// Ouvre la session : envoie StartVoice puis démarre la boucle duplex
    pub async fn open(
        mut transport: Box<dyn VoiceTransport>,
        language: &str,
        queue_capacity: usize,
    ) -> NetworkResult<Self> {
        // Premier message obligatoire de la session
        transport
            .send(ClientMessage::StartVoice {
                language: language.to_string(),
            })
            .await?;

        let (out_tx, mut out_rx) = mpsc::channel::<Outbound>(queue_capacity);
        let (in_tx, in_rx) = mpsc::channel::<ServerMessage>(queue_capacity);

        let task = tokio::spawn(async move {
            loop {
                let step = tokio::select! {
                    outgoing = out_rx.recv() => Step::Outgoing(outgoing),
                    incoming = transport.receive() => Step::Incoming(incoming),
                };

                match step {
                    Step::Outgoing(Some(Outbound::Frame(message))) => {
                        if let Err(e) = transport.send(message).await {
                            eprintln!("❌ Envoi impossible, fin de session : {}", e);
                            break;
                        }
                    }
                    Step::Outgoing(Some(Outbound::Close { graceful })) => {
                        if graceful {
                            let _ = transport.send(ClientMessage::StopVoice).await;
                        }
                        let _ = transport.close().await;
                        break;
                    }
                    Step::Outgoing(None) => {
                        // Tous les handles d'envoi sont partis
                        let _ = transport.close().await;
                        break;
                    }
                    Step::Incoming(Ok(Some(message))) => {
                        if in_tx.send(message).await.is_err() {
                            // Plus personne n'écoute côté client
                            let _ = transport.close().await;
                            break;
                        }
                    }
                    Step::Incoming(Ok(None)) => {
                        // Connexion fermée par le serveur
                        break;
                    }
                    Step::Incoming(Err(NetworkError::ProtocolError(e))) => {
                        // Message malformé : journalisé puis ignoré
                        eprintln!("⚠️  Message serveur ignoré : {}", e);
                    }
                    Step::Incoming(Err(e)) => {
                        eprintln!("❌ Erreur de réception, fin de session : {}", e);
                        break;
                    }
                }
            }
        });

        Ok(Self {
            outbound: out_tx,
            inbound: Some(in_rx),
            dropped: Arc::new(AtomicU64::new(0)),
            task: Some(task),
            closed: false,
        })
    }

    /// Handle d'envoi pour la pompe de capture
    pub fn sender(&self) -> TransportSender {
        TransportSender {
            outbound: self.outbound.clone(),
            dropped: Arc::clone(&self.dropped),
        }
    }

    /// Flux des messages serveur, dans l'ordre d'arrivée (consommable une fois)
    pub fn messages(&mut self) -> Option<mpsc::Receiver<ServerMessage>> {
        self.inbound.take()
    }

    /// Ferme la session (idempotent, jamais de reconnexion)
    pub async fn close(&mut self, graceful: bool) -> NetworkResult<()> {
        if self.closed {
            return Ok(()); // Déjà fermé
        }
        self.closed = true;

        // La tâche peut déjà s'être arrêtée d'elle-même
        let _ = self.outbound.send(Outbound::Close { graceful }).await;

        if let Some(task) = self.task.take() {
            let _ = task.await;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::SimulatedTransport;

    #[tokio::test]
    async fn test_start_voice_is_sent_first() {
        let (transport, mut server) = SimulatedTransport::pair();
        let mut session = TransportSession::open(Box::new(transport), "fr", 8)
            .await
            .unwrap();

        let first = server.sent.recv().await.unwrap();
        assert_eq!(
            first,
            ClientMessage::StartVoice {
                language: "fr".to_string()
            }
        );

        session.close(false).await.unwrap();
    }

    #[tokio::test]
    async fn test_frames_are_delivered_in_order() {
        let (transport, mut server) = SimulatedTransport::pair();
        let mut session = TransportSession::open(Box::new(transport), "auto", 32)
            .await
            .unwrap();
        let sender = session.sender();

        // StartVoice d'abord
        let _ = server.sent.recv().await.unwrap();

        for seq in 0..10u64 {
            let frame = AudioFrame::new(vec![seq as i16; 480], seq);
            sender.send_frame(&frame).unwrap();
        }

        // Les frames ressortent dans l'ordre d'envoi
        for seq in 0..10u64 {
            let message = server.sent.recv().await.unwrap();
            let ClientMessage::AudioData { audio } = message else {
                panic!("Message inattendu");
            };
            let frame = protocol::decode_audio(&audio, seq).unwrap();
            assert_eq!(frame.samples[0], seq as i16);
        }

        session.close(false).await.unwrap();
    }

    #[tokio::test]
    async fn test_server_messages_arrive_in_order() {
        let (transport, mut server) = SimulatedTransport::pair();
        let mut session = TransportSession::open(Box::new(transport), "auto", 8)
            .await
            .unwrap();
        let mut messages = session.messages().unwrap();

        let _ = server.sent.recv().await;

        server
            .inject
            .send(ServerMessage::VoiceStarted {
                session_id: "s-1".to_string(),
            })
            .unwrap();
        server.inject.send(ServerMessage::AudioBufferStart).unwrap();
        server
            .inject
            .send(ServerMessage::AudioBufferComplete)
            .unwrap();

        assert_eq!(
            messages.recv().await.unwrap(),
            ServerMessage::VoiceStarted {
                session_id: "s-1".to_string()
            }
        );
        assert_eq!(messages.recv().await.unwrap(), ServerMessage::AudioBufferStart);
        assert_eq!(
            messages.recv().await.unwrap(),
            ServerMessage::AudioBufferComplete
        );

        session.close(false).await.unwrap();
    }

    #[tokio::test]
    async fn test_graceful_close_sends_stop_voice() {
        let (transport, mut server) = SimulatedTransport::pair();
        let mut session = TransportSession::open(Box::new(transport), "auto", 8)
            .await
            .unwrap();

        let _ = server.sent.recv().await; // StartVoice
        session.close(true).await.unwrap();

        let last = server.sent.recv().await.unwrap();
        assert_eq!(last, ClientMessage::StopVoice);

        // close est idempotent
        session.close(true).await.unwrap();
        assert!(server.sent.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_full_queue_drops_newest_frame() {
        // Handle d'envoi sur une file de capacité 1, jamais drainée
        let (out_tx, _out_rx) = mpsc::channel::<Outbound>(1);
        let sender = TransportSender {
            outbound: out_tx,
            dropped: Arc::new(AtomicU64::new(0)),
        };

        let frame = AudioFrame::silence(480, 0);
        sender.send_frame(&frame).unwrap();
        assert_eq!(sender.dropped_frames(), 0);

        // File pleine : la frame est perdue silencieusement et comptée
        sender.send_frame(&frame).unwrap();
        assert_eq!(sender.dropped_frames(), 1);
    }

    #[tokio::test]
    async fn test_send_after_close_is_an_error() {
        let (transport, _server) = SimulatedTransport::pair();
        let mut session = TransportSession::open(Box::new(transport), "auto", 8)
            .await
            .unwrap();
        let sender = session.sender();

        session.close(false).await.unwrap();

        // La tâche est finie, le canal est fermé
        let frame = AudioFrame::silence(480, 0);
        assert!(matches!(
            sender.send_frame(&frame),
            Err(NetworkError::ChannelClosed)
        ));
    }

    #[tokio::test]
    async fn test_server_disconnect_ends_message_stream() {
        let (transport, server) = SimulatedTransport::pair();
        let mut session = TransportSession::open(Box::new(transport), "auto", 8)
            .await
            .unwrap();
        let mut messages = session.messages().unwrap();

        drop(server);

        // Le flux se termine sans reconnexion
        assert!(messages.recv().await.is_none());
        session.close(false).await.unwrap();
    }
}
