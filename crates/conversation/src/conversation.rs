//! Machine à états de conversation vocale
//!
//! C'est le chef d'orchestre : il possède la capture, l'ordonnanceur de
//! lecture et la session de transport, et fait circuler les données entre
//! eux selon l'état courant. Les collaborateurs (négociation, transport,
//! périphériques) sont injectés par traits, ce qui permet de tester toute
//! la machine sans matériel ni réseau.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use audio::{AudioCapture, AudioSink, PlaybackScheduler, SystemClock};
use network::protocol::{self, ServerMessage};
use network::{Negotiator, NetworkError, TransportConnector, TransportSender, TransportSession};

use crate::error::{ConversationError, ConversationResult};
use crate::events::ConversationEvent;
use crate::session::{ConversationSession, ConversationState};

/// Configuration de la machine de conversation
#[derive(Debug, Clone)]
pub struct ConversationConfig {
    /// Langue demandée au service ("auto" = détection automatique)
    pub language: String,

    /// Délai maximum pour la négociation (seule étape soumise à timeout)
    pub negotiation_timeout: Duration,

    /// Capacité de la file d'envoi vers le transport
    pub outbound_queue: usize,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            language: "auto".to_string(),
            negotiation_timeout: Duration::from_secs(5),
            outbound_queue: 32,
        }
    }
}

/// Handle léger pour demander l'arrêt depuis un autre contexte
/// (gestionnaire Ctrl+C par exemple)
#[derive(Clone)]
pub struct ConversationHandle {
    stop: Arc<Notify>,
}

impl ConversationHandle {
    pub fn request_stop(&self) {
        self.stop.notify_one();
    }
}

/// Résultat d'une itération de la boucle principale
enum Step {
    Message(Option<ServerMessage>),
    StopRequested,
}

/// Machine à états de conversation vocale
///
/// Possède exclusivement le microphone et la connexion : une instance,
/// une session au plus.
pub struct VoiceConversation {
    config: ConversationConfig,

    /// Collaborateur de négociation (HTTP en production)
    negotiator: Box<dyn Negotiator>,

    /// Fabrique de transport (WebSocket en production)
    connector: Box<dyn TransportConnector>,

    /// Capture micro (rendue par la pompe à l'arrêt)
    capture: Option<Box<dyn AudioCapture>>,

    /// Tâche qui pompe les frames de la capture vers le transport
    pump: Option<JoinHandle<Box<dyn AudioCapture>>>,

    /// Cible de rendu audio
    sink: Box<dyn AudioSink>,

    /// Ordonnanceur de lecture
    scheduler: PlaybackScheduler<SystemClock>,

    /// Session courante
    session: ConversationSession,

    /// Session de transport active (None hors session)
    transport: Option<TransportSession>,

    /// Messages serveur entrants, dans l'ordre d'arrivée
    inbound: Option<mpsc::Receiver<ServerMessage>>,

    /// Canal d'événements vers l'interface
    events: mpsc::Sender<ConversationEvent>,

    /// Séquence attribuée aux frames audio reçues
    inbound_sequence: u64,

    /// Signal d'arrêt partagé avec les handles
    stop: Arc<Notify>,
}

impl VoiceConversation {
    /// Crée la machine avec ses collaborateurs injectés
    ///
    /// Retourne aussi le flux d'événements pour l'interface et un handle
    /// d'arrêt utilisable depuis n'importe quelle tâche.
    pub fn new(
        config: ConversationConfig,
        negotiator: Box<dyn Negotiator>,
        connector: Box<dyn TransportConnector>,
        capture: Box<dyn AudioCapture>,
        sink: Box<dyn AudioSink>,
    ) -> (
        Self,
        mpsc::Receiver<ConversationEvent>,
        ConversationHandle,
    ) {
        let (events_tx, events_rx) = mpsc::channel(64);
        let stop = Arc::new(Notify::new());
        let session = ConversationSession::new(config.language.clone());

        let conversation = Self {
            config,
            negotiator,
            connector,
            capture: Some(capture),
            pump: None,
            sink,
            scheduler: PlaybackScheduler::new(SystemClock),
            session,
            transport: None,
            inbound: None,
            events: events_tx,
            inbound_sequence: 0,
            stop: Arc::clone(&stop),
        };

        (conversation, events_rx, ConversationHandle { stop })
    }

    /// État courant de la session
    pub fn state(&self) -> &ConversationState {
        &self.session.state
    }

    /// Identifiant de session attribué par le serveur
    pub fn session_id(&self) -> Option<&str> {
        self.session.session_id.as_deref()
    }

    /// Démarre une session : négociation puis ouverture du transport
    ///
    /// Appeler `start()` pendant une session en vie est un no-op.
    /// Depuis un état absorbant c'est une erreur : pas de reconnexion,
    /// on crée une nouvelle machine pour une nouvelle session.
    pub async fn start(&mut self) -> ConversationResult<()> {
        match &self.session.state {
            ConversationState::Idle => {}
            state if state.is_live() => return Ok(()), // Déjà en cours
            state => {
                return Err(ConversationError::InvalidState {
                    operation: "start".to_string(),
                    state: state.description(),
                })
            }
        }

        self.session.state = ConversationState::Connecting;
        println!("📞 Démarrage de session (langue: {})", self.config.language);

        // Négociation, seule étape soumise à timeout
        let negotiation = match timeout(
            self.config.negotiation_timeout,
            self.negotiator.negotiate(&self.config.language),
        )
        .await
        {
            Err(_) => {
                let error = NetworkError::ConnectionTimeout {
                    timeout_ms: self.config.negotiation_timeout.as_millis() as u64,
                };
                return Err(self.fail(error.to_string(), error.into()).await);
            }
            Ok(Err(NetworkError::QuotaExceeded { message })) => {
                // Quota refusé dès la négociation : même traitement que
                // le quota en cours de session
                let _ = self
                    .events
                    .send(ConversationEvent::QuotaExceeded {
                        message: message.clone(),
                    })
                    .await;
                let error = NetworkError::QuotaExceeded {
                    message: message.clone(),
                };
                self.session.state = ConversationState::Error { message };
                return Err(error.into());
            }
            Ok(Err(e)) => {
                return Err(self.fail(e.to_string(), e.into()).await);
            }
            Ok(Ok(negotiation)) => negotiation,
        };

        // Ouverture du transport et envoi de StartVoice
        let transport = match self.connector.connect(&negotiation).await {
            Ok(transport) => transport,
            Err(e) => return Err(self.fail(e.to_string(), e.into()).await),
        };

        let mut transport_session = match TransportSession::open(
            transport,
            &negotiation.language,
            self.config.outbound_queue,
        )
        .await
        {
            Ok(session) => session,
            Err(e) => return Err(self.fail(e.to_string(), e.into()).await),
        };

        self.inbound = transport_session.messages();
        self.transport = Some(transport_session);

        // La session ne devient Active qu'à la réception de VoiceStarted,
        // traitée par run()
        Ok(())
    }

    /// Boucle principale : route les messages serveur jusqu'à la fin de
    /// session (arrêt demandé, erreur fatale ou déconnexion)
    pub async fn run(&mut self) -> ConversationResult<()> {
        let mut inbound = self.inbound.take().ok_or(ConversationError::InvalidState {
            operation: "run".to_string(),
            state: self.session.state.description(),
        })?;
        let stop = Arc::clone(&self.stop);

        loop {
            let step = tokio::select! {
                message = inbound.recv() => Step::Message(message),
                _ = stop.notified() => Step::StopRequested,
            };

            match step {
                Step::Message(Some(message)) => {
                    if self.handle_message(message).await? {
                        return Ok(());
                    }
                }
                Step::Message(None) => {
                    // Le serveur a coupé la connexion
                    if self.session.state == ConversationState::Stopping {
                        self.session.state = ConversationState::Terminated;
                    } else {
                        let message = "Connexion interrompue par le serveur".to_string();
                        let _ = self
                            .events
                            .send(ConversationEvent::Error {
                                message: message.clone(),
                            })
                            .await;
                        self.teardown(false).await;
                        self.session.state = ConversationState::Error { message };
                    }
                    return Ok(());
                }
                Step::StopRequested => {
                    self.shutdown().await;
                    return Ok(());
                }
            }
        }
    }

    /// Traite un message serveur ; retourne true si la session est finie
    async fn handle_message(&mut self, message: ServerMessage) -> ConversationResult<bool> {
        match message {
            ServerMessage::VoiceStarted { session_id } => {
                if self.session.state != ConversationState::Connecting {
                    // VoiceStarted en double : ignoré
                    return Ok(false);
                }

                // Démarrage de la chaîne audio. Un refus d'accès au micro
                // est fatal, sans retry.
                if let Some(capture) = self.capture.as_mut() {
                    if let Err(e) = capture.start().await {
                        return Err(self.fail(e.to_string(), e.into()).await);
                    }
                }
                if let Err(e) = self.sink.start() {
                    return Err(self.fail(e.to_string(), e.into()).await);
                }

                // La pompe possède la capture et la rend à l'arrêt.
                // On ne prend la capture qu'une fois le transport confirmé.
                if let Some(transport) = self.transport.as_ref() {
                    if let Some(capture) = self.capture.take() {
                        self.pump = Some(spawn_capture_pump(capture, transport.sender()));
                    }
                }

                self.session.session_id = Some(session_id.clone());
                self.session.state = ConversationState::Active;
                println!("🎙️  Session vocale active (id: {})", session_id);

                let _ = self
                    .events
                    .send(ConversationEvent::Started { session_id })
                    .await;
            }

            ServerMessage::UserTranscriptDelta { delta } => {
                let _ = self
                    .events
                    .send(ConversationEvent::TranscriptDelta { delta })
                    .await;
            }

            ServerMessage::UserTranscript { transcript } => {
                let _ = self
                    .events
                    .send(ConversationEvent::Transcript { transcript })
                    .await;
            }

            ServerMessage::AiResponseText { text } => {
                let _ = self
                    .events
                    .send(ConversationEvent::ResponseText { text })
                    .await;
            }

            ServerMessage::AudioBufferStart => {
                self.scheduler.on_buffer_start();
            }

            ServerMessage::AudioBufferComplete => {
                // Un échec du rendu est fatal : libération complète avant
                // de faire remonter l'erreur
                if let Err(e) = self.scheduler.on_buffer_complete(self.sink.as_mut()) {
                    return Err(self.fail(e.to_string(), e.into()).await);
                }
            }

            ServerMessage::AiAudioDelta { audio } => {
                match protocol::decode_audio(&audio, self.inbound_sequence) {
                    Ok(frame) => {
                        self.inbound_sequence += 1;
                        if let Err(e) = self.scheduler.on_frame(frame, self.sink.as_mut()) {
                            return Err(self.fail(e.to_string(), e.into()).await);
                        }
                    }
                    Err(e) => {
                        // Frame invalide : journalisée puis ignorée
                        eprintln!("⚠️  Frame audio serveur ignorée : {}", e);
                    }
                }
            }

            ServerMessage::QuotaExceeded { message } => {
                println!("🚫 Quota épuisé : {}", message);
                let _ = self
                    .events
                    .send(ConversationEvent::QuotaExceeded {
                        message: message.clone(),
                    })
                    .await;
                self.teardown(false).await;
                self.session.state = ConversationState::Error { message };
                return Ok(true);
            }

            ServerMessage::Error { message } => {
                eprintln!("❌ Erreur serveur : {}", message);
                let _ = self
                    .events
                    .send(ConversationEvent::Error {
                        message: message.clone(),
                    })
                    .await;
                self.teardown(false).await;
                self.session.state = ConversationState::Error { message };
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Arrête la session proprement (idempotent)
    ///
    /// Utilisable directement quand l'appelant possède la machine ;
    /// pendant `run()`, passer par le `ConversationHandle`.
    pub async fn stop(&mut self) -> ConversationResult<()> {
        if !self.session.state.is_live() {
            return Ok(()); // Rien à arrêter
        }
        self.shutdown().await;
        Ok(())
    }

    /// Chemin d'arrêt normal : Stopping puis Terminated
    async fn shutdown(&mut self) {
        println!("🛑 Arrêt de la session...");
        self.session.state = ConversationState::Stopping;
        self.teardown(true).await;
        self.session.state = ConversationState::Terminated;
        let _ = self.events.send(ConversationEvent::Stopped).await;
        println!("✅ Session terminée, périphériques libérés");
    }

    /// Passe en état d'erreur avec libération complète des ressources
    async fn fail(&mut self, message: String, error: ConversationError) -> ConversationError {
        let _ = self
            .events
            .send(ConversationEvent::Error {
                message: message.clone(),
            })
            .await;
        self.teardown(false).await;
        self.session.state = ConversationState::Error { message };
        error
    }

    /// Libère toutes les ressources, sur tous les chemins de sortie
    ///
    /// L'ordre compte : fermer le transport termine la pompe, qui rend
    /// la capture, qu'on peut alors arrêter.
    async fn teardown(&mut self, graceful: bool) {
        if let Some(mut transport) = self.transport.take() {
            let _ = transport.close(graceful).await;
        }

        if let Some(pump) = self.pump.take() {
            if let Ok(capture) = pump.await {
                self.capture = Some(capture);
            }
        }

        if let Some(capture) = self.capture.as_mut() {
            let _ = capture.stop().await;
        }

        self.scheduler.clear(self.sink.as_mut());
        let _ = self.sink.stop();
        self.inbound = None;
    }
}

/// Pompe de capture : déplace les frames du micro vers le transport
///
/// S'arrête quand la capture se tarit ou quand le transport est fermé,
/// et rend alors la capture à la machine pour l'arrêt du périphérique.
fn spawn_capture_pump(
    mut capture: Box<dyn AudioCapture>,
    sender: TransportSender,
) -> JoinHandle<Box<dyn AudioCapture>> {
    tokio::spawn(async move {
        while let Some(frame) = capture.next_frame().await {
            if sender.send_frame(&frame).is_err() {
                break; // Transport fermé
            }
        }
        capture
    })
}
