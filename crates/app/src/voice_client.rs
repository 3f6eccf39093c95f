// Client vocal en ligne de commande
//
// Relie la machine de conversation aux vrais périphériques (cpal) et au
// vrai service (négociation HTTP puis WebSocket). Les transcriptions et
// réponses s'affichent dans la console ; Ctrl+C arrête proprement.

use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use audio::{AudioConfig, CpalCapture, CpalPlayback};
use conversation::{ConversationConfig, ConversationEvent, VoiceConversation};
use network::{HttpNegotiator, WsConnector};

/// Client de conversation vocale temps réel
#[derive(Parser, Debug)]
#[command(name = "voice-client", version, about)]
struct Args {
    /// URL de l'endpoint de négociation de session
    #[arg(long)]
    server: String,

    /// Clé API du service
    #[arg(long)]
    api_key: String,

    /// Identifiant de l'assistant à contacter
    #[arg(long)]
    assistant_id: String,

    /// Langue de la session ("auto" = détection automatique)
    #[arg(long, default_value = "auto")]
    language: String,

    /// Délai de négociation en secondes
    #[arg(long, default_value_t = 5)]
    timeout: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    println!("🎤 Client vocal temps réel");
    println!("==========================");

    // Périphériques réels
    let audio_config = AudioConfig::default();
    let capture = CpalCapture::new(audio_config.clone()).context("Ouverture du microphone")?;
    let playback = CpalPlayback::new(audio_config).context("Ouverture de la sortie audio")?;

    // Collaborateurs réseau réels
    let timeout = Duration::from_secs(args.timeout);
    let negotiator = HttpNegotiator::new(args.server, args.api_key, args.assistant_id);
    let connector = WsConnector::new(timeout);

    let config = ConversationConfig {
        language: args.language,
        negotiation_timeout: timeout,
        ..Default::default()
    };

    let (mut conversation, mut events, handle) = VoiceConversation::new(
        config,
        Box::new(negotiator),
        Box::new(connector),
        Box::new(capture),
        Box::new(playback),
    );

    // Ctrl+C demande l'arrêt de la session
    let stop_handle = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\n⏹️  Arrêt demandé...");
            stop_handle.request_stop();
        }
    });

    // Affichage des événements de conversation
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                ConversationEvent::Started { session_id } => {
                    println!("🟢 Session active ({session_id}), parlez !");
                }
                ConversationEvent::TranscriptDelta { delta } => {
                    print!("{delta}");
                    use std::io::Write;
                    let _ = std::io::stdout().flush();
                }
                ConversationEvent::Transcript { transcript } => {
                    println!("\n🗣️  Vous : {transcript}");
                }
                ConversationEvent::ResponseText { text } => {
                    println!("🤖 Assistant : {text}");
                }
                ConversationEvent::QuotaExceeded { message } => {
                    println!("🚫 {message}");
                }
                ConversationEvent::Error { message } => {
                    eprintln!("❌ {message}");
                }
                ConversationEvent::Stopped => {
                    println!("👋 Session terminée");
                }
            }
        }
    });

    conversation.start().await.context("Démarrage de session")?;
    conversation.run().await.context("Session vocale")?;

    drop(conversation);
    let _ = printer.await;

    Ok(())
}
