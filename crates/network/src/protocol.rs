//! Protocole de communication avec le service vocal
//!
//! Les messages sont du JSON échangé sur une connexion WebSocket, avec un
//! champ discriminant `"type"` en snake_case. L'audio voyage en base64 de
//! PCM16 little-endian.

use audio::{AudioFrame, AudioResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{NetworkError, NetworkResult};

/// Messages envoyés par le client au serveur
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Demande d'ouverture de session vocale
    StartVoice { language: String },

    /// Une frame audio du microphone, PCM16 LE encodé en base64
    AudioData { audio: String },

    /// Fin volontaire de la session
    StopVoice,
}

/// Messages reçus du serveur
///
/// Les champs inconnus d'un message reconnu sont tolérés ; un `"type"`
/// inconnu est une erreur de protocole (message ignoré par la session).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// La session vocale est ouverte côté serveur
    VoiceStarted { session_id: String },

    /// Fragment de transcription de la parole de l'utilisateur
    UserTranscriptDelta { delta: String },

    /// Transcription finale du tour de parole de l'utilisateur
    UserTranscript { transcript: String },

    /// Texte de la réponse de l'assistant
    AiResponseText { text: String },

    /// Fragment audio de la réponse, PCM16 LE encodé en base64
    AiAudioDelta { audio: String },

    /// Début d'un bloc audio : mise en file jusqu'au complete
    AudioBufferStart,

    /// Fin du bloc audio : la file est relâchée d'un coup
    AudioBufferComplete,

    /// Quota épuisé en cours de session
    QuotaExceeded { message: String },

    /// Erreur côté serveur, message lisible pour l'utilisateur
    Error { message: String },
}

/// Encode une frame PCM16 en base64 pour le champ `audio`
pub fn encode_audio(frame: &AudioFrame) -> String {
    STANDARD.encode(frame.to_le_bytes())
}

/// Décode un champ `audio` base64 en frame PCM16
///
/// Un base64 invalide ou une longueur impaire donnent une erreur de
/// protocole : la frame fautive est rejetée, pas la session.
pub fn decode_audio(audio: &str, sequence_number: u64) -> NetworkResult<AudioFrame> {
    let bytes = STANDARD
        .decode(audio)
        .map_err(|e| NetworkError::ProtocolError(format!("Base64 invalide: {}", e)))?;

    let frame: AudioResult<AudioFrame> = AudioFrame::from_le_bytes(&bytes, sequence_number);
    frame.map_err(|e| NetworkError::ProtocolError(format!("Payload audio invalide: {}", e)))
}
