//! Événements destinés à la couche de présentation
//!
//! Le cœur de conversation est sans interface : tout ce que l'utilisateur
//! doit voir passe par ce canal d'événements. La couche de présentation
//! (console, widget...) les consomme à son rythme.

/// Événement de conversation destiné à l'interface utilisateur
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationEvent {
    /// La session vocale est active, l'identifiant vient du serveur
    Started { session_id: String },

    /// Fragment de transcription en direct de la parole de l'utilisateur
    TranscriptDelta { delta: String },

    /// Transcription finale du tour de parole
    ///
    /// Distincte des fragments : l'interface décide elle-même comment
    /// remplacer le texte provisoire.
    Transcript { transcript: String },

    /// Texte de la réponse de l'assistant
    ResponseText { text: String },

    /// Quota épuisé, avec le message du serveur
    QuotaExceeded { message: String },

    /// Erreur fatale, avec un message lisible
    Error { message: String },

    /// La session est terminée et les périphériques sont libérés
    Stopped,
}
