//! Traits (interfaces) pour les composants audio
//!
//! Les traits définissent des contrats que les implémentations doivent
//! respecter. Cela nous permet de remplacer les vrais périphériques par
//! des implémentations simulées dans les tests.

use crate::error::AudioResult;
use crate::types::AudioFrame;
use async_trait::async_trait;
use std::time::Instant;

/// Interface pour la capture audio (microphone)
///
/// `Send + Sync` car la capture est partagée entre threads
#[async_trait]
pub trait AudioCapture: Send + Sync {
    /// Démarre la capture audio
    ///
    /// L'échec d'accès au périphérique est fatal : `PermissionDenied`
    /// n'est jamais réessayé automatiquement.
    async fn start(&mut self) -> AudioResult<()>;

    /// Arrête la capture et libère le périphérique
    async fn stop(&mut self) -> AudioResult<()>;

    /// Récupère la prochaine frame capturée (None si la capture est arrêtée)
    async fn next_frame(&mut self) -> Option<AudioFrame>;

    /// Vérifie si la capture est active
    fn is_recording(&self) -> bool;

    /// Nombre de frames perdues faute de place dans la file
    fn dropped_frames(&self) -> u64;

    /// Informations sur le périphérique utilisé
    fn device_info(&self) -> Option<String>;
}

/// Horloge du périphérique de sortie
///
/// Abstraite pour que les tests du scheduler puissent contrôler le temps
pub trait DeviceClock: Send {
    fn now(&self) -> Instant;
}

/// Horloge réelle du système
#[derive(Debug, Default, Clone)]
pub struct SystemClock;

impl DeviceClock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Cible de rendu audio : reçoit des frames avec leur instant de départ
///
/// L'implémentation réelle pousse vers le callback de sortie cpal ;
/// les tests enregistrent les appels pour vérifier l'ordonnancement.
pub trait AudioSink: Send {
    /// Démarre le périphérique de sortie
    fn start(&mut self) -> AudioResult<()>;

    /// Programme le rendu d'une frame à un instant précis
    ///
    /// Les frames arrivent dans l'ordre de lecture : l'implémentation
    /// ne doit jamais les réordonner.
    fn render(&mut self, frame: &AudioFrame, start: Instant) -> AudioResult<()>;

    /// Vide tout l'audio en attente de rendu
    fn clear(&mut self);

    /// Arrête le périphérique de sortie
    fn stop(&mut self) -> AudioResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_advances() {
        let clock = SystemClock;
        let t1 = clock.now();
        let t2 = clock.now();
        assert!(t2 >= t1);
    }
}
