//! Ordonnanceur de lecture : garantit une lecture sans trous et sans
//! chevauchement des frames reçues du serveur.
//!
//! Le serveur envoie la parole synthétisée en petits morceaux. L'ordonnanceur
//! décide de l'instant de départ de chaque frame selon une règle unique :
//!
//! `start = max(next_play_time, now)` puis `next_play_time = start + durée`
//!
//! Une frame en retard crée un trou de silence, jamais un chevauchement ni
//! un réordonnancement. Pendant une phase de buffering (entre BufferStart et
//! BufferComplete), les frames sont mises en file puis relâchées d'un bloc,
//! bout à bout, dans leur ordre d'arrivée.

use crate::error::AudioResult;
use crate::traits::{AudioSink, DeviceClock};
use crate::types::AudioFrame;
use std::collections::VecDeque;
use std::time::Instant;

/// Ordonnanceur de lecture
///
/// Tout l'état d'ordonnancement (`next_play_time`, phase de buffering, file
/// d'attente) est privé et n'est muté que par cette structure.
pub struct PlaybackScheduler<C: DeviceClock> {
    /// Horloge du périphérique (réelle ou simulée)
    clock: C,

    /// Fin programmée de la dernière frame ordonnancée
    next_play_time: Option<Instant>,

    /// Phase de buffering en cours (frames mises en file, pas rendues)
    buffering: bool,

    /// Frames en attente pendant la phase de buffering
    queue: VecDeque<AudioFrame>,
}

impl<C: DeviceClock> PlaybackScheduler<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            next_play_time: None,
            buffering: false,
            queue: VecDeque::new(),
        }
    }

    /// Le serveur annonce le début d'un nouveau bloc audio
    pub fn on_buffer_start(&mut self) {
        self.buffering = true;
    }

    /// Le serveur annonce la fin du bloc : relâche la file d'un coup,
    /// bout à bout, dans l'ordre d'arrivée
    pub fn on_buffer_complete(&mut self, sink: &mut dyn AudioSink) -> AudioResult<()> {
        self.buffering = false;
        while let Some(frame) = self.queue.pop_front() {
            self.schedule(frame, sink)?;
        }
        Ok(())
    }

    /// Reçoit une frame audio du serveur
    ///
    /// En phase de buffering la frame est mise en file, sinon elle est
    /// ordonnancée immédiatement.
    pub fn on_frame(&mut self, frame: AudioFrame, sink: &mut dyn AudioSink) -> AudioResult<()> {
        if self.buffering {
            self.queue.push_back(frame);
            Ok(())
        } else {
            self.schedule(frame, sink)
        }
    }

    /// Applique la règle d'ordonnancement et envoie la frame au rendu
    fn schedule(&mut self, frame: AudioFrame, sink: &mut dyn AudioSink) -> AudioResult<()> {
        let now = self.clock.now();
        let start = match self.next_play_time {
            Some(next) if next > now => next,
            // next_play_time déjà passé (ou première frame) : le retard
            // devient un trou de silence, on ne rattrape jamais
            _ => now,
        };

        sink.render(&frame, start)?;
        self.next_play_time = Some(start + frame.duration());
        Ok(())
    }

    /// Vide la file et tout l'audio en attente de rendu (arrêt de session)
    pub fn clear(&mut self, sink: &mut dyn AudioSink) {
        self.queue.clear();
        self.buffering = false;
        self.next_play_time = None;
        sink.clear();
    }

    /// Nombre de frames en attente dans la file de buffering
    pub fn pending_frames(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Horloge contrôlée manuellement par les tests
    #[derive(Clone)]
    struct MockClock {
        now: Arc<Mutex<Instant>>,
    }

    impl MockClock {
        fn new() -> Self {
            Self {
                now: Arc::new(Mutex::new(Instant::now())),
            }
        }

        fn advance(&self, d: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += d;
        }

        fn current(&self) -> Instant {
            *self.now.lock().unwrap()
        }
    }

    impl DeviceClock for MockClock {
        fn now(&self) -> Instant {
            *self.now.lock().unwrap()
        }
    }

    /// Sink qui enregistre les appels au lieu de jouer de l'audio
    #[derive(Default)]
    struct RecordingSink {
        rendered: Vec<(u64, Instant)>,
        cleared: bool,
    }

    impl AudioSink for RecordingSink {
        fn start(&mut self) -> AudioResult<()> {
            Ok(())
        }

        fn render(&mut self, frame: &AudioFrame, start: Instant) -> AudioResult<()> {
            self.rendered.push((frame.sequence_number, start));
            Ok(())
        }

        fn clear(&mut self) {
            self.cleared = true;
        }

        fn stop(&mut self) -> AudioResult<()> {
            Ok(())
        }
    }

    /// Frame de 20ms (480 échantillons à 24 kHz)
    fn frame_20ms(seq: u64) -> AudioFrame {
        AudioFrame::silence(480, seq)
    }

    #[test]
    fn test_three_instant_frames_are_gapless() {
        let clock = MockClock::new();
        let t0 = clock.current();
        let d = Duration::from_millis(20);
        let mut scheduler = PlaybackScheduler::new(clock);
        let mut sink = RecordingSink::default();

        // Trois frames arrivent au même instant
        scheduler.on_frame(frame_20ms(0), &mut sink).unwrap();
        scheduler.on_frame(frame_20ms(1), &mut sink).unwrap();
        scheduler.on_frame(frame_20ms(2), &mut sink).unwrap();

        // Elles doivent être programmées bout à bout : t0, t0+d, t0+2d
        assert_eq!(sink.rendered.len(), 3);
        assert_eq!(sink.rendered[0], (0, t0));
        assert_eq!(sink.rendered[1], (1, t0 + d));
        assert_eq!(sink.rendered[2], (2, t0 + d + d));
    }

    #[test]
    fn test_late_frame_creates_silent_gap() {
        let clock = MockClock::new();
        let t0 = clock.current();
        let mut scheduler = PlaybackScheduler::new(clock.clone());
        let mut sink = RecordingSink::default();

        scheduler.on_frame(frame_20ms(0), &mut sink).unwrap();

        // La frame suivante arrive 50ms plus tard, bien après la fin de la
        // première (t0+20ms) : elle démarre à l'instant courant, le trou
        // reste du silence
        clock.advance(Duration::from_millis(50));
        scheduler.on_frame(frame_20ms(1), &mut sink).unwrap();

        assert_eq!(sink.rendered[0], (0, t0));
        assert_eq!(sink.rendered[1], (1, t0 + Duration::from_millis(50)));
    }

    #[test]
    fn test_buffering_window_releases_frames_back_to_back() {
        let clock = MockClock::new();
        let t0 = clock.current();
        let d = Duration::from_millis(20);
        let mut scheduler = PlaybackScheduler::new(clock);
        let mut sink = RecordingSink::default();

        scheduler.on_buffer_start();

        // Cinq frames arrivent pendant la phase de buffering : rien ne joue
        for seq in 0..5 {
            scheduler.on_frame(frame_20ms(seq), &mut sink).unwrap();
        }
        assert_eq!(sink.rendered.len(), 0);
        assert_eq!(scheduler.pending_frames(), 5);

        // BufferComplete relâche exactement les cinq frames, bout à bout,
        // dans l'ordre d'arrivée
        scheduler.on_buffer_complete(&mut sink).unwrap();
        assert_eq!(sink.rendered.len(), 5);
        assert_eq!(scheduler.pending_frames(), 0);
        for (i, &(seq, start)) in sink.rendered.iter().enumerate() {
            assert_eq!(seq, i as u64);
            assert_eq!(start, t0 + d * i as u32);
        }
    }

    #[test]
    fn test_frames_after_buffering_continue_gapless() {
        let clock = MockClock::new();
        let t0 = clock.current();
        let d = Duration::from_millis(20);
        let mut scheduler = PlaybackScheduler::new(clock);
        let mut sink = RecordingSink::default();

        scheduler.on_buffer_start();
        scheduler.on_frame(frame_20ms(0), &mut sink).unwrap();
        scheduler.on_buffer_complete(&mut sink).unwrap();

        // Une frame qui arrive hors buffering enchaîne sur la précédente
        scheduler.on_frame(frame_20ms(1), &mut sink).unwrap();
        assert_eq!(sink.rendered[1], (1, t0 + d));
    }

    #[test]
    fn test_clear_resets_scheduling_state() {
        let clock = MockClock::new();
        let mut scheduler = PlaybackScheduler::new(clock.clone());
        let mut sink = RecordingSink::default();

        scheduler.on_buffer_start();
        scheduler.on_frame(frame_20ms(0), &mut sink).unwrap();
        scheduler.clear(&mut sink);

        assert!(sink.cleared);
        assert_eq!(scheduler.pending_frames(), 0);

        // Après un clear, la prochaine frame repart de l'instant courant
        clock.advance(Duration::from_millis(100));
        let t1 = clock.current();
        scheduler.on_frame(frame_20ms(1), &mut sink).unwrap();
        assert_eq!(sink.rendered[0], (1, t1));
    }
}
