//! Session runtime - owns the playback source, drives the engine.
//!
//! This is the effect-execution boundary: the engine stays pure-ish
//! (state + document mutations) and the runtime owns timing. Frame
//! scheduling is last-write-wins: storing a newer handle supersedes an
//! older one, and at most one frame event fires per step. Cleanup
//! timers are fire-and-forget and drain when due.
//!
//! The loop runs on a simulated clock: wall instants are synthesized
//! from the session origin, so throttle arithmetic behaves identically
//! at any simulation speed.

use std::time::{Duration, Instant};

use cuelight_core::document::{ContentRoot, NodeId};
use cuelight_core::highlight::HighlightStyle;
use serde::Serialize;
use tracing::debug;

use crate::effects::EngineEffect;
use crate::events::{FrameHandle, PlayerEvent};
use crate::state::SyncEngine;

/// The playback collaborator interface.
pub trait PlaybackSource {
    /// Current position in seconds.
    fn position(&self) -> f64;
    fn is_paused(&self) -> bool;
    /// Moves the play head. Positions clamp to the stream bounds.
    fn seek(&mut self, position: f64);
    /// True once the stream has played to its end.
    fn ended(&self) -> bool;
    /// Advances a session-driven source by `dt` seconds. Sources with
    /// their own clock ignore this.
    fn advance(&mut self, dt: f64) {
        let _ = dt;
    }
}

/// Scriptable playback source for tests and the simulator.
#[derive(Debug, Clone)]
pub struct SimulatedPlayer {
    position: f64,
    duration: f64,
    paused: bool,
}

impl SimulatedPlayer {
    pub fn new(duration: f64) -> Self {
        Self {
            position: 0.0,
            duration,
            paused: false,
        }
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn play(&mut self) {
        self.paused = false;
    }
}

impl PlaybackSource for SimulatedPlayer {
    fn position(&self) -> f64 {
        self.position
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn seek(&mut self, position: f64) {
        self.position = position.clamp(0.0, self.duration);
    }

    fn ended(&self) -> bool {
        self.position >= self.duration
    }

    fn advance(&mut self, dt: f64) {
        if !self.paused {
            self.position = (self.position + dt).min(self.duration);
        }
    }
}

/// One observed change of the active cue.
#[derive(Debug, Clone, Serialize)]
pub struct Transition {
    /// Playback position when the change was observed.
    pub media_time: f64,
    /// Sorted-index position of the cue, -1 for none.
    pub cue_index: i64,
    pub cue_id: Option<String>,
    pub style: Option<HighlightStyle>,
}

struct CleanupTimer {
    due_at: f64,
    node: NodeId,
}

/// Cooperative single-threaded session loop around one engine and one
/// playback source.
pub struct SessionRuntime<D: ContentRoot, P: PlaybackSource> {
    engine: SyncEngine<D>,
    player: P,
    origin: Instant,
    /// Simulated seconds since the session started.
    clock: f64,
    pending_frame: Option<FrameHandle>,
    cleanups: Vec<CleanupTimer>,
    transitions: Vec<Transition>,
    last_seen_index: Option<usize>,
    ended_notified: bool,
}

impl<D: ContentRoot, P: PlaybackSource> SessionRuntime<D, P> {
    pub fn new(engine: SyncEngine<D>, player: P) -> Self {
        Self {
            engine,
            player,
            origin: Instant::now(),
            clock: 0.0,
            pending_frame: None,
            cleanups: Vec::new(),
            transitions: Vec::new(),
            last_seen_index: None,
            ended_notified: false,
        }
    }

    pub fn engine(&self) -> &SyncEngine<D> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut SyncEngine<D> {
        &mut self.engine
    }

    pub fn player(&self) -> &P {
        &self.player
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    fn now(&self) -> Instant {
        self.origin + Duration::from_secs_f64(self.clock)
    }

    fn dispatch(&mut self, event: PlayerEvent) {
        let effects = self.engine.handle_event(event);
        self.execute(effects);
    }

    fn execute(&mut self, effects: Vec<EngineEffect>) {
        for effect in effects {
            match effect {
                EngineEffect::ScheduleFrame { handle } => {
                    // Last write wins; a replaced handle simply never
                    // matches when its frame would have fired.
                    self.pending_frame = Some(handle);
                }
                EngineEffect::Seek { position } => {
                    debug!(position, "seek");
                    self.player.seek(position);
                }
                EngineEffect::ScheduleCleanup { node, delay } => {
                    self.cleanups.push(CleanupTimer {
                        due_at: self.clock + delay.as_secs_f64(),
                        node,
                    });
                }
            }
        }
    }

    /// Simulates a click on a document node.
    pub fn click(&mut self, node: NodeId) {
        self.dispatch(PlayerEvent::Click { node });
        self.record_transition();
    }

    /// Advances the session by `dt` seconds: fires due cleanup timers,
    /// fires at most one pending frame, then feeds the next time
    /// update (or the end-of-stream notification).
    pub fn step(&mut self, dt: f64) {
        self.clock += dt;
        self.player.advance(dt);

        let due: Vec<NodeId> = {
            let clock = self.clock;
            let (ready, rest): (Vec<CleanupTimer>, Vec<CleanupTimer>) = self
                .cleanups
                .drain(..)
                .partition(|timer| timer.due_at <= clock);
            self.cleanups = rest;
            ready.into_iter().map(|timer| timer.node).collect()
        };
        for node in due {
            self.engine.on_cleanup(node);
        }

        if let Some(handle) = self.pending_frame.take() {
            let at = self.now();
            self.dispatch(PlayerEvent::Frame { handle, at });
        }

        if self.player.ended() {
            if !self.ended_notified {
                self.ended_notified = true;
                self.dispatch(PlayerEvent::Ended);
            }
        } else if !self.player.is_paused() {
            let at = self.now();
            let position = self.player.position();
            self.dispatch(PlayerEvent::TimeUpdate { position, at });
        }

        self.record_transition();
    }

    /// Runs until the stream ends and all pending work has drained.
    pub fn run_to_end(&mut self, step_secs: f64) {
        // Hard ceiling so a zero-or-negative step can never spin forever.
        let mut remaining = 1_000_000u32;
        while remaining > 0 {
            self.step(step_secs.max(0.001));
            remaining -= 1;
            if self.ended_notified && self.pending_frame.is_none() && self.cleanups.is_empty() {
                break;
            }
        }
    }

    fn record_transition(&mut self) {
        let index = self.engine.current_index();
        if index == self.last_seen_index {
            return;
        }
        self.last_seen_index = index;
        self.transitions.push(Transition {
            media_time: self.player.position(),
            cue_index: index.map_or(-1, |position| position as i64),
            cue_id: self.engine.current_cue_id().map(str::to_string),
            style: self.engine.last_style(),
        });
    }
}

#[cfg(test)]
mod tests {
    use cuelight_core::config::EngineConfig;
    use cuelight_core::document::{CUE_ID_ATTR, DocumentModel, Rect};
    use cuelight_core::highlight::is_highlighted;

    use super::*;

    const TRANSCRIPT: &str = "1\n00:00:00,000 --> 00:00:02,000\nfirst\n\n2\n00:00:02,000 --> 00:00:05,000\nsecond\n\n3\n00:00:05,000 --> 00:00:08,000\nthird";

    fn document() -> (DocumentModel, Vec<NodeId>) {
        let mut doc = DocumentModel::new(300.0);
        let root = doc.root();
        let mut spans = Vec::new();
        for (position, id) in ["1", "2", "3"].iter().enumerate() {
            let paragraph = doc.append_element(root, "p");
            let y = position as f64 * 200.0;
            doc.set_bounds(paragraph, Rect::new(0.0, y, 600.0, 180.0));
            doc.append_text(paragraph, "Some ");
            let span = doc.append_element(paragraph, "span");
            doc.set_attr(span, CUE_ID_ATTR, id);
            doc.set_bounds(span, Rect::new(10.0, y + 20.0, 200.0, 20.0));
            doc.append_text(paragraph, " prose.");
            spans.push(span);
        }
        (doc, spans)
    }

    fn session() -> (SessionRuntime<DocumentModel, SimulatedPlayer>, Vec<NodeId>) {
        let (doc, spans) = document();
        let engine = SyncEngine::new(doc, TRANSCRIPT, EngineConfig::default()).unwrap();
        (SessionRuntime::new(engine, SimulatedPlayer::new(9.0)), spans)
    }

    #[test]
    fn test_simulation_visits_every_cue_in_order() {
        let (mut session, _) = session();
        session.run_to_end(0.25);
        let ids: Vec<Option<String>> = session
            .transitions()
            .iter()
            .map(|transition| transition.cue_id.clone())
            .collect();
        assert_eq!(
            ids,
            vec![
                Some("1".to_string()),
                Some("2".to_string()),
                Some("3".to_string()),
                None
            ]
        );
        // Media time never decreases across transitions.
        let times: Vec<f64> = session
            .transitions()
            .iter()
            .map(|transition| transition.media_time)
            .collect();
        assert!(times.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn test_at_most_one_highlight_every_step() {
        let (mut session, spans) = session();
        for _ in 0..80 {
            session.step(0.12);
            let active = spans
                .iter()
                .filter(|&&span| is_highlighted(session.engine().document(), span))
                .count();
            assert!(active <= 1);
        }
    }

    #[test]
    fn test_cleanup_timers_clear_previous_nodes() {
        let (mut session, spans) = session();
        session.run_to_end(0.25);
        // All fades have drained; only highlight-free nodes remain
        // besides (possibly) the final state, which Ended also cleared.
        for span in spans {
            assert!(
                session
                    .engine()
                    .document()
                    .class_names(span)
                    .is_empty(),
                "span kept stale classes"
            );
        }
    }

    #[test]
    fn test_click_seeks_the_player() {
        let (mut session, spans) = session();
        session.step(0.25);
        session.click(spans[2]);
        assert_eq!(session.player().position(), 5.0);
        assert_eq!(session.engine().current_cue_id(), Some("3"));
        // The next steps resume from the seek position.
        session.step(0.25);
        assert_eq!(session.engine().current_cue_id(), Some("3"));
    }

    #[test]
    fn test_autoscroll_follows_playback() {
        let (mut session, _) = session();
        assert_eq!(session.engine().document().scroll_top(), 0.0);
        session.run_to_end(0.25);
        // Later cues sit at y=400+; the viewport is 300 tall, so the
        // session must have scrolled away from the top.
        assert!(session.engine().document().scroll_top() > 0.0);
    }

    #[test]
    fn test_paused_player_holds_position_and_highlight() {
        let (mut session, _) = session();
        // Two steps: the first schedules the frame, the second fires it.
        session.step(0.25);
        session.step(0.25);
        assert_eq!(session.engine().current_cue_id(), Some("1"));
        session.engine_mut().handle_event(PlayerEvent::Pause);
        let before = session.player().position();
        for _ in 0..12 {
            session.step(0.25);
        }
        // The simulated player still advances its own clock, but the
        // engine ignored every update while paused.
        assert!(session.player().position() > before);
        assert_eq!(session.engine().current_cue_id(), Some("1"));
    }
}
