//! The update pipeline (reducer).
//!
//! Every player event funnels through `handle_event`. Time updates run
//! the gate chain (reentrancy, pause, throttle, jitter) before cue
//! lookup; an index change schedules a visual update on the next frame,
//! superseding any schedule that has not fired yet. The frame callback
//! performs the only visual mutation: resolve, classify, highlight,
//! scroll.

use std::time::Instant;

use cuelight_core::document::{ContentRoot, NodeGeometry, NodeId};
use cuelight_core::error::SyncError;
use cuelight_core::highlight::{self, HighlightStyle};
use cuelight_core::layout;
use cuelight_core::locator::marker_to_cue_id;
use cuelight_core::scroll;
use tracing::{debug, warn};

use crate::effects::EngineEffect;
use crate::events::{FrameHandle, PlayerEvent};
use crate::state::{PendingFrame, SyncEngine};

impl<D: ContentRoot> SyncEngine<D> {
    /// Processes one event and returns the effects the runtime must
    /// execute.
    pub fn handle_event(&mut self, event: PlayerEvent) -> Vec<EngineEffect> {
        match event {
            PlayerEvent::TimeUpdate { position, at } => self.on_time_update(position, at),
            PlayerEvent::Frame { handle, at } => self.on_frame(handle, at),
            PlayerEvent::Click { node } => self.on_click(node),
            PlayerEvent::Play => {
                self.paused = false;
                Vec::new()
            }
            PlayerEvent::Pause => {
                self.paused = true;
                Vec::new()
            }
            PlayerEvent::Ended => self.on_ended(),
            PlayerEvent::PlayerError { message } => {
                warn!(%message, "playback source reported an error");
                Vec::new()
            }
        }
    }

    /// Deferred half of a highlight removal. Called by the runtime when
    /// a cleanup timer fires; late or repeated calls are harmless.
    pub fn on_cleanup(&mut self, node: NodeId) {
        if self.last_highlighted == Some(node) {
            // The node was re-activated while the timer was pending.
            return;
        }
        highlight::finish_remove(&mut self.document, node);
    }

    fn on_time_update(&mut self, position: f64, at: Instant) -> Vec<EngineEffect> {
        if self.is_updating || self.paused {
            return Vec::new();
        }

        if let Some(last) = self.last_processed_at {
            if at.duration_since(last) < self.config.throttle_interval() {
                return Vec::new();
            }
        }

        let adjusted = position + self.time_offset;
        if let Some(last) = self.last_adjusted {
            if (adjusted - last).abs() < self.config.scheduler.jitter_secs {
                return Vec::new();
            }
        }
        self.last_processed_at = Some(at);
        self.last_adjusted = Some(adjusted);

        let index = self.timeline.find_cue_index(adjusted, self.current_index);
        if index == self.current_index {
            return Vec::new();
        }
        self.schedule_render(index)
    }

    /// Defers the visual update to the next frame. A newer schedule
    /// supersedes an older one; work stays bounded at one visual
    /// mutation per frame no matter the update frequency.
    fn schedule_render(&mut self, index: Option<usize>) -> Vec<EngineEffect> {
        self.is_updating = true;
        if self.pending_frame.is_some() {
            debug!("superseding pending visual update");
        }
        self.next_frame_id += 1;
        let handle = FrameHandle(self.next_frame_id);
        self.pending_frame = Some(PendingFrame { handle, index });
        vec![EngineEffect::ScheduleFrame { handle }]
    }

    fn on_frame(&mut self, handle: FrameHandle, _at: Instant) -> Vec<EngineEffect> {
        let Some(pending) = self.pending_frame else {
            return Vec::new();
        };
        if pending.handle != handle {
            // Superseded while queued; the newer frame does the work.
            return Vec::new();
        }
        self.pending_frame = None;
        self.render_active(pending.index)
    }

    /// Click-to-seek reverse path: map the clicked region back to its
    /// cue, seek the playback source, and re-run the render pipeline
    /// immediately instead of waiting for the next natural update.
    fn on_click(&mut self, node: NodeId) -> Vec<EngineEffect> {
        let Some(marker) = self.document.cue_marker_at(node) else {
            return Vec::new();
        };
        let marker = marker.to_string();
        let position = self
            .timeline
            .position_of_id(&marker)
            .or_else(|| self.timeline.position_of_id(marker_to_cue_id(&marker)));
        let Some(position) = position else {
            debug!(%marker, "clicked region has no matching cue");
            return Vec::new();
        };
        let Some(entry) = self.timeline.entry(position) else {
            return Vec::new();
        };
        let start = entry.start;

        // Supersede any pending frame; this render happens now.
        self.pending_frame = None;
        self.last_adjusted = Some(start);

        let mut effects = vec![EngineEffect::Seek {
            position: start - self.time_offset,
        }];
        effects.extend(self.render_active(Some(position)));
        effects
    }

    fn on_ended(&mut self) -> Vec<EngineEffect> {
        self.pending_frame = None;
        self.is_updating = false;
        self.current_index = None;
        self.last_style = None;
        let mut effects = Vec::new();
        if let Some(previous) = self.last_highlighted.take() {
            highlight::begin_remove(&mut self.document, previous);
            effects.push(EngineEffect::ScheduleCleanup {
                node: previous,
                delay: self.config.fade_delay(),
            });
        }
        effects
    }

    /// The visual half of the pipeline: one mutation pass over the
    /// document for the given active index.
    fn render_active(&mut self, index: Option<usize>) -> Vec<EngineEffect> {
        let mut effects = Vec::new();

        let target = index.and_then(|position| {
            let cue_id = self.timeline.entry(position)?.id.clone();
            let evictions_before = self.locator.stats().evictions;
            let resolved = self.locator.resolve(&self.document, &cue_id);
            if self.locator.stats().evictions > evictions_before {
                // The node this id used to resolve to is gone; its
                // cached layout no longer describes anything real.
                self.layout_cache.remove(&cue_id);
            }
            match resolved {
                Some(node) => Some((cue_id, node)),
                None => {
                    let error = SyncError::Resolution { cue_id };
                    warn!(%error, "skipping render for this activation");
                    None
                }
            }
        });

        if let Some(previous) = self.last_highlighted {
            let still_active = target.as_ref().is_some_and(|(_, node)| *node == previous);
            if !still_active {
                highlight::begin_remove(&mut self.document, previous);
                effects.push(EngineEffect::ScheduleCleanup {
                    node: previous,
                    delay: self.config.fade_delay(),
                });
                self.last_highlighted = None;
                self.last_style = None;
            }
        }

        if let Some((cue_id, node)) = target {
            let descriptor = match self.layout_cache.get(&cue_id) {
                Some(cached) => *cached,
                None => {
                    let geometry = self.document.geometry(node).unwrap_or(NodeGeometry {
                        inline: false,
                        in_paragraph: false,
                        element_sibling_count: 0,
                        text_sibling_count: 0,
                        parent_width: 0.0,
                        width: 0.0,
                        height: 0.0,
                    });
                    let descriptor = layout::classify(&geometry);
                    self.layout_cache.insert(cue_id, descriptor);
                    descriptor
                }
            };
            let style = HighlightStyle::choose(&descriptor);
            highlight::apply(&mut self.document, node, style);
            if self.autoscroll {
                scroll::ensure_visible(&mut self.document, node, self.config.render.scroll_margin_px);
            }
            self.last_highlighted = Some(node);
            self.last_style = Some(style);
        }

        self.current_index = index;
        self.is_updating = false;
        effects
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use cuelight_core::config::EngineConfig;
    use cuelight_core::document::{CUE_ID_ATTR, DocumentModel, NodeId, Rect};
    use cuelight_core::highlight::is_highlighted;

    use super::*;

    const TRANSCRIPT: &str = "1\n00:00:00,000 --> 00:00:02,000\nfirst\n\n2\n00:00:02,000 --> 00:00:05,000\nsecond\n\n3\n00:00:05,000 --> 00:00:09,000\nthird";

    /// One paragraph per cue, spans carrying aliased markers.
    fn document() -> (DocumentModel, Vec<NodeId>) {
        let mut doc = DocumentModel::new(400.0);
        let root = doc.root();
        let mut spans = Vec::new();
        for (position, id) in ["1", "2", "3"].iter().enumerate() {
            let paragraph = doc.append_element(root, "p");
            let y = position as f64 * 120.0;
            doc.set_bounds(paragraph, Rect::new(0.0, y, 600.0, 100.0));
            doc.append_text(paragraph, "Lorem ");
            let span = doc.append_element(paragraph, "span");
            doc.set_attr(span, CUE_ID_ATTR, &format!("s{id}"));
            doc.set_bounds(span, Rect::new(20.0, y + 10.0, 200.0, 20.0));
            doc.append_text(paragraph, " ipsum.");
            spans.push(span);
        }
        (doc, spans)
    }

    fn engine() -> (SyncEngine<DocumentModel>, Vec<NodeId>, Instant) {
        let (doc, spans) = document();
        let engine = SyncEngine::new(doc, TRANSCRIPT, EngineConfig::default()).unwrap();
        (engine, spans, Instant::now())
    }

    fn at(origin: Instant, ms: u64) -> Instant {
        origin + Duration::from_millis(ms)
    }

    /// Drives a time update and immediately fires the frame it
    /// scheduled, if any.
    fn advance(engine: &mut SyncEngine<DocumentModel>, position: f64, when: Instant) -> Vec<EngineEffect> {
        let mut effects = engine.handle_event(PlayerEvent::TimeUpdate { position, at: when });
        let mut out = Vec::new();
        while let Some(index) = effects
            .iter()
            .position(|effect| matches!(effect, EngineEffect::ScheduleFrame { .. }))
        {
            let EngineEffect::ScheduleFrame { handle } = effects.remove(index) else {
                unreachable!()
            };
            out.extend(engine.handle_event(PlayerEvent::Frame { handle, at: when }));
        }
        out.extend(effects);
        out
    }

    fn highlighted_count(doc: &DocumentModel, spans: &[NodeId]) -> usize {
        spans
            .iter()
            .filter(|&&span| is_highlighted(doc, span))
            .count()
    }

    #[test]
    fn test_update_highlights_active_cue() {
        let (mut engine, spans, origin) = engine();
        advance(&mut engine, 0.5, origin);
        assert_eq!(engine.current_cue_id(), Some("1"));
        assert!(is_highlighted(engine.document(), spans[0]));
        assert!(engine.last_style().is_some());
    }

    #[test]
    fn test_throttle_drops_close_signals() {
        let (mut engine, _, origin) = engine();
        advance(&mut engine, 0.5, origin);

        // 5ms after the first processed signal: dropped by the 20ms
        // throttle even though the position moved substantially.
        let effects = engine.handle_event(PlayerEvent::TimeUpdate {
            position: 3.0,
            at: at(origin, 5),
        });
        assert!(effects.is_empty());
        assert_eq!(engine.current_cue_id(), Some("1"));

        // Past the throttle interval the same position processes.
        advance(&mut engine, 3.0, at(origin, 30));
        assert_eq!(engine.current_cue_id(), Some("2"));
    }

    #[test]
    fn test_jitter_suppression_does_not_consume_throttle_slot() {
        let (mut engine, _, origin) = engine();
        advance(&mut engine, 0.5, origin);

        // Well past the throttle, but the adjusted time barely moved:
        // jitter-dropped, and the throttle clock must not advance.
        let effects = engine.handle_event(PlayerEvent::TimeUpdate {
            position: 0.52,
            at: at(origin, 100),
        });
        assert!(effects.is_empty());

        // 10ms later: under the throttle relative to the jitter-dropped
        // signal, but over it relative to the last processed one.
        let effects = advance(&mut engine, 3.0, at(origin, 110));
        assert!(!effects.is_empty() || engine.current_cue_id() == Some("2"));
        assert_eq!(engine.current_cue_id(), Some("2"));
    }

    #[test]
    fn test_reentrancy_guard_drops_updates_while_frame_pending() {
        let (mut engine, _, origin) = engine();
        let effects = engine.handle_event(PlayerEvent::TimeUpdate {
            position: 0.5,
            at: origin,
        });
        assert_eq!(effects.len(), 1);

        // Frame not fired yet: the engine is mid-update and drops the
        // next signal outright.
        let dropped = engine.handle_event(PlayerEvent::TimeUpdate {
            position: 3.0,
            at: at(origin, 50),
        });
        assert!(dropped.is_empty());

        // Fire the pending frame; updates flow again.
        let EngineEffect::ScheduleFrame { handle } = effects[0] else {
            panic!("expected a frame schedule");
        };
        engine.handle_event(PlayerEvent::Frame {
            handle,
            at: at(origin, 60),
        });
        assert_eq!(engine.current_cue_id(), Some("1"));
        advance(&mut engine, 3.0, at(origin, 100));
        assert_eq!(engine.current_cue_id(), Some("2"));
    }

    #[test]
    fn test_paused_playback_drops_updates() {
        let (mut engine, _, origin) = engine();
        engine.handle_event(PlayerEvent::Pause);
        let effects = engine.handle_event(PlayerEvent::TimeUpdate {
            position: 0.5,
            at: origin,
        });
        assert!(effects.is_empty());
        engine.handle_event(PlayerEvent::Play);
        advance(&mut engine, 0.5, at(origin, 30));
        assert_eq!(engine.current_cue_id(), Some("1"));
    }

    #[test]
    fn test_at_most_one_highlight_across_updates() {
        let (mut engine, spans, origin) = engine();
        let mut when = origin;
        for step in 0..30 {
            when = at(origin, step * 40);
            let position = step as f64 * 0.3;
            advance(&mut engine, position, when);
            assert!(
                highlighted_count(engine.document(), &spans) <= 1,
                "more than one active highlight at t={position}"
            );
        }
    }

    #[test]
    fn test_transition_emits_cleanup_for_previous_node() {
        let (mut engine, spans, origin) = engine();
        advance(&mut engine, 0.5, origin);
        let effects = advance(&mut engine, 3.0, at(origin, 40));
        let cleanup = effects.iter().find_map(|effect| match effect {
            EngineEffect::ScheduleCleanup { node, .. } => Some(*node),
            _ => None,
        });
        assert_eq!(cleanup, Some(spans[0]));

        // Until the deferred cleanup runs, the old node only keeps its
        // fade-out marker state; afterwards it is fully clean.
        engine.on_cleanup(spans[0]);
        assert!(engine.document().class_names(spans[0]).is_empty());
        assert!(is_highlighted(engine.document(), spans[1]));
    }

    #[test]
    fn test_stale_cleanup_for_reactivated_node_is_skipped() {
        let (mut engine, spans, origin) = engine();
        advance(&mut engine, 0.5, origin);
        advance(&mut engine, 3.0, at(origin, 40));
        // Back to cue 1 before its cleanup timer fired.
        advance(&mut engine, 0.5, at(origin, 80));
        engine.on_cleanup(spans[0]);
        assert!(is_highlighted(engine.document(), spans[0]));
    }

    #[test]
    fn test_unchanged_index_is_a_no_op() {
        let (mut engine, _, origin) = engine();
        advance(&mut engine, 0.5, origin);
        let effects = engine.handle_event(PlayerEvent::TimeUpdate {
            position: 1.0,
            at: at(origin, 40),
        });
        assert!(effects.is_empty());
    }

    #[test]
    fn test_resolution_miss_skips_render_but_tracks_index() {
        let (doc, _) = document();
        let transcript = format!("{TRANSCRIPT}\n\nghost\n00:00:09,000 --> 00:00:11,000\nmissing");
        let mut engine = SyncEngine::new(doc, &transcript, EngineConfig::default()).unwrap();
        let origin = Instant::now();
        advance(&mut engine, 9.5, origin);
        assert_eq!(engine.current_cue_id(), Some("ghost"));
        assert_eq!(engine.last_style(), None);
        assert_eq!(engine.diagnostics().element_misses, 1);
    }

    #[test]
    fn test_click_seeks_and_renders_immediately() {
        let (mut engine, spans, origin) = engine();
        engine.set_time_offset(0.25);
        advance(&mut engine, 0.5, origin);

        let effects = engine.handle_event(PlayerEvent::Click { node: spans[2] });
        let seek = effects.iter().find_map(|effect| match effect {
            EngineEffect::Seek { position } => Some(*position),
            _ => None,
        });
        // Cue 3 starts at 5.0; the seek compensates for the offset.
        assert_eq!(seek, Some(4.75));
        // No frame round-trip: the highlight moved already.
        assert_eq!(engine.current_cue_id(), Some("3"));
        assert!(is_highlighted(engine.document(), spans[2]));
    }

    #[test]
    fn test_click_supersedes_pending_frame() {
        let (mut engine, spans, origin) = engine();
        let effects = engine.handle_event(PlayerEvent::TimeUpdate {
            position: 0.5,
            at: origin,
        });
        let EngineEffect::ScheduleFrame { handle } = effects[0] else {
            panic!("expected a frame schedule");
        };

        engine.handle_event(PlayerEvent::Click { node: spans[1] });
        assert_eq!(engine.current_cue_id(), Some("2"));

        // The stale frame fires afterwards and must not roll back.
        engine.handle_event(PlayerEvent::Frame {
            handle,
            at: at(origin, 16),
        });
        assert_eq!(engine.current_cue_id(), Some("2"));
        assert!(is_highlighted(engine.document(), spans[1]));
        assert!(!is_highlighted(engine.document(), spans[0]));
    }

    #[test]
    fn test_click_outside_cue_regions_is_ignored() {
        let (mut engine, _, _) = engine();
        let root = engine.document().root();
        let stray = engine.document_mut().append_element(root, "div");
        let effects = engine.handle_event(PlayerEvent::Click { node: stray });
        assert!(effects.is_empty());
    }

    #[test]
    fn test_ended_clears_highlight_and_index() {
        let (mut engine, spans, origin) = engine();
        advance(&mut engine, 0.5, origin);
        let effects = engine.handle_event(PlayerEvent::Ended);
        assert_eq!(engine.current_index(), None);
        assert!(matches!(
            effects.as_slice(),
            [EngineEffect::ScheduleCleanup { .. }]
        ));
        engine.on_cleanup(spans[0]);
        assert!(!is_highlighted(engine.document(), spans[0]));
    }

    #[test]
    fn test_layout_descriptor_is_cached_per_cue() {
        let (mut engine, _, origin) = engine();
        advance(&mut engine, 0.5, origin);
        assert_eq!(engine.diagnostics().cached_layouts, 1);
        advance(&mut engine, 3.0, at(origin, 40));
        advance(&mut engine, 0.5, at(origin, 80));
        // Returning to cue 1 reuses its descriptor.
        assert_eq!(engine.diagnostics().cached_layouts, 2);
    }
}
