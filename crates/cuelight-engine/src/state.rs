//! Engine state: caches, sync position, scheduler flags.
//!
//! One `SyncEngine` owns one document, one parsed transcript and every
//! cache derived from them. Construction validates the required inputs
//! and fails synchronously; everything after construction degrades
//! instead of failing. `teardown` returns the engine to an inert state
//! and leaves the document without highlight classes.

use std::collections::HashMap;
use std::time::Instant;

use cuelight_core::config::EngineConfig;
use cuelight_core::cues::{self, Cue, ParseReport, ParsedTranscript, TimestampMemo};
use cuelight_core::diagnostics::SyncDiagnostics;
use cuelight_core::document::{ContentRoot, NodeId};
use cuelight_core::error::{SyncError, SyncResult};
use cuelight_core::highlight::{self, HighlightStyle};
use cuelight_core::layout::LayoutDescriptor;
use cuelight_core::locator::ElementLocator;
use cuelight_core::timeline::Timeline;

use crate::events::FrameHandle;

/// A scheduled-but-not-yet-fired visual update.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PendingFrame {
    pub handle: FrameHandle,
    /// Sorted-index position to render when the frame fires.
    pub index: Option<usize>,
}

/// The sync engine. Generic over the document implementation so tests
/// and the simulator run against the in-memory model while a real host
/// can bring its own tree.
pub struct SyncEngine<D: ContentRoot> {
    pub(crate) document: D,
    pub(crate) cues: Vec<Cue>,
    pub(crate) timeline: Timeline,
    pub(crate) locator: ElementLocator,
    pub(crate) layout_cache: HashMap<String, LayoutDescriptor>,
    pub(crate) memo: TimestampMemo,
    pub(crate) parse_report: ParseReport,
    pub(crate) config: EngineConfig,

    pub(crate) current_index: Option<usize>,
    pub(crate) last_highlighted: Option<NodeId>,
    pub(crate) last_style: Option<HighlightStyle>,
    pub(crate) time_offset: f64,
    pub(crate) autoscroll: bool,
    pub(crate) is_updating: bool,
    pub(crate) pending_frame: Option<PendingFrame>,
    pub(crate) next_frame_id: u64,
    pub(crate) last_processed_at: Option<Instant>,
    pub(crate) last_adjusted: Option<f64>,
    pub(crate) paused: bool,
}

impl<D: ContentRoot> SyncEngine<D> {
    /// Builds an engine from raw transcript text, parsing synchronously.
    pub fn new(document: D, transcript: &str, config: EngineConfig) -> SyncResult<Self> {
        let parsed = cues::parse_transcript(transcript, config.limits.timestamp_memo_entries);
        Self::from_parsed(document, parsed, config)
    }

    /// Builds an engine from an already-parsed transcript (the async
    /// loader path).
    pub fn from_parsed(
        document: D,
        parsed: ParsedTranscript,
        config: EngineConfig,
    ) -> SyncResult<Self> {
        if document.is_empty() {
            return Err(SyncError::Initialization(
                "content root has no descendants".to_string(),
            ));
        }
        if parsed.cues.is_empty() {
            return Err(SyncError::Initialization(format!(
                "transcript produced no cues ({} blocks dropped)",
                parsed.report.dropped.len()
            )));
        }

        let timeline = Timeline::new(&parsed.cues, &config.timing);
        let autoscroll = config.render.autoscroll;
        Ok(Self {
            document,
            cues: parsed.cues,
            timeline,
            locator: ElementLocator::new(),
            layout_cache: HashMap::new(),
            memo: parsed.memo,
            parse_report: parsed.report,
            config,
            current_index: None,
            last_highlighted: None,
            last_style: None,
            time_offset: 0.0,
            autoscroll,
            is_updating: false,
            pending_frame: None,
            next_frame_id: 0,
            last_processed_at: None,
            last_adjusted: None,
            paused: false,
        })
    }

    pub fn document(&self) -> &D {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut D {
        &mut self.document
    }

    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    pub fn parse_report(&self) -> &ParseReport {
        &self.parse_report
    }

    /// Sorted-index position of the active cue.
    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    /// Id of the active cue, if any.
    pub fn current_cue_id(&self) -> Option<&str> {
        let position = self.current_index?;
        self.timeline.entry(position).map(|entry| entry.id.as_str())
    }

    /// Style applied by the most recent render, while a highlight is
    /// active.
    pub fn last_style(&self) -> Option<HighlightStyle> {
        self.last_style
    }

    pub fn time_offset(&self) -> f64 {
        self.time_offset
    }

    /// Offset added to every playback position before cue lookup, for
    /// transcripts cut against a different media edit.
    pub fn set_time_offset(&mut self, offset: f64) {
        self.time_offset = offset;
    }

    pub fn set_autoscroll(&mut self, enabled: bool) {
        self.autoscroll = enabled;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Snapshot of counters and cache sizes for external monitoring.
    pub fn diagnostics(&self) -> SyncDiagnostics {
        let mut diagnostics = SyncDiagnostics::from_locator(&self.locator.stats());
        diagnostics.cached_layouts = self.layout_cache.len();
        diagnostics.cached_timestamps = self.memo.len();
        diagnostics.parsed_cues = self.cues.len();
        diagnostics.dropped_blocks = self.parse_report.dropped.len();
        diagnostics.current_index = self.current_index.map_or(-1, |index| index as i64);
        diagnostics
    }

    /// Clears every cache, removes any active highlight immediately and
    /// resets the scheduler. The engine is inert afterwards until new
    /// events arrive.
    pub fn teardown(&mut self) {
        if let Some(node) = self.last_highlighted.take() {
            highlight::begin_remove(&mut self.document, node);
            highlight::finish_remove(&mut self.document, node);
        }
        self.locator.clear();
        self.layout_cache.clear();
        self.memo.clear();
        self.current_index = None;
        self.last_style = None;
        self.is_updating = false;
        self.pending_frame = None;
        self.last_processed_at = None;
        self.last_adjusted = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cuelight_core::document::DocumentModel;

    const TRANSCRIPT: &str = "1\n00:00:00,000 --> 00:00:02,000\nfirst\n\n2\n00:00:02,000 --> 00:00:05,000\nsecond";

    fn document() -> DocumentModel {
        let mut doc = DocumentModel::new(400.0);
        let root = doc.root();
        let span = doc.append_element(root, "span");
        doc.set_attr(span, cuelight_core::document::CUE_ID_ATTR, "1");
        doc
    }

    #[test]
    fn test_construction_requires_document_content() {
        let empty = DocumentModel::new(400.0);
        let result = SyncEngine::new(empty, TRANSCRIPT, EngineConfig::default());
        assert!(matches!(result, Err(SyncError::Initialization(_))));
    }

    #[test]
    fn test_construction_requires_cues() {
        let result = SyncEngine::new(document(), "not a transcript", EngineConfig::default());
        assert!(matches!(result, Err(SyncError::Initialization(_))));
    }

    #[test]
    fn test_fresh_engine_state() {
        let engine = SyncEngine::new(document(), TRANSCRIPT, EngineConfig::default()).unwrap();
        assert_eq!(engine.current_index(), None);
        assert_eq!(engine.current_cue_id(), None);
        assert_eq!(engine.diagnostics().current_index, -1);
        assert_eq!(engine.diagnostics().parsed_cues, 2);
        assert!(!engine.is_paused());
    }

    #[test]
    fn test_teardown_clears_caches() {
        let mut engine = SyncEngine::new(document(), TRANSCRIPT, EngineConfig::default()).unwrap();
        engine.teardown();
        let diagnostics = engine.diagnostics();
        assert_eq!(diagnostics.cached_elements, 0);
        assert_eq!(diagnostics.cached_timestamps, 0);
        assert_eq!(diagnostics.current_index, -1);
    }
}
