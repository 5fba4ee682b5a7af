//! Effects returned by the engine for the runtime to execute.
//!
//! The engine mutates its own state and the document; everything that
//! involves timing or the playback source comes back as an effect.

use std::time::Duration;

use cuelight_core::document::NodeId;

use crate::events::FrameHandle;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineEffect {
    /// Schedule a visual update on the next render frame. Replaces any
    /// earlier not-yet-fired schedule; last write wins.
    ScheduleFrame { handle: FrameHandle },

    /// Move the playback source to a new position (seconds).
    Seek { position: f64 },

    /// Run the deferred half of a highlight removal after the fade
    /// delay. Fire-and-forget; never cancelled.
    ScheduleCleanup { node: NodeId, delay: Duration },
}
