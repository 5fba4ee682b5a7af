//! Player-facing event types.
//!
//! Events carry their own wall-clock instant so throttling stays
//! deterministic under test and under simulated clocks; the engine
//! never reads the system clock itself.

use std::time::Instant;

use cuelight_core::document::NodeId;

/// Identifies one scheduled visual update. A newer schedule supersedes
/// an older one; a frame event whose handle no longer matches the
/// pending schedule is stale and gets dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub(crate) u64);

/// Everything the playback source and the host UI can tell the engine.
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    /// Periodic position report from the playback source.
    TimeUpdate { position: f64, at: Instant },
    /// A previously scheduled visual update is due.
    Frame { handle: FrameHandle, at: Instant },
    /// The user clicked a transcript region.
    Click { node: NodeId },
    Play,
    Pause,
    /// End of stream.
    Ended,
    /// Playback-source failure. Observability only; sync state is kept
    /// so playback can resume where it was.
    PlayerError { message: String },
}
