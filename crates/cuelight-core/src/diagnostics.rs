//! Diagnostics snapshot for external monitoring.
//!
//! Observability only; nothing here feeds back into resolution or
//! rendering decisions.

use serde::{Deserialize, Serialize};

use crate::locator::LocatorStats;

/// Point-in-time view of the engine's caches and sync position,
/// serializable for monitoring collaborators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncDiagnostics {
    /// Element-cache hits.
    pub element_hits: u64,
    /// Lookups that ran the strategy chain or failed.
    pub element_misses: u64,
    /// Hit share of all lookups, 0.0 when none happened yet.
    pub hit_rate: f64,
    /// Cached nodes dropped after detaching from the live document.
    pub cache_evictions: u64,
    pub cached_elements: usize,
    pub cached_strategies: usize,
    pub cached_layouts: usize,
    pub cached_timestamps: usize,
    /// Cues that survived parsing.
    pub parsed_cues: usize,
    /// Blocks the parser dropped.
    pub dropped_blocks: usize,
    /// Sorted-index position of the active cue; -1 when none is active.
    pub current_index: i64,
}

impl SyncDiagnostics {
    pub fn from_locator(stats: &LocatorStats) -> Self {
        Self {
            element_hits: stats.hits,
            element_misses: stats.misses,
            hit_rate: stats.hit_rate(),
            cache_evictions: stats.evictions,
            cached_elements: stats.cached_elements,
            cached_strategies: stats.cached_strategies,
            ..Self::default()
        }
    }
}
