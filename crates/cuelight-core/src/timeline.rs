//! Playback-time to cue-index resolution.
//!
//! Lookup is two-phase: a small locality scan around the previously
//! active cue catches the common case of monotonically advancing
//! playback in O(1); a tolerant binary search over the sorted index
//! handles seeks and jumps, and degrades to a best-effort nearest
//! candidate across small gaps between cues.

use crate::config::TimingConfig;
use crate::cues::{Cue, TimeIndexEntry, build_index};

/// The sorted time index plus the lookup tuning it was built with.
#[derive(Debug, Clone)]
pub struct Timeline {
    entries: Vec<TimeIndexEntry>,
    boundary_tolerance: f64,
    search_tolerance: f64,
    locality_behind: usize,
    locality_ahead: usize,
}

impl Timeline {
    pub fn new(cues: &[Cue], timing: &TimingConfig) -> Self {
        Self {
            entries: build_index(cues),
            boundary_tolerance: timing.boundary_tolerance_secs,
            search_tolerance: timing.search_tolerance_secs,
            locality_behind: timing.locality_behind,
            locality_ahead: timing.locality_ahead,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry at a sorted-index position.
    pub fn entry(&self, position: usize) -> Option<&TimeIndexEntry> {
        self.entries.get(position)
    }

    /// Sorted-index position of the cue covering `time`, or None.
    ///
    /// `last_active` is the position returned by the previous lookup;
    /// passing it enables the locality fast path.
    pub fn find_cue_index(&self, time: f64, last_active: Option<usize>) -> Option<usize> {
        if self.entries.is_empty() {
            return None;
        }
        if let Some(last) = last_active {
            if let Some(hit) = self.locality_scan(time, last) {
                return Some(hit);
            }
        }
        self.tolerant_search(time)
    }

    /// Position of the first cue whose id matches, in sorted order.
    pub fn position_of_id(&self, cue_id: &str) -> Option<usize> {
        self.entries.iter().position(|entry| entry.id == cue_id)
    }

    /// Tolerance-widened containment, used by the locality scan where
    /// stickiness across cue boundaries is intended.
    fn within_window(&self, entry: &TimeIndexEntry, time: f64) -> bool {
        time >= entry.start - self.boundary_tolerance && time <= entry.end + self.boundary_tolerance
    }

    /// Scans a fixed window around the previously active position.
    fn locality_scan(&self, time: f64, last: usize) -> Option<usize> {
        let lo = last.saturating_sub(self.locality_behind);
        let hi = (last + self.locality_ahead).min(self.entries.len() - 1);
        (lo..=hi).find(|&position| self.within_window(&self.entries[position], time))
    }

    /// Binary search by start time. Exact containment returns
    /// immediately; a probe that only lands inside a tolerance window
    /// becomes a candidate, so an exactly-covering cue still wins over
    /// an adjacent cue's widened window.
    fn tolerant_search(&self, time: f64) -> Option<usize> {
        let mut lo = 0usize;
        let mut hi = self.entries.len();
        let mut best: Option<(usize, f64)> = None;

        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let entry = &self.entries[mid];

            if time >= entry.start && time <= entry.end {
                return Some(mid);
            }

            let distance = (time - entry.start).abs().min((time - entry.end).abs());
            if distance < self.search_tolerance {
                // Strictly smaller wins; the first probe seen wins ties.
                if best.is_none_or(|(_, best_distance)| distance < best_distance) {
                    best = Some((mid, distance));
                }
            }

            if time < entry.start {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }

        best.map(|(position, _)| position)
    }
}
