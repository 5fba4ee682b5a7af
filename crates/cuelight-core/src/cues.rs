//! Transcript parsing and the sorted time index.
//!
//! The transcript format is line-oriented: blank-line-separated blocks,
//! each carrying an id line followed by a `start --> end` line in
//! `HH:MM:SS,mmm` form. Any further lines in a block are payload text
//! and are ignored here. Malformed blocks are dropped, recorded in the
//! parse report, and never interrupt parsing.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::SyncError;

/// Separator between the start and end timestamps of a cue block.
const TIMESTAMP_SEPARATOR: &str = "-->";

/// A transcript segment with the time span during which it is active.
///
/// Immutable once parsed; `end_time > start_time` holds for every cue
/// the parser emits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    pub id: String,
    pub start_time: f64,
    pub end_time: f64,
}

/// Sorted-by-start projection of the cue list.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeIndexEntry {
    pub start: f64,
    pub end: f64,
    /// Position of the cue in the original parse order.
    pub index: usize,
    pub id: String,
}

/// A block the parser skipped, with the line it started on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedBlock {
    pub line: usize,
    pub error: SyncError,
}

/// Outcome counters for a single parse run.
#[derive(Debug, Clone, Default)]
pub struct ParseReport {
    pub parsed: usize,
    pub dropped: Vec<DroppedBlock>,
}

impl ParseReport {
    pub fn total_blocks(&self) -> usize {
        self.parsed + self.dropped.len()
    }
}

/// Bounded memo for timestamp literal conversion.
///
/// The conversion is a pure function, so entries never invalidate; the
/// bound only caps memory. Once full, new literals are converted but
/// not remembered.
#[derive(Debug)]
pub struct TimestampMemo {
    map: HashMap<String, f64>,
    cap: usize,
}

impl TimestampMemo {
    pub fn new(cap: usize) -> Self {
        Self {
            map: HashMap::new(),
            cap,
        }
    }

    /// Converts a `HH:MM:SS,mmm` literal to seconds, memoized per
    /// literal string.
    pub fn seconds(&mut self, raw: &str) -> Option<f64> {
        let key = raw.trim();
        if let Some(secs) = self.map.get(key) {
            return Some(*secs);
        }
        let secs = parse_timestamp(key)?;
        if self.map.len() < self.cap {
            self.map.insert(key.to_string(), secs);
        }
        Some(secs)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}

/// Parses a `HH:MM:SS,mmm` timestamp into seconds.
///
/// `hh*3600 + mm*60 + ss + ms/1000`. Returns None when the literal does
/// not have the expected shape.
pub fn parse_timestamp(raw: &str) -> Option<f64> {
    let (clock, millis) = raw.trim().split_once(',')?;
    let mut clock_parts = clock.split(':');
    let hours: u64 = clock_parts.next()?.parse().ok()?;
    let minutes: u64 = clock_parts.next()?.parse().ok()?;
    let seconds: u64 = clock_parts.next()?.parse().ok()?;
    if clock_parts.next().is_some() || minutes > 59 || seconds > 59 {
        return None;
    }
    let millis: u64 = millis.parse().ok()?;
    if millis > 999 {
        return None;
    }
    Some((hours * 3600 + minutes * 60 + seconds) as f64 + millis as f64 / 1000.0)
}

/// Formats seconds back into the `HH:MM:SS,mmm` literal form.
pub fn format_timestamp(seconds: f64) -> String {
    let total_ms = (seconds * 1000.0).round().max(0.0) as u64;
    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    format!(
        "{:02}:{:02}:{:02},{:03}",
        total_secs / 3600,
        (total_secs / 60) % 60,
        total_secs % 60,
        ms
    )
}

/// Everything one parse run produces. The memo travels with the result
/// so the owning engine keeps the cache the parse warmed up.
#[derive(Debug)]
pub struct ParsedTranscript {
    pub cues: Vec<Cue>,
    pub report: ParseReport,
    pub memo: TimestampMemo,
}

/// Parses a full transcript, creating a fresh bounded memo.
pub fn parse_transcript(text: &str, memo_cap: usize) -> ParsedTranscript {
    let mut memo = TimestampMemo::new(memo_cap);
    let (cues, report) = parse_with_memo(text, &mut memo);
    ParsedTranscript { cues, report, memo }
}

/// Parses a transcript reusing an existing timestamp memo.
pub fn parse_with_memo(text: &str, memo: &mut TimestampMemo) -> (Vec<Cue>, ParseReport) {
    let mut cues = Vec::new();
    let mut report = ParseReport::default();

    for block in blocks(text) {
        match parse_block(&block, memo) {
            Ok(cue) => {
                cues.push(cue);
                report.parsed += 1;
            }
            Err(error) => {
                warn!(line = block.first_line, %error, "dropping cue block");
                report.dropped.push(DroppedBlock {
                    line: block.first_line,
                    error,
                });
            }
        }
    }

    (cues, report)
}

/// Re-serializes cues into the block format.
///
/// Parsing the output yields identical `(id, start, end)` tuples; the
/// payload text is not retained, so it is not reproduced.
pub fn serialize_cues(cues: &[Cue]) -> String {
    let mut out = String::new();
    for cue in cues {
        out.push_str(&cue.id);
        out.push('\n');
        out.push_str(&format_timestamp(cue.start_time));
        out.push_str(" --> ");
        out.push_str(&format_timestamp(cue.end_time));
        out.push_str("\n\n");
    }
    out
}

/// Builds the sorted time index. Stable sort by start; ties keep the
/// original parse order.
pub fn build_index(cues: &[Cue]) -> Vec<TimeIndexEntry> {
    let mut entries: Vec<TimeIndexEntry> = cues
        .iter()
        .enumerate()
        .map(|(index, cue)| TimeIndexEntry {
            start: cue.start_time,
            end: cue.end_time,
            index,
            id: cue.id.clone(),
        })
        .collect();
    entries.sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap_or(Ordering::Equal));
    entries
}

struct Block {
    lines: Vec<String>,
    first_line: usize,
}

/// Splits the transcript into blank-line-delimited blocks, tracking the
/// 1-based line each block starts on.
fn blocks(text: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_start = 0usize;

    for (number, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim_end_matches('\r');
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(Block {
                    lines: std::mem::take(&mut current),
                    first_line: current_start,
                });
            }
        } else {
            if current.is_empty() {
                current_start = number + 1;
            }
            current.push(line.to_string());
        }
    }
    if !current.is_empty() {
        blocks.push(Block {
            lines: current,
            first_line: current_start,
        });
    }
    blocks
}

fn parse_block(block: &Block, memo: &mut TimestampMemo) -> Result<Cue, SyncError> {
    let id = block.lines[0].trim();
    if id.is_empty() {
        return Err(SyncError::Parse {
            line: block.first_line,
            reason: "empty id line".to_string(),
        });
    }

    let Some(timing) = block.lines.get(1) else {
        return Err(SyncError::Parse {
            line: block.first_line,
            reason: "missing timestamp line".to_string(),
        });
    };
    let Some((raw_start, raw_end)) = timing.split_once(TIMESTAMP_SEPARATOR) else {
        return Err(SyncError::Parse {
            line: block.first_line,
            reason: format!("missing `{TIMESTAMP_SEPARATOR}` separator"),
        });
    };

    let start_time = memo
        .seconds(raw_start)
        .ok_or_else(|| SyncError::TimeFormat {
            raw: raw_start.trim().to_string(),
        })?;
    let end_time = memo.seconds(raw_end).ok_or_else(|| SyncError::TimeFormat {
        raw: raw_end.trim().to_string(),
    })?;

    if end_time <= start_time {
        return Err(SyncError::Parse {
            line: block.first_line,
            reason: format!(
                "end {} is not after start {}",
                format_timestamp(end_time),
                format_timestamp(start_time)
            ),
        });
    }

    Ok(Cue {
        id: id.to_string(),
        start_time,
        end_time,
    })
}
