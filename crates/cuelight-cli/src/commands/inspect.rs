//! `cuelight inspect` - parse a transcript and report what came out.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use cuelight_core::config::EngineConfig;
use cuelight_core::cues::{ParsedTranscript, format_timestamp};
use cuelight_engine::load_with_deadline;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct DroppedSummary {
    line: usize,
    error: String,
}

#[derive(Debug, Serialize)]
struct InspectReport {
    generated_at: String,
    total_blocks: usize,
    parsed_cues: usize,
    dropped: Vec<DroppedSummary>,
    first_start: Option<f64>,
    last_end: Option<f64>,
}

impl InspectReport {
    fn from_parsed(parsed: &ParsedTranscript) -> Self {
        Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            total_blocks: parsed.report.total_blocks(),
            parsed_cues: parsed.cues.len(),
            dropped: parsed
                .report
                .dropped
                .iter()
                .map(|dropped| DroppedSummary {
                    line: dropped.line,
                    error: dropped.error.to_string(),
                })
                .collect(),
            first_start: parsed
                .cues
                .iter()
                .map(|cue| cue.start_time)
                .reduce(f64::min),
            last_end: parsed.cues.iter().map(|cue| cue.end_time).reduce(f64::max),
        }
    }
}

pub async fn run(file: &Path, json: bool) -> Result<()> {
    let text = fs::read_to_string(file)
        .with_context(|| format!("read transcript from {}", file.display()))?;

    let config = EngineConfig::default();
    let parsed = load_with_deadline(
        text,
        config.limits.timestamp_memo_entries,
        config.parse_deadline(),
        None,
    )
    .await;

    let report = InspectReport::from_parsed(&parsed);
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{}: {} blocks, {} cues, {} dropped",
        file.display(),
        report.total_blocks,
        report.parsed_cues,
        report.dropped.len()
    );
    if let (Some(first), Some(last)) = (report.first_start, report.last_end) {
        println!(
            "  span {} --> {}",
            format_timestamp(first),
            format_timestamp(last)
        );
    }
    for dropped in &report.dropped {
        println!("  line {}: {}", dropped.line, dropped.error);
    }
    Ok(())
}
