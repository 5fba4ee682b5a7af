//! `cuelight simulate` - drive a full synchronized playback session
//! over a synthetic document and report every highlight transition.
//!
//! The synthetic document mixes layouts so all highlight styles get
//! exercised: dense prose rows with inline siblings, wide block rows,
//! and plain rows under the aliased marker form.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use cuelight_core::config::EngineConfig;
use cuelight_core::cues::Cue;
use cuelight_core::diagnostics::SyncDiagnostics;
use cuelight_core::document::{CUE_ID_ATTR, DocumentModel, Rect};
use cuelight_engine::{SessionRuntime, SimulatedPlayer, SyncEngine, Transition, load_with_deadline};
use serde::Serialize;

const PAGE_WIDTH: f64 = 720.0;
const ROW_HEIGHT: f64 = 96.0;
const VIEWPORT_HEIGHT: f64 = 540.0;

pub struct SimulateOptions {
    pub file: PathBuf,
    pub step_ms: u64,
    pub config: Option<PathBuf>,
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct SimulateReport {
    generated_at: String,
    step_ms: u64,
    transitions: Vec<Transition>,
    diagnostics: SyncDiagnostics,
}

/// One row per cue; the row shape cycles so every style branch of the
/// highlight decision table comes up.
fn build_document(cues: &[Cue]) -> DocumentModel {
    let mut doc = DocumentModel::new(VIEWPORT_HEIGHT);
    let root = doc.root();

    for (position, cue) in cues.iter().enumerate() {
        let paragraph = doc.append_element(root, "p");
        let y = position as f64 * ROW_HEIGHT;
        doc.set_bounds(paragraph, Rect::new(0.0, y, PAGE_WIDTH, ROW_HEIGHT - 16.0));

        match position % 3 {
            0 => {
                // Dense prose with an inline target and a sibling.
                doc.append_text(paragraph, "Running text before the target ");
                let span = doc.append_element(paragraph, "span");
                doc.set_attr(span, CUE_ID_ATTR, &cue.id);
                doc.set_bounds(span, Rect::new(180.0, y + 24.0, 160.0, 20.0));
                doc.append_text(paragraph, " and text after it, ");
                let aside = doc.append_element(paragraph, "em");
                doc.set_bounds(aside, Rect::new(360.0, y + 24.0, 80.0, 20.0));
                doc.append_text(paragraph, " trailing off.");
            }
            1 => {
                // Near-full-width block content inside the paragraph.
                let span = doc.append_element(paragraph, "span");
                doc.set_attr(span, CUE_ID_ATTR, &cue.id);
                doc.set_bounds(span, Rect::new(8.0, y + 16.0, PAGE_WIDTH * 0.92, 48.0));
            }
            _ => {
                // Plain narrow target, marker in the aliased form.
                let span = doc.append_element(paragraph, "span");
                doc.set_attr(span, CUE_ID_ATTR, &format!("s{}", cue.id));
                doc.set_bounds(span, Rect::new(8.0, y + 24.0, 220.0, 20.0));
            }
        }
    }
    doc
}

pub async fn run(options: SimulateOptions) -> Result<()> {
    let text = fs::read_to_string(&options.file)
        .with_context(|| format!("read transcript from {}", options.file.display()))?;
    let config = match &options.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    let parsed = load_with_deadline(
        text,
        config.limits.timestamp_memo_entries,
        config.parse_deadline(),
        None,
    )
    .await;

    tracing::info!(
        cues = parsed.cues.len(),
        dropped = parsed.report.dropped.len(),
        "transcript loaded"
    );

    let duration = parsed
        .cues
        .iter()
        .map(|cue| cue.end_time)
        .reduce(f64::max)
        .unwrap_or(0.0)
        + 1.0;
    let document = build_document(&parsed.cues);
    let engine =
        SyncEngine::from_parsed(document, parsed, config).context("construct sync engine")?;

    let mut session = SessionRuntime::new(engine, SimulatedPlayer::new(duration));
    session.run_to_end(options.step_ms as f64 / 1000.0);

    let report = SimulateReport {
        generated_at: chrono::Utc::now().to_rfc3339(),
        step_ms: options.step_ms,
        transitions: session.transitions().to_vec(),
        diagnostics: session.engine().diagnostics(),
    };

    if options.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for transition in &report.transitions {
        match (&transition.cue_id, transition.style) {
            (Some(id), Some(style)) => println!(
                "[{:>8.3}s] cue {id} ({})",
                transition.media_time,
                style.display_name()
            ),
            (Some(id), None) => println!(
                "[{:>8.3}s] cue {id} (unresolved)",
                transition.media_time
            ),
            _ => println!("[{:>8.3}s] idle", transition.media_time),
        }
    }
    println!(
        "{} transitions, cache hit rate {:.0}%, {} evictions",
        report.transitions.len(),
        report.diagnostics.hit_rate * 100.0,
        report.diagnostics.cache_evictions
    );
    Ok(())
}
