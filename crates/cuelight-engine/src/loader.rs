//! Deadline-bounded transcript loading.
//!
//! Parsing normally runs on a blocking worker so a large transcript
//! never stalls the event loop. The worker is optional in the strictest
//! sense: on timeout, cancellation or a failed join the loader falls
//! back to parsing synchronously on the caller's thread. Loading never
//! fails the pipeline.

use std::time::Duration;

use cuelight_core::cues::{self, ParsedTranscript};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Parses a transcript on a blocking worker, falling back to a
/// synchronous in-thread parse when the deadline passes or the token
/// cancels first.
pub async fn load_with_deadline(
    text: String,
    memo_cap: usize,
    deadline: Duration,
    cancel: Option<CancellationToken>,
) -> ParsedTranscript {
    let worker = tokio::task::spawn_blocking({
        let text = text.clone();
        move || cues::parse_transcript(&text, memo_cap)
    });

    let bounded = tokio::time::timeout(deadline, worker);
    let outcome = match cancel {
        Some(token) => {
            tokio::select! {
                () = token.cancelled() => None,
                joined = bounded => joined.ok().and_then(Result::ok),
            }
        }
        None => bounded.await.ok().and_then(Result::ok),
    };

    match outcome {
        Some(parsed) => parsed,
        None => {
            warn!("transcript worker unavailable, parsing synchronously");
            cues::parse_transcript(&text, memo_cap)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRANSCRIPT: &str =
        "1\n00:00:01,500 --> 00:00:03,000\nHello\n\n2\n00:00:03,000 --> 00:00:06,000\nWorld";
    const MEMO_CAP: usize = 256;

    #[tokio::test]
    async fn test_loads_on_worker_within_deadline() {
        let parsed = load_with_deadline(
            TRANSCRIPT.to_string(),
            MEMO_CAP,
            Duration::from_secs(2),
            None,
        )
        .await;
        assert_eq!(parsed.cues.len(), 2);
        assert_eq!(parsed.cues[0].start_time, 1.5);
    }

    #[tokio::test]
    async fn test_expired_deadline_falls_back_to_sync_parse() {
        let parsed = load_with_deadline(
            TRANSCRIPT.to_string(),
            MEMO_CAP,
            Duration::ZERO,
            None,
        )
        .await;
        let reference = cues::parse_transcript(TRANSCRIPT, MEMO_CAP);
        assert_eq!(parsed.cues, reference.cues);
    }

    #[tokio::test]
    async fn test_cancellation_falls_back_to_sync_parse() {
        let token = CancellationToken::new();
        token.cancel();
        let parsed = load_with_deadline(
            TRANSCRIPT.to_string(),
            MEMO_CAP,
            Duration::from_secs(2),
            Some(token),
        )
        .await;
        assert_eq!(parsed.cues.len(), 2);
        assert_eq!(parsed.report.parsed, 2);
    }
}
