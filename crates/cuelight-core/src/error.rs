//! Error taxonomy for the sync pipeline.
//!
//! Only `Initialization` is fatal and surfaces to callers. The other
//! variants describe recoverable failures that the pipeline records and
//! continues past; they appear in parse reports and log output rather
//! than in return types.

use thiserror::Error;

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// A cue block that could not be parsed. The block is skipped and
    /// parsing continues over the remaining blocks.
    #[error("malformed cue block at line {line}: {reason}")]
    Parse { line: usize, reason: String },

    /// A timestamp literal that does not match `HH:MM:SS,mmm`.
    #[error("malformed timestamp `{raw}`")]
    TimeFormat { raw: String },

    /// No document node matched a cue id. Rendering is skipped for that
    /// activation only.
    #[error("no document node matches cue id `{cue_id}`")]
    Resolution { cue_id: String },

    /// Required inputs were missing at construction. Fatal; propagated
    /// synchronously to the caller.
    #[error("engine initialization failed: {0}")]
    Initialization(String),
}

impl SyncError {
    /// Recoverable errors are swallowed with a diagnostic record;
    /// everything else must interrupt the caller.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, SyncError::Initialization(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_initialization_is_fatal() {
        assert!(
            SyncError::Parse {
                line: 3,
                reason: "missing separator".into()
            }
            .is_recoverable()
        );
        assert!(SyncError::TimeFormat { raw: "bogus".into() }.is_recoverable());
        assert!(SyncError::Resolution { cue_id: "7".into() }.is_recoverable());
        assert!(!SyncError::Initialization("no cues".into()).is_recoverable());
    }
}
