//! Core cuelight library (cues, document model, resolution, layout, highlight).

pub mod config;
pub mod cues;
pub mod diagnostics;
pub mod document;
pub mod error;
pub mod highlight;
pub mod layout;
pub mod locator;
pub mod scroll;
pub mod timeline;

pub use config::EngineConfig;
pub use cues::{Cue, ParsedTranscript, TimeIndexEntry};
pub use document::{ContentRoot, DocumentModel, NodeId};
pub use error::{SyncError, SyncResult};
pub use highlight::HighlightStyle;
pub use layout::LayoutDescriptor;
pub use locator::ElementLocator;
pub use timeline::Timeline;
