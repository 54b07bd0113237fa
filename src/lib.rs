/// Replay Vocab - vocabulary acquisition tracking for subtitled video
///
/// Detects replayed segments during playback, recovers the transcript text
/// inside each replayed window, and maintains a persistent per-word
/// learning ledger with study sessions and Anki export.

pub mod config;
pub mod detector;
pub mod error;
pub mod ledger;
pub mod pipeline;
pub mod transcript;
pub mod words;

// Re-export main types for easy access
pub use crate::config::Config;
pub use crate::detector::{ReplaySegment, SegmentDetector};
pub use crate::error::{AcquisitionError, LedgerError};
pub use crate::ledger::{
    LedgerStats, LedgerStore, LogEntry, LogOutcome, SessionRecord, WordFilter, WordQuery,
    WordRecord, WordSort, WordUpdate,
};
pub use crate::pipeline::{CaptionOverlay, Pipeline, VideoMetadataResolver};
pub use crate::transcript::{Cue, CueStore, TranscriptService, TranscriptSource, WordOccurrence};
pub use crate::words::StopWords;
