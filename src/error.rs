/// Typed errors for the acquisition chain and the vocabulary ledger.
use thiserror::Error;

/// Failure of a single caption-acquisition strategy, or of the whole chain.
///
/// Individual strategy failures are logged and trigger fallback to the next
/// strategy; only `Exhausted` surfaces to the caller, who proceeds with "no
/// transcript data" rather than aborting.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// The strategy ran but has no caption data for this video.
    #[error("{strategy}: no caption data available")]
    Unavailable { strategy: &'static str },

    /// The strategy's bounded wait elapsed. Not retried within the strategy;
    /// the fallback chain is the retry mechanism.
    #[error("{strategy}: request timed out after {timeout_secs}s")]
    Timeout {
        strategy: &'static str,
        timeout_secs: u64,
    },

    /// Unparseable payload (empty body, invalid JSON, cue-less subtitles).
    #[error("{strategy}: malformed payload: {reason}")]
    Malformed {
        strategy: &'static str,
        reason: String,
    },

    /// Network-level failure while talking to a caption source.
    #[error("{strategy}: transport error: {source}")]
    Transport {
        strategy: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// Local file read failure.
    #[error("{strategy}: i/o failure: {source}")]
    Io {
        strategy: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// Every strategy in the chain failed for this video.
    #[error("all caption sources exhausted for video {video_id}")]
    Exhausted { video_id: String },
}

/// Errors from the persistent vocabulary ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("word not found: {0}")]
    WordNotFound(String),

    #[error("session not found: {0}")]
    SessionNotFound(u64),

    #[error("ledger storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("corrupt ledger file: {0}")]
    Corrupt(#[from] serde_json::Error),
}
