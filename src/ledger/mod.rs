/// The vocabulary ledger: durable word, context, and session records plus
/// the mutation operations over them.
///
/// Mastery is a 3-level user-driven ordinal: 0 = new, 1 = learning,
/// 2 = known. Levels advance only by explicit user action, never by
/// encounter thresholds.

pub mod export;
pub mod store;

pub use export::ExportResult;
pub use store::LedgerStore;

use serde::{Deserialize, Serialize};

/// Highest mastery level.
pub const MASTERY_MAX: u8 = 2;

/// Maximum context records returned per word.
pub const MAX_CONTEXTS_RETURNED: usize = 10;

pub fn mastery_label(level: u8) -> &'static str {
    match level {
        0 => "new",
        1 => "learning",
        _ => "known",
    }
}

/// Primary key for a word record.
pub fn word_key(language: &str, word: &str) -> String {
    format!("{}:{}", language, word)
}

/// Per-word learning record, keyed by `language:normalized_word`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordRecord {
    pub id: String,
    pub word: String,
    pub language: String,
    /// Monotonic encounter count, always >= 1.
    pub encounters: u64,
    pub first_seen_ms: i64,
    pub last_seen_ms: i64,
    pub mastery_level: u8,
    /// User-set, independent of mastery.
    pub excluded: bool,
}

/// A captured example sentence for a word.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextRecord {
    pub id: u64,
    pub word_id: String,
    pub sentence: String,
    pub video_id: String,
    pub video_title: String,
    /// Video-relative position of the sentence.
    pub timestamp_ms: u64,
    pub captured_at_ms: i64,
}

/// One learning session's accumulated statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: u64,
    /// ISO date (YYYY-MM-DD) the session started.
    pub date: String,
    pub start_ms: i64,
    pub end_ms: i64,
    pub words_encountered: u64,
    pub new_words: u64,
    pub rewinds: u64,
    pub video_ids: Vec<String>,
}

/// One word occurrence to be logged, already normalized.
#[derive(Debug, Clone, Default)]
pub struct LogEntry {
    pub word: String,
    pub sentence: Option<String>,
    pub timestamp_ms: u64,
}

impl LogEntry {
    pub fn new(word: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            ..Self::default()
        }
    }

    pub fn with_sentence(mut self, sentence: impl Into<String>) -> Self {
        self.sentence = Some(sentence.into());
        self
    }
}

/// Result of logging one occurrence batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LogOutcome {
    pub new_words: usize,
    pub updated_words: usize,
    /// Valid (non-empty) occurrences actually logged.
    pub total_logged: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WordFilter {
    All,
    /// Mastery at maximum and not excluded.
    Known,
    Learning,
    New,
    /// Excluded flag set; overrides mastery filtering.
    Excluded,
    /// Not excluded and mastery below the top level.
    #[default]
    Default,
}

impl WordFilter {
    pub fn parse(value: &str) -> Self {
        match value {
            "all" => Self::All,
            "known" => Self::Known,
            "learning" => Self::Learning,
            "new" => Self::New,
            "excluded" => Self::Excluded,
            _ => Self::Default,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WordSort {
    Alphabetical,
    MostRecent,
    /// Mastery descending, then encounter count.
    Mastery,
    /// Encounter count descending.
    #[default]
    Frequency,
}

impl WordSort {
    pub fn parse(value: &str) -> Self {
        match value {
            "alpha" => Self::Alphabetical,
            "recent" => Self::MostRecent,
            "mastery" => Self::Mastery,
            _ => Self::Frequency,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WordQuery {
    pub filter: WordFilter,
    /// Case-insensitive substring match on the word text.
    pub search: Option<String>,
    pub sort: WordSort,
}

/// Partial update for `update_word`. Mastery input is unclamped here; the
/// store clamps it into the valid ordinal range.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordUpdate {
    pub mastery_level: Option<i64>,
    pub excluded: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionState {
    pub active: bool,
    pub session_id: Option<u64>,
}

/// Aggregate totals plus a snapshot of the active session, if any.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerStats {
    pub total_words: usize,
    pub learned_words: usize,
    pub total_encounters: u64,
    pub total_sessions: usize,
    pub current_session: Option<SessionRecord>,
}
