/// Unicode-aware word normalization, tokenization, and stop-word filtering.
///
/// Normalization only strips punctuation from the edges of a token, so
/// accented characters and non-Latin scripts survive intact.
use std::collections::HashSet;

/// Spanish function words that add noise to vocabulary tracking.
const STOP_WORDS_ES: &[&str] = &[
    "a", "al", "algo", "con", "de", "del", "el", "en", "es", "eso", "esta", "este", "esto", "hay",
    "la", "las", "le", "les", "lo", "los", "me", "mi", "muy", "más", "no", "nos", "o", "para",
    "pero", "por", "que", "qué", "se", "si", "sin", "su", "sus", "sí", "te", "tu", "tú", "un",
    "una", "y", "ya", "yo",
];

/// Normalize a raw word: lowercase, then strip leading and trailing
/// characters that are not Unicode letters or numbers.
///
/// Returns an empty string when nothing remains; callers must discard those.
pub fn normalize(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    lowered
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_string()
}

/// Split text on whitespace runs and normalize each token, dropping empties.
///
/// Order-preserving and a pure function of the input.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_whitespace()
        .map(normalize)
        .filter(|w| !w.is_empty())
}

/// Closed per-language set of function words.
#[derive(Debug, Clone, Default)]
pub struct StopWords {
    words: HashSet<&'static str>,
}

impl StopWords {
    /// Stop-word set for a language code. Languages without a bundled set get
    /// an empty set, which filters nothing.
    pub fn for_language(language: &str) -> Self {
        let words = match language {
            "es" | "spa" => STOP_WORDS_ES.iter().copied().collect(),
            _ => HashSet::new(),
        };
        Self { words }
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}
