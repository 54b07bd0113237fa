/// Transcript acquisition and time-interval matching.
///
/// This module holds the cue store for the current video, the interval
/// matcher that answers "which words occur in [start, end]?", and the
/// service that populates the store through an ordered chain of fallback
/// acquisition strategies, memoized per video identity.

pub mod page;
pub mod sources;
pub mod timedtext;
pub mod vtt;

pub use page::CaptionTrack;
pub use sources::{
    BridgeSource, CaptionBridge, PageDocumentSource, PlayerTrackApi, SubtitleFileSource,
    TextTrackSource, TranscriptSource,
};
pub use timedtext::TrackFetcher;

use crate::error::AcquisitionError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// A finer-grained fragment of a cue, when the source format provides
/// per-fragment timing (json3 `segs`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CueSegment {
    pub offset_ms: u64,
    pub text: String,
}

/// A time-bounded unit of transcript text. All interval math is in
/// milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cue {
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub segments: Vec<CueSegment>,
}

impl Cue {
    pub fn new(start_ms: u64, end_ms: u64, text: impl Into<String>) -> Self {
        Self {
            start_ms,
            end_ms,
            text: text.into(),
            segments: Vec::new(),
        }
    }
}

/// One raw word occurrence inside a matched cue, tagged with the cue's full
/// sentence and the best available start offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordOccurrence {
    pub word: String,
    pub sentence: String,
    pub timestamp_ms: u64,
}

/// Cue data for one video at a time, replaced wholesale when the video
/// changes.
#[derive(Debug, Default)]
pub struct CueStore {
    video_id: Option<String>,
    cues: Option<Vec<Cue>>,
}

impl CueStore {
    /// Switch to a new video identity with no cue data yet.
    pub fn reset(&mut self, video_id: &str) {
        self.video_id = Some(video_id.to_string());
        self.cues = None;
    }

    pub fn replace(&mut self, video_id: &str, cues: Vec<Cue>) {
        self.video_id = Some(video_id.to_string());
        self.cues = Some(cues);
    }

    pub fn video_id(&self) -> Option<&str> {
        self.video_id.as_deref()
    }

    pub fn is_loaded_for(&self, video_id: &str) -> bool {
        self.video_id.as_deref() == Some(video_id) && self.cues.is_some()
    }

    /// Raw word occurrences for every cue overlapping `[start, end]` seconds.
    ///
    /// Returns `None` both when no cue data has been loaded and when the
    /// matched set is empty after filtering, so the caller can tell "no
    /// data" apart from an ordinary empty answer and apply its fallback.
    /// Linear scan; cue ordering is not assumed.
    pub fn words_in_range(&self, start_secs: f64, end_secs: f64) -> Option<Vec<WordOccurrence>> {
        let cues = self.cues.as_ref()?;
        let start_ms = (start_secs.max(0.0) * 1000.0).round() as u64;
        let end_ms = (end_secs.max(0.0) * 1000.0).round() as u64;

        let mut results = Vec::new();
        for cue in cues {
            if cue.end_ms < start_ms || cue.start_ms > end_ms {
                continue;
            }
            if cue.text.is_empty() {
                continue;
            }
            if cue.segments.is_empty() {
                for token in cue.text.split_whitespace() {
                    results.push(WordOccurrence {
                        word: token.to_string(),
                        sentence: cue.text.clone(),
                        timestamp_ms: cue.start_ms,
                    });
                }
            } else {
                for segment in &cue.segments {
                    for token in segment.text.split_whitespace() {
                        results.push(WordOccurrence {
                            word: token.to_string(),
                            sentence: cue.text.clone(),
                            timestamp_ms: cue.start_ms + segment.offset_ms,
                        });
                    }
                }
            }
        }

        if results.is_empty() {
            None
        } else {
            Some(results)
        }
    }
}

/// Populates the cue store through the acquisition strategy chain.
///
/// Loads are serialized: a load in flight for an identity is awaited by
/// later requests rather than duplicated, and a result arriving after the
/// store moved to another identity is discarded.
pub struct TranscriptService {
    chain: Vec<Box<dyn TranscriptSource>>,
    store: Arc<RwLock<CueStore>>,
    load_lock: Arc<Mutex<()>>,
}

impl TranscriptService {
    pub fn new(chain: Vec<Box<dyn TranscriptSource>>) -> Self {
        Self {
            chain,
            store: Arc::new(RwLock::new(CueStore::default())),
            load_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Ensure cues are loaded for `video_id`, walking the strategy chain in
    /// order and stopping at the first success. The result is memoized for
    /// the identity until it changes; failures of individual strategies are
    /// logged and fall through.
    pub async fn load(&self, video_id: &str) -> Result<(), AcquisitionError> {
        if self.store.read().await.is_loaded_for(video_id) {
            return Ok(());
        }

        let _guard = self.load_lock.lock().await;
        if self.store.read().await.is_loaded_for(video_id) {
            debug!("cue cache hit for {}", video_id);
            return Ok(());
        }
        self.store.write().await.reset(video_id);

        for source in &self.chain {
            match source.acquire(video_id).await {
                Ok(cues) if !cues.is_empty() => {
                    let mut store = self.store.write().await;
                    if store.video_id() == Some(video_id) {
                        info!(
                            "loaded {} cues for {} via {}",
                            cues.len(),
                            video_id,
                            source.name()
                        );
                        store.replace(video_id, cues);
                    } else {
                        warn!("discarding late cues for superseded video {}", video_id);
                    }
                    return Ok(());
                }
                Ok(_) => {
                    warn!("{}: produced no cues for {}", source.name(), video_id);
                }
                Err(e) => {
                    warn!("{} failed, trying next source: {}", source.name(), e);
                }
            }
        }

        Err(AcquisitionError::Exhausted {
            video_id: video_id.to_string(),
        })
    }

    /// Push-path for host-side VTT interception: the host saw the page fetch
    /// a subtitle file and hands the raw text over. Stored only if the
    /// identity is still current (or none is set yet).
    pub async fn ingest_vtt(
        &self,
        video_id: &str,
        vtt_text: &str,
    ) -> Result<usize, AcquisitionError> {
        let cues = vtt::parse(vtt_text);
        if cues.is_empty() {
            return Err(AcquisitionError::Malformed {
                strategy: "vtt-ingest",
                reason: "no parseable cues in intercepted VTT".to_string(),
            });
        }

        let count = cues.len();
        let mut store = self.store.write().await;
        match store.video_id() {
            Some(current) if current != video_id => {
                warn!(
                    "discarding intercepted VTT for {} (current video is {})",
                    video_id, current
                );
                Ok(0)
            }
            _ => {
                info!("loaded {} cues for {} via vtt-ingest", count, video_id);
                store.replace(video_id, cues);
                Ok(count)
            }
        }
    }

    pub async fn words_in_range(
        &self,
        start_secs: f64,
        end_secs: f64,
    ) -> Option<Vec<WordOccurrence>> {
        self.store.read().await.words_in_range(start_secs, end_secs)
    }

    pub async fn current_video_id(&self) -> Option<String> {
        self.store.read().await.video_id().map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded_store(cues: Vec<Cue>) -> CueStore {
        let mut store = CueStore::default();
        store.replace("vid", cues);
        store
    }

    #[test]
    fn test_words_in_range_absent_before_load() {
        let store = CueStore::default();
        assert!(store.words_in_range(0.0, 100.0).is_none());

        let mut reset_only = CueStore::default();
        reset_only.reset("vid");
        assert!(reset_only.words_in_range(0.0, 100.0).is_none());
    }

    #[test]
    fn test_words_in_range_overlap_boundaries() {
        let store = loaded_store(vec![Cue::new(10_000, 12_000, "hola mundo")]);

        // Overlaps [9, 11] seconds...
        let hits = store.words_in_range(9.0, 11.0).expect("should match");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].word, "hola");
        assert_eq!(hits[0].sentence, "hola mundo");
        assert_eq!(hits[0].timestamp_ms, 10_000);

        // ...but not [13, 15].
        assert!(store.words_in_range(13.0, 15.0).is_none());
    }

    #[test]
    fn test_words_in_range_empty_match_is_absent() {
        let store = loaded_store(vec![Cue::new(10_000, 12_000, "hola")]);
        assert!(store.words_in_range(50.0, 60.0).is_none());
    }

    #[test]
    fn test_words_in_range_uses_segment_offsets() {
        let cue = Cue {
            start_ms: 5_000,
            end_ms: 8_000,
            text: "hola mundo".to_string(),
            segments: vec![
                CueSegment {
                    offset_ms: 0,
                    text: "hola".to_string(),
                },
                CueSegment {
                    offset_ms: 1_200,
                    text: "mundo".to_string(),
                },
            ],
        };
        let store = loaded_store(vec![cue]);
        let hits = store.words_in_range(5.0, 8.0).unwrap();
        assert_eq!(hits[1].word, "mundo");
        assert_eq!(hits[1].timestamp_ms, 6_200);
        assert_eq!(hits[1].sentence, "hola mundo");
    }

    #[test]
    fn test_words_in_range_scans_unsorted_cues() {
        let store = loaded_store(vec![
            Cue::new(40_000, 42_000, "tarde"),
            Cue::new(10_000, 12_000, "temprano"),
        ]);
        let hits = store.words_in_range(9.0, 11.0).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].word, "temprano");
    }

    #[test]
    fn test_replace_swaps_identity_wholesale() {
        let mut store = loaded_store(vec![Cue::new(0, 1_000, "uno")]);
        assert!(store.is_loaded_for("vid"));
        store.reset("other");
        assert!(!store.is_loaded_for("vid"));
        assert!(store.words_in_range(0.0, 10.0).is_none());
    }
}
