/// Event pipeline wiring playback signals to the ledger.
///
/// The host (browser extension, player integration, CLI) feeds position
/// and seek events in; a detected replay segment is matched against the
/// transcript, normalized, filtered, and logged as one batch. When no
/// transcript is available for the window, the visible caption overlay is
/// used as a degraded fallback and never cached.
use crate::detector::{ReplaySegment, SegmentDetector};
use crate::error::LedgerError;
use crate::ledger::{LedgerStore, LogEntry, LogOutcome};
use crate::transcript::TranscriptService;
use crate::words::{self, StopWords};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Reads whatever caption text is currently rendered on screen.
pub trait CaptionOverlay: Send + Sync {
    fn visible_text(&self) -> Option<String>;
}

/// Resolves the identity and title of the video under playback.
pub trait VideoMetadataResolver: Send + Sync {
    fn video_id(&self) -> Option<String>;
    fn video_title(&self) -> String;
}

pub struct Pipeline {
    transcript: TranscriptService,
    ledger: LedgerStore,
    stop_words: StopWords,
    filter_stop_words: bool,
    language: String,
    detector: Mutex<SegmentDetector>,
    overlay: Option<Arc<dyn CaptionOverlay>>,
    metadata: Arc<dyn VideoMetadataResolver>,
}

impl Pipeline {
    pub fn new(
        transcript: TranscriptService,
        ledger: LedgerStore,
        metadata: Arc<dyn VideoMetadataResolver>,
        language: &str,
        filter_stop_words: bool,
        min_rewind_secs: f64,
    ) -> Self {
        Self {
            transcript,
            ledger,
            stop_words: StopWords::for_language(language),
            filter_stop_words,
            language: language.to_string(),
            detector: Mutex::new(SegmentDetector::new(min_rewind_secs)),
            overlay: None,
            metadata,
        }
    }

    pub fn with_overlay(mut self, overlay: Arc<dyn CaptionOverlay>) -> Self {
        self.overlay = Some(overlay);
        self
    }

    pub fn ledger(&self) -> &LedgerStore {
        &self.ledger
    }

    pub fn transcript(&self) -> &TranscriptService {
        &self.transcript
    }

    /// A new video came under playback: kick off transcript acquisition and
    /// re-arm the detector from the persisted session state. Acquisition
    /// failure is logged, not fatal; the overlay fallback still works.
    pub async fn video_changed(&self, video_id: &str) {
        if let Err(e) = self.transcript.load(video_id).await {
            warn!("transcript unavailable for {}: {}", video_id, e);
        }
        self.sync_session_state().await;
    }

    /// Align detector arming with whether a session is active in the ledger.
    pub async fn sync_session_state(&self) {
        let active = self.ledger.session_state().await.active;
        self.detector.lock().await.set_enabled(active);
    }

    pub async fn set_session_active(&self, active: bool) -> Result<(), LedgerError> {
        if active {
            self.ledger.start_session().await?;
        } else {
            self.ledger.stop_session().await?;
        }
        self.detector.lock().await.set_enabled(active);
        Ok(())
    }

    /// Ordinary playback progress.
    pub async fn handle_position(&self, position_secs: f64) {
        self.detector.lock().await.observe_position(position_secs);
    }

    /// The playback element was replaced (ad break, player rebuild); the
    /// next jump must not be read as a rewind.
    pub async fn media_element_replaced(&self, position_secs: f64) {
        self.detector.lock().await.reattach(position_secs);
    }

    /// A seek landed. If it reads as a rewind past the threshold, the
    /// replayed window is logged; otherwise nothing happens.
    pub async fn handle_seek(&self, new_position_secs: f64) -> Result<Option<LogOutcome>, LedgerError> {
        let segment = self.detector.lock().await.observe_seek(new_position_secs);
        match segment {
            Some(segment) => self.process_segment(&segment).await,
            None => Ok(None),
        }
    }

    /// Log every word in the replayed window as one batch.
    pub async fn process_segment(
        &self,
        segment: &ReplaySegment,
    ) -> Result<Option<LogOutcome>, LedgerError> {
        let entries = self.collect_entries(segment).await;
        if entries.is_empty() {
            debug!(
                "no words in replayed window {:.1}s-{:.1}s",
                segment.start_secs, segment.end_secs
            );
            return Ok(None);
        }

        let video_id = match self.metadata.video_id() {
            Some(id) => id,
            None => self.transcript.current_video_id().await.unwrap_or_default(),
        };
        let outcome = self
            .ledger
            .log_occurrences(
                &entries,
                &video_id,
                &self.metadata.video_title(),
                &self.language,
            )
            .await?;
        info!(
            "replay {:.1}s-{:.1}s: logged {} words ({} new)",
            segment.start_secs, segment.end_secs, outcome.total_logged, outcome.new_words
        );
        Ok(Some(outcome))
    }

    async fn collect_entries(&self, segment: &ReplaySegment) -> Vec<LogEntry> {
        if let Some(occurrences) = self
            .transcript
            .words_in_range(segment.start_secs, segment.end_secs)
            .await
        {
            return occurrences
                .into_iter()
                .filter_map(|occ| {
                    let word = words::normalize(&occ.word);
                    if word.is_empty() || self.is_filtered(&word) {
                        return None;
                    }
                    Some(LogEntry {
                        word,
                        sentence: Some(occ.sentence),
                        timestamp_ms: occ.timestamp_ms,
                    })
                })
                .collect();
        }

        // Transcript has nothing for this window; fall back to whatever
        // caption text is on screen right now. Timing is approximate, so
        // the segment start stands in for each word's timestamp.
        let Some(overlay) = &self.overlay else {
            return Vec::new();
        };
        let Some(text) = overlay.visible_text() else {
            return Vec::new();
        };
        debug!("using overlay fallback for replayed window");
        let timestamp_ms = (segment.start_secs.max(0.0) * 1000.0).round() as u64;
        words::tokenize(&text)
            .filter(|word| !self.is_filtered(word))
            .map(|word| LogEntry {
                word,
                sentence: Some(text.clone()),
                timestamp_ms,
            })
            .collect()
    }

    fn is_filtered(&self, word: &str) -> bool {
        self.filter_stop_words && self.stop_words.contains(word)
    }
}
