/// The ordered caption-acquisition strategies.
///
/// Each strategy implements one common contract and is tried in sequence by
/// `TranscriptService`, short-circuiting on the first success. Host-page
/// capabilities (the privileged bridge, the player's text-track API) are
/// traits the embedding environment implements; the page-document and
/// subtitle-file strategies are self-contained.
use super::page;
use super::timedtext::TrackFetcher;
use super::{vtt, Cue};
use crate::error::AcquisitionError;
use async_trait::async_trait;
use reqwest::Client;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// One caption-acquisition strategy.
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Attempt to produce the full cue list for a video. `Err` values are
    /// logged by the chain and trigger fallback to the next strategy.
    async fn acquire(&self, video_id: &str) -> Result<Vec<Cue>, AcquisitionError>;
}

/// Privileged same-process data channel that can hand back the available
/// caption tracks directly (e.g. a page-level bridge script).
#[async_trait]
pub trait CaptionBridge: Send + Sync {
    /// Resolve to `None` when no tracks are available rather than hang; the
    /// wrapping strategy applies a bounded timeout regardless.
    async fn request_tracks(
        &self,
        video_id: &str,
    ) -> Result<Option<Vec<page::CaptionTrack>>, AcquisitionError>;
}

/// The host player's text-track objects. Implementations select a matching
/// track, activate it without rendering it on-screen, and poll briefly for
/// its cues to materialize.
#[async_trait]
pub trait PlayerTrackApi: Send + Sync {
    async fn poll_cues(
        &self,
        video_id: &str,
        language: &str,
    ) -> Result<Option<Vec<Cue>>, AcquisitionError>;
}

/// Strategy 1: ask the bridge for caption tracks, then fetch the selected
/// track as a subtitle file.
pub struct BridgeSource {
    bridge: Arc<dyn CaptionBridge>,
    fetcher: TrackFetcher,
    language: String,
    timeout: Duration,
}

impl BridgeSource {
    pub fn new(
        bridge: Arc<dyn CaptionBridge>,
        fetcher: TrackFetcher,
        language: impl Into<String>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            bridge,
            fetcher,
            language: language.into(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[async_trait]
impl TranscriptSource for BridgeSource {
    fn name(&self) -> &'static str {
        "bridge"
    }

    async fn acquire(&self, video_id: &str) -> Result<Vec<Cue>, AcquisitionError> {
        let tracks = tokio::time::timeout(self.timeout, self.bridge.request_tracks(video_id))
            .await
            .map_err(|_| AcquisitionError::Timeout {
                strategy: self.name(),
                timeout_secs: self.timeout.as_secs(),
            })??
            .unwrap_or_default();

        let track =
            page::select_track(&tracks, &self.language).ok_or(AcquisitionError::Unavailable {
                strategy: self.name(),
            })?;
        debug!("bridge offered track: {}", track.base_url);
        self.fetcher.fetch_cues(&track.base_url).await
    }
}

/// Strategy 2: read cues straight from the embedded player's text tracks.
pub struct TextTrackSource {
    api: Arc<dyn PlayerTrackApi>,
    language: String,
}

impl TextTrackSource {
    pub fn new(api: Arc<dyn PlayerTrackApi>, language: impl Into<String>) -> Self {
        Self {
            api,
            language: language.into(),
        }
    }
}

#[async_trait]
impl TranscriptSource for TextTrackSource {
    fn name(&self) -> &'static str {
        "text-track"
    }

    async fn acquire(&self, video_id: &str) -> Result<Vec<Cue>, AcquisitionError> {
        self.api
            .poll_cues(video_id, &self.language)
            .await?
            .filter(|cues| !cues.is_empty())
            .ok_or(AcquisitionError::Unavailable {
                strategy: self.name(),
            })
    }
}

/// Strategy 3: fetch the watch-page document, extract the embedded player
/// response, and fetch the selected caption track from its descriptor.
pub struct PageDocumentSource {
    client: Client,
    fetcher: TrackFetcher,
    /// Watch-page URL with an `{id}` placeholder.
    url_template: String,
    language: String,
}

impl PageDocumentSource {
    pub fn new(
        url_template: impl Into<String>,
        language: impl Into<String>,
        timeout_secs: u64,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            fetcher: TrackFetcher::new(timeout_secs),
            url_template: url_template.into(),
            language: language.into(),
        }
    }
}

#[async_trait]
impl TranscriptSource for PageDocumentSource {
    fn name(&self) -> &'static str {
        "page-document"
    }

    async fn acquire(&self, video_id: &str) -> Result<Vec<Cue>, AcquisitionError> {
        let url = self.url_template.replace("{id}", video_id);
        let html = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|source| AcquisitionError::Transport {
                strategy: self.name(),
                source,
            })?
            .text()
            .await
            .map_err(|source| AcquisitionError::Transport {
                strategy: self.name(),
                source,
            })?;

        let json = page::extract_marked_object(&html, page::PLAYER_RESPONSE_MARKER)?;
        let player_response: serde_json::Value =
            serde_json::from_str(json).map_err(|e| AcquisitionError::Malformed {
                strategy: self.name(),
                reason: format!("player response is not valid JSON: {}", e),
            })?;

        let tracks = page::caption_tracks(&player_response);
        let track =
            page::select_track(&tracks, &self.language).ok_or(AcquisitionError::Unavailable {
                strategy: self.name(),
            })?;
        self.fetcher.fetch_cues(&track.base_url).await
    }
}

/// Local subtitle file (WebVTT/SRT) as a chain strategy, used by the CLI to
/// run the pipeline offline.
pub struct SubtitleFileSource {
    path: PathBuf,
}

impl SubtitleFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TranscriptSource for SubtitleFileSource {
    fn name(&self) -> &'static str {
        "subtitle-file"
    }

    async fn acquire(&self, _video_id: &str) -> Result<Vec<Cue>, AcquisitionError> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| AcquisitionError::Io {
                strategy: self.name(),
                source,
            })?;
        if text.trim().is_empty() {
            return Err(AcquisitionError::Malformed {
                strategy: self.name(),
                reason: format!("empty subtitle file: {}", self.path.display()),
            });
        }
        let cues = vtt::parse(&text);
        if cues.is_empty() {
            return Err(AcquisitionError::Malformed {
                strategy: self.name(),
                reason: format!("no parseable cues in {}", self.path.display()),
            });
        }
        Ok(cues)
    }
}
