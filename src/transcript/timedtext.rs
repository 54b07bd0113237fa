/// Subtitle-file fetching and structured (json3) payload parsing.
///
/// Track URLs taken from page or bridge data may point at any serving
/// format; the fetcher coerces the `fmt` query parameter to `json3` so the
/// response is structured rather than free text. A WebVTT body is still
/// handled, since some sources ignore the parameter.
use super::{vtt, Cue, CueSegment};
use crate::error::AcquisitionError;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

const STRATEGY: &str = "subtitle-fetch";

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Fetches a caption track URL and parses the payload into cues.
#[derive(Debug, Clone)]
pub struct TrackFetcher {
    client: Client,
}

impl TrackFetcher {
    pub fn new(timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }

    pub async fn fetch_cues(&self, base_url: &str) -> Result<Vec<Cue>, AcquisitionError> {
        let url = force_json3(base_url)?;
        debug!("fetching subtitle track: {}", url);

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|source| AcquisitionError::Transport {
                strategy: STRATEGY,
                source,
            })?;

        let body = response
            .text()
            .await
            .map_err(|source| AcquisitionError::Transport {
                strategy: STRATEGY,
                source,
            })?;

        parse_payload(&body)
    }
}

/// Rewrite a track URL so the response format is json3, replacing any
/// existing `fmt` parameter.
pub fn force_json3(base_url: &str) -> Result<Url, AcquisitionError> {
    let mut url = Url::parse(base_url).map_err(|e| AcquisitionError::Malformed {
        strategy: STRATEGY,
        reason: format!("invalid track url: {}", e),
    })?;

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "fmt")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    {
        let mut query = url.query_pairs_mut();
        query.clear();
        for (k, v) in &pairs {
            query.append_pair(k, v);
        }
        query.append_pair("fmt", "json3");
    }
    Ok(url)
}

/// Parse a subtitle payload: json3 if it looks structured, WebVTT otherwise.
/// Empty or cue-less payloads are a typed error, never silently no cues.
pub fn parse_payload(body: &str) -> Result<Vec<Cue>, AcquisitionError> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(AcquisitionError::Malformed {
            strategy: STRATEGY,
            reason: "empty subtitle payload".to_string(),
        });
    }

    if trimmed.starts_with('{') {
        return parse_json3(trimmed);
    }

    let cues = vtt::parse(body);
    if cues.is_empty() {
        return Err(AcquisitionError::Malformed {
            strategy: STRATEGY,
            reason: format!("no parseable cues in payload: {:.60}", trimmed),
        });
    }
    Ok(cues)
}

#[derive(Debug, Deserialize)]
struct TimedTextPayload {
    #[serde(default)]
    events: Vec<TimedTextEvent>,
}

#[derive(Debug, Deserialize)]
struct TimedTextEvent {
    #[serde(default, rename = "tStartMs")]
    t_start_ms: u64,
    #[serde(default, rename = "dDurationMs")]
    d_duration_ms: u64,
    #[serde(default)]
    segs: Vec<TimedTextSeg>,
}

#[derive(Debug, Deserialize)]
struct TimedTextSeg {
    #[serde(default)]
    utf8: String,
    #[serde(default, rename = "tOffsetMs")]
    t_offset_ms: u64,
}

/// Parse a json3 timedtext payload. Events carry the full cue text plus
/// per-fragment offsets, which the cue keeps as sub-segments for
/// finer-grained word timestamps.
pub fn parse_json3(body: &str) -> Result<Vec<Cue>, AcquisitionError> {
    let payload: TimedTextPayload =
        serde_json::from_str(body).map_err(|e| AcquisitionError::Malformed {
            strategy: STRATEGY,
            reason: format!("invalid json3 payload: {}", e),
        })?;

    let mut cues = Vec::new();
    for event in payload.events {
        if event.segs.is_empty() {
            continue;
        }
        let sentence = event
            .segs
            .iter()
            .map(|s| s.utf8.as_str())
            .collect::<String>()
            .replace('\n', " ")
            .trim()
            .to_string();
        if sentence.is_empty() {
            continue;
        }
        let segments = event
            .segs
            .iter()
            .filter_map(|s| {
                let text = s.utf8.trim();
                (!text.is_empty()).then(|| CueSegment {
                    offset_ms: s.t_offset_ms,
                    text: text.to_string(),
                })
            })
            .collect();
        cues.push(Cue {
            start_ms: event.t_start_ms,
            end_ms: event.t_start_ms + event.d_duration_ms,
            text: sentence,
            segments,
        });
    }

    if cues.is_empty() {
        return Err(AcquisitionError::Malformed {
            strategy: STRATEGY,
            reason: "json3 payload contained no usable events".to_string(),
        });
    }
    Ok(cues)
}
