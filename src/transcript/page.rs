/// Watch-page document parsing: locates the embedded player-response JSON by
/// marker and extracts it with a brace-depth matcher.
///
/// Naive bracket counting breaks on dialogue text containing `{` or `}`, so
/// the matcher tracks quoted strings and escape sequences while balancing
/// braces.
use crate::error::AcquisitionError;
use serde::Deserialize;
use serde_json::Value;

pub const PLAYER_RESPONSE_MARKER: &str = "ytInitialPlayerResponse";

const STRATEGY: &str = "page-document";

/// A caption-track descriptor as found in the player response.
#[derive(Debug, Clone, Deserialize)]
pub struct CaptionTrack {
    #[serde(rename = "baseUrl")]
    pub base_url: String,
    #[serde(rename = "languageCode")]
    pub language_code: String,
    /// `"asr"` marks auto-generated tracks.
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default, rename = "vssId")]
    pub vss_id: Option<String>,
}

/// Extract the balanced JSON object following `marker` in an HTML document.
pub fn extract_marked_object<'a>(
    html: &'a str,
    marker: &str,
) -> Result<&'a str, AcquisitionError> {
    let marker_idx = html.find(marker).ok_or_else(|| malformed(format!(
        "marker '{}' not found in document",
        marker
    )))?;
    let brace_start = html[marker_idx..]
        .find('{')
        .map(|i| marker_idx + i)
        .ok_or_else(|| malformed("no opening brace after marker".to_string()))?;

    // Braces, quotes, and backslashes are all ASCII, so byte scanning keeps
    // the offsets valid as string slice boundaries.
    let bytes = html.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape = false;

    for (i, &b) in bytes.iter().enumerate().skip(brace_start) {
        if escape {
            escape = false;
            continue;
        }
        match b {
            b'\\' if in_string => escape = true,
            b'"' => in_string = !in_string,
            _ if in_string => {}
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(&html[brace_start..=i]);
                }
            }
            _ => {}
        }
    }

    Err(malformed("unbalanced braces after marker".to_string()))
}

/// Parse the extracted object and read the caption-track descriptors from
/// their known nested path. Missing path means no tracks, not an error.
pub fn caption_tracks(player_response: &Value) -> Vec<CaptionTrack> {
    player_response
        .pointer("/captions/playerCaptionsTracklistRenderer/captionTracks")
        .and_then(|tracks| serde_json::from_value(tracks.clone()).ok())
        .unwrap_or_default()
}

/// Pick the best track for a target language: manual captions beat
/// auto-generated (`asr`), with a vss-id suffix match as last resort.
pub fn select_track<'a>(tracks: &'a [CaptionTrack], language: &str) -> Option<&'a CaptionTrack> {
    tracks
        .iter()
        .find(|t| t.language_code == language && t.kind.as_deref() != Some("asr"))
        .or_else(|| tracks.iter().find(|t| t.language_code == language))
        .or_else(|| {
            let suffix = format!(".{}", language);
            tracks
                .iter()
                .find(|t| t.vss_id.as_deref().is_some_and(|v| v.contains(&suffix)))
        })
}

fn malformed(reason: String) -> AcquisitionError {
    AcquisitionError::Malformed {
        strategy: STRATEGY,
        reason,
    }
}
