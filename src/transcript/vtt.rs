/// Line-oriented WebVTT parser.
///
/// Tolerant by design: header lines are skipped until the first timestamp
/// arrow, pure-numeric cue-id lines are ignored, trailing positioning
/// metadata on timing lines is discarded, and inline markup tags are
/// stripped. Cues with no remaining text are dropped rather than emitted
/// empty. SRT-style comma separators in timestamps are accepted too.
use super::Cue;
use regex::Regex;

/// Parse raw subtitle markup into cues. Returns an empty vec for payloads
/// with no parseable cue blocks; the caller decides whether that is an error.
pub fn parse(text: &str) -> Vec<Cue> {
    let tag_re = Regex::new(r"<[^>]*>").unwrap();
    let lines: Vec<&str> = text.lines().collect();
    let mut cues = Vec::new();
    let mut i = 0;

    // Skip the WEBVTT header and any metadata before the first cue timing.
    while i < lines.len() && !lines[i].contains("-->") {
        i += 1;
    }

    while i < lines.len() {
        let line = lines[i].trim();
        let Some((start_ms, end_ms)) = parse_cue_timing(line) else {
            i += 1;
            continue;
        };

        i += 1;
        let mut text_lines = Vec::new();
        while i < lines.len() && !lines[i].trim().is_empty() && !lines[i].contains("-->") {
            let candidate = lines[i].trim();
            if !is_cue_id(candidate) {
                text_lines.push(candidate);
            }
            i += 1;
        }

        let text = tag_re
            .replace_all(&text_lines.join(" "), "")
            .trim()
            .to_string();
        if !text.is_empty() {
            cues.push(Cue::new(start_ms, end_ms, text));
        }
    }

    cues
}

/// Parse a `start --> end` timing line, discarding any trailing positioning
/// metadata (`align:start position:0%` and friends).
fn parse_cue_timing(line: &str) -> Option<(u64, u64)> {
    let (start_str, rest) = line.split_once("-->")?;
    let end_str = rest.trim().split_whitespace().next()?;
    let start_ms = parse_timestamp(start_str.trim())?;
    let end_ms = parse_timestamp(end_str)?;
    Some((start_ms, end_ms))
}

/// Parse `HH:MM:SS.mmm` or `MM:SS.mmm` into milliseconds.
pub fn parse_timestamp(value: &str) -> Option<u64> {
    let parts: Vec<&str> = value.split(':').collect();
    let (hours, minutes, seconds_str) = match parts.len() {
        3 => (parts[0].parse::<u64>().ok()?, parts[1].parse::<u64>().ok()?, parts[2]),
        2 => (0, parts[0].parse::<u64>().ok()?, parts[1]),
        _ => return None,
    };
    let seconds: f64 = seconds_str.replace(',', ".").parse().ok()?;
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    Some((hours * 3600 + minutes * 60) * 1000 + (seconds * 1000.0).round() as u64)
}

fn is_cue_id(line: &str) -> bool {
    !line.is_empty() && line.bytes().all(|b| b.is_ascii_digit())
}
