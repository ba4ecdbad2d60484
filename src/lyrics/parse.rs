use crate::lyrics::normalize::DEFAULT_LINE_SPAN;
use crate::lyrics::types::{LineBlock, LyricsError, ProviderPayload, SyllableBlock};
use crate::timeline::gaps::{GAP_THRESHOLD, INTERLUDE_MARGIN};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;

static SYNCED_LYRICS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(\d{1,2}):(\d{2})[.](\d{2,3})\]").unwrap());

/// Decode a provider `responseData` object into a payload.
///
/// Only a missing or non-string `Type` is an error. Individual content blocks
/// that fail to decode are dropped so one bad line does not cost the whole song.
pub fn parse_payload(data: &Value) -> Result<ProviderPayload, LyricsError> {
    let kind = data
        .get("Type")
        .and_then(|v| v.as_str())
        .ok_or_else(|| LyricsError::Api("lyrics payload has no Type".to_string()))?;

    let payload = match kind {
        "Syllable" => ProviderPayload::Syllable(parse_blocks::<SyllableBlock>(data.get("Content"))),
        "Line" => ProviderPayload::Line(parse_blocks::<LineBlock>(data.get("Content"))),
        "Static" => ProviderPayload::Static(
            data.get("Lines")
                .and_then(|v| v.as_array())
                .map(|lines| {
                    lines
                        .iter()
                        .map(|l| l.get("Text").and_then(|t| t.as_str()).unwrap_or("").to_string())
                        .collect()
                })
                .unwrap_or_default(),
        ),
        other => ProviderPayload::Unknown(other.to_string()),
    };
    Ok(payload)
}

fn parse_blocks<T: DeserializeOwned>(content: Option<&Value>) -> Vec<T> {
    let Some(arr) = content.and_then(|v| v.as_array()) else {
        return Vec::new();
    };
    arr.iter()
        .filter_map(|block| match serde_json::from_value::<T>(block.clone()) {
            Ok(b) => Some(b),
            Err(e) => {
                tracing::debug!(error = %e, "skipping malformed content block");
                None
            }
        })
        .collect()
}

/// Parse LRC text into a line payload.
///
/// Each line ends where the next one starts. The last line, and a line
/// followed by an instrumental break, gets the default span instead.
/// Lines with several timestamps are repeated at each of them.
pub fn parse_synced_lyrics(synced: &str) -> ProviderPayload {
    let re = &SYNCED_LYRICS_RE;
    let mut stamped: Vec<(f64, String)> = Vec::new();
    for line in synced.lines() {
        let matches: Vec<_> = re.captures_iter(line).collect();
        if matches.is_empty() {
            continue;
        }
        let text = re.replace_all(line, "").trim().to_string();
        if text.is_empty() {
            continue;
        }
        for cap in matches {
            let min = cap
                .get(1)
                .and_then(|m| m.as_str().parse::<u32>().ok())
                .unwrap_or(0);
            let sec = cap
                .get(2)
                .and_then(|s| s.as_str().parse::<u32>().ok())
                .unwrap_or(0);
            // "5" and "50" are both half a second; pad to milliseconds.
            let frac = cap
                .get(3)
                .and_then(|c| format!("{:0<3}", c.as_str()).parse::<u32>().ok())
                .unwrap_or(0);
            let time = min as f64 * 60.0 + sec as f64 + frac as f64 / 1000.0;
            stamped.push((time, text.clone()));
        }
    }
    stamped.sort_by(|a, b| a.0.total_cmp(&b.0));

    let blocks = stamped
        .iter()
        .enumerate()
        .map(|(i, (time, text))| LineBlock {
            kind: "Vocal".to_string(),
            start_time: *time,
            end_time: stamped
                .get(i + 1)
                .map(|(next, _)| *next)
                .filter(|next| next > time)
                .map(|next| {
                    if next - time > GAP_THRESHOLD + INTERLUDE_MARGIN {
                        time + DEFAULT_LINE_SPAN
                    } else {
                        next
                    }
                }),
            text: text.clone(),
            opposite_aligned: false,
        })
        .collect();
    ProviderPayload::Line(blocks)
}
