use serde::Deserialize;

use crate::lyrics::parse::parse_synced_lyrics;
use crate::lyrics::types::{LyricsError, ProviderPayload, ProviderResult, http_client};

#[derive(Deserialize)]
#[allow(non_snake_case)]
struct LrcLibResponse {
    syncedLyrics: Option<String>,
    plainLyrics: Option<String>,
}

/// Fetch lyrics from lrclib.net API.
///
/// Synced LRC becomes a line payload; plain lyrics become a static payload.
/// Matching is improved by including album and duration when available.
pub async fn fetch_lyrics_from_lrclib(
    artist: &str,
    title: &str,
    album: &str,
    duration: Option<f64>,
) -> ProviderResult {
    let url = build_lrclib_url(artist, title, album, duration);

    let resp = http_client().get(&url).send().await?;

    // 404 means no lyrics found - not an error
    if resp.status().as_u16() == 404 {
        return Ok(None);
    }

    if !resp.status().is_success() {
        return Err(LyricsError::Api(format!("lrclib: HTTP {}", resp.status())));
    }

    let response: LrcLibResponse = resp.json().await?;
    Ok(payload_from_response(response))
}

fn payload_from_response(response: LrcLibResponse) -> Option<ProviderPayload> {
    match (response.syncedLyrics, response.plainLyrics) {
        (Some(synced), _) if !synced.trim().is_empty() => Some(parse_synced_lyrics(&synced)),
        (_, Some(plain)) if !plain.trim().is_empty() => Some(ProviderPayload::Static(
            plain.lines().map(|l| l.trim().to_string()).filter(|l| !l.is_empty()).collect(),
        )),
        _ => None,
    }
}

/// Build lrclib API URL with query parameters.
fn build_lrclib_url(artist: &str, title: &str, album: &str, duration: Option<f64>) -> String {
    let mut params = vec![
        format!("artist_name={}", urlencoding::encode(artist)),
        format!("track_name={}", urlencoding::encode(title)),
    ];

    if !album.is_empty() {
        params.push(format!("album_name={}", urlencoding::encode(album)));
    }

    if let Some(d) = duration {
        // API expects duration in seconds (integer)
        params.push(format!("duration={}", d.round() as i64));
    }

    format!("https://lrclib.net/api/get?{}", params.join("&"))
}
