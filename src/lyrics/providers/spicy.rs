use serde::Deserialize;
use serde_json::{Value, json};

use crate::lyrics::parse::parse_payload;
use crate::lyrics::types::{LyricsError, ProviderResult, http_client};

const SPICY_API_URL: &str = "https://api.spicylyrics.org/query";
const SPICY_CLIENT_VERSION: &str = "5.18.55";

#[derive(Debug, Deserialize)]
struct SpicyResponse {
    #[serde(default)]
    jobs: Vec<SpicyJob>,
}

#[derive(Debug, Deserialize)]
struct SpicyJob {
    #[serde(rename = "processId", default)]
    process_id: String,
    result: SpicyJobResult,
}

#[derive(Debug, Deserialize)]
struct SpicyJobResult {
    #[serde(default)]
    status: i64,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(rename = "responseData", default)]
    response_data: Option<Value>,
}

/// Fetch lyrics for a Spotify track id from the SpicyLyrics job API.
///
/// The API answers a batch of jobs; the lyrics job is the one typed `json`
/// or carrying `responseData`. A job status of 404 means the track simply
/// has no lyrics.
pub async fn fetch_lyrics_from_spicy(track_id: &str, token: &str) -> ProviderResult {
    let body = json!({
        "jobs": [{
            "handler": "lyrics",
            "args": { "id": track_id, "auth": "SpicyLyrics-WebAuth" },
        }],
        "client": { "version": SPICY_CLIENT_VERSION },
    });

    let resp = http_client()
        .post(SPICY_API_URL)
        .header("SpicyLyrics-Version", SPICY_CLIENT_VERSION)
        .header("SpicyLyrics-WebAuth", format!("Bearer {}", token))
        .json(&body)
        .send()
        .await?;

    if !resp.status().is_success() {
        return Err(LyricsError::Api(format!("spicylyrics: HTTP {}", resp.status())));
    }

    let response: SpicyResponse = resp.json().await?;
    lyrics_from_response(response)
}

fn lyrics_from_response(response: SpicyResponse) -> ProviderResult {
    let job = response
        .jobs
        .into_iter()
        .find(|j| j.result.kind == "json" || j.result.response_data.is_some())
        .ok_or(LyricsError::MissingJob)?;

    match job.result.status {
        200 => {}
        404 => return Ok(None),
        status => return Err(LyricsError::JobFailed(status)),
    }

    let data = job.result.response_data.ok_or(LyricsError::MissingJob)?;
    tracing::debug!(job = %job.process_id, "spicylyrics job succeeded");
    parse_payload(&data).map(Some)
}
