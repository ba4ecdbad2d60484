use once_cell::sync::Lazy;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

// Shared HTTP client with reasonable defaults for timeouts
static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .user_agent("lyricsync/0.1")
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .expect("failed to build HTTP client")
});

/// Provider result: the raw payload, or `None` when the provider has no lyrics for the track.
pub type ProviderResult = Result<Option<ProviderPayload>, LyricsError>;

/// A word (or syllable) with its own timing, in seconds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LyricWord {
    pub text: String,
    pub time: f64,
    pub duration: f64,
    /// Syllables subdividing the word. Empty when the source had no syllable timing.
    pub syllables: Vec<LyricWord>,
}

impl LyricWord {
    pub fn end(&self) -> f64 {
        self.time + self.duration
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LyricLine {
    pub time: f64,
    pub text: String,
    /// Per-word timings for karaoke rendering. Empty for static lyrics.
    pub words: Vec<LyricWord>,
    pub opposite_aligned: bool,
    pub is_background: bool,
    /// Background vocals nested under this line, timed independently of it.
    pub background_lines: Vec<LyricLine>,
}

impl LyricLine {
    /// End of the last word, if the line carries word timing.
    pub fn words_end(&self) -> Option<f64> {
        self.words.last().map(LyricWord::end)
    }
}

// ============================================================================
// Raw provider payloads
// ============================================================================

/// Raw lyric payload as delivered by a provider, discriminated by its `Type` field.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderPayload {
    /// Per-syllable timing grouped in vocal content blocks.
    Syllable(Vec<SyllableBlock>),
    /// Per-line timing only.
    Line(Vec<LineBlock>),
    /// Untimed text lines.
    Static(Vec<String>),
    /// A discriminant this crate does not understand. Normalizes to nothing.
    Unknown(String),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawSyllable {
    #[serde(rename = "Text", default)]
    pub text: String,
    /// Missing times are kept as `None` so one bad syllable does not fail the block.
    #[serde(rename = "StartTime", default)]
    pub start_time: Option<f64>,
    #[serde(rename = "EndTime", default)]
    pub end_time: Option<f64>,
    #[serde(rename = "IsPartOfWord", default)]
    pub is_part_of_word: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct VocalGroup {
    #[serde(rename = "StartTime", default)]
    pub start_time: f64,
    #[serde(rename = "EndTime", default)]
    pub end_time: f64,
    #[serde(rename = "Text", default)]
    pub text: Option<String>,
    #[serde(rename = "Syllables", default)]
    pub syllables: Vec<RawSyllable>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SyllableBlock {
    #[serde(rename = "Type", default)]
    pub kind: String,
    #[serde(rename = "OppositeAligned", default)]
    pub opposite_aligned: bool,
    #[serde(rename = "Lead", default)]
    pub lead: Option<VocalGroup>,
    #[serde(rename = "Background", default)]
    pub background: Vec<VocalGroup>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LineBlock {
    #[serde(rename = "Type", default)]
    pub kind: String,
    #[serde(rename = "StartTime", default)]
    pub start_time: f64,
    #[serde(rename = "EndTime", default)]
    pub end_time: Option<f64>,
    #[serde(rename = "Text", default)]
    pub text: String,
    #[serde(rename = "OppositeAligned", default)]
    pub opposite_aligned: bool,
}

#[derive(Error, Debug)]
pub enum LyricsError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("API error: {0}")]
    Api(String),
    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("no lyrics job in provider response")]
    MissingJob,
    #[error("lyrics job failed with status {0}")]
    JobFailed(i64),
}

impl LyricsError {
    /// Transient failures let the provider chain move on to the next provider.
    pub fn is_transient(&self) -> bool {
        matches!(self, LyricsError::Network(_))
    }
}

// Re-export HTTP client for providers within the lyrics module
pub(crate) fn http_client() -> &'static Client {
    &HTTP_CLIENT
}
