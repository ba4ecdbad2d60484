// lyrics/mod.rs - lyric payloads, providers, and normalization into canonical lines
pub mod normalize;
pub mod parse;
pub mod providers;
pub mod types;

pub use normalize::normalize;
pub use providers::{Provider, fetch_lyrics_from_lrclib, fetch_lyrics_from_spicy};
pub use types::{LyricLine, LyricWord, LyricsError, ProviderPayload};
