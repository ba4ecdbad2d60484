pub mod lrclib;
pub mod spicy;

pub use lrclib::fetch_lyrics_from_lrclib;
pub use spicy::fetch_lyrics_from_spicy;

use std::fmt;
use std::str::FromStr;

/// Lyric sources, tried in the order given by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// SpicyLyrics job API, keyed by Spotify track id. Needs a token.
    Spicy,
    /// lrclib.net, keyed by artist/title/album.
    Lrclib,
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "spicy" | "spicylyrics" => Ok(Provider::Spicy),
            "lrclib" => Ok(Provider::Lrclib),
            other => Err(format!("unknown provider: {}", other)),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Spicy => write!(f, "spicy"),
            Provider::Lrclib => write!(f, "lrclib"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_provider_names() {
        assert_eq!(" SpicyLyrics ".parse::<Provider>(), Ok(Provider::Spicy));
        assert_eq!("lrclib".parse::<Provider>(), Ok(Provider::Lrclib));
        assert!("musixmatch".parse::<Provider>().is_err());
        assert_eq!(Provider::Spicy.to_string(), "spicy");
    }
}
