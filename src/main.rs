mod event;
mod lyrics;
mod mpris;
mod playback;
mod pool;
mod state;
mod timeline;
mod timer;
mod ui;

use crate::lyrics::Provider;
use crate::pool::Settings;
use crate::timeline::resolve::SYNC_OFFSET;
use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

const DEFAULT_PROVIDERS: [Provider; 2] = [Provider::Spicy, Provider::Lrclib];

/// Application configuration from CLI
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Config {
    /// Emit one JSON frame per change instead of plain lyric lines
    #[arg(long)]
    pub json: bool,
    /// Blocklist for MPRIS player service names (comma-separated, case-insensitive)
    #[arg(
        long = "block",
        value_name = "SERVICE1,SERVICE2",
        value_delimiter = ','
    )]
    pub block: Vec<String>,
    /// Verbose logging to stderr
    #[arg(long)]
    pub debug_log: bool,
    /// Comma-separated list of lyric providers in preferred order (e.g. "spicy,lrclib").
    /// If empty, the LYRIC_PROVIDERS env var will be used as a fallback.
    #[arg(long, value_delimiter = ',')]
    pub providers: Vec<String>,
    /// SpicyLyrics bearer token. Falls back to SPICY_LYRICS_TOKEN.
    #[arg(long)]
    pub token: Option<String>,
    /// Seconds added to the player position before lookup
    #[arg(long, default_value_t = SYNC_OFFSET, allow_negative_numbers = true)]
    pub sync_offset: f64,
    /// Position poll interval while playing, in milliseconds
    #[arg(long, default_value_t = 200)]
    pub tick_ms: u64,
}

impl Config {
    /// Provider order; unknown names are skipped, an empty list means the default order.
    pub fn provider_order(&self) -> Vec<Provider> {
        let parsed: Vec<Provider> = self
            .providers
            .iter()
            .filter_map(|name| match name.parse::<Provider>() {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!(error = %e, "ignoring provider");
                    None
                }
            })
            .collect();
        if parsed.is_empty() {
            DEFAULT_PROVIDERS.to_vec()
        } else {
            parsed
        }
    }

    pub fn settings(&self) -> Settings {
        Settings {
            providers: self.provider_order(),
            token: self.token.clone().filter(|t| !t.trim().is_empty()),
            sync_offset: if self.sync_offset.is_finite() { self.sync_offset } else { SYNC_OFFSET },
            tick: Duration::from_millis(self.tick_ms.max(1)),
        }
    }
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .collect()
}

fn providers_from_env_if_empty(cli: &mut Config) {
    if cli.providers.is_empty()
        && let Ok(s) = std::env::var("LYRIC_PROVIDERS")
    {
        let parts = split_list(&s);
        if !parts.is_empty() {
            cli.providers = parts;
        }
    }
}

fn token_from_env_if_empty(cli: &mut Config) {
    if cli.token.is_none()
        && let Ok(s) = std::env::var("SPICY_LYRICS_TOKEN")
        && !s.trim().is_empty()
    {
        cli.token = Some(s.trim().to_string());
    }
}

/// Logs go to stderr; stdout carries lyrics only.
fn init_tracing(debug_log: bool) {
    let default = if debug_log { "lyricsync=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let mut cfg = Config::parse();
    providers_from_env_if_empty(&mut cfg);
    token_from_env_if_empty(&mut cfg);
    init_tracing(cfg.debug_log);

    if let Err(e) = crate::ui::pipe::display_lyrics_pipe(cfg).await {
        tracing::error!(error = %e, "exiting");
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        Config::parse_from(std::iter::once("lyricsync").chain(args.iter().copied()))
    }

    #[test]
    fn defaults() {
        let cfg = parse(&[]);
        assert!(!cfg.json);
        assert_eq!(cfg.sync_offset, 0.4);
        let settings = cfg.settings();
        assert_eq!(settings.providers, DEFAULT_PROVIDERS);
        assert_eq!(settings.tick, Duration::from_millis(200));
        assert_eq!(settings.token, None);
    }

    #[test]
    fn provider_order_and_unknown_names() {
        let cfg = parse(&["--providers", "lrclib,musixmatch,spicy"]);
        assert_eq!(cfg.provider_order(), [Provider::Lrclib, Provider::Spicy]);

        let only_unknown = parse(&["--providers", "genius"]);
        assert_eq!(only_unknown.provider_order(), DEFAULT_PROVIDERS);
    }

    #[test]
    fn offset_and_blocklist() {
        let cfg = parse(&["--sync-offset", "-0.25", "--block", "firefox,Chromium", "--json"]);
        assert_eq!(cfg.sync_offset, -0.25);
        assert_eq!(cfg.block, ["firefox", "Chromium"]);
        assert!(cfg.json);
    }

    #[test]
    fn list_splitting() {
        assert_eq!(split_list(" Spicy, ,LRCLIB "), ["spicy", "lrclib"]);
    }
}
