use crate::Config;
use crate::event::{Event, EventForwarder, SeekTarget};
use crate::mpris::{MprisEventHandler, MprisSource};
use crate::pool;
use crate::state::Update;
use crate::timeline::TimelineEntry;
use crate::timeline::frame::Frame;
use serde::Serialize;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Printed for the active instrumental gap.
const GAP_GLYPH: &str = "♪";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PipeFrame<'a> {
    title: &'a str,
    artist: &'a str,
    album: &'a str,
    playing: bool,
    loading: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    frame: Frame,
}

/// Turns updates into stdout lines.
#[derive(Debug, Default)]
pub struct PipeRenderer {
    json: bool,
    last_track: Option<String>,
    last_entry: Option<usize>,
    printed_any: bool,
    printed_static: bool,
}

impl PipeRenderer {
    pub fn new(json: bool) -> Self {
        Self {
            json,
            ..Default::default()
        }
    }

    /// Lines to print for `upd`; empty when nothing visible changed.
    pub fn render(&mut self, upd: &Update) -> Vec<String> {
        if self.json {
            return self.render_json(upd).into_iter().collect();
        }

        let mut out = Vec::new();
        let track_id = upd.track.track_id();
        if self.last_track.as_deref() != Some(track_id.as_str()) {
            // Blank line between the lyrics of consecutive tracks.
            if self.printed_any {
                out.push(String::new());
            }
            self.last_track = Some(track_id);
            self.last_entry = None;
            self.printed_any = false;
            self.printed_static = false;
        }

        let timeline = &upd.timeline;
        if timeline.is_empty() {
            return out;
        }
        if timeline.is_static() {
            if !self.printed_static {
                out.extend(timeline.lines().map(|l| l.text.clone()));
                self.printed_static = true;
            }
        } else if upd.active.entry != self.last_entry {
            self.last_entry = upd.active.entry;
            match upd.active.entry.and_then(|i| timeline.get(i)) {
                Some(TimelineEntry::Line(line)) => out.push(line.text.clone()),
                Some(TimelineEntry::Gap(_)) => out.push(GAP_GLYPH.to_string()),
                None => {}
            }
        }
        self.printed_any |= !out.is_empty();
        out
    }

    fn render_json(&mut self, upd: &Update) -> Option<String> {
        let frame = PipeFrame {
            title: &upd.track.title,
            artist: &upd.track.artist,
            album: &upd.track.album,
            playing: upd.playing,
            loading: upd.loading,
            provider: upd.provider.map(|p| p.to_string()),
            error: upd.err.as_deref(),
            frame: upd.frame(),
        };
        match serde_json::to_string(&frame) {
            Ok(s) => Some(s),
            Err(e) => {
                warn!(error = %e, "frame not serializable");
                None
            }
        }
    }
}

/// `seek <seconds>` or `line <index>`.
pub fn parse_command(input: &str) -> Option<SeekTarget> {
    let mut parts = input.split_whitespace();
    let cmd = parts.next()?;
    let arg = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    match cmd {
        "seek" => arg.parse::<f64>().ok().filter(|s| s.is_finite()).map(SeekTarget::Position),
        "line" => arg.parse::<usize>().ok().map(SeekTarget::Entry),
        _ => None,
    }
}

async fn read_commands(events: mpsc::Sender<Event>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match parse_command(&line) {
                Some(target) => {
                    if events.send(Event::Seek(target)).await.is_err() {
                        break;
                    }
                }
                None if line.trim().is_empty() => {}
                None => warn!(input = %line.trim(), "unknown command; expected `seek <s>` or `line <n>`"),
            },
            Ok(None) => break,
            Err(e) => {
                debug!(error = %e, "stdin closed");
                break;
            }
        }
    }
}

/// Print lyrics to stdout, one line per change, and accept seek commands on stdin.
pub async fn display_lyrics_pipe(cfg: Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let (events_tx, events_rx) = mpsc::channel(64);
    let (update_tx, mut update_rx) = mpsc::channel(32);

    let forwarder = EventForwarder(events_tx.clone());
    let block = cfg.block.clone();
    tokio::spawn(async move {
        match MprisEventHandler::new(forwarder, block).await {
            Ok(mut handler) => {
                if let Err(e) = handler.handle_events().await {
                    warn!(error = %e, "MPRIS watcher stopped");
                }
            }
            Err(e) => warn!(error = %e, "MPRIS unavailable"),
        }
    });

    tokio::spawn(read_commands(events_tx.clone()));

    let shutdown_tx = events_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(Event::Shutdown).await;
        }
    });

    tokio::spawn(pool::listen(
        Arc::new(MprisSource),
        events_tx,
        events_rx,
        update_tx,
        cfg.settings(),
    ));

    let mut renderer = PipeRenderer::new(cfg.json);
    while let Some(upd) = update_rx.recv().await {
        for line in renderer.render(&upd) {
            println!("{}", line);
        }
    }
    Ok(())
}
