// pool.rs: central event loop driving ticks, player events and lyric fetches

use crate::event::{self, Event, FetchRequest, send_update};
use crate::lyrics::Provider;
use crate::playback::PositionSource;
use crate::state::{StateBundle, Update};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Loop settings derived from the command line.
#[derive(Debug, Clone)]
pub struct Settings {
    pub providers: Vec<Provider>,
    pub token: Option<String>,
    pub sync_offset: f64,
    pub tick: Duration,
}

/// Owns the in-flight lyric fetch. Starting a new one aborts the previous.
struct Fetcher {
    providers: Arc<[Provider]>,
    token: Option<Arc<str>>,
    events: mpsc::Sender<Event>,
    in_flight: Option<JoinHandle<()>>,
}

impl Fetcher {
    fn start(&mut self, request: FetchRequest) {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
        let providers = self.providers.clone();
        let token = self.token.clone();
        let events = self.events.clone();
        self.in_flight = Some(tokio::spawn(async move {
            let result = event::fetch_lyrics(request, &providers, token.as_deref()).await;
            let _ = events.send(Event::LyricsFetched(result)).await;
        }));
    }

    fn stop(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
    }
}

/// Process events until shutdown, sending an [`Update`] whenever the
/// highlighted segments or the track state change.
///
/// Ticks pull a sample from `source` only while the player is playing;
/// otherwise the loop is purely event-driven.
pub async fn listen<S: PositionSource>(
    source: Arc<S>,
    events_tx: mpsc::Sender<Event>,
    mut events_rx: mpsc::Receiver<Event>,
    update_tx: mpsc::Sender<Update>,
    settings: Settings,
) {
    let mut state = StateBundle::new(settings.sync_offset);
    let mut fetcher = Fetcher {
        providers: settings.providers.into(),
        token: settings.token.map(Into::into),
        events: events_tx,
        in_flight: None,
    };
    let mut ticker = tokio::time::interval(settings.tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            maybe_event = events_rx.recv() => {
                let Some(ev) = maybe_event else { break };
                match ev {
                    Event::Player(player_event) => {
                        let was_active = state.player_state.is_active();
                        if let Some(request) = event::handle_player_event(player_event, &mut state) {
                            fetcher.start(request);
                            send_update(&mut state, &update_tx, true).await;
                        } else {
                            if was_active && !state.player_state.is_active() {
                                fetcher.stop();
                            }
                            send_update(&mut state, &update_tx, false).await;
                        }
                    }
                    Event::LyricsFetched(result) => {
                        if state.apply_fetch(result.generation, &result.track_id, result.fetched) {
                            state.update_index();
                            send_update(&mut state, &update_tx, true).await;
                        }
                    }
                    Event::Seek(target) => {
                        if event::handle_seek(&mut state, source.as_ref(), target).await {
                            send_update(&mut state, &update_tx, false).await;
                        }
                    }
                    Event::Shutdown => {
                        debug!("shutting down event loop");
                        fetcher.stop();
                        send_update(&mut state, &update_tx, true).await;
                        break;
                    }
                }
            }
            _ = ticker.tick() => {
                if state.player_state.playing
                    && event::handle_tick(&mut state, source.as_ref()).await
                {
                    send_update(&mut state, &update_tx, false).await;
                }
            }
        }
    }
}
