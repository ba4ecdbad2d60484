use crate::lyrics::{LyricsError, Provider, ProviderPayload, fetch_lyrics_from_lrclib, fetch_lyrics_from_spicy};
use crate::mpris::{MprisEventCallback, PlayerSnapshot, TrackMetadata};
use crate::playback::{PlaybackSample, PositionSource};
use crate::state::{Fetched, StateBundle, Update};
use crate::timeline::Timeline;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub enum PlayerEvent {
    TrackChanged(PlayerSnapshot),
    Seeked(PlayerSnapshot),
    StatusChanged(PlayerSnapshot),
}

/// Seek targets accepted from renderers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeekTarget {
    /// Absolute position in seconds.
    Position(f64),
    /// Start of a timeline entry.
    Entry(usize),
}

/// Lyrics for one track, fetched and turned into a timeline off the loop.
#[derive(Debug)]
pub struct FetchResult {
    pub generation: u64,
    pub track_id: String,
    pub fetched: Fetched,
}

#[derive(Debug)]
pub enum Event {
    Player(PlayerEvent),
    LyricsFetched(FetchResult),
    Seek(SeekTarget),
    Shutdown,
}

/// A lyric fetch the loop has to start.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub generation: u64,
    pub track: TrackMetadata,
}

/// Forwards MPRIS watcher callbacks into the event channel.
pub struct EventForwarder(pub mpsc::Sender<Event>);

impl EventForwarder {
    /// Seek and status events are dropped on a full channel; the next tick
    /// pulls the position anyway.
    fn forward(&self, event: PlayerEvent) {
        if let Err(e) = self.0.try_send(Event::Player(event)) {
            warn!(error = %e, "dropping player event");
        }
    }

    /// Track changes are never dropped. A full channel hands the event to a
    /// task that waits for room.
    fn forward_track_change(&self, snapshot: PlayerSnapshot) {
        match self.0.try_send(Event::Player(PlayerEvent::TrackChanged(snapshot))) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                debug!("event channel full; queueing track change");
                let tx = self.0.clone();
                tokio::spawn(async move {
                    if tx.send(event).await.is_err() {
                        debug!("event loop gone; track change discarded");
                    }
                });
            }
            Err(TrySendError::Closed(_)) => debug!("event loop gone; track change discarded"),
        }
    }
}

impl MprisEventCallback for EventForwarder {
    fn on_track_change(&mut self, snapshot: PlayerSnapshot) {
        self.forward_track_change(snapshot);
    }

    fn on_seek(&mut self, snapshot: PlayerSnapshot) {
        self.forward(PlayerEvent::Seeked(snapshot));
    }

    fn on_status_change(&mut self, snapshot: PlayerSnapshot) {
        self.forward(PlayerEvent::StatusChanged(snapshot));
    }
}

/// Send the current state unless an identical version was already sent.
pub async fn send_update(state: &mut StateBundle, update_tx: &mpsc::Sender<Update>, force: bool) {
    let playing_bit: u64 = if state.player_state.playing { 1 } else { 0 };
    let key = (state.version << 1) | playing_bit;

    if !force && state.last_sent == Some(key) {
        return;
    }
    if update_tx.send(state.to_update()).await.is_ok() {
        state.last_sent = Some(key);
    }
}

/// Apply a watcher event. Returns the fetch to start when the track changed.
pub fn handle_player_event(event: PlayerEvent, state: &mut StateBundle) -> Option<FetchRequest> {
    match event {
        PlayerEvent::TrackChanged(snapshot) => {
            if !snapshot.is_active() {
                if state.player_state.is_active() {
                    state.clear();
                }
                return None;
            }
            if !state.player_state.has_changed(&snapshot) {
                state.observe(snapshot.sample());
                state.update_index();
                return None;
            }
            let generation = state.begin_track(&snapshot);
            info!(track = %snapshot.track.track_id(), generation, "new track");
            Some(FetchRequest {
                generation,
                track: snapshot.track,
            })
        }
        // A seek can jump anywhere; resolution is stateless so one call
        // recomputes everything from the new position.
        PlayerEvent::Seeked(snapshot) | PlayerEvent::StatusChanged(snapshot) => {
            if snapshot.service != state.player_state.service {
                return None;
            }
            state.observe(snapshot.sample());
            state.update_index();
            None
        }
    }
}

/// Pull a fresh sample and re-resolve. On a failed pull the clock keeps
/// estimating from the last observation.
pub async fn handle_tick<S: PositionSource>(state: &mut StateBundle, source: &S) -> bool {
    if !state.player_state.is_active() {
        return false;
    }
    let pulled = source.sample(&state.player_state.service).await;
    match pulled {
        Ok(sample) => state.observe(sample),
        Err(e) => debug!(error = %e, "position pull failed; estimating"),
    }
    state.update_index()
}

/// Start position, in milliseconds, of a seek target in the current timeline.
pub fn seek_target_ms(state: &StateBundle, target: SeekTarget) -> Option<f64> {
    let seconds = match target {
        SeekTarget::Position(s) if s.is_finite() => s.max(0.0),
        SeekTarget::Position(_) => return None,
        SeekTarget::Entry(index) => state.lyric_state.timeline.get(index)?.time(),
    };
    Some(seconds * 1000.0)
}

pub async fn handle_seek<S: PositionSource>(state: &mut StateBundle, source: &S, target: SeekTarget) -> bool {
    if !state.player_state.is_active() {
        return false;
    }
    let Some(position_ms) = seek_target_ms(state, target) else {
        debug!(?target, "seek target out of range");
        return false;
    };
    if let Err(e) = source.seek(&state.player_state.service, position_ms).await {
        warn!(error = %e, position_ms, "seek failed");
        return false;
    }
    let paused = !state.player_state.playing;
    state.observe(PlaybackSample::new(position_ms, paused));
    state.update_index()
}

/// Timeline for a provider payload, or `None` when nothing in it normalizes
/// to a line.
fn timeline_with_lyrics(payload: &ProviderPayload) -> Option<Timeline> {
    let timeline = Timeline::from_payload(payload);
    let has_lines = timeline.lines().next().is_some();
    has_lines.then_some(timeline)
}

/// Try each provider in order. Network errors and results without a single
/// usable line move on to the next provider; any other error ends the chain.
pub async fn fetch_timeline(
    track: &TrackMetadata,
    providers: &[Provider],
    token: Option<&str>,
) -> Result<Option<(Provider, Timeline)>, LyricsError> {
    for &provider in providers {
        let result = match provider {
            Provider::Spicy => {
                let (Some(id), Some(token)) = (track.spotify_id.as_deref(), token) else {
                    debug!("skipping spicy: no spotify id or token");
                    continue;
                };
                fetch_lyrics_from_spicy(id, token).await
            }
            Provider::Lrclib => {
                fetch_lyrics_from_lrclib(&track.artist, &track.title, &track.album, track.length).await
            }
        };
        match result {
            Ok(Some(payload)) => match timeline_with_lyrics(&payload) {
                Some(timeline) => return Ok(Some((provider, timeline))),
                None => debug!(%provider, "payload has no usable lines"),
            },
            Ok(None) => debug!(%provider, "no lyrics"),
            Err(e) if e.is_transient() => warn!(%provider, error = %e, "provider unreachable, trying next"),
            Err(e) => return Err(e),
        }
    }
    Ok(None)
}

/// Fetch, normalize and gap-fill lyrics for a track.
pub async fn fetch_lyrics(request: FetchRequest, providers: &[Provider], token: Option<&str>) -> FetchResult {
    let fetched = match fetch_timeline(&request.track, providers, token).await {
        Ok(Some((provider, timeline))) => Fetched::Lyrics(provider, timeline),
        Ok(None) => Fetched::NotFound,
        Err(e) => {
            warn!(error = %e, "lyrics fetch failed");
            Fetched::Failed(e.to_string())
        }
    };
    FetchResult {
        generation: request.generation,
        track_id: request.track.track_id(),
        fetched,
    }
}
