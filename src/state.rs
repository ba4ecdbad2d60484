// state.rs: per-track engine state shared by the event handlers

use crate::lyrics::Provider;
use crate::mpris::{PlayerSnapshot, TrackMetadata};
use crate::playback::PlaybackSample;
use crate::timeline::Timeline;
use crate::timeline::frame::{Frame, project};
use crate::timeline::resolve::{ActiveState, Resolver};
use crate::timer::PlaybackTimer;
use std::sync::Arc;
use tracing::debug;

/// Snapshot handed to renderers whenever something visible changed.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub timeline: Arc<Timeline>,
    pub active: ActiveState,
    pub err: Option<String>,
    pub version: u64, // Incremented on any state change
    pub playing: bool,
    /// A fetch for the current track is still in flight.
    pub loading: bool,
    pub track: TrackMetadata,
    pub provider: Option<Provider>,
}

impl Update {
    pub fn frame(&self) -> Frame {
        project(&self.timeline, &self.active)
    }
}

/// Player side: which service and track are followed, and its clock.
#[derive(Debug, Default, PartialEq)]
pub struct PlayerState {
    pub service: String,
    pub track: TrackMetadata,
    pub playing: bool,
    pub timer: PlaybackTimer,
}

impl PlayerState {
    pub fn is_active(&self) -> bool {
        !self.service.is_empty()
    }

    /// True when `snapshot` is a different player or a different track.
    pub fn has_changed(&self, snapshot: &PlayerSnapshot) -> bool {
        self.service != snapshot.service || self.track.track_id() != snapshot.track.track_id()
    }

    pub fn observe(&mut self, sample: PlaybackSample) {
        self.playing = !sample.paused;
        self.timer.observe(sample);
    }
}

/// Lyric side: the current timeline and what is highlighted in it.
#[derive(Debug)]
pub struct LyricState {
    pub timeline: Arc<Timeline>,
    pub resolver: Resolver,
    pub active: ActiveState,
    pub provider: Option<Provider>,
    pub err: Option<String>,
    pub loading: bool,
}

impl LyricState {
    fn new(offset: f64) -> Self {
        Self {
            timeline: Arc::new(Timeline::default()),
            resolver: Resolver::new(offset),
            active: ActiveState::default(),
            provider: None,
            err: None,
            loading: false,
        }
    }

    fn replace(&mut self, timeline: Timeline) {
        self.timeline = Arc::new(timeline);
        self.resolver.reset();
        self.active = ActiveState::default();
    }
}

/// Outcome of one lyric fetch, as applied to the state.
#[derive(Debug)]
pub enum Fetched {
    Lyrics(Provider, Timeline),
    NotFound,
    Failed(String),
}

/// Bundles player and lyric state, plus versioning and fetch generations.
#[derive(Debug)]
pub struct StateBundle {
    pub lyric_state: LyricState,
    pub player_state: PlayerState,
    /// Bumped on every track change; fetch results carry the value they
    /// were started with so late arrivals can be recognised.
    pub generation: u64,
    pub version: u64, // Incremented on any state change
    /// Version and playing bit of the last update handed to renderers.
    pub last_sent: Option<u64>,
}

impl Default for StateBundle {
    fn default() -> Self {
        Self::new(crate::timeline::resolve::SYNC_OFFSET)
    }
}

impl StateBundle {
    pub fn new(sync_offset: f64) -> Self {
        Self {
            lyric_state: LyricState::new(sync_offset),
            player_state: PlayerState::default(),
            generation: 0,
            version: 0,
            last_sent: None,
        }
    }

    /// Switch to a new track: drop the old timeline and start a new fetch
    /// generation. Returns the generation the fetch must report back with.
    pub fn begin_track(&mut self, snapshot: &PlayerSnapshot) -> u64 {
        self.player_state.service = snapshot.service.clone();
        self.player_state.track = snapshot.track.clone();
        self.player_state.observe(snapshot.sample());
        self.lyric_state.replace(Timeline::default());
        self.lyric_state.provider = None;
        self.lyric_state.err = None;
        self.lyric_state.loading = true;
        self.generation += 1;
        self.version += 1;
        self.generation
    }

    /// Player went away.
    pub fn clear(&mut self) {
        self.player_state = PlayerState::default();
        self.lyric_state.replace(Timeline::default());
        self.lyric_state.provider = None;
        self.lyric_state.err = None;
        self.lyric_state.loading = false;
        self.generation += 1;
        self.version += 1;
    }

    /// Install a fetch result unless it belongs to an earlier track.
    pub fn apply_fetch(&mut self, generation: u64, track_id: &str, fetched: Fetched) -> bool {
        if generation != self.generation || track_id != self.player_state.track.track_id() {
            debug!(
                generation,
                current = self.generation,
                track = %track_id,
                "discarding stale lyrics"
            );
            return false;
        }
        match fetched {
            Fetched::Lyrics(provider, timeline) => {
                debug!(%provider, entries = timeline.len(), "lyrics installed");
                self.lyric_state.replace(timeline);
                self.lyric_state.provider = Some(provider);
                self.lyric_state.err = None;
            }
            Fetched::NotFound => {
                self.lyric_state.replace(Timeline::default());
                self.lyric_state.err = None;
            }
            Fetched::Failed(err) => {
                self.lyric_state.replace(Timeline::default());
                self.lyric_state.err = Some(err);
            }
        }
        self.lyric_state.loading = false;
        self.version += 1;
        true
    }

    pub fn observe(&mut self, sample: PlaybackSample) {
        let was_playing = self.player_state.playing;
        self.player_state.observe(sample);
        if was_playing != self.player_state.playing {
            self.version += 1;
        }
    }

    /// Re-resolve at the clock's current estimate. Returns true when the
    /// highlighted segments changed.
    pub fn update_index(&mut self) -> bool {
        let position = self.player_state.timer.estimate();
        self.update_index_at(position)
    }

    pub fn update_index_at(&mut self, position: f64) -> bool {
        let lyric = &mut self.lyric_state;
        let next = lyric.resolver.resolve(&lyric.timeline, position);
        let changed = !next.same_segments(&lyric.active);
        lyric.active = next;
        if changed {
            self.version += 1;
        }
        changed
    }

    pub fn to_update(&self) -> Update {
        Update {
            timeline: self.lyric_state.timeline.clone(),
            active: self.lyric_state.active.clone(),
            err: self.lyric_state.err.clone(),
            version: self.version,
            playing: self.player_state.playing,
            loading: self.lyric_state.loading,
            track: self.player_state.track.clone(),
            provider: self.lyric_state.provider,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mpris::PlaybackStatus;
    use crate::timeline::tests::line;

    fn snapshot(title: &str, position_ms: f64) -> PlayerSnapshot {
        PlayerSnapshot {
            service: "org.mpris.MediaPlayer2.test".into(),
            track: TrackMetadata {
                title: title.into(),
                artist: "Band".into(),
                ..Default::default()
            },
            status: PlaybackStatus::Playing,
            position_ms,
        }
    }

    fn timeline() -> Timeline {
        Timeline::from_lines(vec![line(1.0, "one"), line(3.0, "two")])
    }

    #[test]
    fn track_change_clears_before_fetch_completes() {
        let mut state = StateBundle::default();
        let g1 = state.begin_track(&snapshot("A", 0.0));
        let id_a = state.player_state.track.track_id();
        assert!(state.apply_fetch(g1, &id_a, Fetched::Lyrics(Provider::Lrclib, timeline())));
        assert_eq!(state.lyric_state.timeline.len(), 2);

        state.begin_track(&snapshot("B", 0.0));
        assert!(state.lyric_state.timeline.is_empty());
        assert!(state.lyric_state.loading);
        assert_eq!(state.lyric_state.provider, None);
    }

    #[test]
    fn late_results_from_previous_track_are_discarded() {
        let mut state = StateBundle::default();
        let g1 = state.begin_track(&snapshot("A", 0.0));
        let id_a = state.player_state.track.track_id();
        let g2 = state.begin_track(&snapshot("B", 0.0));
        let id_b = state.player_state.track.track_id();

        let version = state.version;
        assert!(!state.apply_fetch(g1, &id_a, Fetched::Lyrics(Provider::Spicy, timeline())));
        assert!(state.lyric_state.timeline.is_empty());
        assert_eq!(state.version, version);

        // Right generation, wrong track id: still stale.
        assert!(!state.apply_fetch(g2, &id_a, Fetched::NotFound));

        assert!(state.apply_fetch(g2, &id_b, Fetched::Lyrics(Provider::Spicy, timeline())));
        assert!(!state.lyric_state.loading);
        assert_eq!(state.lyric_state.provider, Some(Provider::Spicy));
    }

    #[test]
    fn failed_fetch_records_error_and_empty_timeline() {
        let mut state = StateBundle::default();
        let g = state.begin_track(&snapshot("A", 0.0));
        let id = state.player_state.track.track_id();
        assert!(state.apply_fetch(g, &id, Fetched::Failed("API error: boom".into())));
        let update = state.to_update();
        assert_eq!(update.err.as_deref(), Some("API error: boom"));
        assert!(update.timeline.is_empty());
        assert!(!update.loading);
    }

    #[test]
    fn index_changes_bump_version_only_on_segment_change() {
        let mut state = StateBundle::default();
        let g = state.begin_track(&snapshot("A", 0.0));
        let id = state.player_state.track.track_id();
        state.apply_fetch(g, &id, Fetched::Lyrics(Provider::Lrclib, timeline()));

        assert!(state.update_index_at(1.0));
        assert_eq!(state.lyric_state.active.entry, Some(0));
        let version = state.version;
        assert!(!state.update_index_at(1.05));
        assert_eq!(state.version, version);
        assert!(state.update_index_at(2.8));
        assert_eq!(state.lyric_state.active.entry, Some(1));
        assert!(state.version > version);
    }

    #[test]
    fn clear_forgets_player() {
        let mut state = StateBundle::default();
        state.begin_track(&snapshot("A", 5_000.0));
        assert!(state.player_state.playing);
        state.clear();
        assert!(!state.player_state.is_active());
        assert!(!state.player_state.playing);
        assert!(!state.to_update().loading);
    }

    #[test]
    fn snapshot_change_detection() {
        let mut state = StateBundle::default();
        state.begin_track(&snapshot("A", 0.0));
        assert!(!state.player_state.has_changed(&snapshot("A", 9_000.0)));
        assert!(state.player_state.has_changed(&snapshot("B", 0.0)));
    }
}
