//! Watches the active MPRIS player and reports track, seek and status changes.

use crate::mpris::connection::{
    MPRIS_PATH, MprisError, PlayerctldProxy, get_active_player_names, get_dbus_conn, is_blocked,
};
use crate::mpris::metadata::{TrackMetadata, extract_metadata};
use crate::mpris::playback::{PlaybackStatus, get_position_ms};
use crate::playback::PlaybackSample;
use futures_util::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use zbus::proxy;
use zvariant::OwnedValue;

const IDLE_RESCAN: Duration = Duration::from_millis(500);
const LIVENESS_CHECK: Duration = Duration::from_secs(1);

/// Everything known about the followed player at the moment of an event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerSnapshot {
    /// Bus name of the player; empty when no player is followed.
    pub service: String,
    pub track: TrackMetadata,
    pub status: PlaybackStatus,
    pub position_ms: f64,
}

impl PlayerSnapshot {
    pub fn is_active(&self) -> bool {
        !self.service.is_empty()
    }

    pub fn sample(&self) -> PlaybackSample {
        PlaybackSample::new(self.position_ms, !self.status.is_playing())
    }
}

pub trait MprisEventCallback: Send + 'static {
    /// A different track (or player) is now current. An inactive snapshot
    /// means the player went away.
    fn on_track_change(&mut self, snapshot: PlayerSnapshot);
    fn on_seek(&mut self, snapshot: PlayerSnapshot);
    fn on_status_change(&mut self, snapshot: PlayerSnapshot);
}

#[proxy(
    interface = "org.mpris.MediaPlayer2.Player",
    default_path = "/org/mpris/MediaPlayer2"
)]
trait MediaPlayer2Player {
    #[zbus(property)]
    fn metadata(&self) -> zbus::Result<HashMap<String, OwnedValue>>;

    #[zbus(property)]
    fn position(&self) -> zbus::Result<i64>;

    #[zbus(property)]
    fn playback_status(&self) -> zbus::Result<String>;

    #[zbus(signal)]
    fn seeked(&self, position: i64) -> zbus::Result<()>;
}

pub struct MprisEventHandler<C: MprisEventCallback> {
    callback: C,
    block_list: Arc<Vec<String>>,
    state: PlayerSnapshot,
    conn: Arc<zbus::Connection>,
}

impl<C: MprisEventCallback> MprisEventHandler<C> {
    /// Connect and report the initially active player, if any.
    pub async fn new(callback: C, block_list: Vec<String>) -> Result<Self, MprisError> {
        let conn = get_dbus_conn().await?;

        let mut handler = Self {
            callback,
            block_list: Arc::new(block_list),
            state: PlayerSnapshot::default(),
            conn,
        };
        handler.discover_active_player().await?;
        Ok(handler)
    }

    /// Run forever, following whichever unblocked player is active.
    pub async fn handle_events(&mut self) -> Result<(), MprisError> {
        let playerctld = PlayerctldProxy::new(&self.conn).await.ok();
        let mut player_names_stream = match &playerctld {
            Some(proxy) => Some(proxy.receive_player_names_changed().await),
            None => None,
        };

        loop {
            tokio::select! {
                Some(_) = async {
                    match player_names_stream.as_mut() {
                        Some(stream) => stream.next().await,
                        None => None,
                    }
                } => {
                    if let Err(e) = self.discover_active_player().await {
                        warn!(error = %e, "player discovery failed");
                    }
                }
                res = self.follow_player() => {
                    if let Err(e) = res {
                        debug!(error = %e, "player watch ended");
                    }
                }
            }
        }
    }

    /// Forward signals of the current player until it disappears.
    async fn follow_player(&mut self) -> Result<(), MprisError> {
        if !self.state.is_active() {
            tokio::time::sleep(IDLE_RESCAN).await;
            return self.discover_active_player().await;
        }

        let proxy = MediaPlayer2PlayerProxy::builder(&self.conn)
            .destination(self.state.service.clone())?
            .path(MPRIS_PATH)?
            .build()
            .await?;

        let mut seeked_stream = proxy.receive_seeked().await?;
        let mut metadata_stream = proxy.receive_metadata_changed().await;
        let mut position_stream = proxy.receive_position_changed().await;
        let mut status_stream = proxy.receive_playback_status_changed().await;

        loop {
            tokio::select! {
                Some(signal) = seeked_stream.next() => {
                    if let Ok(args) = signal.args() {
                        self.handle_seek_signal(args.position);
                    }
                }
                Some(_) = metadata_stream.next() => {
                    if let Err(e) = self.handle_metadata_change(&proxy).await {
                        warn!(error = %e, "metadata change not handled");
                    }
                }
                // Rare: most players only emit Seeked.
                Some(_) = position_stream.next() => {
                    if let Ok(pos) = proxy.position().await {
                        self.handle_seek_signal(pos);
                    }
                }
                Some(_) = status_stream.next() => {
                    if let Err(e) = self.handle_status_change(&proxy).await {
                        warn!(error = %e, "status change not handled");
                    }
                }
                _ = tokio::time::sleep(LIVENESS_CHECK) => {
                    if proxy.playback_status().await.is_err() {
                        info!(service = %self.state.service, "player disconnected");
                        self.discover_active_player().await?;
                        return Ok(());
                    }
                }
            }
        }
    }

    fn handle_seek_signal(&mut self, position_us: i64) {
        self.state.position_ms = position_us as f64 / 1000.0;
        debug!(position_ms = self.state.position_ms, "seeked");
        self.callback.on_seek(self.state.clone());
    }

    async fn handle_metadata_change(
        &mut self,
        proxy: &MediaPlayer2PlayerProxy<'_>,
    ) -> Result<(), MprisError> {
        let new_track = extract_metadata(&proxy.metadata().await?);
        if new_track == self.state.track {
            return Ok(());
        }
        self.state.track = new_track;
        if let Ok(pos) = proxy.position().await {
            self.state.position_ms = pos as f64 / 1000.0;
        }
        info!(title = %self.state.track.title, artist = %self.state.track.artist, "track changed");
        self.callback.on_track_change(self.state.clone());
        Ok(())
    }

    async fn handle_status_change(
        &mut self,
        proxy: &MediaPlayer2PlayerProxy<'_>,
    ) -> Result<(), MprisError> {
        let status = PlaybackStatus::from_mpris(&proxy.playback_status().await?);
        if status == self.state.status {
            return Ok(());
        }
        self.state.status = status;
        if let Ok(pos) = get_position_ms(&self.state.service).await {
            self.state.position_ms = pos;
        }
        debug!(?status, position_ms = self.state.position_ms, "playback status changed");
        self.callback.on_status_change(self.state.clone());
        Ok(())
    }

    async fn discover_active_player(&mut self) -> Result<(), MprisError> {
        let names = get_active_player_names().await?;

        if let Some(service) = names.iter().find(|s| !is_blocked(s, &self.block_list)) {
            if *service != self.state.service {
                self.switch_to_player(service).await?;
            }
        } else if self.state.is_active() {
            info!(service = %self.state.service, "no active player left");
            self.state = PlayerSnapshot::default();
            self.callback.on_track_change(PlayerSnapshot::default());
        }
        Ok(())
    }

    async fn switch_to_player(&mut self, service: &str) -> Result<(), MprisError> {
        let proxy = MediaPlayer2PlayerProxy::builder(&self.conn)
            .destination(service)?
            .path(MPRIS_PATH)?
            .build()
            .await?;

        let track = proxy
            .metadata()
            .await
            .map(|map| extract_metadata(&map))
            .unwrap_or_default();
        let position_ms = proxy
            .position()
            .await
            .map(|us| us as f64 / 1000.0)
            .unwrap_or(0.0);
        let status = proxy
            .playback_status()
            .await
            .map(|s| PlaybackStatus::from_mpris(&s))
            .unwrap_or_default();

        info!(service, title = %track.title, "following player");
        self.state = PlayerSnapshot {
            service: service.to_string(),
            track,
            status,
            position_ms,
        };
        self.callback.on_track_change(self.state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_sample_reflects_status() {
        let snap = PlayerSnapshot {
            service: "org.mpris.MediaPlayer2.spotify".into(),
            status: PlaybackStatus::Playing,
            position_ms: 1500.0,
            ..Default::default()
        };
        assert!(snap.is_active());
        assert_eq!(snap.sample(), PlaybackSample::new(1500.0, false));

        let paused = PlayerSnapshot {
            status: PlaybackStatus::Paused,
            ..snap
        };
        assert!(paused.sample().paused);
        assert!(!PlayerSnapshot::default().is_active());
    }
}
