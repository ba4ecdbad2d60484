//! Playback status, position and seeking for one MPRIS player.

use std::future::Future;

use crate::mpris::connection::{MPRIS_PATH, MprisError, get_dbus_conn};
use crate::playback::{PlaybackSample, PositionSource};
use zbus::Proxy;
use zvariant::OwnedValue;

const PLAYER_IFACE: &str = "org.mpris.MediaPlayer2.Player";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlaybackStatus {
    Playing,
    Paused,
    #[default]
    Stopped,
}

impl PlaybackStatus {
    /// Unknown strings count as stopped.
    pub fn from_mpris(s: &str) -> Self {
        match s {
            "Playing" => Self::Playing,
            "Paused" => Self::Paused,
            _ => Self::Stopped,
        }
    }

    pub fn is_playing(self) -> bool {
        self == Self::Playing
    }
}

/// Position in milliseconds from an MPRIS microsecond value.
fn position_ms_from_owned(val: &OwnedValue) -> Option<f64> {
    if let Ok(i) = i64::try_from(val.clone()) {
        return Some(i as f64 / 1000.0);
    }
    if let Ok(u) = u64::try_from(val.clone()) {
        return Some(u as f64 / 1000.0);
    }
    None
}

async fn get_property(service: &str, name: &'static str) -> Result<OwnedValue, MprisError> {
    let conn = get_dbus_conn().await?;
    // Targeted Properties.Get; some players misbehave on GetAll.
    let props = Proxy::new(&conn, service, MPRIS_PATH, "org.freedesktop.DBus.Properties").await?;
    let reply = props.call_method("Get", &(PLAYER_IFACE, name)).await?;
    reply
        .body()
        .deserialize::<OwnedValue>()
        .map_err(|_| MprisError::MissingProperty(name))
}

pub async fn get_position_ms(service: &str) -> Result<f64, MprisError> {
    let val = get_property(service, "Position").await?;
    position_ms_from_owned(&val).ok_or(MprisError::MissingProperty("Position"))
}

pub async fn get_playback_status(service: &str) -> Result<PlaybackStatus, MprisError> {
    let val = get_property(service, "PlaybackStatus").await?;
    String::try_from(val)
        .map(|s| PlaybackStatus::from_mpris(&s))
        .map_err(|_| MprisError::MissingProperty("PlaybackStatus"))
}

/// Move the player to an absolute position.
///
/// MPRIS `Seek` is relative, so the offset is taken against the position the
/// player reports right now.
pub async fn seek_to(service: &str, position_ms: f64) -> Result<(), MprisError> {
    let current = get_position_ms(service).await?;
    let offset_us = seek_offset_us(current, position_ms);
    let conn = get_dbus_conn().await?;
    let player = Proxy::new(&conn, service, MPRIS_PATH, PLAYER_IFACE).await?;
    player.call_method("Seek", &(offset_us,)).await?;
    Ok(())
}

fn seek_offset_us(current_ms: f64, target_ms: f64) -> i64 {
    let offset = ((target_ms.max(0.0) - current_ms) * 1000.0).round();
    if offset.is_finite() { offset as i64 } else { 0 }
}

/// [`PositionSource`] backed by the session bus.
#[derive(Debug, Clone, Copy, Default)]
pub struct MprisSource;

impl PositionSource for MprisSource {
    type Error = MprisError;

    fn sample(&self, player: &str) -> impl Future<Output = Result<PlaybackSample, MprisError>> + Send {
        let player = player.to_string();
        async move {
            let position_ms = get_position_ms(&player).await?;
            let status = get_playback_status(&player).await?;
            Ok(PlaybackSample::new(position_ms, !status.is_playing()))
        }
    }

    fn seek(&self, player: &str, position_ms: f64) -> impl Future<Output = Result<(), MprisError>> + Send {
        let player = player.to_string();
        async move { seek_to(&player, position_ms).await }
    }
}
