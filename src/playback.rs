//! Playback position source abstraction.
//!
//! The engine never talks to a player directly. It pulls samples through a
//! [`PositionSource`] on every tick and receives discrete changes (track,
//! seek, status) as events, so tests can drive it with synthetic instants.

use std::future::Future;

/// One observation of the player clock.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlaybackSample {
    /// Position in milliseconds.
    pub position_ms: f64,
    pub paused: bool,
}

impl PlaybackSample {
    pub fn new(position_ms: f64, paused: bool) -> Self {
        Self { position_ms, paused }
    }

    pub fn seconds(&self) -> f64 {
        self.position_ms / 1000.0
    }
}

/// Pull side of a player: current sample and seek.
pub trait PositionSource: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Read the current position of `player`.
    fn sample(&self, player: &str) -> impl Future<Output = Result<PlaybackSample, Self::Error>> + Send;

    /// Move `player` to an absolute position in milliseconds.
    fn seek(&self, player: &str, position_ms: f64) -> impl Future<Output = Result<(), Self::Error>> + Send;
}
