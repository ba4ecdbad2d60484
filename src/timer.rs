use std::time::Instant;

use crate::playback::PlaybackSample;

/// Last observed player position plus the instant it was observed.
///
/// Used when a sample cannot be pulled: while playing, the position is
/// advanced by elapsed monotonic time; while paused it stays put.
#[derive(Debug, PartialEq, Default)]
pub struct PlaybackTimer {
    /// Anchor position in seconds (finite, >= 0).
    anchor_position: f64,
    /// Set only while playing.
    anchor_instant: Option<Instant>,
}

impl PlaybackTimer {
    /// Re-anchor on a fresh sample. Jumps in either direction are taken as-is.
    pub fn observe(&mut self, sample: PlaybackSample) {
        self.anchor_position = sanitize_position(sample.seconds());
        self.anchor_instant = if sample.paused { None } else { Some(Instant::now()) };
    }

    pub fn is_running(&self) -> bool {
        self.anchor_instant.is_some()
    }

    /// Estimated current position in seconds.
    pub fn estimate(&self) -> f64 {
        let base = self.anchor_position;
        let Some(inst) = self.anchor_instant else {
            return base;
        };
        let val = base + inst.elapsed().as_secs_f64();
        if val.is_finite() { val } else { base }
    }
}

pub fn sanitize_position(p: f64) -> f64 {
    if !p.is_finite() || p < 0.0 {
        0.0
    } else {
        p
    }
}
