//! Canonical timeline model.
//!
//! A [`Timeline`] is built once per track from a provider payload
//! (normalize, then synthesize gaps) and is never mutated afterwards. The
//! resolver and the frame projection only read it.

pub mod frame;
pub mod gaps;
pub mod resolve;

use crate::lyrics::{LyricLine, ProviderPayload, normalize};

/// Span assumed for the last entry of a timeline, and for word-less lines
/// with nothing after them.
pub const FALLBACK_SPAN: f64 = 5.0;
/// Span of a background line that has no word timing.
pub const BACKGROUND_FALLBACK_SPAN: f64 = 3.0;

/// Synthetic marker for an instrumental or silent stretch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GapMarker {
    pub time: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TimelineEntry {
    Line(LyricLine),
    Gap(GapMarker),
}

impl TimelineEntry {
    pub fn time(&self) -> f64 {
        match self {
            TimelineEntry::Line(line) => line.time,
            TimelineEntry::Gap(gap) => gap.time,
        }
    }

    pub fn as_line(&self) -> Option<&LyricLine> {
        match self {
            TimelineEntry::Line(line) => Some(line),
            TimelineEntry::Gap(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    entries: Vec<TimelineEntry>,
}

impl Timeline {
    pub fn from_payload(payload: &ProviderPayload) -> Self {
        Self::from_lines(normalize(payload))
    }

    /// Build from lines already sorted by start time.
    pub fn from_lines(lines: Vec<LyricLine>) -> Self {
        Self {
            entries: gaps::synthesize(lines),
        }
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&TimelineEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn lines(&self) -> impl Iterator<Item = &LyricLine> {
        self.entries.iter().filter_map(TimelineEntry::as_line)
    }

    /// All entries start at zero: the lyrics carry no timing and nothing is highlighted.
    pub fn is_static(&self) -> bool {
        self.entries.iter().all(|e| e.time() == 0.0)
    }

    /// More than one line and at least one of them timed after zero.
    pub fn is_synced(&self) -> bool {
        self.lines().count() > 1 && self.lines().any(|l| l.time > 0.0)
    }

    /// Start of the entry following `index`, if any.
    fn next_time(&self, index: usize) -> Option<f64> {
        self.entries.get(index + 1).map(TimelineEntry::time)
    }

    /// End of an entry's span.
    ///
    /// Lines end with their last word; word-less lines and gaps end where the
    /// next entry starts, or [`FALLBACK_SPAN`] after their own start when last.
    pub fn end_of(&self, index: usize) -> f64 {
        let Some(entry) = self.entries.get(index) else {
            return f64::NAN;
        };
        let following = self
            .next_time(index)
            .unwrap_or(entry.time() + FALLBACK_SPAN);
        match entry {
            TimelineEntry::Line(line) => line.words_end().unwrap_or(following),
            TimelineEntry::Gap(_) => following,
        }
    }

    /// Duration a renderer should give a gap marker.
    pub fn gap_duration(&self, index: usize) -> f64 {
        let start = self.entries.get(index).map(TimelineEntry::time).unwrap_or(0.0);
        (self.end_of(index) - start).max(gaps::MIN_GAP_DURATION)
    }

    /// Whether `effective` falls in the half-open slot `[entry.time, next.time)`.
    pub fn slot_contains(&self, index: usize, effective: f64) -> bool {
        let Some(entry) = self.entries.get(index) else {
            return false;
        };
        effective >= entry.time() && self.next_time(index).is_none_or(|next| effective < next)
    }

    /// Index of the entry whose slot contains `effective`.
    ///
    /// Slots partition the timeline by start time, so every instant at or after
    /// the first entry maps to exactly one entry. Among entries sharing a start
    /// time the last one owns the slot.
    pub fn slot_index(&self, effective: f64) -> Option<usize> {
        if !effective.is_finite() {
            return None;
        }
        let after = self.entries.partition_point(|e| e.time() <= effective);
        after.checked_sub(1)
    }
}

/// End of a background line: its last word, else a fixed span after its start.
pub fn background_end(line: &LyricLine) -> f64 {
    line.words_end()
        .unwrap_or(line.time + BACKGROUND_FALLBACK_SPAN)
}
