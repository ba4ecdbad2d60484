//! Active-segment resolution.
//!
//! Maps a playback position onto the timeline: which entry owns the current
//! instant, which word and syllable inside it are sounding, and which
//! background lines are sounding anywhere in the song. Resolution is pure;
//! [`Resolver`] only remembers the last entry index to shorten the next
//! lookup.

use std::borrow::Cow;

use serde::Serialize;
use unicode_segmentation::UnicodeSegmentation;

use crate::lyrics::normalize::WORD_FILL_RATIO;
use crate::lyrics::{LyricLine, LyricWord};
use crate::timeline::{Timeline, TimelineEntry, background_end};

/// Added to every incoming position so highlighting does not trail the audio.
pub const SYNC_OFFSET: f64 = 0.4;
/// Shortest line span used when timing words of a line that has none.
pub const MIN_FALLBACK_LINE_SPAN: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentState {
    Upcoming,
    Active,
    Sung,
}

impl SegmentState {
    /// State of the half-open span `[start, end)` at `effective`.
    pub fn at(start: f64, end: f64, effective: f64) -> Self {
        if effective >= end {
            SegmentState::Sung
        } else if effective >= start {
            SegmentState::Active
        } else {
            SegmentState::Upcoming
        }
    }

    pub fn of_word(word: &LyricWord, effective: f64) -> Self {
        Self::at(word.time, word.end(), effective)
    }
}

/// A background line sounding at the resolved instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackgroundRef {
    /// Timeline index of the parent line.
    pub entry: usize,
    /// Index into the parent's background lines.
    pub line: usize,
    /// Sounding word of the background line.
    pub word: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActiveState {
    /// Compensated position, in seconds, the state was resolved at.
    pub effective: f64,
    pub entry: Option<usize>,
    /// Sounding word of the active line, including fallback-timed words.
    pub word: Option<usize>,
    /// Sounding syllable of the active word.
    pub syllable: Option<usize>,
    pub background: Vec<BackgroundRef>,
}

impl ActiveState {
    fn idle(effective: f64) -> Self {
        Self {
            effective,
            ..Default::default()
        }
    }

    /// Same highlighted segments, regardless of the exact instant.
    pub fn same_segments(&self, other: &ActiveState) -> bool {
        self.entry == other.entry
            && self.word == other.word
            && self.syllable == other.syllable
            && self.background == other.background
    }
}

/// Words of a line, synthesizing timings when the line has none.
pub fn line_words(line: &LyricLine, line_end: f64) -> Cow<'_, [LyricWord]> {
    if line.words.is_empty() {
        Cow::Owned(fallback_words(line, line_end))
    } else {
        Cow::Borrowed(&line.words)
    }
}

/// Approximate word timings for a line without word data.
///
/// Each space-separated word gets a share of 90% of the line span
/// proportional to its length in graphemes, laid end to end from the line
/// start. Only used for presentation; never stored.
pub fn fallback_words(line: &LyricLine, line_end: f64) -> Vec<LyricWord> {
    let total = line.text.graphemes(true).count();
    if total == 0 {
        return Vec::new();
    }
    let span = (line_end - line.time).max(MIN_FALLBACK_LINE_SPAN) * WORD_FILL_RATIO;
    let mut cursor = line.time;
    let mut words = Vec::new();
    for text in line.text.split(' ') {
        let len = text.graphemes(true).count();
        if len == 0 {
            continue;
        }
        let duration = len as f64 / total as f64 * span;
        words.push(LyricWord {
            text: text.to_string(),
            time: cursor,
            duration,
            syllables: Vec::new(),
        });
        cursor += duration;
    }
    words
}

/// Compensate a raw position, rejecting positions that cannot be on the timeline.
fn compensate(position: f64, offset: f64) -> Option<f64> {
    (position.is_finite() && position >= 0.0).then_some(position + offset)
}

/// Resolve a position, in seconds, against a timeline with the default offset.
pub fn resolve(timeline: &Timeline, position: f64) -> ActiveState {
    Resolver::default().resolve(timeline, position)
}

/// Stateless resolution plus a remembered index used as a lookup hint.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolver {
    offset: f64,
    hint: Option<usize>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new(SYNC_OFFSET)
    }
}

impl Resolver {
    pub fn new(offset: f64) -> Self {
        Self { offset, hint: None }
    }

    /// Forget the hint. Called when the timeline is replaced.
    pub fn reset(&mut self) {
        self.hint = None;
    }

    pub fn resolve(&mut self, timeline: &Timeline, position: f64) -> ActiveState {
        let Some(effective) = compensate(position, self.offset) else {
            return ActiveState::idle(f64::NEG_INFINITY);
        };
        if timeline.is_static() {
            return ActiveState::idle(effective);
        }
        let slot = self.locate(timeline, effective);
        self.hint = slot;
        build_state(timeline, effective, slot)
    }

    /// Check the hinted slot and its successor before falling back to a binary search.
    fn locate(&self, timeline: &Timeline, effective: f64) -> Option<usize> {
        if let Some(hint) = self.hint {
            for candidate in [hint, hint + 1] {
                if timeline.slot_contains(candidate, effective) {
                    return Some(candidate);
                }
            }
        }
        timeline.slot_index(effective)
    }
}

fn build_state(timeline: &Timeline, effective: f64, slot: Option<usize>) -> ActiveState {
    // Past the end of the last entry nothing is active any more.
    let entry = slot.filter(|&i| i + 1 < timeline.len() || effective < timeline.end_of(i));

    let mut state = ActiveState {
        effective,
        entry,
        background: active_background(timeline, effective),
        ..Default::default()
    };

    if let Some(index) = entry
        && let Some(TimelineEntry::Line(line)) = timeline.get(index)
    {
        let words = line_words(line, timeline.end_of(index));
        state.word = active_index(&words, effective);
        state.syllable = state
            .word
            .and_then(|w| active_index(&words[w].syllables, effective));
    }
    state
}

fn active_index(words: &[LyricWord], effective: f64) -> Option<usize> {
    words
        .iter()
        .position(|w| SegmentState::of_word(w, effective) == SegmentState::Active)
}

fn active_background(timeline: &Timeline, effective: f64) -> Vec<BackgroundRef> {
    let mut active = Vec::new();
    for (entry, item) in timeline.entries().iter().enumerate() {
        let Some(line) = item.as_line() else {
            continue;
        };
        for (index, bg) in line.background_lines.iter().enumerate() {
            if SegmentState::at(bg.time, background_end(bg), effective) == SegmentState::Active {
                active.push(BackgroundRef {
                    entry,
                    line: index,
                    word: active_index(&bg.words, effective),
                });
            }
        }
    }
    active
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lyrics::ProviderPayload;
    use crate::lyrics::types::LineBlock;
    use crate::timeline::tests::{line, worded};

    fn word(text: &str, time: f64, duration: f64) -> LyricWord {
        LyricWord {
            text: text.to_string(),
            time,
            duration,
            syllables: Vec::new(),
        }
    }

    fn karaoke_line() -> LyricLine {
        let mut hello = word("Hello", 10.0, 1.0);
        hello.syllables = vec![word("Hel", 10.0, 0.5), word("lo", 10.5, 0.5)];
        LyricLine {
            time: 10.0,
            text: "Hello there".to_string(),
            words: vec![hello, word("there", 11.5, 1.0)],
            ..Default::default()
        }
    }

    #[test]
    fn offset_is_applied_before_lookup() {
        let timeline = Timeline::from_lines(vec![line(4.0, "a"), line(9.3, "b"), line(9.5, "c")]);
        let state = resolve(&timeline, 9.0);
        assert!((state.effective - 9.4).abs() < 1e-9);
        assert_eq!(state.entry, Some(1));
        assert_eq!(Resolver::new(0.0).resolve(&timeline, 9.0).entry, Some(0));
    }

    #[test]
    fn nothing_is_active_before_first_entry_or_for_negative_positions() {
        let timeline = Timeline::from_lines(vec![line(3.0, "a"), line(4.0, "b")]);
        assert_eq!(resolve(&timeline, 2.0).entry, None);
        assert_eq!(resolve(&timeline, -1.0).entry, None);
        assert_eq!(resolve(&timeline, f64::NAN).entry, None);
        assert_eq!(resolve(&Timeline::default(), 5.0), ActiveState::idle(5.0 + SYNC_OFFSET));
    }

    #[test]
    fn static_lyrics_are_never_active() {
        let timeline = Timeline::from_payload(&ProviderPayload::Static(vec!["a".into(), "b".into()]));
        for position in [0.0, 0.5, 3.0, 600.0] {
            assert_eq!(resolve(&timeline, position).entry, None);
        }
    }

    #[test]
    fn exactly_one_entry_active_until_the_end() {
        let timeline = Timeline::from_lines(vec![
            worded(6.0, "a", 1.0),
            line(7.0, "b c"),
            worded(20.0, "d", 2.0),
        ]);
        let first = timeline.entries()[0].time();
        let mut position = first;
        while position < 30.0 {
            let effective = position + SYNC_OFFSET;
            let state = resolve(&timeline, position);
            let last = timeline.len() - 1;
            if effective < timeline.end_of(last) {
                let expected: Vec<usize> = (0..timeline.len())
                    .filter(|&i| timeline.slot_contains(i, effective))
                    .collect();
                assert_eq!(expected.len(), 1, "at {effective}");
                assert_eq!(state.entry, Some(expected[0]), "at {effective}");
            } else {
                assert_eq!(state.entry, None, "at {effective}");
            }
            position += 0.05;
        }
    }

    #[test]
    fn last_entry_is_sung_past_its_end() {
        let timeline = Timeline::from_lines(vec![line(1.0, "a"), worded(2.0, "b", 1.0)]);
        assert_eq!(resolve(&timeline, 2.0).entry, Some(1));
        assert_eq!(resolve(&timeline, 2.7).entry, None);
        assert_eq!(resolve(&timeline, 1_000.0).entry, None);
    }

    #[test]
    fn words_and_syllables_resolve_inside_active_line() {
        let timeline = Timeline::from_lines(vec![karaoke_line()]);
        let at = |effective: f64| resolve(&timeline, effective - SYNC_OFFSET);

        let state = at(10.25);
        assert_eq!((state.entry, state.word, state.syllable), (Some(1), Some(0), Some(0)));

        let state = at(10.75);
        assert_eq!((state.word, state.syllable), (Some(0), Some(1)));

        // Between words the line stays the slot owner with nothing sounding.
        let state = at(11.25);
        assert_eq!((state.entry, state.word, state.syllable), (Some(1), None, None));

        let state = at(12.0);
        assert_eq!((state.word, state.syllable), (Some(1), None));
    }

    #[test]
    fn word_fill_is_monotonic() {
        let w = word("la", 4.0, 0.5);
        let mut sung_seen = false;
        for step in 0..200 {
            let effective = 3.0 + step as f64 * 0.01;
            let sung = SegmentState::of_word(&w, effective) == SegmentState::Sung;
            assert_eq!(sung, effective >= 4.5);
            assert!(!sung_seen || sung);
            sung_seen |= sung;
        }
    }

    #[test]
    fn background_lines_resolve_independently_of_parent() {
        let mut parent = worded(10.0, "lead", 1.0);
        parent.background_lines = vec![
            LyricLine {
                is_background: true,
                ..worded(11.5, "echo", 1.0)
            },
            LyricLine {
                is_background: true,
                ..line(30.0, "late")
            },
        ];
        // Intro marker at index 0, parent at 1.
        let timeline = Timeline::from_lines(vec![parent, line(12.0, "next")]);

        // Parent has finished singing, background still sounding.
        let state = resolve(&timeline, 11.6 - SYNC_OFFSET);
        assert_eq!(state.entry, Some(1));
        assert_eq!(state.word, None);
        assert_eq!(state.background, [BackgroundRef { entry: 1, line: 0, word: Some(0) }]);

        // Parent long past; the late background line has its own span.
        let state = resolve(&timeline, 31.0 - SYNC_OFFSET);
        assert_eq!(state.background, [BackgroundRef { entry: 1, line: 1, word: None }]);
        assert!(resolve(&timeline, 34.0 - SYNC_OFFSET).background.is_empty());
    }

    #[test]
    fn fallback_words_are_proportional_to_length() {
        let words = fallback_words(&line(0.0, "aa bbbb"), 7.0);
        // 7 graphemes including the space, 90% of a 7 second line.
        assert_eq!(words.len(), 2);
        assert!((words[0].duration - 2.0 / 7.0 * 6.3).abs() < 1e-9);
        assert!((words[1].duration - 4.0 / 7.0 * 6.3).abs() < 1e-9);
        assert!((words[1].time - words[0].end()).abs() < 1e-9);

        let short = fallback_words(&line(5.0, "hey"), 5.2);
        assert!((short[0].duration - 0.9).abs() < 1e-9);
        assert!(fallback_words(&line(5.0, ""), 9.0).is_empty());
    }

    #[test]
    fn wordless_active_line_uses_fallback_words() {
        let timeline = Timeline::from_lines(vec![line(0.5, "aa bbbb"), line(7.5, "next")]);
        let state = resolve(&timeline, 3.0 - SYNC_OFFSET);
        assert_eq!(state.entry, Some(0));
        assert_eq!(state.word, Some(1));
    }

    #[test]
    fn line_payload_resolves_end_to_end() {
        let payload = ProviderPayload::Line(vec![LineBlock {
            kind: "Vocal".to_string(),
            start_time: 10.0,
            end_time: Some(12.0),
            text: "la la".to_string(),
            opposite_aligned: false,
        }]);
        let timeline = Timeline::from_payload(&payload);
        // Intro marker at 0.5, then the line.
        assert_eq!(resolve(&timeline, 1.0).entry, Some(0));
        let state = resolve(&timeline, 11.2 - SYNC_OFFSET);
        assert_eq!((state.entry, state.word), (Some(1), Some(1)));
    }

    #[test]
    fn hint_never_changes_the_answer() {
        let timeline = Timeline::from_lines(vec![
            worded(1.0, "a", 0.5),
            line(2.0, "b"),
            line(2.0, "c"),
            worded(15.0, "d", 1.0),
            line(16.0, "e"),
        ]);
        let positions = [0.0, 1.0, 1.7, 2.1, 14.0, 3.0, 0.2, 16.5, 25.0, 1.2, 15.1];
        let mut resolver = Resolver::default();
        for position in positions {
            assert_eq!(resolver.resolve(&timeline, position), resolve(&timeline, position));
        }
        resolver.reset();
        assert_eq!(resolver, Resolver::default());
    }
}
