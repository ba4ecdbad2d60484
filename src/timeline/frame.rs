//! Read-only projection of a resolved timeline for renderers.
//!
//! A [`Frame`] annotates every entry with its [`SegmentState`]. Word and
//! syllable annotations are filled in for the active entry and for sounding
//! background lines only; everything else carries plain text.

use serde::Serialize;

use crate::lyrics::LyricWord;
use crate::lyrics::normalize::MIN_SEGMENT_DURATION;
use crate::timeline::resolve::{ActiveState, SegmentState, line_words};
use crate::timeline::{Timeline, TimelineEntry, background_end};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    pub effective: f64,
    pub synced: bool,
    pub active: Option<usize>,
    pub entries: Vec<EntryView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EntryView {
    Line(LineView),
    #[serde(rename_all = "camelCase")]
    Gap {
        time: f64,
        end: f64,
        duration: f64,
        state: SegmentState,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineView {
    pub time: f64,
    pub end: f64,
    pub text: String,
    pub state: SegmentState,
    pub opposite_aligned: bool,
    pub is_background: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub words: Vec<WordView>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub background: Vec<LineView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WordView {
    pub text: String,
    pub time: f64,
    pub duration: f64,
    /// Duration a fill animation should run; never shorter than the segment floor.
    pub animation_duration: f64,
    pub state: SegmentState,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub syllables: Vec<WordView>,
}

fn word_view(word: &LyricWord, effective: f64) -> WordView {
    WordView {
        text: word.text.clone(),
        time: word.time,
        duration: word.duration,
        animation_duration: word.duration.max(MIN_SEGMENT_DURATION),
        state: SegmentState::of_word(word, effective),
        syllables: word.syllables.iter().map(|s| word_view(s, effective)).collect(),
    }
}

/// Project a timeline at an already resolved state.
///
/// Untimed lyrics project every entry as upcoming so nothing is highlighted.
pub fn project(timeline: &Timeline, state: &ActiveState) -> Frame {
    let effective = state.effective;
    let untimed = timeline.is_static();
    let state_of = |start: f64, end: f64| {
        if untimed {
            SegmentState::Upcoming
        } else {
            SegmentState::at(start, end, effective)
        }
    };

    let entries = timeline
        .entries()
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let end = timeline.end_of(index);
            match entry {
                TimelineEntry::Gap(gap) => EntryView::Gap {
                    time: gap.time,
                    end,
                    duration: timeline.gap_duration(index),
                    state: state_of(gap.time, end),
                },
                TimelineEntry::Line(line) => {
                    let words = if state.entry == Some(index) {
                        line_words(line, end)
                            .iter()
                            .map(|w| word_view(w, effective))
                            .collect()
                    } else {
                        Vec::new()
                    };
                    let background = line
                        .background_lines
                        .iter()
                        .map(|bg| {
                            let bg_end = background_end(bg);
                            let bg_state = state_of(bg.time, bg_end);
                            LineView {
                                time: bg.time,
                                end: bg_end,
                                text: bg.text.clone(),
                                state: bg_state,
                                opposite_aligned: line.opposite_aligned,
                                is_background: true,
                                words: if bg_state == SegmentState::Active {
                                    bg.words.iter().map(|w| word_view(w, effective)).collect()
                                } else {
                                    Vec::new()
                                },
                                background: Vec::new(),
                            }
                        })
                        .collect();
                    EntryView::Line(LineView {
                        time: line.time,
                        end,
                        text: line.text.clone(),
                        state: state_of(line.time, end),
                        opposite_aligned: line.opposite_aligned,
                        is_background: line.is_background,
                        words,
                        background,
                    })
                }
            }
        })
        .collect();

    Frame {
        effective,
        synced: timeline.is_synced(),
        active: state.entry,
        entries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lyrics::LyricLine;
    use crate::timeline::resolve::{SYNC_OFFSET, resolve};
    use crate::timeline::tests::{line, worded};

    #[test]
    fn active_line_carries_word_annotations() {
        let mut first = worded(1.0, "one", 1.0);
        first.words[0].syllables = vec![LyricWord {
            text: "one".to_string(),
            time: 1.0,
            duration: 0.05,
            syllables: Vec::new(),
        }];
        let timeline = Timeline::from_lines(vec![first, line(3.0, "two three")]);
        let state = resolve(&timeline, 1.5 - SYNC_OFFSET);
        let frame = project(&timeline, &state);

        assert_eq!(frame.active, Some(0));
        assert!(frame.synced);
        let Some(EntryView::Line(active)) = frame.entries.first() else {
            panic!("expected active line");
        };
        assert_eq!(active.state, SegmentState::Active);
        assert_eq!(active.words[0].state, SegmentState::Active);
        assert_eq!(active.words[0].syllables[0].state, SegmentState::Sung);
        assert_eq!(active.words[0].syllables[0].animation_duration, MIN_SEGMENT_DURATION);

        let EntryView::Line(upcoming) = &frame.entries[1] else {
            panic!("expected line");
        };
        assert_eq!(upcoming.state, SegmentState::Upcoming);
        assert!(upcoming.words.is_empty());
    }

    #[test]
    fn gaps_report_duration_and_state() {
        let timeline = Timeline::from_lines(vec![line(20.0, "late"), line(20.5, "later")]);
        let frame = project(&timeline, &resolve(&timeline, 10.0));
        assert_eq!(frame.active, Some(0));
        assert_eq!(
            frame.entries[0],
            EntryView::Gap {
                time: 0.5,
                end: 20.0,
                duration: 19.5,
                state: SegmentState::Active,
            }
        );
    }

    #[test]
    fn untimed_lyrics_are_plain() {
        let timeline = Timeline::from_lines(vec![line(0.0, "a"), line(0.0, "b")]);
        let frame = project(&timeline, &resolve(&timeline, 42.0));
        assert!(!frame.synced);
        assert_eq!(frame.active, None);
        assert!(frame.entries.iter().all(|e| matches!(
            e,
            EntryView::Line(LineView { state: SegmentState::Upcoming, .. })
        )));
    }

    #[test]
    fn sounding_background_gets_words_after_parent_is_sung() {
        let mut parent = worded(1.0, "lead", 0.5);
        parent.background_lines = vec![LyricLine {
            is_background: true,
            ..worded(1.8, "echo", 1.0)
        }];
        let timeline = Timeline::from_lines(vec![parent, line(4.0, "next")]);
        let frame = project(&timeline, &resolve(&timeline, 2.0 - SYNC_OFFSET));
        let EntryView::Line(parent) = &frame.entries[0] else {
            panic!("expected line");
        };
        assert_eq!(parent.state, SegmentState::Sung);
        assert_eq!(parent.background[0].state, SegmentState::Active);
        assert_eq!(parent.background[0].words.len(), 1);
    }

    #[test]
    fn serializes_for_renderers() {
        let timeline = Timeline::from_lines(vec![line(6.0, "hi")]);
        let frame = project(&timeline, &resolve(&timeline, 1.0));
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["entries"][0]["kind"], "gap");
        assert_eq!(json["entries"][0]["state"], "active");
        assert_eq!(json["entries"][1]["kind"], "line");
        assert_eq!(json["entries"][1]["oppositeAligned"], false);
        assert_eq!(json["active"], 0);
    }
}
