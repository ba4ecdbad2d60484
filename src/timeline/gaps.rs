//! Instrumental gap synthesis.

use crate::lyrics::LyricLine;
use crate::timeline::{GapMarker, TimelineEntry};

/// A first line starting later than this gets an intro marker.
pub const GAP_THRESHOLD: f64 = 5.0;
/// Where the intro marker sits. Fixed early so the "upcoming" indicator shows
/// well before the first line.
pub const INTRO_GAP_TIME: f64 = 0.5;
/// Extra silence, beyond [`GAP_THRESHOLD`], needed between two lines before a
/// marker goes between them.
pub const INTERLUDE_MARGIN: f64 = 3.0;
/// Offset of an interlude marker from the start of the line before it.
pub const INTERLUDE_LEAD_IN: f64 = 2.0;
/// Shortest duration a gap marker is rendered with.
pub const MIN_GAP_DURATION: f64 = 1.0;

/// Interleave gap markers with the lines.
///
/// Adds an intro marker when the first line starts late, and a marker after
/// any line whose successor starts more than `GAP_THRESHOLD + INTERLUDE_MARGIN`
/// seconds later. Trailing silence is not marked.
pub fn synthesize(lines: Vec<LyricLine>) -> Vec<TimelineEntry> {
    let Some(first) = lines.first() else {
        return Vec::new();
    };

    let mut out = Vec::with_capacity(lines.len() + 1);
    if first.time > GAP_THRESHOLD {
        out.push(TimelineEntry::Gap(GapMarker { time: INTRO_GAP_TIME }));
    }

    let next_starts: Vec<Option<f64>> = lines
        .iter()
        .skip(1)
        .map(|l| Some(l.time))
        .chain(std::iter::once(None))
        .collect();

    for (line, next) in lines.into_iter().zip(next_starts) {
        let start = line.time;
        out.push(TimelineEntry::Line(line));
        if let Some(next) = next
            && next - start > GAP_THRESHOLD + INTERLUDE_MARGIN
        {
            out.push(TimelineEntry::Gap(GapMarker {
                time: start + INTERLUDE_LEAD_IN,
            }));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::tests::line;

    fn gap_times(entries: &[TimelineEntry]) -> Vec<f64> {
        entries
            .iter()
            .filter_map(|e| match e {
                TimelineEntry::Gap(g) => Some(g.time),
                TimelineEntry::Line(_) => None,
            })
            .collect()
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(synthesize(Vec::new()).is_empty());
    }

    #[test]
    fn long_pause_gets_one_marker_two_seconds_in() {
        let entries = synthesize(vec![line(0.0, "a"), line(10.0, "b")]);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1], TimelineEntry::Gap(GapMarker { time: 2.0 }));
        assert_eq!(gap_times(&entries), [2.0]);
    }

    #[test]
    fn late_first_line_gets_intro_marker() {
        let entries = synthesize(vec![line(5.5, "a")]);
        assert_eq!(entries[0], TimelineEntry::Gap(GapMarker { time: 0.5 }));
        assert_eq!(entries.len(), 2);

        let on_threshold = synthesize(vec![line(5.0, "a")]);
        assert!(gap_times(&on_threshold).is_empty());
    }

    #[test]
    fn pause_of_exactly_eight_seconds_is_not_a_gap() {
        let entries = synthesize(vec![line(1.0, "a"), line(9.0, "b"), line(17.5, "c")]);
        assert_eq!(gap_times(&entries), [11.0]);
    }

    #[test]
    fn trailing_silence_is_unmarked() {
        let entries = synthesize(vec![line(1.0, "a"), line(2.0, "b")]);
        assert!(matches!(entries.last(), Some(TimelineEntry::Line(l)) if l.text == "b"));
    }

    #[test]
    fn every_long_pause_has_exactly_one_marker_between() {
        let starts = [6.0, 7.0, 20.0, 20.5, 40.0, 48.0, 57.0];
        let entries = synthesize(starts.iter().map(|t| line(*t, "x")).collect());
        let times: Vec<f64> = entries.iter().map(TimelineEntry::time).collect();
        assert!(times.windows(2).all(|w| w[0] <= w[1]));

        for pair in starts.windows(2) {
            let between: Vec<f64> = gap_times(&entries)
                .into_iter()
                .filter(|t| *t > pair[0] && *t < pair[1])
                .collect();
            if pair[1] - pair[0] > 8.0 {
                assert_eq!(between, [pair[0] + 2.0]);
            } else {
                assert!(between.is_empty());
            }
        }
        assert_eq!(gap_times(&entries)[0], INTRO_GAP_TIME);
    }
}
