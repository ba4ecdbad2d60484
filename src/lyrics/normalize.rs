//! Timeline normalization.
//!
//! Every provider payload shape is turned into the same ordered list of
//! [`LyricLine`]s here, once per track. Nothing downstream looks at the
//! payload shape again.

use crate::lyrics::types::{LineBlock, LyricLine, LyricWord, ProviderPayload, RawSyllable, SyllableBlock, VocalGroup};

/// Smallest duration given to a word or syllable whose source timing is unusable.
pub const MIN_SEGMENT_DURATION: f64 = 0.15;
/// Line span assumed by the line variant when a block has no end time.
pub const DEFAULT_LINE_SPAN: f64 = 2.0;
/// Share of an evenly split word slot that is highlighted; the rest is a visual gap.
pub const WORD_FILL_RATIO: f64 = 0.9;

const VOCAL: &str = "Vocal";

/// Convert a raw payload into canonical lines sorted by start time.
///
/// The sort is stable, so lines sharing a start time keep their payload order.
pub fn normalize(payload: &ProviderPayload) -> Vec<LyricLine> {
    let mut lines = match payload {
        ProviderPayload::Syllable(blocks) => normalize_syllable_blocks(blocks),
        ProviderPayload::Line(blocks) => normalize_line_blocks(blocks),
        ProviderPayload::Static(texts) => texts
            .iter()
            .map(|text| LyricLine {
                time: 0.0,
                text: text.clone(),
                ..Default::default()
            })
            .collect(),
        ProviderPayload::Unknown(kind) => {
            tracing::debug!(kind = %kind, "unrecognized lyrics payload type");
            Vec::new()
        }
    };
    lines.sort_by(|a, b| a.time.total_cmp(&b.time));
    lines
}

fn clamp_duration(duration: f64) -> f64 {
    if duration.is_finite() && duration > 0.0 {
        duration
    } else {
        MIN_SEGMENT_DURATION
    }
}

fn normalize_syllable_blocks(blocks: &[SyllableBlock]) -> Vec<LyricLine> {
    let mut lines = Vec::with_capacity(blocks.len());
    for block in blocks {
        if block.kind != VOCAL {
            continue;
        }
        let Some(lead) = &block.lead else {
            continue;
        };
        let Some(mut line) = group_line(lead) else {
            tracing::debug!(start = lead.start_time, "skipping vocal block without usable lead");
            continue;
        };
        line.opposite_aligned = block.opposite_aligned;
        line.background_lines = block
            .background
            .iter()
            .filter_map(group_line)
            .map(|mut bg| {
                bg.is_background = true;
                bg
            })
            .collect();
        lines.push(line);
    }
    lines
}

/// Build one line from a lead or background vocal group.
///
/// Groups with timed syllables get syllable-derived words. Otherwise the
/// group text becomes a single word spanning the group; a group with blank
/// text yields nothing.
fn group_line(group: &VocalGroup) -> Option<LyricLine> {
    let syllables: Vec<TimedSyllable> = group.syllables.iter().filter_map(TimedSyllable::new).collect();

    if let Some(first) = syllables.first() {
        let text = syllables
            .iter()
            .map(|s| {
                if s.raw.is_part_of_word {
                    s.raw.text.clone()
                } else {
                    format!("{} ", s.raw.text)
                }
            })
            .collect::<String>()
            .trim()
            .to_string();
        return Some(LyricLine {
            time: first.start,
            text,
            words: group_syllables(&syllables),
            ..Default::default()
        });
    }

    let text = group.text.clone().unwrap_or_default();
    if text.trim().is_empty() || !group.start_time.is_finite() {
        return None;
    }
    let word = LyricWord {
        text: text.trim().to_string(),
        time: group.start_time,
        duration: clamp_duration(group.end_time - group.start_time),
        syllables: Vec::new(),
    };
    Some(LyricLine {
        time: group.start_time,
        text,
        words: vec![word],
        ..Default::default()
    })
}

/// A syllable with usable timing.
struct TimedSyllable<'a> {
    raw: &'a RawSyllable,
    start: f64,
    end: f64,
}

impl<'a> TimedSyllable<'a> {
    /// A syllable without a finite start is dropped. A missing or non-finite
    /// end is clamped to the minimum duration.
    fn new(raw: &'a RawSyllable) -> Option<Self> {
        let Some(start) = raw.start_time.filter(|t| t.is_finite()) else {
            tracing::debug!(text = %raw.text, "dropping syllable without start time");
            return None;
        };
        let end = raw
            .end_time
            .filter(|t| t.is_finite())
            .unwrap_or(start + MIN_SEGMENT_DURATION);
        Some(Self { raw, start, end })
    }
}

/// Group a flat syllable run into words.
///
/// A syllable not flagged as part of a word, or the last syllable, closes the
/// current word.
fn group_syllables(syllables: &[TimedSyllable]) -> Vec<LyricWord> {
    let mut words = Vec::new();
    let mut text = String::new();
    let mut start: Option<f64> = None;
    let mut parts: Vec<LyricWord> = Vec::new();

    for (i, syl) in syllables.iter().enumerate() {
        let word_start = *start.get_or_insert(syl.start);
        text.push_str(&syl.raw.text);
        parts.push(LyricWord {
            text: syl.raw.text.clone(),
            time: syl.start,
            duration: clamp_duration(syl.end - syl.start),
            syllables: Vec::new(),
        });

        if !syl.raw.is_part_of_word || i == syllables.len() - 1 {
            words.push(LyricWord {
                text: text.trim().to_string(),
                time: word_start,
                duration: clamp_duration(syl.end - word_start),
                syllables: std::mem::take(&mut parts),
            });
            text.clear();
            start = None;
        }
    }
    words
}

fn normalize_line_blocks(blocks: &[LineBlock]) -> Vec<LyricLine> {
    blocks
        .iter()
        .filter(|b| b.kind == VOCAL && b.start_time.is_finite())
        .map(|block| {
            let start = block.start_time;
            let end = block
                .end_time
                .filter(|e| e.is_finite())
                .unwrap_or(start + DEFAULT_LINE_SPAN);
            let texts: Vec<&str> = block.text.split(' ').filter(|w| !w.is_empty()).collect();
            let share = (end - start) / texts.len().max(1) as f64;
            let words = texts
                .iter()
                .enumerate()
                .map(|(i, w)| LyricWord {
                    text: (*w).to_string(),
                    time: start + i as f64 * share,
                    duration: clamp_duration(share * WORD_FILL_RATIO),
                    syllables: Vec::new(),
                })
                .collect();
            LyricLine {
                time: start,
                text: block.text.clone(),
                words,
                opposite_aligned: block.opposite_aligned,
                ..Default::default()
            }
        })
        .collect()
}
