//! Flat note events → an ordered list of chords.
//!
//! Notes on the performance channel that share a start time (to the
//! microsecond) become one [`Chord`].  A lyric is attached to the chord it
//! lines up with, at most once.

use std::collections::{BTreeMap, HashMap};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::event::{LyricEvent, NoteEvent};

/// Chord timestamps are quantized to this many seconds.
pub const TIME_QUANTUM: f64 = 1e-6;
const STEPS_PER_SECOND: f64 = 1e6;

/// Integer chord key for a time in seconds.
pub fn quantize(time: f64) -> i64 {
    (time * STEPS_PER_SECOND).round() as i64
}

fn seconds(key: i64) -> f64 {
    key as f64 / STEPS_PER_SECOND
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GroupingConfig {
    /// Only events on this channel are performed.
    pub channel:       u8,
    /// Largest gap, in seconds, between a lyric and the chord it attaches to.
    pub lyric_epsilon: f64,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        GroupingConfig { channel: 0, lyric_epsilon: 1e-3 }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Chord
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, PartialEq)]
pub struct Chord {
    key:           i64,
    /// Start time in seconds, already quantized.
    pub timestamp: f64,
    pub lyric:     Option<String>,
    /// Keyed by note number; iteration is low → high.
    pub notes:     BTreeMap<u8, NoteEvent>,
}

impl Chord {
    fn new(key: i64) -> Self {
        Chord {
            key,
            timestamp: seconds(key),
            lyric:     None,
            notes:     BTreeMap::new(),
        }
    }

    pub fn key(&self) -> i64 {
        self.key
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn pitches(&self) -> impl Iterator<Item = u8> + '_ {
        self.notes.keys().copied()
    }

    /// Longest note in the chord, in seconds.
    pub fn duration(&self) -> f64 {
        self.notes.values().map(|n| n.duration).fold(0.0, f64::max)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Sequence
// ════════════════════════════════════════════════════════════════════════════

/// Chords in ascending time order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Sequence {
    chords: Vec<Chord>,
}

impl Sequence {
    pub fn new(mut chords: Vec<Chord>) -> Self {
        chords.sort_by_key(|c| c.key);
        Sequence { chords }
    }

    pub fn len(&self) -> usize {
        self.chords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chords.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Chord> {
        self.chords.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Chord> {
        self.chords.iter()
    }

    pub fn chords(&self) -> &[Chord] {
        &self.chords
    }

    pub fn note_count(&self) -> usize {
        self.chords.iter().map(Chord::len).sum()
    }

    /// When the last note ends, in seconds from the first timestamp origin.
    pub fn end_time(&self) -> f64 {
        self.chords.iter()
            .flat_map(|c| c.notes.values())
            .map(NoteEvent::end_time)
            .fold(0.0, f64::max)
    }
}

impl<'a> IntoIterator for &'a Sequence {
    type Item     = &'a Chord;
    type IntoIter = std::slice::Iter<'a, Chord>;

    fn into_iter(self) -> Self::IntoIter {
        self.chords.iter()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Grouping
// ════════════════════════════════════════════════════════════════════════════

pub fn group_events(
    events: &[NoteEvent],
    lyrics: &[LyricEvent],
    config: &GroupingConfig,
) -> Sequence {
    let mut pool: Vec<(i64, &LyricEvent)> = lyrics.iter()
        .map(|l| (quantize(l.time), l))
        .collect();
    let tolerance = config.lyric_epsilon.max(0.0);

    let mut chords: Vec<Chord> = Vec::new();
    let mut by_key: HashMap<i64, usize> = HashMap::new();

    for event in events.iter().filter(|e| e.channel == config.channel) {
        let key = quantize(event.time);
        let index = *by_key.entry(key).or_insert_with(|| {
            let mut chord = Chord::new(key);
            let hit = pool.iter()
                .position(|(k, _)| seconds((k - key).abs()) <= tolerance);
            if let Some(at) = hit {
                chord.lyric = Some(pool.remove(at).1.text.clone());
            }
            chords.push(chord);
            chords.len() - 1
        });
        chords[index].notes.insert(event.note, event.clone());
    }

    if !pool.is_empty() {
        debug!("{} lyric(s) matched no chord", pool.len());
    }
    Sequence::new(chords)
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn note(time: f64, channel: u8, pitch: u8, velocity: f32) -> NoteEvent {
        NoteEvent { time, channel, note: pitch, velocity, duration: 0.5, program: 0 }
    }

    fn lyric(time: f64, text: &str) -> LyricEvent {
        LyricEvent { time, text: text.to_string() }
    }

    #[test]
    fn filters_channel_and_merges_same_time() {
        let events = [
            note(0.0, 0, 60, 0.8),
            note(0.0, 1, 62, 0.8),
            note(0.0, 0, 64, 0.8),
        ];
        let seq = group_events(&events, &[], &GroupingConfig::default());
        assert_eq!(seq.len(), 1);
        assert_eq!(seq.get(0).unwrap().pitches().collect::<Vec<_>>(), vec![60, 64]);
    }

    #[test]
    fn chords_are_sorted_by_time() {
        let events = [note(2.0, 0, 60, 0.5), note(0.5, 0, 62, 0.5), note(1.0, 0, 64, 0.5)];
        let seq = group_events(&events, &[], &GroupingConfig::default());
        let times: Vec<f64> = seq.iter().map(|c| c.timestamp).collect();
        assert_eq!(times.len(), 3);
        assert!(times.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(seq.get(0).unwrap().pitches().next(), Some(62));
    }

    #[test]
    fn sub_microsecond_jitter_shares_a_chord() {
        let events = [note(1.0, 0, 60, 0.5), note(1.000_000_2, 0, 67, 0.5)];
        let seq = group_events(&events, &[], &GroupingConfig::default());
        assert_eq!(seq.len(), 1);
        assert_eq!(seq.get(0).unwrap().len(), 2);
    }

    #[test]
    fn last_write_wins_per_pitch() {
        let events = [note(0.0, 0, 60, 0.2), note(0.0, 0, 60, 0.9)];
        let seq = group_events(&events, &[], &GroupingConfig::default());
        let chord = seq.get(0).unwrap();
        assert_eq!(chord.len(), 1);
        assert_eq!(chord.notes[&60].velocity, 0.9);
    }

    #[test]
    fn exact_lyric_is_consumed_once() {
        let events = [note(1.0, 0, 60, 0.5), note(1.0, 0, 64, 0.5)];
        let lyrics = [lyric(1.0, "hey")];
        let seq = group_events(&events, &lyrics, &GroupingConfig::default());
        assert_eq!(seq.len(), 1);
        assert_eq!(seq.get(0).unwrap().lyric.as_deref(), Some("hey"));
    }

    #[test]
    fn one_lyric_never_attaches_twice() {
        // Both chords are within tolerance of the single lyric.
        let events = [note(1.0, 0, 60, 0.5), note(1.0005, 0, 62, 0.5)];
        let lyrics = [lyric(1.0002, "only")];
        let seq = group_events(&events, &lyrics, &GroupingConfig::default());
        let attached: Vec<_> = seq.iter().filter_map(|c| c.lyric.as_deref()).collect();
        assert_eq!(attached, vec!["only"]);
    }

    #[test]
    fn lyric_outside_tolerance_is_dropped() {
        let events = [note(1.0, 0, 60, 0.5)];
        let lyrics = [lyric(1.1, "late")];
        let seq = group_events(&events, &lyrics, &GroupingConfig::default());
        assert_eq!(seq.get(0).unwrap().lyric, None);
    }

    #[test]
    fn first_matching_lyric_wins() {
        let events = [note(1.0, 0, 60, 0.5)];
        let lyrics = [lyric(1.0, "a"), lyric(1.0, "b")];
        let seq = group_events(&events, &lyrics, &GroupingConfig::default());
        assert_eq!(seq.get(0).unwrap().lyric.as_deref(), Some("a"));
    }

    #[test]
    fn other_performance_channel() {
        let events = [note(0.0, 0, 60, 0.5), note(0.0, 3, 61, 0.5)];
        let cfg = GroupingConfig { channel: 3, ..GroupingConfig::default() };
        let seq = group_events(&events, &[], &cfg);
        assert_eq!(seq.note_count(), 1);
        assert_eq!(seq.get(0).unwrap().pitches().next(), Some(61));
    }

    #[test]
    fn empty_input_is_empty_sequence() {
        let seq = group_events(&[], &[lyric(0.0, "x")], &GroupingConfig::default());
        assert!(seq.is_empty());
        assert_eq!(seq.end_time(), 0.0);
    }

    #[test]
    fn end_time_covers_longest_note() {
        let mut long = note(1.0, 0, 60, 0.5);
        long.duration = 3.0;
        let seq = group_events(&[note(0.0, 0, 64, 0.5), long], &[], &GroupingConfig::default());
        assert!((seq.end_time() - 4.0).abs() < 1e-9);
        assert_eq!(seq.get(1).unwrap().duration(), 3.0);
    }
}
