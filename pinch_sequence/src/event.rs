//! Typed note and lyric events, validated at the catalog boundary.
//!
//! The catalog serves loosely-shaped JSON.  Each entry is decoded on its own
//! so that one bad entry costs one note, not the whole download.

use log::debug;
use serde::Deserialize;
use serde_json::Value;

use crate::error::CatalogError;

// ════════════════════════════════════════════════════════════════════════════
// NoteEvent / LyricEvent
// ════════════════════════════════════════════════════════════════════════════

/// A single note as served by the catalog.  Times are seconds from the start
/// of the source file.
#[derive(Clone, Debug, PartialEq)]
pub struct NoteEvent {
    pub time:     f64,
    pub channel:  u8,
    /// MIDI note number (0–127).
    pub note:     u8,
    /// 0.0–1.0; `0.0` when the source did not say.
    pub velocity: f32,
    pub duration: f64,
    pub program:  u8,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LyricEvent {
    pub time: f64,
    pub text: String,
}

// ── raw wire shapes ──────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawNoteEvent {
    time:     Option<f64>,
    channel:  Option<f64>,
    #[serde(alias = "midi")]
    note:     Option<f64>,
    velocity: Option<f64>,
    duration: Option<f64>,
    program:  Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawLyricEvent {
    time: Option<f64>,
    text: Option<String>,
}

/// Longest note kept from a download, in seconds.  Longer values are
/// clamped so timed playback can always place the note-off.
pub const MAX_DURATION: f64 = 3600.0;

impl NoteEvent {
    /// `None` for entries that cannot be placed or sounded: no usable time,
    /// note or channel outside the MIDI range.  Everything else is defaulted
    /// or clamped.
    fn from_raw(raw: RawNoteEvent) -> Option<Self> {
        let time = raw.time.filter(|t| t.is_finite() && *t >= 0.0)?;
        let note = raw.note.filter(|n| (0.0..=127.0).contains(n))?.round() as u8;
        let channel = match raw.channel {
            None                                   => 0,
            Some(c) if (0.0..=15.0).contains(&c) => c.round() as u8,
            Some(_)                                => return None,
        };
        Some(NoteEvent {
            time,
            channel,
            note,
            velocity: raw.velocity.filter(|v| v.is_finite()).unwrap_or(0.0).clamp(0.0, 1.0) as f32,
            duration: raw.duration.filter(|d| d.is_finite()).unwrap_or(0.0).clamp(0.0, MAX_DURATION),
            program:  raw.program.filter(|p| p.is_finite()).unwrap_or(0.0).clamp(0.0, 127.0).round() as u8,
        })
    }

    /// Velocity on the MIDI 0–127 scale, never below `floor`.
    pub fn midi_velocity(&self, floor: u8) -> u8 {
        ((self.velocity.clamp(0.0, 1.0) * 127.0).floor() as u8).max(floor.min(127))
    }

    pub fn end_time(&self) -> f64 {
        self.time + self.duration
    }
}

impl LyricEvent {
    fn from_raw(raw: RawLyricEvent) -> Option<Self> {
        let time = raw.time.filter(|t| t.is_finite() && *t >= 0.0)?;
        let text = raw.text?;
        Some(LyricEvent { time, text })
    }
}

// ════════════════════════════════════════════════════════════════════════════
// EventPayload — one catalog download
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventPayload {
    pub events: Vec<NoteEvent>,
    pub lyrics: Vec<LyricEvent>,
}

impl EventPayload {
    /// Decode a download body.  Only unparseable JSON is an error; a body
    /// without an `events` array is simply empty.
    pub fn from_json(body: &str) -> Result<Self, CatalogError> {
        let value: Value = serde_json::from_str(body)?;
        Ok(Self::from_value(value))
    }

    pub fn from_value(value: Value) -> Self {
        let events = entries(&value, "events")
            .filter_map(|v| decode::<RawNoteEvent>(v).and_then(NoteEvent::from_raw))
            .collect::<Vec<_>>();
        let lyrics = entries(&value, "lyrics")
            .filter_map(|v| decode::<RawLyricEvent>(v).and_then(LyricEvent::from_raw))
            .collect::<Vec<_>>();

        let served = value.get("events").and_then(Value::as_array).map_or(0, Vec::len);
        if served != events.len() {
            debug!("skipped {} unplayable event(s)", served - events.len());
        }
        EventPayload { events, lyrics }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

fn entries<'a>(value: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    value.get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn decode<T: for<'de> Deserialize<'de>>(value: &Value) -> Option<T> {
    T::deserialize(value).ok()
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_full_event() {
        let p = EventPayload::from_json(
            r#"{"events":[{"time":1.5,"channel":0,"note":60,"velocity":0.5,"duration":0.25,"program":40}]}"#,
        ).unwrap();
        assert_eq!(p.events, vec![NoteEvent {
            time: 1.5, channel: 0, note: 60, velocity: 0.5, duration: 0.25, program: 40,
        }]);
        assert!(p.lyrics.is_empty());
    }

    #[test]
    fn midi_is_an_alias_for_note_and_channel_defaults_to_zero() {
        let p = EventPayload::from_json(r#"{"events":[{"time":0,"midi":72}]}"#).unwrap();
        assert_eq!(p.events[0].note, 72);
        assert_eq!(p.events[0].channel, 0);
        assert_eq!(p.events[0].velocity, 0.0);
        assert_eq!(p.events[0].duration, 0.0);
    }

    #[test]
    fn unplayable_entries_are_skipped() {
        let p = EventPayload::from_json(r#"{"events":[
            {"note":60},
            {"time":-1,"note":60},
            {"time":0,"note":128},
            {"time":0,"note":60,"channel":16},
            {"time":0,"note":"C4"},
            "garbage",
            {"time":0,"note":61}
        ]}"#).unwrap();
        assert_eq!(p.events.len(), 1);
        assert_eq!(p.events[0].note, 61);
    }

    #[test]
    fn out_of_range_fields_are_clamped() {
        let p = EventPayload::from_json(
            r#"{"events":[{"time":0,"note":60,"velocity":3.0,"duration":-2,"program":500}]}"#,
        ).unwrap();
        let e = &p.events[0];
        assert_eq!(e.velocity, 1.0);
        assert_eq!(e.duration, 0.0);
        assert_eq!(e.program, 127);
    }

    #[test]
    fn huge_durations_are_clamped() {
        let p = EventPayload::from_json(
            r#"{"events":[{"time":0,"note":60,"velocity":0.5,"duration":1e19}]}"#,
        ).unwrap();
        assert_eq!(p.events[0].duration, MAX_DURATION);
    }

    #[test]
    fn missing_events_array_is_empty() {
        assert!(EventPayload::from_json(r#"{"title":"x"}"#).unwrap().is_empty());
        assert!(EventPayload::from_json(r#"{"events":{"not":"an array"}}"#).unwrap().is_empty());
        assert!(EventPayload::from_json("[]").unwrap().is_empty());
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(matches!(EventPayload::from_json("{events:"), Err(CatalogError::Json(_))));
    }

    #[test]
    fn lyrics_need_time_and_text() {
        let p = EventPayload::from_json(
            r#"{"events":[],"lyrics":[{"time":1,"text":"a"},{"time":2},{"text":"b"}]}"#,
        ).unwrap();
        assert_eq!(p.lyrics, vec![LyricEvent { time: 1.0, text: "a".into() }]);
    }

    #[test]
    fn midi_velocity_floors() {
        let mut e = NoteEvent { time: 0.0, channel: 0, note: 60, velocity: 0.5, duration: 1.0, program: 0 };
        assert_eq!(e.midi_velocity(0), 63);
        e.velocity = 0.01;
        assert_eq!(e.midi_velocity(20), 20);
        e.velocity = 1.0;
        assert_eq!(e.midi_velocity(20), 127);
    }
}
