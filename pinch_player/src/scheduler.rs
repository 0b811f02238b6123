//! Note scheduling for both playback modes.
//!
//! | Mode    | Driven by                  | Notes end when                       |
//! |---------|----------------------------|--------------------------------------|
//! | `Timed` | [`Scheduler::play`] + clock | their note-off timer fires, or stop  |
//! | `Step`  | [`Scheduler::advance`]      | [`Scheduler::release_all`]           |
//!
//! Starting one mode stops the other.  Whatever the mode, after `stop` or
//! `release_all` nothing is sounding and no timer is pending.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use pinch_gesture::{Expression, CC_CHANNEL_VOLUME};
use pinch_sequence::{Chord, NoteEvent, Sequence};

use crate::synth::{SynthBackend, SynthError};
use crate::timer::{TimedAction, TimerQueue};

/// A note that has been switched on and not yet off.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActiveNote {
    pub channel: u8,
    pub note:    u8,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlaybackMode {
    #[default]
    Idle,
    Timed,
    Step,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Velocity floor for notes taken from the sequence.
    pub min_velocity:  u8,
    /// Step-mode velocity for notes whose source gave none.
    pub step_velocity: u8,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        PlaybackConfig { min_velocity: 20, step_velocity: 100 }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Scheduler
// ════════════════════════════════════════════════════════════════════════════

pub struct Scheduler {
    synth:         Option<Box<dyn SynthBackend>>,
    config:        PlaybackConfig,
    sequence:      Sequence,
    mode:          PlaybackMode,
    cursor:        usize,
    active:        BTreeSet<ActiveNote>,
    timers:        TimerQueue,
    current_lyric: Option<String>,
    epoch:         Option<Instant>,
}

impl Scheduler {
    pub fn new(config: PlaybackConfig) -> Self {
        Scheduler {
            synth:         None,
            config,
            sequence:      Sequence::default(),
            mode:          PlaybackMode::Idle,
            cursor:        0,
            active:        BTreeSet::new(),
            timers:        TimerQueue::new(),
            current_lyric: None,
            epoch:         None,
        }
    }

    pub fn attach_synth(&mut self, synth: Box<dyn SynthBackend>) {
        self.silence_all();
        self.synth = Some(synth);
    }

    fn ready(&self) -> bool {
        self.synth.is_some() && !self.sequence.is_empty()
    }

    /// Replace the sequence wholesale.  Anything sounding is silenced and
    /// the step cursor returns to the first chord.
    pub fn set_sequence(&mut self, sequence: Sequence) {
        self.silence_all();
        self.mode          = PlaybackMode::Idle;
        self.cursor        = 0;
        self.current_lyric = None;
        self.epoch         = None;
        self.sequence      = sequence;
    }

    // ── timed mode ───────────────────────────────────────────────────────

    /// Schedule the whole sequence against `epoch`.  Restarts from scratch
    /// if anything is already playing.  Returns the number of notes
    /// scheduled.
    pub fn play(&mut self, epoch: Instant) -> usize {
        if !self.ready() {
            return 0;
        }
        self.silence_all();
        self.mode  = PlaybackMode::Timed;
        self.epoch = Some(epoch);

        let mut scheduled = 0;
        for chord in self.sequence.iter() {
            let Some(on_at) = at_offset(epoch, chord.timestamp) else {
                debug!("chord at {}s cannot be scheduled", chord.timestamp);
                continue;
            };
            for note in chord.notes.values() {
                let Some(off_at) = at_offset(on_at, note.duration) else {
                    debug!("note {} at {}s lasts too long to schedule", note.note, chord.timestamp);
                    continue;
                };
                self.timers.schedule(on_at, TimedAction::NoteOn {
                    channel:  note.channel,
                    note:     note.note,
                    velocity: note.midi_velocity(self.config.min_velocity),
                    program:  note.program,
                });
                self.timers.schedule(off_at, TimedAction::NoteOff {
                    channel: note.channel,
                    note:    note.note,
                });
                scheduled += 1;
            }
        }
        info!("timed playback: {} notes over {:.2}s", scheduled, self.sequence.end_time());
        scheduled
    }

    pub fn stop(&mut self) {
        self.silence_all();
        if self.mode == PlaybackMode::Timed {
            self.mode = PlaybackMode::Idle;
        }
        self.epoch = None;
    }

    /// Fire every timer due at `now`.  Returns how many fired.
    pub fn poll(&mut self, now: Instant) -> usize {
        let fired = self.timers.drain_due(now);
        let count = fired.len();
        for (_, action) in fired {
            match action {
                TimedAction::NoteOn { channel, note, velocity, program } => {
                    self.sound(channel, note, velocity, program);
                }
                TimedAction::NoteOff { channel, note } => {
                    self.active.remove(&ActiveNote { channel, note });
                    if let Some(synth) = self.synth.as_mut() {
                        swallow(synth.note_off(channel, note));
                    }
                }
            }
        }
        if self.mode == PlaybackMode::Timed && self.timers.is_empty() && self.active.is_empty() {
            info!("timed playback finished");
            self.mode  = PlaybackMode::Idle;
            self.epoch = None;
        }
        count
    }

    // ── step mode ────────────────────────────────────────────────────────

    /// Sound the chord under the cursor and move the cursor on, wrapping at
    /// the end.  Returns the index of the chord played.
    pub fn advance(&mut self) -> Option<usize> {
        if !self.ready() {
            return None;
        }
        if self.mode == PlaybackMode::Timed {
            self.stop();
        }
        self.mode = PlaybackMode::Step;

        let index = self.cursor % self.sequence.len();
        let chord: Chord = self.sequence.get(index)?.clone();
        for note in chord.notes.values() {
            let velocity = self.step_velocity(note);
            self.sound(note.channel, note.note, velocity, note.program);
        }
        if let Some(lyric) = chord.lyric {
            self.current_lyric = Some(lyric);
        }
        self.cursor = (index + 1) % self.sequence.len();
        Some(index)
    }

    fn step_velocity(&self, note: &NoteEvent) -> u8 {
        if note.velocity > 0.0 {
            note.midi_velocity(self.config.min_velocity)
        } else {
            self.config.step_velocity.min(127)
        }
    }

    /// Silence everything and hand back the lyric that was showing, once.
    /// Safe to call any number of times.
    pub fn release_all(&mut self) -> Option<String> {
        self.silence_all();
        if self.mode == PlaybackMode::Timed {
            self.mode  = PlaybackMode::Idle;
            self.epoch = None;
        }
        self.current_lyric.take()
    }

    // ── expression ───────────────────────────────────────────────────────

    /// Send volume and pressure to every channel with a sounding note.
    /// Returns the number of channels updated.
    pub fn apply_expression(&mut self, expression: Expression) -> usize {
        let channels: BTreeSet<u8> = self.active.iter().map(|n| n.channel).collect();
        let Some(synth) = self.synth.as_mut() else { return 0 };
        for &channel in &channels {
            report(synth.controller_change(channel, CC_CHANNEL_VOLUME, expression.volume));
            report(synth.channel_pressure(channel, expression.pressure));
        }
        channels.len()
    }

    // ── shared ───────────────────────────────────────────────────────────

    fn sound(&mut self, channel: u8, note: u8, velocity: u8, program: u8) {
        let Some(synth) = self.synth.as_mut() else { return };
        report(synth.program_change(channel, program));
        report(synth.note_on(channel, note, velocity));
        self.active.insert(ActiveNote { channel, note });
    }

    /// Force every active note off, cancel every timer, forget both.
    fn silence_all(&mut self) {
        if let Some(synth) = self.synth.as_mut() {
            for n in &self.active {
                swallow(synth.note_off(n.channel, n.note));
            }
        }
        let cancelled = self.timers.cancel_all();
        if cancelled > 0 {
            debug!("cancelled {} pending timer(s)", cancelled);
        }
        self.active.clear();
    }

    // ── accessors ────────────────────────────────────────────────────────

    pub fn mode(&self)           -> PlaybackMode            { self.mode }
    pub fn cursor(&self)         -> usize                   { self.cursor }
    pub fn sequence(&self)       -> &Sequence               { &self.sequence }
    pub fn active_notes(&self)   -> &BTreeSet<ActiveNote>   { &self.active }
    pub fn pending_timers(&self) -> usize                   { self.timers.pending() }
    pub fn current_lyric(&self)  -> Option<&str>            { self.current_lyric.as_deref() }
    pub fn epoch(&self)          -> Option<Instant>         { self.epoch }
}

fn report(result: Result<(), SynthError>) {
    if let Err(e) = result {
        warn!("{}", e);
    }
}

/// `base + secs`, or `None` when the offset is not a representable instant.
fn at_offset(base: Instant, secs: f64) -> Option<Instant> {
    Duration::try_from_secs_f64(secs).ok().and_then(|d| base.checked_add(d))
}

/// Redundant note-offs are expected while tearing down.
fn swallow(result: Result<(), SynthError>) {
    if let Err(e) = result {
        debug!("note-off ignored: {}", e);
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::recording::{RecordingSynth, SynthCall};
    use pinch_sequence::{group_events, GroupingConfig};

    fn note(time: f64, pitch: u8, velocity: f32, duration: f64) -> NoteEvent {
        NoteEvent { time, channel: 0, note: pitch, velocity, duration, program: 5 }
    }

    fn sequence(events: &[NoteEvent]) -> Sequence {
        group_events(events, &[], &GroupingConfig::default())
    }

    fn scheduler_with(events: &[NoteEvent]) -> (Scheduler, RecordingSynth) {
        let synth = RecordingSynth::new();
        let mut s = Scheduler::new(PlaybackConfig::default());
        s.attach_synth(Box::new(synth.clone()));
        s.set_sequence(sequence(events));
        (s, synth)
    }

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    // ── timed ────────────────────────────────────────────────────────────

    #[test]
    fn unrepresentable_note_off_skips_the_note() {
        let (mut s, synth) = scheduler_with(&[
            note(0.0, 60, 0.5, 1e19),
            note(0.0, 64, 0.5, 0.5),
        ]);
        let e = Instant::now();
        assert_eq!(s.play(e), 1);
        assert_eq!(s.pending_timers(), 2);
        s.poll(e);
        assert_eq!(synth.note_ons(), vec![(0, 64)]);
        s.stop();
        assert!(s.active_notes().is_empty());
        assert_eq!(s.pending_timers(), 0);
    }

    #[test]
    fn timed_note_fires_on_and_off_at_offsets() {
        let (mut s, synth) = scheduler_with(&[note(2.0, 60, 0.5, 0.5)]);
        let e = Instant::now();
        assert_eq!(s.play(e), 1);
        assert_eq!(s.pending_timers(), 2);

        s.poll(e + secs(1.999));
        assert!(synth.note_ons().is_empty());

        s.poll(e + secs(2.0));
        assert_eq!(synth.calls(), vec![
            SynthCall::Program { channel: 0, program: 5 },
            SynthCall::NoteOn  { channel: 0, note: 60, velocity: 63 },
        ]);
        assert_eq!(s.active_notes().len(), 1);

        s.poll(e + secs(2.499));
        assert!(synth.note_offs().is_empty());
        s.poll(e + secs(2.5));
        assert_eq!(synth.note_offs(), vec![(0, 60)]);
        assert!(s.active_notes().is_empty());
        assert_eq!(s.mode(), PlaybackMode::Idle);
    }

    #[test]
    fn stop_before_onset_keeps_note_silent() {
        let (mut s, synth) = scheduler_with(&[note(2.0, 60, 0.5, 0.5)]);
        let e = Instant::now();
        s.play(e);
        s.poll(e + secs(1.0));
        s.stop();
        assert_eq!(s.pending_timers(), 0);
        s.poll(e + secs(3.0));
        assert!(synth.note_ons().is_empty());
        assert!(s.active_notes().is_empty());
    }

    #[test]
    fn stop_silences_sounding_notes() {
        let (mut s, synth) = scheduler_with(&[note(0.0, 60, 0.5, 4.0), note(0.0, 64, 0.5, 4.0)]);
        let e = Instant::now();
        s.play(e);
        s.poll(e);
        assert_eq!(s.active_notes().len(), 2);
        s.stop();
        assert_eq!(synth.note_offs(), vec![(0, 60), (0, 64)]);
        assert!(s.active_notes().is_empty());
        assert_eq!(s.pending_timers(), 0);
        assert_eq!(synth.sounding(), 0);
    }

    #[test]
    fn replay_restarts_from_scratch() {
        let (mut s, synth) = scheduler_with(&[note(0.0, 60, 0.5, 4.0), note(1.0, 62, 0.5, 1.0)]);
        let e = Instant::now();
        s.play(e);
        s.poll(e);
        let e2 = e + secs(0.5);
        s.play(e2);
        // The first play's note was silenced and its timers dropped.
        assert_eq!(synth.note_offs(), vec![(0, 60)]);
        assert_eq!(s.pending_timers(), 4);
        assert_eq!(s.epoch(), Some(e2));
    }

    #[test]
    fn timed_velocity_has_a_floor() {
        let (mut s, synth) = scheduler_with(&[note(0.0, 60, 0.05, 1.0)]);
        let e = Instant::now();
        s.play(e);
        s.poll(e);
        assert!(synth.calls().contains(&SynthCall::NoteOn { channel: 0, note: 60, velocity: 20 }));
    }

    #[test]
    fn nothing_happens_without_synth_or_sequence() {
        let mut bare = Scheduler::new(PlaybackConfig::default());
        bare.set_sequence(sequence(&[note(0.0, 60, 0.5, 1.0)]));
        assert_eq!(bare.play(Instant::now()), 0);
        assert_eq!(bare.advance(), None);
        assert_eq!(bare.release_all(), None);
        assert_eq!(bare.pending_timers(), 0);

        let (mut empty, synth) = scheduler_with(&[]);
        assert_eq!(empty.play(Instant::now()), 0);
        assert_eq!(empty.advance(), None);
        empty.stop();
        assert!(synth.calls().is_empty());
    }

    // ── step ─────────────────────────────────────────────────────────────

    #[test]
    fn advance_plays_chord_and_wraps() {
        let (mut s, synth) = scheduler_with(&[
            note(0.0, 60, 0.0, 1.0),
            note(0.0, 64, 0.0, 1.0),
            note(1.0, 67, 0.0, 1.0),
        ]);
        assert_eq!(s.advance(), Some(0));
        assert_eq!(synth.note_ons(), vec![(0, 60), (0, 64)]);
        assert!(synth.calls().contains(&SynthCall::NoteOn { channel: 0, note: 60, velocity: 100 }));
        assert_eq!(s.cursor(), 1);
        s.release_all();
        assert_eq!(s.advance(), Some(1));
        assert_eq!(s.cursor(), 0);
        s.release_all();
        assert_eq!(s.advance(), Some(0));
    }

    #[test]
    fn step_uses_event_velocity_when_present() {
        let (mut s, synth) = scheduler_with(&[note(0.0, 60, 1.0, 1.0)]);
        s.advance();
        assert!(synth.calls().contains(&SynthCall::NoteOn { channel: 0, note: 60, velocity: 127 }));
    }

    #[test]
    fn release_all_is_idempotent_and_hands_off_lyric_once() {
        let events = [note(0.0, 60, 0.5, 1.0)];
        let lyrics = [pinch_sequence::LyricEvent { time: 0.0, text: "oh".into() }];
        let synth = RecordingSynth::strict();
        let mut s = Scheduler::new(PlaybackConfig::default());
        s.attach_synth(Box::new(synth.clone()));
        s.set_sequence(group_events(&events, &lyrics, &GroupingConfig::default()));

        s.advance();
        assert_eq!(s.current_lyric(), Some("oh"));
        assert_eq!(s.release_all(), Some("oh".to_string()));
        assert_eq!(s.release_all(), None);
        assert_eq!(synth.note_offs(), vec![(0, 60)]);
        assert!(s.active_notes().is_empty());
        assert_eq!(s.pending_timers(), 0);
    }

    #[test]
    fn chord_without_lyric_keeps_previous_one() {
        let events = [note(0.0, 60, 0.5, 1.0), note(1.0, 62, 0.5, 1.0)];
        let lyrics = [pinch_sequence::LyricEvent { time: 0.0, text: "la".into() }];
        let (mut s, _synth) = scheduler_with(&[]);
        s.set_sequence(group_events(&events, &lyrics, &GroupingConfig::default()));
        s.advance();
        s.advance();
        assert_eq!(s.current_lyric(), Some("la"));
    }

    #[test]
    fn advance_stops_timed_playback() {
        let (mut s, synth) = scheduler_with(&[note(0.0, 60, 0.5, 4.0), note(2.0, 62, 0.5, 1.0)]);
        let e = Instant::now();
        s.play(e);
        s.poll(e);
        s.advance();
        assert_eq!(s.mode(), PlaybackMode::Step);
        assert_eq!(s.pending_timers(), 0);
        // Timed note silenced, then the step chord sounds.
        assert_eq!(synth.note_offs(), vec![(0, 60)]);
        assert_eq!(s.active_notes().len(), 1);
    }

    #[test]
    fn play_stops_step_notes() {
        let (mut s, synth) = scheduler_with(&[note(0.0, 60, 0.5, 1.0)]);
        s.advance();
        s.play(Instant::now());
        assert_eq!(synth.note_offs(), vec![(0, 60)]);
        assert_eq!(s.mode(), PlaybackMode::Timed);
        assert!(s.active_notes().is_empty());
    }

    #[test]
    fn redundant_note_off_errors_are_swallowed() {
        let synth = RecordingSynth::strict();
        let mut s = Scheduler::new(PlaybackConfig::default());
        s.attach_synth(Box::new(synth.clone()));
        s.set_sequence(sequence(&[note(0.0, 60, 0.5, 1.0)]));
        let e = Instant::now();
        s.play(e);
        s.poll(e);
        // The same pitch is already off at the synth; the scheduler's
        // teardown still completes.
        synth.calls.borrow_mut().clear();
        s.poll(e + secs(1.0));
        s.stop();
        assert!(s.active_notes().is_empty());
    }

    #[test]
    fn new_sequence_resets_cursor_and_silences() {
        let (mut s, synth) = scheduler_with(&[note(0.0, 60, 0.5, 1.0), note(1.0, 62, 0.5, 1.0)]);
        s.advance();
        s.set_sequence(sequence(&[note(0.0, 70, 0.5, 1.0)]));
        assert_eq!(s.cursor(), 0);
        assert_eq!(synth.note_offs(), vec![(0, 60)]);
        assert_eq!(s.mode(), PlaybackMode::Idle);
        assert_eq!(s.current_lyric(), None);
    }

    // ── expression ───────────────────────────────────────────────────────

    #[test]
    fn expression_goes_to_each_active_channel_once() {
        let mut a = note(0.0, 60, 0.5, 1.0);
        let mut b = note(0.0, 64, 0.5, 1.0);
        a.channel = 2;
        b.channel = 2;
        let synth = RecordingSynth::new();
        let mut s = Scheduler::new(PlaybackConfig::default());
        s.attach_synth(Box::new(synth.clone()));
        s.set_sequence(group_events(&[a, b], &[], &GroupingConfig { channel: 2, ..GroupingConfig::default() }));

        assert_eq!(s.apply_expression(Expression { volume: 90, pressure: 64 }), 0);
        s.advance();
        synth.clear();
        assert_eq!(s.apply_expression(Expression { volume: 90, pressure: 70 }), 1);
        assert_eq!(synth.calls(), vec![
            SynthCall::Control  { channel: 2, controller: CC_CHANNEL_VOLUME, value: 90 },
            SynthCall::Pressure { channel: 2, pressure: 70 },
        ]);
    }
}
