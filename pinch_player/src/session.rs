//! One performance session: the per-frame pipeline from raw detections to
//! synth messages.
//!
//! Each [`Session::tick`] runs, in order:
//!
//! 1. snapshot reset and fill from the detector
//! 2. gesture classification
//! 3. scheduler action for the gesture (advance / release)
//! 4. timed-mode timer polling
//! 5. expression mapping onto the sounding channels
//!
//! and returns what the overlay needs in a [`FrameOutput`].

use std::time::Instant;

use log::info;

use pinch_gesture::{
    map_expression, Detection, Expression, ExpressionConfig, FrameSize, GestureClassifier,
    GestureEvent, GestureState, HandSide, HandSnapshot, Landmark,
};
use pinch_sequence::{group_events, EventPayload, GroupingConfig};

use crate::config::AppConfig;
use crate::scheduler::Scheduler;
use crate::synth::SynthBackend;

/// Thumb and index tips of one visible hand, in camera pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Fingertips {
    pub side:  HandSide,
    pub thumb: Landmark,
    pub index: Landmark,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameOutput {
    pub fingertips:     Vec<Fingertips>,
    pub gesture:        Option<GestureEvent>,
    /// Lyric handed off by a release this frame.
    pub released_lyric: Option<String>,
    /// Lyric showing now, and where: the playing hand's index tip.
    pub lyric:          Option<(String, Landmark)>,
    pub expression:     Option<Expression>,
}

pub struct Session {
    snapshot:   HandSnapshot,
    frame:      FrameSize,
    classifier: GestureClassifier,
    scheduler:  Scheduler,
    expression: ExpressionConfig,
    grouping:   GroupingConfig,
}

impl Session {
    pub fn new(config: &AppConfig) -> Self {
        Session {
            snapshot:   HandSnapshot::new(),
            frame:      config.frame,
            classifier: GestureClassifier::new(config.gesture.clone()),
            scheduler:  Scheduler::new(config.playback_config()),
            expression: config.expression_config(),
            grouping:   config.grouping_config(),
        }
    }

    pub fn attach_synth(&mut self, synth: Box<dyn SynthBackend>) {
        self.scheduler.attach_synth(synth);
    }

    /// Group a downloaded payload and make it the current sequence.
    /// Returns the number of chords.
    pub fn select_sequence(&mut self, payload: &EventPayload) -> usize {
        let sequence = group_events(&payload.events, &payload.lyrics, &self.grouping);
        let chords = sequence.len();
        info!("sequence loaded: {} chords, {} notes", chords, sequence.note_count());
        self.scheduler.set_sequence(sequence);
        chords
    }

    pub fn play(&mut self, now: Instant) -> usize {
        self.scheduler.play(now)
    }

    pub fn stop(&mut self) {
        self.scheduler.stop();
    }

    pub fn tick(&mut self, detections: &[Detection], now: Instant) -> FrameOutput {
        self.snapshot.clear();
        self.snapshot.fill(detections, self.frame);

        let gesture = self.classifier.update(&self.snapshot);
        let mut released_lyric = None;
        match gesture {
            Some(GestureEvent::Start { .. }) => {
                self.scheduler.advance();
            }
            Some(GestureEvent::Handover { .. }) => {
                released_lyric = self.scheduler.release_all();
                self.scheduler.advance();
            }
            Some(GestureEvent::Release { .. }) => {
                released_lyric = self.scheduler.release_all();
            }
            Some(GestureEvent::Transfer { .. }) | None => {}
        }

        self.scheduler.poll(now);

        let state = self.classifier.state();
        let expression = if state.pinch_engaged {
            let tip = self.expression.controller
                .resolve(state.active_hand)
                .and_then(|side| self.snapshot.index_tip(side));
            let expr = map_expression(tip, state.reference.map(|r| r.x), &self.expression);
            self.scheduler.apply_expression(expr);
            Some(expr)
        } else {
            None
        };

        let lyric = match (self.scheduler.current_lyric(), state.active_hand) {
            (Some(text), Some(hand)) => self.snapshot.index_tip(hand).map(|tip| (text.to_string(), tip)),
            _ => None,
        };

        FrameOutput {
            fingertips: self.fingertips(),
            gesture,
            released_lyric,
            lyric,
            expression,
        }
    }

    fn fingertips(&self) -> Vec<Fingertips> {
        HandSide::BOTH.iter()
            .filter_map(|&side| {
                let thumb = self.snapshot.thumb_tip(side)?;
                let index = self.snapshot.index_tip(side)?;
                Some(Fingertips { side, thumb, index })
            })
            .collect()
    }

    pub fn gesture_state(&self) -> &GestureState { self.classifier.state() }
    pub fn scheduler(&self)     -> &Scheduler    { &self.scheduler }
    pub fn frame(&self)         -> FrameSize     { self.frame }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
