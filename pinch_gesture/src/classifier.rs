//! Pinch classification and hand ownership.
//!
//! Every frame each side gets a boolean `pinched`.  Only *edges* matter to
//! the player: a rising edge on a free hand starts (or takes over) playback,
//! both hands open releases it.  At most one [`GestureEvent`] is produced per
//! frame.
//!
//! # State machine
//!
//! ```text
//!              rise(s)                     rise(other) while owner held
//!   Idle ─────────────────▶ Owned(s) ─────────────────────────────▶ Owned(other)
//!    ▲                        │  │            (Handover)
//!    │      both open         │  │ owner opens, other already held
//!    └────────────────────────┘  └──────────────────────────────▶ Owned(other)
//!            (Release)                         (Transfer)
//! ```

use log::debug;
use serde::{Deserialize, Serialize};

use crate::landmarks::{HandSide, HandSnapshot, MIN_LANDMARKS};

// ════════════════════════════════════════════════════════════════════════════
// PinchConfig
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PinchConfig {
    /// Thumb/index distance (camera pixels) below which a hand is pinched.
    pub pinch_threshold: f32,
    /// Fewer landmarks than this and the side counts as open.
    pub min_landmarks:   usize,
    /// Which hand starts playback when both pinch in the same frame.
    pub preferred_hand:  HandSide,
}

impl Default for PinchConfig {
    fn default() -> Self {
        PinchConfig {
            pinch_threshold: 40.0,
            min_landmarks:   MIN_LANDMARKS,
            preferred_hand:  HandSide::Right,
        }
    }
}

/// `true` iff `side` has enough landmarks and its tips are strictly closer
/// than the threshold.
pub fn is_pinched(snapshot: &HandSnapshot, side: HandSide, config: &PinchConfig) -> bool {
    if snapshot.hand(side).len() < config.min_landmarks.max(MIN_LANDMARKS) {
        return false;
    }
    snapshot.pinch_distance(side)
        .map(|d| d < config.pinch_threshold)
        .unwrap_or(false)
}

// ════════════════════════════════════════════════════════════════════════════
// GestureEvent / ReferencePosition / GestureState
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GestureEvent {
    /// No hand owned playback; `hand` pinched and now owns it.
    Start { hand: HandSide },
    /// `to` pinched while `from` still owned playback.
    Handover { from: HandSide, to: HandSide },
    /// `from` opened while `to` was already pinched; nothing is retriggered.
    Transfer { from: HandSide, to: HandSide },
    /// Both hands open.
    Release { hand: HandSide },
}

/// Index-tip x of the free hand, captured when the owner's pinch began.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReferencePosition {
    /// Hand the position was read from.
    pub side: HandSide,
    pub x:    f32,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GestureState {
    pub left_pinched:  bool,
    pub right_pinched: bool,
    pub active_hand:   Option<HandSide>,
    pub pinch_engaged: bool,
    pub reference:     Option<ReferencePosition>,
}

impl GestureState {
    pub fn pinched(&self, side: HandSide) -> bool {
        match side {
            HandSide::Left  => self.left_pinched,
            HandSide::Right => self.right_pinched,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// GestureClassifier
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, Default)]
pub struct GestureClassifier {
    config: PinchConfig,
    state:  GestureState,
}

impl GestureClassifier {
    pub fn new(config: PinchConfig) -> Self {
        GestureClassifier { config, state: GestureState::default() }
    }

    pub fn config(&self) -> &PinchConfig { &self.config }
    pub fn state(&self)  -> &GestureState { &self.state }

    /// Back to idle, no hand pinched.
    pub fn reset(&mut self) {
        self.state = GestureState::default();
    }

    /// Classify one frame.  Must be called exactly once per frame with that
    /// frame's snapshot; edges are computed against the previous call.
    pub fn update(&mut self, snapshot: &HandSnapshot) -> Option<GestureEvent> {
        let now_left  = is_pinched(snapshot, HandSide::Left,  &self.config);
        let now_right = is_pinched(snapshot, HandSide::Right, &self.config);
        let now = |side: HandSide| match side {
            HandSide::Left  => now_left,
            HandSide::Right => now_right,
        };
        let rose = |side: HandSide| now(side) && !self.state.pinched(side);

        let event = match self.state.active_hand {
            None => {
                let preferred = self.config.preferred_hand;
                [preferred, preferred.other()].into_iter()
                    .find(|&side| rose(side))
                    .map(|hand| GestureEvent::Start { hand })
            }
            Some(owner) => {
                let other = owner.other();
                if !now_left && !now_right {
                    Some(GestureEvent::Release { hand: owner })
                } else if rose(other) {
                    Some(GestureEvent::Handover { from: owner, to: other })
                } else if !now(owner) {
                    Some(GestureEvent::Transfer { from: owner, to: other })
                } else {
                    None
                }
            }
        };

        match event {
            Some(GestureEvent::Start { hand })
            | Some(GestureEvent::Handover { to: hand, .. })
            | Some(GestureEvent::Transfer { to: hand, .. }) => {
                self.state.active_hand = Some(hand);
                self.state.reference = capture_reference(snapshot, hand.other());
            }
            Some(GestureEvent::Release { .. }) => {
                self.state.active_hand = None;
                self.state.reference = None;
            }
            None => {}
        }
        if let Some(evt) = event {
            debug!("gesture {:?} (reference {:?})", evt, self.state.reference);
        }

        self.state.left_pinched  = now_left;
        self.state.right_pinched = now_right;
        self.state.pinch_engaged = self.state.active_hand.is_some();
        event
    }
}

fn capture_reference(snapshot: &HandSnapshot, side: HandSide) -> Option<ReferencePosition> {
    snapshot.index_tip(side).map(|tip| ReferencePosition { side, x: tip.x })
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
