//! # pinch_gesture
//!
//! Turns noisy per-frame hand landmarks into discrete performance gestures.
//!
//! ## Pipeline
//!
//! | Stage | Type | Output |
//! |---|---|---|
//! | Normalize | [`HandSnapshot`] | Two sides in camera pixel space, each empty or ≥ 9 points |
//! | Classify | [`GestureClassifier`] | Per-side `pinched`, owning hand, one [`GestureEvent`] per frame |
//! | Express | [`map_expression`] | Channel volume and channel pressure for the sounding notes |
//!
//! ## Gesture → Action mapping
//!
//! | Event | Meaning for the player |
//! |---|---|
//! | `Start`    | Advance one chord |
//! | `Handover` | Release everything, then advance one chord for the new owner |
//! | `Release`  | Release everything |
//! | `Transfer` | Ownership moves silently to the hand that was already pinched |
//!
//! ```rust
//! use pinch_gesture::{Detection, FrameSize, GestureClassifier, GestureEvent,
//!                     HandSide, HandSnapshot, PinchConfig};
//!
//! // Thumb tip (4) and index tip (8) ~13 px apart: a pinch.
//! let mut points = vec![[0.2, 0.8, 0.0]; 21];
//! points[4] = [0.50, 0.5, 0.0];
//! points[8] = [0.51, 0.5, 0.0];
//!
//! let frame = FrameSize::new(1280.0, 720.0);
//! let snapshot = HandSnapshot::from_detections(
//!     &[Detection::new("Right", points)], frame);
//!
//! let mut classifier = GestureClassifier::new(PinchConfig::default());
//! assert_eq!(classifier.update(&snapshot),
//!            Some(GestureEvent::Start { hand: HandSide::Right }));
//! ```

pub mod landmarks;
pub mod classifier;
pub mod expression;

pub use landmarks::{
    Detection, FrameSize, HandSide, HandSnapshot, Landmark,
    HAND_LANDMARKS, INDEX_TIP, MIN_LANDMARKS, THUMB_TIP,
};
pub use classifier::{
    is_pinched, GestureClassifier, GestureEvent, GestureState, PinchConfig,
    ReferencePosition,
};
pub use expression::{
    map_expression, pressure_for, pressure_ratio, volume_for, ControllerHand,
    Expression, ExpressionConfig, CC_CHANNEL_VOLUME, PRESSURE_CENTER,
};
