//! Per-frame hand snapshots.
//!
//! A hand detector reports each hand as a side label plus a list of
//! normalized keypoints (`0.0..=1.0` of the camera frame).  The normalizer
//! scales them into camera pixel space so that every later stage (pinch
//! threshold, expression ranges, overlay) works in one coordinate system.

use log::debug;
use serde::{Deserialize, Serialize};

// ════════════════════════════════════════════════════════════════════════════
// Landmark indices (21-point hand layout)
// ════════════════════════════════════════════════════════════════════════════

/// Number of keypoints in a full hand.
pub const HAND_LANDMARKS: usize = 21;
/// Tip of the thumb.
pub const THUMB_TIP: usize = 4;
/// Tip of the index finger.
pub const INDEX_TIP: usize = 8;
/// Shortest array that still contains both tips.
pub const MIN_LANDMARKS: usize = INDEX_TIP + 1;

/// Depth is reported on a much smaller scale than x/y.
const Z_SCALE: f32 = 10.0;

// ════════════════════════════════════════════════════════════════════════════
// HandSide
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HandSide {
    Left,
    Right,
}

impl HandSide {
    pub const BOTH: [HandSide; 2] = [HandSide::Left, HandSide::Right];

    pub fn other(self) -> Self {
        match self {
            HandSide::Left  => HandSide::Right,
            HandSide::Right => HandSide::Left,
        }
    }

    /// Parse a detector handedness label (`"Left"`, `"right"`, …).
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "left"  => Some(HandSide::Left),
            "right" => Some(HandSide::Right),
            _       => None,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Landmark / FrameSize / Detection
// ════════════════════════════════════════════════════════════════════════════

/// One keypoint in camera pixel space.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Landmark { x, y, z }
    }

    /// Planar distance; depth is too noisy to take part in pinch detection.
    pub fn distance_to(&self, other: &Landmark) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Pixel dimensions of the camera frame the detector ran on.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FrameSize {
    pub width:  f32,
    pub height: f32,
}

impl FrameSize {
    pub fn new(width: f32, height: f32) -> Self {
        FrameSize { width, height }
    }
}

impl Default for FrameSize {
    fn default() -> Self {
        FrameSize { width: 1280.0, height: 720.0 }
    }
}

/// Raw detector output for one hand: handedness label + normalized points.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub label:  String,
    pub points: Vec<[f32; 3]>,
}

impl Detection {
    pub fn new(label: &str, points: Vec<[f32; 3]>) -> Self {
        Detection { label: label.to_string(), points }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// HandSnapshot
// ════════════════════════════════════════════════════════════════════════════

/// Both hands for a single frame.  A side is either empty or holds at least
/// [`MIN_LANDMARKS`] points.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HandSnapshot {
    left:  Vec<Landmark>,
    right: Vec<Landmark>,
}

impl HandSnapshot {
    pub fn new() -> Self {
        HandSnapshot::default()
    }

    /// Build a fresh snapshot from detector output.
    pub fn from_detections(detections: &[Detection], frame: FrameSize) -> Self {
        let mut snapshot = HandSnapshot::new();
        snapshot.fill(detections, frame);
        snapshot
    }

    /// Drop both hands.  Called at the start of every frame so a hand that
    /// left the camera does not linger.
    pub fn clear(&mut self) {
        self.left.clear();
        self.right.clear();
    }

    /// Scale `detections` into pixel space.  Unknown labels and arrays too
    /// short to hold both tips are ignored; a later detection for the same
    /// side replaces an earlier one.
    pub fn fill(&mut self, detections: &[Detection], frame: FrameSize) {
        for det in detections {
            let Some(side) = HandSide::from_label(&det.label) else {
                debug!("ignoring hand with unknown label {:?}", det.label);
                continue;
            };
            let points: Vec<Landmark> = det.points.iter()
                .map(|p| Landmark::new(p[0] * frame.width, p[1] * frame.height, p[2] * Z_SCALE))
                .collect();
            self.set(side, points);
        }
    }

    /// Replace one side.  Arrays shorter than [`MIN_LANDMARKS`] empty the side.
    pub fn set(&mut self, side: HandSide, points: Vec<Landmark>) {
        let slot = match side {
            HandSide::Left  => &mut self.left,
            HandSide::Right => &mut self.right,
        };
        if points.len() < MIN_LANDMARKS {
            slot.clear();
        } else {
            *slot = points;
        }
    }

    pub fn hand(&self, side: HandSide) -> &[Landmark] {
        match side {
            HandSide::Left  => &self.left,
            HandSide::Right => &self.right,
        }
    }

    pub fn is_present(&self, side: HandSide) -> bool {
        !self.hand(side).is_empty()
    }

    pub fn thumb_tip(&self, side: HandSide) -> Option<Landmark> {
        self.hand(side).get(THUMB_TIP).copied()
    }

    pub fn index_tip(&self, side: HandSide) -> Option<Landmark> {
        self.hand(side).get(INDEX_TIP).copied()
    }

    /// Thumb-tip to index-tip distance, or `None` if the side is absent.
    pub fn pinch_distance(&self, side: HandSide) -> Option<f32> {
        let thumb = self.thumb_tip(side)?;
        let index = self.index_tip(side)?;
        Some(thumb.distance_to(&index))
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
