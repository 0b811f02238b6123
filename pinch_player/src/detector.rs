//! Hand detectors — keyboard/mouse simulation and LeapMotion hardware.
//!
//! Both produce [`Detection`]s in the 21-point hand layout with normalized
//! camera coordinates (`0.0..=1.0`, unmirrored), so the rest of the pipeline
//! cannot tell them apart.

use pinch_gesture::{Detection, HAND_LANDMARKS, INDEX_TIP, THUMB_TIP};

/// Per-frame input the simulated hands follow.  Built by the window from
/// mouse and keyboard state; real trackers ignore it.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SimControls {
    /// Pointer as a fraction of the window, if inside it.
    pub pointer:     Option<(f32, f32)>,
    pub pinch_left:  bool,
    pub pinch_right: bool,
    /// Left-hand movement this frame, in window fractions.
    pub nudge_left:  (f32, f32),
}

/// Anything that can report the hands visible this frame.
pub trait HandDetector {
    /// Latest simulation input.  Only the simulator uses it.
    fn feed(&mut self, _controls: &SimControls) {}

    /// Hands seen since the previous call.  Empty when none are visible.
    fn detect(&mut self) -> Vec<Detection>;
}

// ════════════════════════════════════════════════════════════════════════════
// SimHands — keyboard/mouse simulation (always available)
// ════════════════════════════════════════════════════════════════════════════

/// Thumb/index gap, as a fraction of frame width.
const PINCHED_GAP: f32 = 0.005;
const OPEN_GAP:    f32 = 0.08;

/// Two synthetic hands.  The mouse carries the right index tip; the arrow
/// keys carry the left hand.
#[derive(Clone, Debug)]
pub struct SimHands {
    left:        (f32, f32),
    right:       (f32, f32),
    pinch_left:  bool,
    pinch_right: bool,
}

impl Default for SimHands {
    fn default() -> Self {
        // Camera x is mirrored on screen: 0.75 shows on the left.
        SimHands {
            left:        (0.75, 0.5),
            right:       (0.25, 0.5),
            pinch_left:  false,
            pinch_right: false,
        }
    }
}

impl SimHands {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HandDetector for SimHands {
    fn feed(&mut self, controls: &SimControls) {
        if let Some((wx, wy)) = controls.pointer {
            self.right = ((1.0 - wx).clamp(0.0, 1.0), wy.clamp(0.0, 1.0));
        }
        let (dx, dy) = controls.nudge_left;
        self.left = (
            (self.left.0 - dx).clamp(0.0, 1.0),
            (self.left.1 + dy).clamp(0.0, 1.0),
        );
        self.pinch_left  = controls.pinch_left;
        self.pinch_right = controls.pinch_right;
    }

    fn detect(&mut self) -> Vec<Detection> {
        vec![
            synth_hand("Left",  self.left,  self.pinch_left,  1.0),
            synth_hand("Right", self.right, self.pinch_right, -1.0),
        ]
    }
}

/// A plausible 21-point hand hanging below the index tip at `tip`.
/// `thumb_side` is +1 when the thumb sits to the right in camera space.
fn synth_hand(label: &str, tip: (f32, f32), pinched: bool, thumb_side: f32) -> Detection {
    let (x, y) = tip;
    let gap = if pinched { PINCHED_GAP } else { OPEN_GAP };
    let points = (0..HAND_LANDMARKS)
        .map(|i| match i {
            INDEX_TIP => [x, y, 0.0],
            THUMB_TIP => [x + thumb_side * gap, y + 0.01, 0.0],
            // Palm and remaining joints: a loose grid under the fingers.
            _ => {
                let col = (i % 5) as f32 - 2.0;
                let row = (i / 5) as f32;
                [x + col * 0.015, y + 0.06 + row * 0.02, -0.01]
            }
        })
        .collect();
    Detection::new(label, points)
}

// ════════════════════════════════════════════════════════════════════════════
// LeapHands — real hardware (feature = "leap")
// ════════════════════════════════════════════════════════════════════════════

/// Hands from a LeapMotion controller, polled on a background thread.
///
/// Requires the `leap` feature flag and the LeapC shared library installed.
/// Leap coordinates (millimetres above the device) are mapped onto the
/// normalized camera frame: ±200 mm across, 50–450 mm up.
#[cfg(feature = "leap")]
pub struct LeapHands {
    rx:     std::sync::mpsc::Receiver<Vec<Detection>>,
    latest: Vec<Detection>,
}

#[cfg(feature = "leap")]
impl LeapHands {
    pub fn spawn() -> Self {
        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || leap_thread(tx));
        LeapHands { rx, latest: Vec::new() }
    }
}

#[cfg(feature = "leap")]
impl HandDetector for LeapHands {
    fn detect(&mut self) -> Vec<Detection> {
        if let Some(frame) = self.rx.try_iter().last() {
            self.latest = frame;
        }
        self.latest.clone()
    }
}

#[cfg(feature = "leap")]
fn leap_thread(tx: std::sync::mpsc::Sender<Vec<Detection>>) {
    use leaprs::*;
    use log::{info, warn};

    let mut connection = match Connection::create(ConnectionConfig::default()) {
        Ok(c)  => c,
        Err(e) => { warn!("LeapC connection failed: {:?}", e); return; }
    };
    if let Err(e) = connection.open() {
        warn!("cannot open LeapMotion device: {:?}", e);
        return;
    }
    info!("LeapMotion connected");

    macro_rules! normalize {
        ($v:expr) => {{
            let v = $v;
            [0.5 - v.x / 400.0, 1.0 - (v.y - 50.0) / 400.0, v.z / 400.0]
        }};
    }

    loop {
        let msg = match connection.poll(100) {
            Ok(m)  => m,
            Err(_) => continue,
        };
        let Event::Tracking(frame) = msg.event() else { continue };

        let detections: Vec<Detection> = frame.hands()
            .map(|hand| {
                let label = if hand.hand_type() == HandType::Left { "Left" } else { "Right" };
                let mut points = vec![normalize!(hand.palm().position()); HAND_LANDMARKS];
                for (d, digit) in hand.digits().enumerate().take(5) {
                    let base = 4 * d;
                    points[base + 1] = normalize!(digit.proximal().prev_joint());
                    points[base + 2] = normalize!(digit.intermediate().prev_joint());
                    points[base + 3] = normalize!(digit.distal().prev_joint());
                    points[base + 4] = normalize!(digit.distal().next_joint());
                }
                Detection::new(label, points)
            })
            .collect();

        if tx.send(detections).is_err() {
            return;
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
