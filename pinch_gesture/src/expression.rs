//! Fingertip position → continuous controllers.
//!
//! Height of the controlling fingertip drives channel volume (CC 7);
//! horizontal travel away from the reference captured at pinch start drives
//! channel pressure around a centre of 64.

use serde::{Deserialize, Serialize};

use crate::landmarks::{HandSide, Landmark};

/// MIDI controller number for channel volume.
pub const CC_CHANNEL_VOLUME: u8 = 7;
/// Channel pressure with the fingertip exactly on the reference.
pub const PRESSURE_CENTER: u8 = 64;

pub const DEFAULT_VIEWPORT_HEIGHT: f32 = 720.0;
const PRESSURE_SWING: f32 = 63.0;

// ════════════════════════════════════════════════════════════════════════════
// Configuration
// ════════════════════════════════════════════════════════════════════════════

/// Which hand's index tip drives expression.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ControllerHand {
    /// Whichever hand is not playing.
    #[default]
    Free,
    Left,
    Right,
}

impl ControllerHand {
    pub fn resolve(self, active_hand: Option<HandSide>) -> Option<HandSide> {
        match self {
            ControllerHand::Free  => active_hand.map(HandSide::other),
            ControllerHand::Left  => Some(HandSide::Left),
            ControllerHand::Right => Some(HandSide::Right),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExpressionConfig {
    pub controller:      ControllerHand,
    /// Height of the coordinate space fingertip `y` is measured in.
    /// Unset means [`DEFAULT_VIEWPORT_HEIGHT`]; the player fills it from the
    /// camera frame.
    pub viewport_height: Option<f32>,
    /// Added to the normalized height before scaling to 0–127.
    pub volume_offset:   f32,
    /// Volume sent when no controlling fingertip is visible.
    pub neutral_volume:  u8,
    /// Horizontal pixels from the reference that saturate pressure.
    pub pressure_range:  f32,
}

impl ExpressionConfig {
    pub fn viewport_height(&self) -> f32 {
        self.viewport_height.unwrap_or(DEFAULT_VIEWPORT_HEIGHT)
    }
}

impl Default for ExpressionConfig {
    fn default() -> Self {
        ExpressionConfig {
            controller:      ControllerHand::Free,
            viewport_height: None,
            volume_offset:   0.1,
            neutral_volume:  100,
            pressure_range:  120.0,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Mapping
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Expression {
    pub volume:   u8,
    pub pressure: u8,
}

/// Higher on screen is louder; the offset keeps the bottom edge audible.
pub fn volume_for(y: f32, config: &ExpressionConfig) -> u8 {
    let height = config.viewport_height().max(1.0);
    let level  = (1.0 - y / height).clamp(0.0, 1.0) + config.volume_offset;
    (level * 127.0).floor().clamp(0.0, 127.0) as u8
}

/// Signed travel from the reference, saturated to `-1.0..=1.0`.
pub fn pressure_ratio(x: f32, reference_x: f32, range: f32) -> f32 {
    ((x - reference_x) / range.max(f32::EPSILON)).clamp(-1.0, 1.0)
}

pub fn pressure_for(ratio: f32) -> u8 {
    (PRESSURE_CENTER as f32 + ratio.clamp(-1.0, 1.0) * PRESSURE_SWING).round() as u8
}

/// Controller values for one frame.
///
/// Without a fingertip volume falls back to the neutral level and pressure
/// to centre; without a reference only pressure is centred.
pub fn map_expression(
    fingertip:   Option<Landmark>,
    reference_x: Option<f32>,
    config:      &ExpressionConfig,
) -> Expression {
    let Some(tip) = fingertip else {
        return Expression { volume: config.neutral_volume.min(127), pressure: PRESSURE_CENTER };
    };
    let pressure = reference_x
        .map(|rx| pressure_for(pressure_ratio(tip.x, rx, config.pressure_range)))
        .unwrap_or(PRESSURE_CENTER);
    Expression { volume: volume_for(tip.y, config), pressure }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn tip(x: f32, y: f32) -> Option<Landmark> {
        Some(Landmark::new(x, y, 0.0))
    }

    #[test]
    fn top_of_screen_is_full_volume() {
        let cfg = ExpressionConfig::default();
        assert_eq!(volume_for(0.0, &cfg), 127);
    }

    #[test]
    fn bottom_of_screen_is_offset_only() {
        let cfg = ExpressionConfig::default();
        // 0.1 × 127 = 12.7
        assert_eq!(volume_for(cfg.viewport_height(), &cfg), 12);
        assert_eq!(volume_for(cfg.viewport_height() * 3.0, &cfg), 12);
    }

    #[test]
    fn middle_of_screen() {
        let cfg = ExpressionConfig { volume_offset: 0.0, ..ExpressionConfig::default() };
        assert_eq!(volume_for(360.0, &cfg), 63);
    }

    #[test]
    fn pressure_saturates_beyond_range() {
        let cfg = ExpressionConfig::default();
        let right = map_expression(tip(500.0 + 200.0, 0.0), Some(500.0), &cfg);
        let left  = map_expression(tip(500.0 - 200.0, 0.0), Some(500.0), &cfg);
        assert_eq!(right.pressure, 127);
        assert_eq!(left.pressure, 1);
        let edge = map_expression(tip(500.0 + cfg.pressure_range, 0.0), Some(500.0), &cfg);
        assert_eq!(edge.pressure, 127);
    }

    #[test]
    fn pressure_centred_on_reference() {
        let cfg = ExpressionConfig::default();
        assert_eq!(map_expression(tip(321.0, 0.0), Some(321.0), &cfg).pressure, PRESSURE_CENTER);
        assert_eq!(map_expression(tip(321.0, 0.0), None, &cfg).pressure, PRESSURE_CENTER);
    }

    #[test]
    fn half_range_is_half_swing() {
        assert_eq!(pressure_for(pressure_ratio(60.0, 0.0, 120.0)), 96); // 64 + 31.5
        assert_eq!(pressure_for(pressure_ratio(-60.0, 0.0, 120.0)), 33);
    }

    #[test]
    fn missing_fingertip_resets_to_neutral() {
        let cfg = ExpressionConfig::default();
        assert_eq!(map_expression(None, Some(10.0), &cfg),
                   Expression { volume: 100, pressure: PRESSURE_CENTER });
    }

    #[test]
    fn controller_resolution() {
        assert_eq!(ControllerHand::Free.resolve(Some(HandSide::Right)), Some(HandSide::Left));
        assert_eq!(ControllerHand::Free.resolve(None), None);
        assert_eq!(ControllerHand::Right.resolve(Some(HandSide::Right)), Some(HandSide::Right));
        assert_eq!(ControllerHand::Left.resolve(None), Some(HandSide::Left));
    }
}
