//! TOML configuration.  Every section and field is optional; an empty file
//! is the default configuration.
//!
//! ```toml
//! [gesture]
//! pinch_threshold = 35.0
//!
//! [expression]
//! controller = "left"
//! # viewport_height defaults to [frame] height
//!
//! [catalog]
//! dir = "catalog"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use pinch_gesture::{ExpressionConfig, FrameSize, PinchConfig};
use pinch_sequence::{GroupingConfig, PagingPolicy};

use crate::error::ConfigError;
use crate::scheduler::PlaybackConfig;

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Camera frame the detector's normalized points are scaled into.
    pub frame:      FrameSize,
    pub gesture:    PinchConfig,
    pub expression: ExpressionConfig,
    pub playback:   PlaybackSection,
    pub grouping:   GroupingSection,
    pub catalog:    CatalogSection,
    pub midi:       MidiSection,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PlaybackSection {
    /// The single performance channel.
    pub channel:       u8,
    pub min_velocity:  u8,
    pub step_velocity: u8,
}

impl Default for PlaybackSection {
    fn default() -> Self {
        let p = PlaybackConfig::default();
        PlaybackSection { channel: 0, min_velocity: p.min_velocity, step_velocity: p.step_velocity }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GroupingSection {
    pub lyric_epsilon: f64,
}

impl Default for GroupingSection {
    fn default() -> Self {
        GroupingSection { lyric_epsilon: GroupingConfig::default().lyric_epsilon }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CatalogSection {
    /// On-disk catalog mirror; no catalog panel without one.
    pub dir:           Option<PathBuf>,
    pub page_limit:    u32,
    pub page_delay_ms: u64,
}

impl Default for CatalogSection {
    fn default() -> Self {
        CatalogSection { dir: None, page_limit: 100, page_delay_ms: 250 }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MidiSection {
    /// Substring of the output port name to prefer.
    pub port: Option<String>,
}

impl AppConfig {
    pub fn from_toml(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text, path)
    }

    /// Fingertip `y` is in camera pixels, so an unset viewport follows the
    /// frame height.
    pub fn expression_config(&self) -> ExpressionConfig {
        let mut expression = self.expression.clone();
        expression.viewport_height.get_or_insert(self.frame.height);
        expression
    }

    pub fn grouping_config(&self) -> GroupingConfig {
        GroupingConfig {
            channel:       self.playback.channel.min(15),
            lyric_epsilon: self.grouping.lyric_epsilon,
        }
    }

    pub fn playback_config(&self) -> PlaybackConfig {
        PlaybackConfig {
            min_velocity:  self.playback.min_velocity.min(127),
            step_velocity: self.playback.step_velocity.min(127),
        }
    }

    pub fn paging_policy(&self) -> PagingPolicy {
        PagingPolicy {
            limit:     self.catalog.page_limit.max(1),
            delay:     Duration::from_millis(self.catalog.page_delay_ms),
            max_pages: None,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use pinch_gesture::{ControllerHand, HandSide};

    fn parse(text: &str) -> AppConfig {
        AppConfig::from_toml(text, Path::new("test.toml")).unwrap()
    }

    #[test]
    fn empty_file_is_default() {
        assert_eq!(parse(""), AppConfig::default());
    }

    #[test]
    fn defaults_match_documented_values() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.gesture.pinch_threshold, 40.0);
        assert_eq!(cfg.gesture.preferred_hand, HandSide::Right);
        assert_eq!(cfg.expression.controller, ControllerHand::Free);
        assert_eq!(cfg.frame, FrameSize::new(1280.0, 720.0));
        assert_eq!(cfg.playback_config(), PlaybackConfig { min_velocity: 20, step_velocity: 100 });
        assert_eq!(cfg.grouping_config(), GroupingConfig::default());
        assert_eq!(cfg.paging_policy(), PagingPolicy::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = parse(r#"
            [gesture]
            pinch_threshold = 25.5
            preferred_hand = "left"

            [expression]
            controller = "right"

            [playback]
            channel = 3

            [catalog]
            dir = "mirror"
            page_delay_ms = 0

            [midi]
            port = "fluid"
        "#);
        assert_eq!(cfg.gesture.pinch_threshold, 25.5);
        assert_eq!(cfg.gesture.preferred_hand, HandSide::Left);
        assert_eq!(cfg.gesture.min_landmarks, 9);
        assert_eq!(cfg.expression.controller, ControllerHand::Right);
        assert_eq!(cfg.expression.neutral_volume, 100);
        assert_eq!(cfg.grouping_config().channel, 3);
        assert_eq!(cfg.playback.step_velocity, 100);
        assert_eq!(cfg.catalog.dir.as_deref(), Some(Path::new("mirror")));
        assert_eq!(cfg.paging_policy().delay, Duration::ZERO);
        assert_eq!(cfg.midi.port.as_deref(), Some("fluid"));
    }

    #[test]
    fn viewport_follows_frame_unless_set() {
        let cfg = parse("[frame]\nheight = 1080.0");
        assert_eq!(cfg.expression_config().viewport_height(), 1080.0);
        assert_eq!(AppConfig::default().expression_config().viewport_height(), 720.0);

        let cfg = parse("[frame]\nheight = 1080.0\n[expression]\nviewport_height = 500.0");
        assert_eq!(cfg.expression_config().viewport_height(), 500.0);
    }

    #[test]
    fn bad_values_are_reported_with_path() {
        let err = AppConfig::from_toml("[gesture]\npinch_threshold = \"wide\"", Path::new("x.toml"))
            .unwrap_err();
        assert!(err.to_string().contains("x.toml"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = AppConfig::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
