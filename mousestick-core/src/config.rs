//! Shaping and tracking configuration
//!
//! Stored as a flat TOML table of numbers. Every key has its own default, so a
//! file missing some keys still loads; a missing or unreadable file yields the
//! full default set. Values that parse but make no sense (e.g. `radius = 0`)
//! are rejected rather than clamped.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::error::EngineError;

/// Longest accepted rudder grace period, in seconds
pub const MAX_RUDDER_GRACE: f32 = 60.0;

/// Errors from writing the config file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to write config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Immutable configuration snapshot
///
/// Swapped as a whole between ticks, never edited while a tick runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Mouse travel (px) from center to full deflection
    #[serde(default = "default_radius")]
    pub radius: f32,
    /// Extra travel (px) past full deflection before the hard stop
    #[serde(default = "default_outer")]
    pub outer: f32,
    /// Response exponent (1.0 = linear)
    #[serde(default = "default_curve")]
    pub curve: f32,
    /// Radial deadzone as a fraction of radius
    #[serde(default = "default_deadzone")]
    pub deadzone: f32,
    /// Per-axis snap threshold as a fraction of radius
    #[serde(default = "default_snap")]
    pub snap: f32,

    /// Head yaw gain
    #[serde(default = "default_t_sens_x")]
    pub t_sens_x: f32,
    /// Head pitch gain
    #[serde(default = "default_t_sens_y")]
    pub t_sens_y: f32,
    /// One-Euro beta for the head filters
    #[serde(default = "default_t_smooth")]
    pub t_smooth: f32,
    #[serde(default = "default_t_deadzone")]
    pub t_deadzone: f32,
    /// Smaller head axis is dropped when below this fraction of the larger
    #[serde(default = "default_t_snap_axis")]
    pub t_snap_axis: f32,
    /// Head magnitude above `1 - t_snap_outer` snaps to full deflection
    #[serde(default = "default_t_snap_outer")]
    pub t_snap_outer: f32,
    /// Rate at which the head anchor follows the resting position
    #[serde(default = "default_t_center_drag")]
    pub t_center_drag: f32,

    /// Anchor stops following beyond this normalized distance
    #[serde(default = "default_anchor_freeze")]
    pub anchor_freeze: f32,
    /// Seconds without horizontal wheel input before the rudder recenters
    #[serde(default = "default_rudder_grace")]
    pub rudder_grace: f32,
    /// Rudder magnitude removed per tick while recentering
    #[serde(default = "default_rudder_decay_step")]
    pub rudder_decay_step: f32,
    /// Throttle change per wheel detent
    #[serde(default = "default_throttle_step")]
    pub throttle_step: f32,
    /// Rudder change per horizontal wheel detent
    #[serde(default = "default_rudder_step")]
    pub rudder_step: f32,
}

fn default_radius() -> f32 {
    320.0
}
fn default_outer() -> f32 {
    60.0
}
fn default_curve() -> f32 {
    2.0
}
fn default_deadzone() -> f32 {
    0.05
}
fn default_snap() -> f32 {
    0.08
}
fn default_t_sens_x() -> f32 {
    7.0
}
fn default_t_sens_y() -> f32 {
    5.0
}
fn default_t_smooth() -> f32 {
    0.5
}
fn default_t_deadzone() -> f32 {
    0.02
}
fn default_t_snap_axis() -> f32 {
    0.25
}
fn default_t_snap_outer() -> f32 {
    0.10
}
fn default_t_center_drag() -> f32 {
    0.01
}
fn default_anchor_freeze() -> f32 {
    0.15
}
fn default_rudder_grace() -> f32 {
    0.15
}
fn default_rudder_decay_step() -> f32 {
    0.04
}
fn default_throttle_step() -> f32 {
    0.05
}
fn default_rudder_step() -> f32 {
    0.20
}

impl Default for Config {
    fn default() -> Self {
        Self {
            radius: default_radius(),
            outer: default_outer(),
            curve: default_curve(),
            deadzone: default_deadzone(),
            snap: default_snap(),
            t_sens_x: default_t_sens_x(),
            t_sens_y: default_t_sens_y(),
            t_smooth: default_t_smooth(),
            t_deadzone: default_t_deadzone(),
            t_snap_axis: default_t_snap_axis(),
            t_snap_outer: default_t_snap_outer(),
            t_center_drag: default_t_center_drag(),
            anchor_freeze: default_anchor_freeze(),
            rudder_grace: default_rudder_grace(),
            rudder_decay_step: default_rudder_decay_step(),
            throttle_step: default_throttle_step(),
            rudder_step: default_rudder_step(),
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mousestick")
            .join("config.toml")
    }

    /// Load config from a file
    ///
    /// A missing file or one that is not valid TOML falls back to defaults.
    /// A file that parses but fails [`Config::validate`] is an error.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let config = match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content).unwrap_or_else(|e| {
                warn!("Corrupt config {:?} ({}), using defaults", path, e);
                Self::default()
            }),
            Err(e) => {
                warn!("Cannot read config {:?} ({}), using defaults", path, e);
                Self::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document, filling missing keys with their defaults
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Save config to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Render as the TOML document [`Config::save`] writes
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Rudder grace period as a duration
    ///
    /// Saturates instead of panicking when called on an unvalidated snapshot.
    pub fn rudder_grace_period(&self) -> Duration {
        Duration::try_from_secs_f32(self.rudder_grace).unwrap_or(Duration::MAX)
    }

    /// Check every value against its documented range
    pub fn validate(&self) -> Result<(), EngineError> {
        let fields = [
            ("radius", self.radius),
            ("outer", self.outer),
            ("curve", self.curve),
            ("deadzone", self.deadzone),
            ("snap", self.snap),
            ("t_sens_x", self.t_sens_x),
            ("t_sens_y", self.t_sens_y),
            ("t_smooth", self.t_smooth),
            ("t_deadzone", self.t_deadzone),
            ("t_snap_axis", self.t_snap_axis),
            ("t_snap_outer", self.t_snap_outer),
            ("t_center_drag", self.t_center_drag),
            ("anchor_freeze", self.anchor_freeze),
            ("rudder_grace", self.rudder_grace),
            ("rudder_decay_step", self.rudder_decay_step),
            ("throttle_step", self.throttle_step),
            ("rudder_step", self.rudder_step),
        ];
        if let Some((name, value)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(invalid(format!("{name} must be finite, got {value}")));
        }

        check(self.radius > 0.0, "radius", "> 0", self.radius)?;
        check(self.outer >= 0.0, "outer", ">= 0", self.outer)?;
        check(self.curve >= 1.0, "curve", ">= 1.0", self.curve)?;
        check(unit(self.deadzone), "deadzone", "in [0, 1)", self.deadzone)?;
        check(unit(self.snap), "snap", "in [0, 1)", self.snap)?;
        check(self.t_smooth >= 0.0, "t_smooth", ">= 0", self.t_smooth)?;
        check(unit(self.t_deadzone), "t_deadzone", "in [0, 1)", self.t_deadzone)?;
        check(self.t_snap_axis >= 0.0, "t_snap_axis", ">= 0", self.t_snap_axis)?;
        check(unit(self.t_snap_outer), "t_snap_outer", "in [0, 1)", self.t_snap_outer)?;
        check(unit(self.t_center_drag), "t_center_drag", "in [0, 1)", self.t_center_drag)?;
        check(self.anchor_freeze > 0.0, "anchor_freeze", "> 0", self.anchor_freeze)?;
        check(
            (0.0..=MAX_RUDDER_GRACE).contains(&self.rudder_grace),
            "rudder_grace",
            "in [0, 60]",
            self.rudder_grace,
        )?;
        check(self.rudder_decay_step > 0.0, "rudder_decay_step", "> 0", self.rudder_decay_step)?;
        check(self.throttle_step > 0.0, "throttle_step", "> 0", self.throttle_step)?;
        check(self.rudder_step > 0.0, "rudder_step", "> 0", self.rudder_step)?;
        Ok(())
    }
}

fn unit(v: f32) -> bool {
    (0.0..1.0).contains(&v)
}

fn check(ok: bool, name: &str, rule: &str, value: f32) -> Result<(), EngineError> {
    if ok {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be {rule}, got {value}")))
    }
}

fn invalid(msg: String) -> EngineError {
    EngineError::ConfigurationInvalid(msg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("mousestick-test-{}", std::process::id()))
            .join(name)
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.radius, 320.0);
        assert_eq!(config.curve, 2.0);
        assert_eq!(config.outer, 60.0);
        assert_eq!(config.t_snap_axis, 0.25);
    }

    #[test]
    fn test_missing_keys_fall_back_per_key() {
        let config = Config::parse("radius = 250.0\ncurve = 1.5\n").unwrap();
        assert_eq!(config.radius, 250.0);
        assert_eq!(config.curve, 1.5);
        assert_eq!(config.deadzone, 0.05);
        assert_eq!(config.t_sens_x, 7.0);
        assert_eq!(config.rudder_decay_step, 0.04);
    }

    #[test]
    fn test_roundtrip() {
        let mut config = Config::default();
        config.radius = 400.0;
        config.t_center_drag = 0.005;
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("radius = 400.0"));
        assert_eq!(Config::parse(&toml_str).unwrap(), config);
    }

    #[test]
    fn test_rejects_non_positive_radius() {
        let config = Config {
            radius: 0.0,
            ..Config::default()
        };
        match config.validate() {
            Err(EngineError::ConfigurationInvalid(msg)) => assert!(msg.contains("radius")),
            other => panic!("Expected ConfigurationInvalid, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let bad = [
            Config {
                curve: 0.5,
                ..Config::default()
            },
            Config {
                deadzone: 1.0,
                ..Config::default()
            },
            Config {
                t_center_drag: -0.1,
                ..Config::default()
            },
            Config {
                outer: f32::NAN,
                ..Config::default()
            },
            Config {
                rudder_grace: 1e20,
                ..Config::default()
            },
            Config {
                rudder_grace: MAX_RUDDER_GRACE + 1.0,
                ..Config::default()
            },
        ];
        for config in bad {
            assert!(config.validate().is_err(), "{:?} should be rejected", config);
        }
    }

    #[test]
    fn test_rudder_grace_period() {
        let config = Config {
            rudder_grace: MAX_RUDDER_GRACE,
            ..Config::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.rudder_grace_period(), Duration::from_secs(60));

        let huge = Config {
            rudder_grace: 1e20,
            ..Config::default()
        };
        assert_eq!(huge.rudder_grace_period(), Duration::MAX);
    }

    #[test]
    fn test_load_huge_rudder_grace_is_rejected() {
        let path = temp_path("huge-grace.toml");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "rudder_grace = 1e20\n").unwrap();
        assert!(matches!(
            Config::load(&path),
            Err(EngineError::ConfigurationInvalid(_))
        ));
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let path = temp_path("does-not-exist.toml");
        assert_eq!(Config::load(&path).unwrap(), Config::default());
    }

    #[test]
    fn test_load_corrupt_file_gives_defaults() {
        let path = temp_path("corrupt.toml");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "radius = [not a number").unwrap();
        assert_eq!(Config::load(&path).unwrap(), Config::default());
    }

    #[test]
    fn test_load_invalid_file_is_rejected() {
        let path = temp_path("invalid.toml");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "radius = -5.0\n").unwrap();
        assert!(matches!(
            Config::load(&path),
            Err(EngineError::ConfigurationInvalid(_))
        ));
    }

    #[test]
    fn test_save_then_load() {
        let path = temp_path("nested/saved.toml");
        let config = Config {
            snap: 0.1,
            ..Config::default()
        };
        config.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), config);
    }
}
