//! Stick displacement to axis value shaping
//!
//! Converts the virtual pointer's offset from center (in px) into a pair of
//! stick values in [-1.0, 1.0]. The deadzone is round, the outer gate is
//! square, and the curve is applied per axis so diagonals reach the corners.

use crate::config::Config;

/// Diagnostics produced alongside a shaped value
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ShapeStatus {
    /// At least one axis was zeroed by axis snapping
    pub is_snapped: bool,
    /// Radial magnitude fell inside the deadzone
    pub in_deadzone: bool,
    /// Radial magnitude after snapping, in radius units
    pub raw_mag: f32,
}

/// Shaped stick output
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Shaped {
    pub x: f32,
    pub y: f32,
    pub status: ShapeStatus,
}

/// Clamp each axis of a displacement to `±(radius + outer)`
///
/// Returns the clamped offset and whether either axis hit the stop.
pub fn hard_limit(dx: f32, dy: f32, config: &Config) -> (f32, f32, bool) {
    let hard = config.radius + config.outer;
    let at_limit = dx.abs() > hard || dy.abs() > hard;
    (dx.clamp(-hard, hard), dy.clamp(-hard, hard), at_limit)
}

/// Shape a displacement from center into stick values
///
/// Pure; `config` must already be validated (`radius > 0`).
pub fn calculate(dx: f32, dy: f32, config: &Config) -> Shaped {
    let mut raw_x = dx / config.radius;
    let mut raw_y = dy / config.radius;

    let mut is_snapped = false;
    if raw_x.abs() < config.snap {
        raw_x = 0.0;
        is_snapped = true;
    }
    if raw_y.abs() < config.snap {
        raw_y = 0.0;
        is_snapped = true;
    }

    let raw_mag = raw_x.hypot(raw_y);
    let in_deadzone = raw_mag < config.deadzone;

    let (x, y) = if in_deadzone {
        (0.0, 0.0)
    } else {
        (
            apply_curve(raw_x, config.curve),
            apply_curve(raw_y, config.curve),
        )
    };

    Shaped {
        x: x.clamp(-1.0, 1.0),
        y: y.clamp(-1.0, 1.0),
        status: ShapeStatus {
            is_snapped,
            in_deadzone,
            raw_mag,
        },
    }
}

/// Apply response curve (exponent) to one axis, saturating at 1.0
///
/// Exponent > 1.0 makes the center less sensitive
fn apply_curve(value: f32, exponent: f32) -> f32 {
    value.abs().min(1.0).powf(exponent).copysign(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear() -> Config {
        Config {
            radius: 300.0,
            curve: 1.0,
            deadzone: 0.0,
            snap: 0.0,
            ..Config::default()
        }
    }

    #[test]
    fn test_reference_scenario() {
        let config = Config {
            radius: 300.0,
            curve: 2.0,
            deadzone: 0.05,
            snap: 0.08,
            ..Config::default()
        };
        let out = calculate(150.0, 0.0, &config);
        assert!((out.x - 0.25).abs() < 1e-6);
        assert_eq!(out.y, 0.0);
        assert!(out.status.is_snapped);
        assert!(!out.status.in_deadzone);
        assert!((out.status.raw_mag - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_radial_deadzone() {
        let config = Config {
            radius: 300.0,
            deadzone: 0.1,
            snap: 0.0,
            ..Config::default()
        };
        // Each axis is 0.08 of radius, radial magnitude ~0.113 -> outside
        let out = calculate(24.0, 24.0, &config);
        assert!(!out.status.in_deadzone);
        assert!(out.x > 0.0 && out.y > 0.0);

        // Radial magnitude ~0.094 -> inside
        for (dx, dy) in [(20.0, 20.0), (-28.0, 0.0), (0.0, 29.9), (-10.0, -15.0)] {
            let out = calculate(dx, dy, &config);
            assert!(out.status.in_deadzone, "({dx}, {dy})");
            assert_eq!((out.x, out.y), (0.0, 0.0));
        }
    }

    #[test]
    fn test_square_gate_bounds() {
        for curve in [1.0, 1.7, 3.0] {
            let config = Config {
                curve,
                ..Config::default()
            };
            let far = 10.0 * config.radius;
            for (dx, dy) in [(far, far), (-far, far), (far, -far), (-far, -far), (far, 3.0)] {
                let out = calculate(dx, dy, &config);
                assert!((-1.0..=1.0).contains(&out.x));
                assert!((-1.0..=1.0).contains(&out.y));
            }
        }
    }

    #[test]
    fn test_diagonal_reaches_corner() {
        let config = linear();
        let out = calculate(300.0, 300.0, &config);
        assert_eq!((out.x, out.y), (1.0, 1.0));
        let out = calculate(-300.0, 300.0, &config);
        assert_eq!((out.x, out.y), (-1.0, 1.0));
    }

    #[test]
    fn test_linear_curve_is_passthrough() {
        let config = linear();
        let out = calculate(-75.0, 120.0, &config);
        assert!((out.x + 0.25).abs() < 1e-6);
        assert!((out.y - 0.4).abs() < 1e-6);
        assert!(!out.status.is_snapped);
    }

    #[test]
    fn test_curve_preserves_sign() {
        let config = Config {
            radius: 100.0,
            curve: 3.0,
            deadzone: 0.0,
            snap: 0.0,
            ..Config::default()
        };
        let out = calculate(-50.0, 50.0, &config);
        assert!((out.x + 0.125).abs() < 1e-6);
        assert!((out.y - 0.125).abs() < 1e-6);
    }

    #[test]
    fn test_hard_limit() {
        let config = Config {
            radius: 300.0,
            outer: 50.0,
            ..Config::default()
        };
        assert_eq!(hard_limit(100.0, -200.0, &config), (100.0, -200.0, false));
        assert_eq!(hard_limit(500.0, -20.0, &config), (350.0, -20.0, true));
        assert_eq!(hard_limit(0.0, -351.0, &config), (0.0, -350.0, true));
    }
}
