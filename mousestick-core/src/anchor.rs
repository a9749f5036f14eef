//! Head-tracking anchor with slow drift compensation
//!
//! Vision samples arrive as absolute normalized points (chin position). The
//! anchor is the reference they are measured against: it creeps toward the
//! resting position while the head is near center and freezes during large
//! excursions, so looking over a shoulder does not drag the center along.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::filter::{OneEuroFilter, HEAD_MIN_CUTOFF};

/// Scale hints below this are treated as this (normalized units)
pub const MIN_SCALE: f32 = 0.001;

/// Filtered magnitudes below this are treated as exactly centered
const EPSILON: f32 = 0.0001;

/// One sample from the vision collaborator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisionSample {
    /// Normalized horizontal position (0..1)
    pub x: f32,
    /// Normalized vertical position (0..1)
    pub y: f32,
    /// Face size in the same normalized units (e.g. inter-ocular distance)
    pub scale: f32,
}

/// Shaped head axes in [-1.0, 1.0]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HeadAxes {
    pub yaw: f32,
    pub pitch: f32,
}

/// Cloneable handle that requests a hard recenter from any thread
#[derive(Debug, Clone)]
pub struct RecenterHandle(Arc<AtomicBool>);

impl RecenterHandle {
    pub fn recenter(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Dynamic anchor plus per-axis One-Euro filtering
pub struct AnchorTracker {
    ref_x: f32,
    ref_y: f32,
    needs_recenter: Arc<AtomicBool>,
    filter_yaw: OneEuroFilter,
    filter_pitch: OneEuroFilter,
    /// Last filtered (unshaped) values
    yaw: f32,
    pitch: f32,
    epoch: Instant,
}

impl AnchorTracker {
    /// Create a tracker; the first sample becomes the anchor
    pub fn new(config: &Config) -> Self {
        Self {
            ref_x: 0.5,
            ref_y: 0.5,
            needs_recenter: Arc::new(AtomicBool::new(true)),
            filter_yaw: OneEuroFilter::new(HEAD_MIN_CUTOFF, config.t_smooth),
            filter_pitch: OneEuroFilter::new(HEAD_MIN_CUTOFF, config.t_smooth),
            yaw: 0.0,
            pitch: 0.0,
            epoch: Instant::now(),
        }
    }

    pub fn recenter_handle(&self) -> RecenterHandle {
        RecenterHandle(Arc::clone(&self.needs_recenter))
    }

    pub fn recenter(&self) {
        self.needs_recenter.store(true, Ordering::SeqCst);
    }

    /// Current anchor point
    pub fn reference(&self) -> (f32, f32) {
        (self.ref_x, self.ref_y)
    }

    /// Last filtered (yaw, pitch), before deadzone and snapping
    pub fn filtered(&self) -> (f32, f32) {
        (self.yaw, self.pitch)
    }

    /// Pick up a new smoothing beta; filter history is kept
    pub fn apply_config(&mut self, config: &Config) {
        self.filter_yaw.set_beta(config.t_smooth);
        self.filter_pitch.set_beta(config.t_smooth);
    }

    /// Feed a sample stamped with the tracker's monotonic clock
    pub fn update(&mut self, sample: VisionSample, config: &Config) -> Option<(f32, f32)> {
        let t = self.epoch.elapsed().as_secs_f64();
        self.update_at(t, sample, config)
    }

    /// Feed a sample taken at `t` seconds
    ///
    /// Returns `None` when the sample was consumed as the new anchor.
    pub fn update_at(&mut self, t: f64, sample: VisionSample, config: &Config) -> Option<(f32, f32)> {
        if self.needs_recenter.swap(false, Ordering::SeqCst) {
            self.ref_x = sample.x;
            self.ref_y = sample.y;
            return None;
        }

        let distance = (sample.x - self.ref_x).hypot(sample.y - self.ref_y);
        if distance < config.anchor_freeze {
            self.ref_x += (sample.x - self.ref_x) * config.t_center_drag;
            self.ref_y += (sample.y - self.ref_y) * config.t_center_drag;
        }

        let scale = sample.scale.max(MIN_SCALE);
        let raw_yaw = (sample.x - self.ref_x) / scale * config.t_sens_x;
        let raw_pitch = (sample.y - self.ref_y) / scale * config.t_sens_y;

        self.yaw = self.filter_yaw.filter(t, raw_yaw);
        self.pitch = self.filter_pitch.filter(t, raw_pitch);
        Some((self.yaw, self.pitch))
    }

    /// Shaped head axes from the last filtered values
    pub fn axes(&self, config: &Config) -> HeadAxes {
        shape_head(self.yaw, self.pitch, config)
    }
}

/// Radial deadzone, axis snap and outer snap for a filtered head vector
pub fn shape_head(raw_x: f32, raw_y: f32, config: &Config) -> HeadAxes {
    let magnitude = raw_x.hypot(raw_y);
    if magnitude < EPSILON || magnitude < config.t_deadzone {
        return HeadAxes::default();
    }

    let rescaled = ((magnitude - config.t_deadzone) / (1.0 - config.t_deadzone)).min(1.0);

    let (mut out_x, mut out_y) = (raw_x, raw_y);
    if raw_y.abs() < raw_x.abs() * config.t_snap_axis {
        out_y = 0.0;
    } else if raw_x.abs() < raw_y.abs() * config.t_snap_axis {
        out_x = 0.0;
    }

    let current = out_x.hypot(out_y);
    if current < EPSILON {
        return HeadAxes::default();
    }

    let final_mag = if rescaled > 1.0 - config.t_snap_outer {
        1.0
    } else {
        rescaled
    };

    HeadAxes {
        yaw: out_x / current * final_mag,
        pitch: out_y / current * final_mag,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(x: f32, y: f32) -> VisionSample {
        VisionSample { x, y, scale: 0.1 }
    }

    fn tracker_at(x: f32, y: f32, config: &Config) -> AnchorTracker {
        let mut tracker = AnchorTracker::new(config);
        assert!(tracker.update_at(0.0, sample(x, y), config).is_none());
        tracker
    }

    #[test]
    fn test_first_sample_sets_anchor_verbatim() {
        let config = Config::default();
        let tracker = tracker_at(0.42, 0.61, &config);
        assert_eq!(tracker.reference(), (0.42, 0.61));
    }

    #[test]
    fn test_small_offset_drags_anchor() {
        let config = Config {
            t_center_drag: 0.5,
            ..Config::default()
        };
        let mut tracker = tracker_at(0.5, 0.5, &config);
        tracker.update_at(0.1, sample(0.6, 0.5), &config);
        let (rx, ry) = tracker.reference();
        assert!((rx - 0.55).abs() < 1e-6);
        assert_eq!(ry, 0.5);
    }

    #[test]
    fn test_large_excursion_freezes_anchor() {
        let config = Config {
            t_center_drag: 0.5,
            ..Config::default()
        };
        let mut tracker = tracker_at(0.5, 0.5, &config);
        let before = tracker.reference();
        for (i, (x, y)) in [(0.7, 0.5), (0.5, 0.2), (0.62, 0.62), (0.9, 0.9)].iter().enumerate() {
            tracker.update_at(0.1 * (i + 1) as f64, sample(*x, *y), &config);
            assert_eq!(tracker.reference(), before);
        }
    }

    #[test]
    fn test_recenter_takes_next_sample_verbatim() {
        let config = Config::default();
        let mut tracker = tracker_at(0.5, 0.5, &config);
        tracker.update_at(0.1, sample(0.52, 0.5), &config);
        let handle = tracker.recenter_handle();
        handle.recenter();
        assert!(tracker.update_at(0.2, sample(0.9, 0.1), &config).is_none());
        assert_eq!(tracker.reference(), (0.9, 0.1));
        assert!(tracker.update_at(0.3, sample(0.9, 0.1), &config).is_some());
    }

    #[test]
    fn test_update_applies_scale_and_gain() {
        let config = Config {
            t_center_drag: 0.0,
            t_sens_x: 2.0,
            t_sens_y: 3.0,
            ..Config::default()
        };
        let mut tracker = tracker_at(0.5, 0.5, &config);
        // First filtered sample passes straight through the One-Euro filter
        let (yaw, pitch) = tracker.update_at(0.1, sample(0.51, 0.48), &config).unwrap();
        assert!((yaw - 0.2).abs() < 1e-4, "yaw {}", yaw);
        assert!((pitch + 0.6).abs() < 1e-4, "pitch {}", pitch);
    }

    #[test]
    fn test_degenerate_scale_is_floored() {
        let config = Config {
            t_center_drag: 0.0,
            t_sens_x: 1.0,
            ..Config::default()
        };
        let mut tracker = tracker_at(0.5, 0.5, &config);
        let s = VisionSample {
            x: 0.501,
            y: 0.5,
            scale: 0.0,
        };
        let (yaw, _) = tracker.update_at(0.1, s, &config).unwrap();
        assert!(yaw.is_finite());
        assert!((yaw - 1.0).abs() < 1e-2);
    }

    #[test]
    fn test_shape_head_deadzone() {
        let config = Config::default();
        assert_eq!(shape_head(0.01, 0.01, &config), HeadAxes::default());
        assert_eq!(shape_head(0.0, 0.0, &config), HeadAxes::default());
    }

    #[test]
    fn test_shape_head_axis_snap() {
        let config = Config {
            t_deadzone: 0.0,
            t_snap_outer: 0.0,
            ..Config::default()
        };
        let out = shape_head(0.5, 0.1, &config);
        assert_eq!(out.pitch, 0.0);
        assert!((out.yaw - 0.5099).abs() < 1e-3);

        let out = shape_head(-0.05, -0.6, &config);
        assert_eq!(out.yaw, 0.0);
        assert!(out.pitch < 0.0);
    }

    #[test]
    fn test_shape_head_outer_snap() {
        let config = Config {
            t_deadzone: 0.0,
            t_snap_outer: 0.1,
            ..Config::default()
        };
        let out = shape_head(0.0, 0.95, &config);
        assert_eq!(out, HeadAxes { yaw: 0.0, pitch: 1.0 });
        let out = shape_head(-3.0, 0.0, &config);
        assert_eq!(out, HeadAxes { yaw: -1.0, pitch: 0.0 });
    }

    #[test]
    fn test_shape_head_rescales_past_deadzone() {
        let config = Config {
            t_deadzone: 0.2,
            t_snap_outer: 0.0,
            ..Config::default()
        };
        let out = shape_head(0.6, 0.0, &config);
        assert!((out.yaw - 0.5).abs() < 1e-6);
    }
}
