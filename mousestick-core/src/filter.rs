//! One-Euro adaptive low-pass filter
//!
//! Cutoff frequency rises with the (smoothed) signal velocity: heavy smoothing
//! while the head is still, little lag while it moves.

use std::f32::consts::PI;

/// Derivative cutoff (Hz)
pub const D_CUTOFF: f32 = 1.0;

/// Minimum cutoff (Hz) used for head-tracking axes
pub const HEAD_MIN_CUTOFF: f32 = 0.05;

/// Single-axis One-Euro filter
#[derive(Debug, Clone)]
pub struct OneEuroFilter {
    min_cutoff: f32,
    beta: f32,
    d_cutoff: f32,
    /// `None` until the first sample seeds the filter
    x_prev: Option<f32>,
    dx_prev: f32,
    t_prev: f64,
}

impl OneEuroFilter {
    pub fn new(min_cutoff: f32, beta: f32) -> Self {
        Self {
            min_cutoff,
            beta,
            d_cutoff: D_CUTOFF,
            x_prev: None,
            dx_prev: 0.0,
            t_prev: 0.0,
        }
    }

    /// Change the speed coefficient without touching history
    pub fn set_beta(&mut self, beta: f32) {
        self.beta = beta;
    }

    pub fn beta(&self) -> f32 {
        self.beta
    }

    fn smoothing_factor(t_e: f32, cutoff: f32) -> f32 {
        let r = 2.0 * PI * cutoff * t_e;
        r / (r + 1.0)
    }

    /// Filter one sample taken at `t` seconds
    ///
    /// The first sample passes through unchanged. A sample whose timestamp
    /// does not advance returns the previous output and leaves state alone.
    pub fn filter(&mut self, t: f64, x: f32) -> f32 {
        let Some(x_prev) = self.x_prev else {
            self.x_prev = Some(x);
            self.t_prev = t;
            return x;
        };

        let t_e = (t - self.t_prev) as f32;
        if t_e <= 0.0 {
            return x_prev;
        }

        let a_d = Self::smoothing_factor(t_e, self.d_cutoff);
        let dx = (x - x_prev) / t_e;
        let dx_hat = a_d * dx + (1.0 - a_d) * self.dx_prev;

        let cutoff = self.min_cutoff + self.beta * dx_hat.abs();
        let a = Self::smoothing_factor(t_e, cutoff);
        let x_hat = a * x + (1.0 - a) * x_prev;

        self.x_prev = Some(x_hat);
        self.dx_prev = dx_hat;
        self.t_prev = t;
        x_hat
    }

    /// Forget history; the next sample seeds the filter again
    pub fn reset(&mut self) {
        self.x_prev = None;
        self.dx_prev = 0.0;
        self.t_prev = 0.0;
    }
}
