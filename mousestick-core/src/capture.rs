//! Exclusive pointer capture and axis integration
//!
//! [`DeviceCapture`] owns the grabbed device for the length of a session and
//! is the only writer of [`IntegratorState`]. Relative motion accumulates into
//! a virtual cursor, wheels drive throttle and rudder, and buttons are
//! level-triggered latches.

use std::time::Instant;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::EngineError;

/// Rudder magnitudes at or below this snap to zero during decay
pub const RUDDER_REST: f32 = 0.01;

/// The five mouse buttons forwarded to the joystick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Primary,
    Secondary,
    Middle,
    SideBack,
    SideForward,
}

impl Button {
    pub const ALL: [Button; 5] = [
        Button::Primary,
        Button::Secondary,
        Button::Middle,
        Button::SideBack,
        Button::SideForward,
    ];

    pub fn index(self) -> usize {
        match self {
            Button::Primary => 0,
            Button::Secondary => 1,
            Button::Middle => 2,
            Button::SideBack => 3,
            Button::SideForward => 4,
        }
    }
}

/// Device-independent input event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEvent {
    RelX(i32),
    RelY(i32),
    Wheel(i32),
    HWheel(i32),
    /// Key value as reported by the kernel: 0 release, 1 press, 2 repeat
    Button { button: Button, value: i32 },
}

/// A physical device that can be grabbed and drained
pub trait EventSource: Send {
    /// Take exclusive ownership of the device
    fn acquire(&mut self) -> Result<(), EngineError>;

    /// Append every pending event to `out` without blocking
    fn drain(&mut self, out: &mut Vec<RawEvent>) -> Result<(), EngineError>;

    /// Give up exclusive ownership; must be safe to call more than once
    fn release(&mut self) -> Result<(), EngineError>;

    /// Human-readable device description for logs
    fn describe(&self) -> String;
}

/// Screen area the virtual cursor is confined to
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenBounds {
    pub width: f32,
    pub height: f32,
}

impl ScreenBounds {
    pub fn center(&self) -> (f32, f32) {
        (self.width / 2.0, self.height / 2.0)
    }
}

impl Default for ScreenBounds {
    fn default() -> Self {
        Self {
            width: 1920.0,
            height: 1080.0,
        }
    }
}

/// Integrated axis and button state
#[derive(Debug, Clone, PartialEq)]
pub struct IntegratorState {
    pub virtual_x: f32,
    pub virtual_y: f32,
    pub throttle: f32,
    pub rudder: f32,
    pub last_rudder_input: Option<Instant>,
    pub buttons: [bool; 5],
}

impl IntegratorState {
    /// Fresh state with the cursor at screen center
    pub fn centered(bounds: ScreenBounds) -> Self {
        let (x, y) = bounds.center();
        Self {
            virtual_x: x,
            virtual_y: y,
            throttle: 0.0,
            rudder: 0.0,
            last_rudder_input: None,
            buttons: [false; 5],
        }
    }

    /// Fold one event into the state
    pub fn apply(
        &mut self,
        event: RawEvent,
        bounds: ScreenBounds,
        config: &Config,
        now: Instant,
    ) -> Result<(), EngineError> {
        match event {
            RawEvent::RelX(v) => {
                self.virtual_x = (self.virtual_x + v as f32).clamp(0.0, bounds.width);
            }
            RawEvent::RelY(v) => {
                self.virtual_y = (self.virtual_y + v as f32).clamp(0.0, bounds.height);
            }
            RawEvent::Wheel(v) => {
                self.throttle = (self.throttle + v as f32 * config.throttle_step).clamp(-1.0, 1.0);
            }
            RawEvent::HWheel(v) => {
                self.rudder = (self.rudder + v as f32 * config.rudder_step).clamp(-1.0, 1.0);
                self.last_rudder_input = Some(now);
            }
            RawEvent::Button { button, value } => {
                let pressed = match value {
                    0 => false,
                    1 | 2 => true,
                    other => {
                        return Err(EngineError::MalformedEvent(format!(
                            "{:?} reported key value {}",
                            button, other
                        )))
                    }
                };
                self.buttons[button.index()] = pressed;
            }
        }
        Ok(())
    }

    /// Spring the rudder back toward center once input has stopped
    ///
    /// Moves by a fixed step per call and never crosses zero.
    pub fn decay_rudder(&mut self, now: Instant, config: &Config) {
        let grace = config.rudder_grace_period();
        let idle = match self.last_rudder_input {
            Some(last) => now.saturating_duration_since(last) > grace,
            None => true,
        };
        if !idle {
            return;
        }
        if self.rudder.abs() > RUDDER_REST {
            let magnitude = self.rudder.abs() - config.rudder_decay_step;
            self.rudder = if magnitude > 0.0 {
                magnitude.copysign(self.rudder)
            } else {
                0.0
            };
        } else {
            self.rudder = 0.0;
        }
    }

    /// Put the cursor back at center and drop any rudder deflection
    pub fn recenter(&mut self, bounds: ScreenBounds) {
        let (x, y) = bounds.center();
        self.virtual_x = x;
        self.virtual_y = y;
        self.rudder = 0.0;
    }

    /// Cursor offset from screen center
    pub fn offset(&self, bounds: ScreenBounds) -> (f32, f32) {
        let (cx, cy) = bounds.center();
        (self.virtual_x - cx, self.virtual_y - cy)
    }
}

/// A grabbed device plus the state integrated from it
///
/// The grab is released by [`DeviceCapture::release`] or, failing that, on drop.
pub struct DeviceCapture<E: EventSource> {
    source: E,
    bounds: ScreenBounds,
    state: IntegratorState,
    pending: Vec<RawEvent>,
    released: bool,
}

impl<E: EventSource> DeviceCapture<E> {
    /// Grab the device and start integrating from screen center
    pub fn acquire(mut source: E, bounds: ScreenBounds) -> Result<Self, EngineError> {
        source.acquire()?;
        debug!("Acquired {}", source.describe());
        Ok(Self {
            source,
            bounds,
            state: IntegratorState::centered(bounds),
            pending: Vec::with_capacity(64),
            released: false,
        })
    }

    /// Drain the device queue and integrate every event
    ///
    /// Malformed events are logged and skipped. Only a failing read is
    /// returned as an error.
    pub fn poll(&mut self, config: &Config, now: Instant) -> Result<usize, EngineError> {
        self.pending.clear();
        self.source.drain(&mut self.pending)?;
        for &event in &self.pending {
            if let Err(e) = self.state.apply(event, self.bounds, config, now) {
                warn!("Skipping event: {}", e);
            }
        }
        Ok(self.pending.len())
    }

    pub fn decay_rudder(&mut self, now: Instant, config: &Config) {
        self.state.decay_rudder(now, config);
    }

    pub fn recenter(&mut self) {
        self.state.recenter(self.bounds);
    }

    pub fn state(&self) -> &IntegratorState {
        &self.state
    }

    pub fn bounds(&self) -> ScreenBounds {
        self.bounds
    }

    pub fn offset(&self) -> (f32, f32) {
        self.state.offset(self.bounds)
    }

    /// Release the grab; later calls are no-ops
    pub fn release(&mut self) -> Result<(), EngineError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.source.release()?;
        debug!("Released {}", self.source.describe());
        Ok(())
    }
}

impl<E: EventSource> Drop for DeviceCapture<E> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("Failed to release device on drop: {}", e);
        }
    }
}
