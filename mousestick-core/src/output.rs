//! Per-tick output record, the sink it goes to, and the telemetry copy

use crate::anchor::HeadAxes;
use crate::error::EngineError;
use crate::shaper::Shaped;

/// Everything the virtual joystick needs for one tick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OutputFrame {
    pub stick_x: f32,
    pub stick_y: f32,
    pub throttle: f32,
    pub rudder: f32,
    pub head_yaw: f32,
    pub head_pitch: f32,
    pub buttons: [bool; 5],
}

impl OutputFrame {
    pub fn new(
        shaped: &Shaped,
        throttle: f32,
        rudder: f32,
        head: HeadAxes,
        buttons: [bool; 5],
    ) -> Self {
        Self {
            stick_x: shaped.x,
            stick_y: shaped.y,
            throttle,
            rudder,
            head_yaw: head.yaw,
            head_pitch: head.pitch,
            buttons,
        }
    }

    pub fn is_finite(&self) -> bool {
        [
            self.stick_x,
            self.stick_y,
            self.throttle,
            self.rudder,
            self.head_yaw,
            self.head_pitch,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

/// Consumer of shaped output (normally a uinput joystick)
pub trait OutputSink: Send {
    fn emit(&mut self, frame: &OutputFrame) -> Result<(), EngineError>;
}

/// Sink that drops every frame
#[derive(Debug, Default)]
pub struct NullSink;

impl OutputSink for NullSink {
    fn emit(&mut self, _frame: &OutputFrame) -> Result<(), EngineError> {
        Ok(())
    }
}

/// Latest engine output, replaced wholesale every tick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TelemetrySnapshot {
    pub tick: u64,
    pub stick_x: f32,
    pub stick_y: f32,
    pub throttle: f32,
    pub rudder: f32,
    pub head_yaw: f32,
    pub head_pitch: f32,
    pub buttons: [bool; 5],
    pub in_deadzone: bool,
    pub is_snapped: bool,
    pub at_limit: bool,
    pub raw_mag: f32,
}

impl TelemetrySnapshot {
    pub fn from_tick(tick: u64, frame: &OutputFrame, shaped: &Shaped, at_limit: bool) -> Self {
        Self {
            tick,
            stick_x: frame.stick_x,
            stick_y: frame.stick_y,
            throttle: frame.throttle,
            rudder: frame.rudder,
            head_yaw: frame.head_yaw,
            head_pitch: frame.head_pitch,
            buttons: frame.buttons,
            in_deadzone: shaped.status.in_deadzone,
            is_snapped: shaped.status.is_snapped,
            at_limit,
            raw_mag: shaped.status.raw_mag,
        }
    }
}
