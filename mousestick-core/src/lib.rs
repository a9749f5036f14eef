//! Mouse and head-tracking to virtual joystick fusion engine
//!
//! Captures a pointing device, integrates its motion into stick, throttle and
//! rudder axes, shapes them like a mechanical gimbal and merges in filtered
//! head-tracking axes. Devices and the output joystick are abstracted behind
//! [`EventSource`], [`OutputSink`] and [`AuxiliarySource`].

pub mod anchor;
pub mod capture;
pub mod config;
pub mod error;
pub mod filter;
pub mod fusion;
pub mod output;
pub mod shaper;
pub mod tracker;

pub use anchor::{AnchorTracker, HeadAxes, RecenterHandle, VisionSample};
pub use capture::{Button, DeviceCapture, EventSource, IntegratorState, RawEvent, ScreenBounds};
pub use config::{Config, ConfigError};
pub use error::{EngineError, Severity};
pub use filter::OneEuroFilter;
pub use fusion::{EngineHandle, EngineState, FusionLoop, LoopOptions, Session};
pub use output::{NullSink, OutputFrame, OutputSink, TelemetrySnapshot};
pub use shaper::{calculate, hard_limit, ShapeStatus, Shaped};
pub use tracker::{AuxiliarySource, HeadTracker, NoAuxiliary, VisionSource};
