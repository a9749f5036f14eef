//! Virtual flight stick using evdev/uinput
//!
//! Creates a HOTAS-style device (stick, throttle, twist rudder, two head axes
//! and five buttons) that games pick up as an ordinary joystick.

use evdev::{
    uinput::{VirtualDevice, VirtualDeviceBuilder},
    AbsInfo, AbsoluteAxisType, AttributeSet, BusType, EventType, InputEvent, InputId, Key,
    UinputAbsSetup,
};
use thiserror::Error;

use mousestick_core::{EngineError, OutputFrame, OutputSink};

/// Joystick axis value range (standard for most games)
pub const AXIS_MIN: i32 = -32767;
pub const AXIS_MAX: i32 = 32767;

/// Default device name; many sims ship bindings for this stick
pub const DEFAULT_NAME: &str = "Thrustmaster T.16000M (Virtual)";

const VENDOR_THRUSTMASTER: u16 = 0x044f;
const PRODUCT_T16000M: u16 = 0xb10a;

/// Output axes in frame order
const AXES: [AbsoluteAxisType; 6] = [
    AbsoluteAxisType::ABS_X,
    AbsoluteAxisType::ABS_Y,
    AbsoluteAxisType::ABS_Z,
    AbsoluteAxisType::ABS_RZ,
    AbsoluteAxisType::ABS_RX,
    AbsoluteAxisType::ABS_RY,
];

/// Output buttons, indexed like [`mousestick_core::Button::index`]
const BUTTONS: [Key; 5] = [
    Key::BTN_TRIGGER,
    Key::BTN_THUMB,
    Key::BTN_TOP,
    Key::BTN_TOP2,
    Key::BTN_PINKIE,
];

/// Errors from virtual joystick operations
#[derive(Debug, Error)]
pub enum JoystickError {
    #[error("Failed to create virtual device: {0}")]
    CreateDevice(#[source] std::io::Error),
    #[error("Failed to emit event: {0}")]
    EmitEvent(#[source] std::io::Error),
}

impl From<JoystickError> for EngineError {
    fn from(e: JoystickError) -> Self {
        match e {
            JoystickError::CreateDevice(_) => EngineError::DeviceUnavailable(e.to_string()),
            JoystickError::EmitEvent(ref io)
                if matches!(io.raw_os_error(), Some(libc::ENODEV | libc::EBADF)) =>
            {
                EngineError::SinkLost(e.to_string())
            }
            JoystickError::EmitEvent(_) => EngineError::Sink(e.to_string()),
        }
    }
}

/// Scale a [-1, 1] axis value to the device range
pub fn to_axis_value(value: f32) -> i32 {
    (value.clamp(-1.0, 1.0) * AXIS_MAX as f32).round() as i32
}

/// Virtual joystick device
pub struct VirtualJoystick {
    device: VirtualDevice,
    /// Last values sent (for change detection)
    axis_values: [i32; 6],
    buttons: [bool; 5],
}

impl VirtualJoystick {
    /// Create a new virtual joystick device
    ///
    /// # Arguments
    /// * `name` - Device name (shown in `evtest` and game controller settings)
    pub fn new(name: &str) -> Result<Self, JoystickError> {
        let mut keys = AttributeSet::<Key>::new();
        for key in BUTTONS {
            keys.insert(key);
        }

        let mut builder = VirtualDeviceBuilder::new()
            .map_err(JoystickError::CreateDevice)?
            .name(name)
            .input_id(InputId::new(
                BusType::BUS_USB,
                VENDOR_THRUSTMASTER,
                PRODUCT_T16000M,
                0,
            ))
            .with_keys(&keys)
            .map_err(JoystickError::CreateDevice)?;

        for code in AXES {
            let abs_setup = UinputAbsSetup::new(code, AbsInfo::new(0, AXIS_MIN, AXIS_MAX, 0, 0, 0));
            builder = builder
                .with_absolute_axis(&abs_setup)
                .map_err(JoystickError::CreateDevice)?;
        }

        let device = builder.build().map_err(JoystickError::CreateDevice)?;

        Ok(Self {
            device,
            axis_values: [0; 6],
            buttons: [false; 5],
        })
    }

    /// Write a whole frame
    ///
    /// Only changed axes and buttons are emitted; nothing is written when the
    /// frame matches the previous one.
    pub fn update(&mut self, frame: &OutputFrame) -> Result<(), JoystickError> {
        let values = [
            frame.stick_x,
            frame.stick_y,
            frame.throttle,
            frame.rudder,
            frame.head_yaw,
            frame.head_pitch,
        ]
        .map(to_axis_value);

        let mut events = Vec::new();
        for (i, &value) in values.iter().enumerate() {
            if self.axis_values[i] != value {
                self.axis_values[i] = value;
                events.push(InputEvent::new_now(EventType::ABSOLUTE, AXES[i].0, value));
            }
        }
        for (i, &pressed) in frame.buttons.iter().enumerate() {
            if self.buttons[i] != pressed {
                self.buttons[i] = pressed;
                events.push(InputEvent::new_now(
                    EventType::KEY,
                    BUTTONS[i].code(),
                    i32::from(pressed),
                ));
            }
        }

        if !events.is_empty() {
            self.device
                .emit(&events)
                .map_err(JoystickError::EmitEvent)?;
        }

        Ok(())
    }

    /// Get the device path (e.g., /dev/input/eventX)
    pub fn device_path(&mut self) -> Option<std::path::PathBuf> {
        self.device
            .enumerate_dev_nodes_blocking()
            .ok()?
            .next()?
            .ok()
    }
}

impl OutputSink for VirtualJoystick {
    fn emit(&mut self, frame: &OutputFrame) -> Result<(), EngineError> {
        self.update(frame).map_err(EngineError::from)
    }
}
