//! Linux device layer for mousestick
//!
//! evdev capture of the physical mouse, the uinput joystick the engine writes
//! to, and the UDP socket head-tracking samples arrive on.

pub mod discovery;
pub mod joystick;
pub mod source;
pub mod vision;

pub use discovery::{list_candidates, select_best, Candidate, DiscoveryError};
pub use joystick::{JoystickError, VirtualJoystick, AXIS_MAX, AXIS_MIN, DEFAULT_NAME};
pub use source::EvdevSource;
pub use vision::{parse_datagram, UdpVisionSource};
