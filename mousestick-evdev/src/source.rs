//! Exclusive evdev event source
//!
//! Opens a pointing device, grabs it so the desktop cursor stops moving, and
//! drains its queue without blocking on every tick.

use std::io;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use evdev::{Device, InputEvent, InputEventKind, Key, RelativeAxisType};
use tracing::{debug, warn};

use mousestick_core::{Button, EngineError, EventSource, RawEvent};

/// A grabbed `/dev/input/event*` pointing device
pub struct EvdevSource {
    path: PathBuf,
    name: String,
    device: Device,
    grabbed: bool,
}

impl EvdevSource {
    /// Open a device node; nothing is grabbed until [`EventSource::acquire`]
    pub fn open(path: &Path) -> Result<Self, EngineError> {
        let device = Device::open(path).map_err(|e| {
            EngineError::DeviceUnavailable(format!("open {}: {}", path.display(), e))
        })?;
        let name = device.name().unwrap_or("Unknown").to_string();
        Ok(Self {
            path: path.to_path_buf(),
            name,
            device,
            grabbed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Put the fd in non-blocking mode so an empty queue reads as `WouldBlock`
fn set_nonblocking(device: &Device) -> io::Result<()> {
    let fd = device.as_raw_fd();
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Translate a kernel event; `None` for anything we do not forward
pub fn translate(event: &InputEvent) -> Option<RawEvent> {
    match event.kind() {
        InputEventKind::RelAxis(axis) => match axis {
            RelativeAxisType::REL_X => Some(RawEvent::RelX(event.value())),
            RelativeAxisType::REL_Y => Some(RawEvent::RelY(event.value())),
            RelativeAxisType::REL_WHEEL => Some(RawEvent::Wheel(event.value())),
            RelativeAxisType::REL_HWHEEL => Some(RawEvent::HWheel(event.value())),
            _ => None,
        },
        InputEventKind::Key(key) => button_for(key).map(|button| RawEvent::Button {
            button,
            value: event.value(),
        }),
        _ => None,
    }
}

fn button_for(key: Key) -> Option<Button> {
    match key {
        Key::BTN_LEFT => Some(Button::Primary),
        Key::BTN_RIGHT => Some(Button::Secondary),
        Key::BTN_MIDDLE => Some(Button::Middle),
        Key::BTN_SIDE => Some(Button::SideBack),
        Key::BTN_EXTRA => Some(Button::SideForward),
        _ => None,
    }
}

impl EventSource for EvdevSource {
    fn acquire(&mut self) -> Result<(), EngineError> {
        set_nonblocking(&self.device).map_err(|e| {
            EngineError::DeviceUnavailable(format!("{}: set non-blocking: {}", self.name, e))
        })?;
        self.device.grab().map_err(|e| {
            EngineError::DeviceUnavailable(format!(
                "grab {} ({}): {} (is another program holding it?)",
                self.name,
                self.path.display(),
                e
            ))
        })?;
        self.grabbed = true;
        Ok(())
    }

    fn drain(&mut self, out: &mut Vec<RawEvent>) -> Result<(), EngineError> {
        loop {
            match self.device.fetch_events() {
                Ok(events) => {
                    let before = out.len();
                    out.extend(events.filter_map(|ev| translate(&ev)));
                    if out.len() == before {
                        // Only SYN and unmapped events were pending
                        return Ok(());
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(EngineError::DeviceIo(e)),
            }
        }
    }

    fn release(&mut self) -> Result<(), EngineError> {
        if !self.grabbed {
            return Ok(());
        }
        self.grabbed = false;
        self.device.ungrab().map_err(EngineError::DeviceIo)
    }

    fn describe(&self) -> String {
        format!("{} ({})", self.name, self.path.display())
    }
}

impl Drop for EvdevSource {
    fn drop(&mut self) {
        if self.grabbed {
            if let Err(e) = self.device.ungrab() {
                warn!("Failed to ungrab {}: {}", self.name, e);
            } else {
                debug!("Ungrabbed {}", self.name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evdev::EventType;

    fn rel(axis: RelativeAxisType, value: i32) -> InputEvent {
        InputEvent::new(EventType::RELATIVE, axis.0, value)
    }

    fn key(key: Key, value: i32) -> InputEvent {
        InputEvent::new(EventType::KEY, key.code(), value)
    }

    #[test]
    fn test_translate_motion_and_wheels() {
        assert_eq!(translate(&rel(RelativeAxisType::REL_X, -3)), Some(RawEvent::RelX(-3)));
        assert_eq!(translate(&rel(RelativeAxisType::REL_Y, 8)), Some(RawEvent::RelY(8)));
        assert_eq!(translate(&rel(RelativeAxisType::REL_WHEEL, 1)), Some(RawEvent::Wheel(1)));
        assert_eq!(
            translate(&rel(RelativeAxisType::REL_HWHEEL, -1)),
            Some(RawEvent::HWheel(-1))
        );
        assert_eq!(translate(&rel(RelativeAxisType::REL_WHEEL_HI_RES, 120)), None);
    }

    #[test]
    fn test_translate_buttons() {
        assert_eq!(
            translate(&key(Key::BTN_EXTRA, 1)),
            Some(RawEvent::Button {
                button: Button::SideForward,
                value: 1
            })
        );
        assert_eq!(
            translate(&key(Key::BTN_SIDE, 0)),
            Some(RawEvent::Button {
                button: Button::SideBack,
                value: 0
            })
        );
        assert_eq!(translate(&key(Key::KEY_A, 1)), None);
    }

    #[test]
    fn test_translate_ignores_sync() {
        let syn = InputEvent::new(EventType::SYNCHRONIZATION, 0, 0);
        assert_eq!(translate(&syn), None);
    }
}
