//! Engine error types

use thiserror::Error;

/// How the fusion loop reacts to an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Log, skip, keep ticking
    Transient,
    /// Keep running without the failing collaborator
    Degraded,
    /// Leave CAPTURING and release resources
    Fatal,
}

/// Errors that can occur while running the engine
#[derive(Error, Debug)]
pub enum EngineError {
    /// No matching device, or the exclusive grab failed
    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Read failed mid-session (device unplugged, fd closed)
    #[error("Device I/O error: {0}")]
    DeviceIo(#[source] std::io::Error),

    /// Head-tracking source could not be started
    #[error("Auxiliary source unavailable: {0}")]
    AuxiliarySourceUnavailable(String),

    /// A configuration value outside its accepted range
    #[error("Invalid configuration: {0}")]
    ConfigurationInvalid(String),

    /// A single raw event that could not be interpreted
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    /// The virtual joystick rejected a frame
    #[error("Output sink error: {0}")]
    Sink(String),

    /// The virtual joystick is gone (node removed, fd closed)
    #[error("Output sink lost: {0}")]
    SinkLost(String),
}

impl EngineError {
    pub fn severity(&self) -> Severity {
        match self {
            EngineError::MalformedEvent(_) | EngineError::Sink(_) => Severity::Transient,
            EngineError::AuxiliarySourceUnavailable(_) => Severity::Degraded,
            EngineError::DeviceUnavailable(_)
            | EngineError::DeviceIo(_)
            | EngineError::ConfigurationInvalid(_)
            | EngineError::SinkLost(_) => Severity::Fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_classification() {
        assert_eq!(
            EngineError::MalformedEvent("key value 7".into()).severity(),
            Severity::Transient
        );
        assert_eq!(
            EngineError::AuxiliarySourceUnavailable("bind".into()).severity(),
            Severity::Degraded
        );
        let io = std::io::Error::from_raw_os_error(19);
        assert_eq!(EngineError::DeviceIo(io).severity(), Severity::Fatal);
        assert_eq!(EngineError::Sink("EAGAIN".into()).severity(), Severity::Transient);
        assert_eq!(EngineError::SinkLost("ENODEV".into()).severity(), Severity::Fatal);
    }
}
