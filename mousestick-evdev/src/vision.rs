//! Face position samples over UDP
//!
//! A separate face-landmark process sends one datagram per camera frame with
//! three ASCII numbers: normalized `x`, `y` and a `scale` hint, separated by
//! whitespace or commas (`"0.512 0.430 0.071"`).

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use tracing::debug;

use mousestick_core::{EngineError, VisionSample, VisionSource};

/// Default listen address
pub const DEFAULT_ADDR: &str = "127.0.0.1:4243";

const MAX_DATAGRAM: usize = 256;

/// Parse one datagram into a sample
pub fn parse_datagram(data: &[u8]) -> Result<VisionSample, EngineError> {
    let text = std::str::from_utf8(data)
        .map_err(|_| EngineError::MalformedEvent("vision datagram is not UTF-8".into()))?;

    let mut fields = text
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|f| !f.is_empty())
        .map(|f| {
            f.parse::<f32>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| EngineError::MalformedEvent(format!("bad vision field {f:?}")))
        });

    let mut next = || {
        fields
            .next()
            .unwrap_or_else(|| Err(EngineError::MalformedEvent(format!("short vision datagram {text:?}"))))
    };
    let sample = VisionSample {
        x: next()?,
        y: next()?,
        scale: next()?,
    };

    if fields.next().is_some() {
        return Err(EngineError::MalformedEvent(format!(
            "trailing data in vision datagram {text:?}"
        )));
    }
    Ok(sample)
}

/// Vision samples received on a UDP socket
pub struct UdpVisionSource {
    addr: SocketAddr,
    socket: Option<UdpSocket>,
    buf: [u8; MAX_DATAGRAM],
}

impl UdpVisionSource {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            socket: None,
            buf: [0; MAX_DATAGRAM],
        }
    }

    /// Bound address, once open
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }
}

impl VisionSource for UdpVisionSource {
    fn open(&mut self) -> Result<(), EngineError> {
        let socket = UdpSocket::bind(self.addr).map_err(|e| {
            EngineError::AuxiliarySourceUnavailable(format!("bind {}: {}", self.addr, e))
        })?;
        self.socket = Some(socket);
        Ok(())
    }

    fn next_sample(&mut self, timeout: Duration) -> Result<Option<VisionSample>, EngineError> {
        let socket = self.socket.as_ref().ok_or_else(|| {
            EngineError::AuxiliarySourceUnavailable("vision socket not open".into())
        })?;
        socket
            .set_read_timeout(Some(timeout.max(Duration::from_millis(1))))
            .map_err(|e| EngineError::AuxiliarySourceUnavailable(e.to_string()))?;

        match socket.recv_from(&mut self.buf) {
            Ok((len, from)) => {
                let sample = parse_datagram(&self.buf[..len])?;
                debug!("Vision sample from {}: {:?}", from, sample);
                Ok(Some(sample))
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Ok(None)
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(None),
            Err(e) => Err(EngineError::AuxiliarySourceUnavailable(format!(
                "receive on {}: {}",
                self.addr, e
            ))),
        }
    }

    fn describe(&self) -> String {
        format!("udp://{}", self.addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mousestick_core::Severity;

    #[test]
    fn test_parse_whitespace_and_commas() {
        let s = parse_datagram(b"0.5 0.25 0.1\n").unwrap();
        assert_eq!((s.x, s.y, s.scale), (0.5, 0.25, 0.1));
        let s = parse_datagram(b"0.5,0.25, 0.1").unwrap();
        assert_eq!((s.x, s.y, s.scale), (0.5, 0.25, 0.1));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in [
            &b""[..],
            b"0.5 0.5",
            b"0.5 0.5 0.1 9",
            b"x 0.5 0.1",
            b"0.5 NaN 0.1",
            b"0.5 inf 0.1",
            &[0xff, 0xfe, 0x20],
        ] {
            let err = parse_datagram(bad).unwrap_err();
            assert_eq!(err.severity(), Severity::Transient, "{bad:?}");
        }
    }

    #[test]
    fn test_receive_over_loopback() {
        let mut source = UdpVisionSource::new("127.0.0.1:0".parse().unwrap());
        source.open().unwrap();
        let addr = source.local_addr().unwrap();

        assert_eq!(source.next_sample(Duration::from_millis(20)).unwrap(), None);

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        sender.send_to(b"0.4 0.6 0.08", addr).unwrap();
        sender.send_to(b"garbage", addr).unwrap();

        let sample = source.next_sample(Duration::from_secs(1)).unwrap().unwrap();
        assert_eq!((sample.x, sample.y, sample.scale), (0.4, 0.6, 0.08));
        let err = source.next_sample(Duration::from_secs(1)).unwrap_err();
        assert_eq!(err.severity(), Severity::Transient);
    }

    #[test]
    fn test_bind_failure_is_degraded() {
        let taken = UdpSocket::bind("127.0.0.1:0").unwrap();
        let mut source = UdpVisionSource::new(taken.local_addr().unwrap());
        let err = source.open().unwrap_err();
        assert_eq!(err.severity(), Severity::Degraded);
    }
}
