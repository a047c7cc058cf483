//! Line-oriented serial transport for the text-over-serial device family,
//! built on the `serialport` crate — the idiomatic choice for host-side
//! serial I/O in the Rust ecosystem.
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use crate::error::{LumenError, Result};
use crate::transport::Transport;

pub struct SerialTransport {
    port: Option<Box<dyn serialport::SerialPort>>,
}

impl SerialTransport {
    pub fn open(port_name: &str, baud_rate: u32, timeout: Duration) -> Result<Self> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(timeout)
            .open()
            .map_err(LumenError::from)?;

        Ok(Self { port: Some(port) })
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, frame: &[u8]) -> Result<()> {
        let Some(port) = self.port.as_mut() else {
            return Err(LumenError::Disconnected("port already closed".into()));
        };
        port.write_all(frame).map_err(|e| classify_io_error(&e))?;
        port.flush().map_err(|e| classify_io_error(&e))
    }

    fn read(&mut self, max_len: usize, timeout: Duration) -> Result<Vec<u8>> {
        let Some(port) = self.port.as_mut() else {
            return Err(LumenError::Disconnected("port already closed".into()));
        };
        port.set_timeout(timeout).map_err(LumenError::from)?;
        let mut buf = vec![0u8; max_len];
        match port.read(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            }
            Err(e) if e.kind() == ErrorKind::TimedOut => Err(LumenError::Timeout(timeout)),
            Err(e) => Err(classify_io_error(&e)),
        }
    }

    fn close(&mut self) {
        self.port = None;
    }
}

fn classify_io_error(err: &std::io::Error) -> LumenError {
    match err.kind() {
        ErrorKind::TimedOut => LumenError::Timeout(Duration::default()),
        ErrorKind::PermissionDenied => LumenError::PermissionDenied(err.to_string()),
        ErrorKind::NotConnected | ErrorKind::BrokenPipe => {
            LumenError::Disconnected(err.to_string())
        }
        _ => LumenError::Io(err.to_string()),
    }
}

/// Terminate a driver-built ASCII command with the line separator the text
/// family's firmware expects.
#[must_use]
pub fn terminate_line(command: &str) -> Vec<u8> {
    let mut bytes = command.as_bytes().to_vec();
    bytes.push(b'\n');
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminate_line_appends_newline() {
        assert_eq!(terminate_line("COLOR 255,0,0"), b"COLOR 255,0,0\n".to_vec());
    }
}
