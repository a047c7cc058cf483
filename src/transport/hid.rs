//! HID report transport, built on `hidapi`: one open handle, one `HidApi`
//! instance kept alive for the lifetime of the device, writes mapped
//! through the crate error type.
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use hidapi::{HidApi, HidDevice};

use crate::error::{LumenError, Result};
use crate::transport::Transport;

/// An open HID device handle.
///
/// `HidDevice` is `Send` but not `Sync`; callers serialize access with a
/// per-Light mutex.
pub struct HidTransport {
    device: Option<HidDevice>,
    // Kept alive: HidApi must outlive every HidDevice it opened.
    _api: HidApi,
    write_timeout: Duration,
}

impl HidTransport {
    /// Open the first device matching `vendor_id`/`product_id`, optionally
    /// disambiguated by `path` when more than one device shares that pair.
    /// `write_timeout` bounds every subsequent `write` call.
    pub fn open(vendor_id: u16, product_id: u16, path: Option<&str>, write_timeout: Duration) -> Result<Self> {
        let api = HidApi::new().map_err(|e| LumenError::Io(e.to_string()))?;

        let device = if let Some(path) = path {
            let target = std::ffi::CString::new(path)
                .map_err(|_| LumenError::InvalidArgument("invalid device path".into()))?;
            api.open_path(&target)
        } else {
            api.open(vendor_id, product_id)
        };

        let device = device.map_err(|e| classify_open_error(&e))?;

        Ok(Self {
            device: Some(device),
            _api: api,
            write_timeout,
        })
    }

    /// Product string reported by the device, if any (used to build a
    /// `Light`'s logical name when the driver doesn't hardcode one).
    #[must_use]
    pub fn product_string(&self) -> Option<String> {
        self.device
            .as_ref()
            .and_then(|d| d.get_product_string().ok().flatten())
    }

    /// Serial number reported by the device, if any.
    #[must_use]
    pub fn serial_number(&self) -> Option<String> {
        self.device
            .as_ref()
            .and_then(|d| d.get_serial_number_string().ok().flatten())
    }
}

fn classify_open_error(err: &hidapi::HidError) -> LumenError {
    let msg = err.to_string();
    let lower = msg.to_lowercase();
    if lower.contains("permission") || lower.contains("access") {
        LumenError::PermissionDenied(msg)
    } else if lower.contains("busy") || lower.contains("in use") {
        LumenError::Busy(msg)
    } else {
        LumenError::NotFound
    }
}

impl Transport for HidTransport {
    /// Bounded by `write_timeout`: the write runs on a detached thread since
    /// `HidDevice` isn't `Sync` and there is no cancellable hidapi call. A
    /// timeout abandons that thread along with the device handle it took
    /// ownership of, leaving this transport closed until the caller reopens
    /// it — the same state a `Disconnected` write would leave behind.
    fn write(&mut self, frame: &[u8]) -> Result<()> {
        let Some(device) = self.device.take() else {
            return Err(LumenError::Disconnected("device already closed".into()));
        };
        let frame = frame.to_vec();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let result = match device.write(&frame) {
                Ok(n) if n == frame.len() => Ok(()),
                Ok(_) => Err(LumenError::Io("short HID write".into())),
                Err(e) => Err(classify_write_error(&e)),
            };
            let _ = tx.send((device, result));
        });
        match rx.recv_timeout(self.write_timeout) {
            Ok((device, result)) => {
                self.device = Some(device);
                result
            }
            Err(_) => Err(LumenError::Timeout(self.write_timeout)),
        }
    }

    fn read(&mut self, max_len: usize, timeout: Duration) -> Result<Vec<u8>> {
        let Some(device) = self.device.as_ref() else {
            return Err(LumenError::Disconnected("device already closed".into()));
        };
        let mut buf = vec![0u8; max_len];
        let timeout_ms = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
        match device.read_timeout(&mut buf, timeout_ms) {
            Ok(0) => Err(LumenError::Timeout(timeout)),
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            }
            Err(e) => Err(classify_write_error(&e)),
        }
    }

    fn close(&mut self) {
        self.device = None;
    }
}

fn classify_write_error(err: &hidapi::HidError) -> LumenError {
    let msg = err.to_string();
    if msg.to_lowercase().contains("disconnect") {
        LumenError::Disconnected(msg)
    } else {
        LumenError::Io(msg)
    }
}
