//! Transport adapters: the two physical wire types a driver can sit on top
//! of. A transport owns exactly one OS handle at a time and is strictly
//! single-threaded per handle; serialization across callers is the Light's
//! job (a per-Light mutex), never the transport's.
pub mod hid;
pub mod serial;

use std::time::Duration;

use crate::error::Result;

/// One complete packet a driver hands the transport for a single write.
///
/// A `Frame` for a multi-report command is still a single logical write as
/// far as callers are concerned; drivers that need several physical writes
/// return several `Frame`s and the caller writes them in order.
pub type Frame = Vec<u8>;

/// Locator used by [`Transport::open`]. HID devices are identified by
/// vendor/product id (and, for disambiguating identical pairs, an OS path);
/// serial devices are identified by port name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Hid {
        vendor_id: u16,
        product_id: u16,
        path: Option<String>,
    },
    Serial {
        port_name: String,
        baud_rate: u32,
    },
}

/// Common contract shared by every wire-type adapter.
///
/// On platforms where HID writes require a leading zero-byte report-id
/// prefix, the adapter prepends/strips it transparently — drivers never see
/// the platform distinction, only the logical report bytes.
pub trait Transport: Send {
    /// Write a complete frame. The write is bounded by the transport's
    /// configured timeout; a timed-out write is classified `Io` and the
    /// caller (the effect engine) decides whether to retry.
    fn write(&mut self, frame: &[u8]) -> Result<()>;

    /// Read up to `max_len` bytes, bounded by `timeout`. Only implemented
    /// meaningfully for HID devices exposing button/touch input; serial
    /// drivers in this crate never call it. Returns `Unsupported` when the
    /// concrete transport has nothing sensible to read.
    fn read(&mut self, max_len: usize, timeout: Duration) -> Result<Vec<u8>>;

    /// Idempotent close. Called explicitly on shutdown and implicitly on
    /// drop; safe to call more than once.
    fn close(&mut self);
}

#[cfg(test)]
pub mod testing {
    //! An in-memory `Transport` double used by driver, engine, and
    //! controller tests. Records every frame written so tests can assert
    //! on exact wire bytes without touching real hardware.
    use super::{Result, Transport};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Default, Clone)]
    pub struct RecordingTransport {
        pub writes: Arc<Mutex<Vec<Vec<u8>>>>,
        pub fail_next_n_writes: Arc<Mutex<usize>>,
        closed: Arc<Mutex<bool>>,
    }

    impl RecordingTransport {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        #[must_use]
        pub fn frames(&self) -> Vec<Vec<u8>> {
            self.writes.lock().unwrap().clone()
        }

        pub fn fail_next(&self, n: usize) {
            *self.fail_next_n_writes.lock().unwrap() = n;
        }

        #[must_use]
        pub fn is_closed(&self) -> bool {
            *self.closed.lock().unwrap()
        }
    }

    impl Transport for RecordingTransport {
        fn write(&mut self, frame: &[u8]) -> Result<()> {
            let mut remaining = self.fail_next_n_writes.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(crate::error::LumenError::Io("simulated failure".into()));
            }
            self.writes.lock().unwrap().push(frame.to_vec());
            Ok(())
        }

        fn read(&mut self, _max_len: usize, _timeout: Duration) -> Result<Vec<u8>> {
            Err(crate::error::LumenError::Unsupported(
                "recording transport has no read data".into(),
            ))
        }

        fn close(&mut self) {
            *self.closed.lock().unwrap() = true;
        }
    }
}
