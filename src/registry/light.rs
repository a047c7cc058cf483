//! A single open device: driver, transport, and the small bit of state the
//! effect engine needs to drive keep-alives and report `list()` colour.
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::color::{Colour, LedIndex};
use crate::driver::{DeviceDriver, Keepalive};
use crate::error::Result;
use crate::transport::Transport;

/// Opaque, `Copy`, cloneable handle to a [`Light`] inside a [`super::Registry`].
///
/// Selections and scheduled tasks hold `LightId`s rather than references or
/// indices, so a snapshot replacement during re-enumeration never leaves a
/// dangling borrow or a silently-wrong index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LightId(pub(crate) u64);

/// What was last explicitly commanded on a `Light`, independent of any
/// in-flight keep-alive refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandedState {
    Off,
    Solid(Colour),
    Effect(String),
}

struct LightState {
    commanded: CommandedState,
    last_written: Option<(Colour, LedIndex)>,
}

/// Rebuilds a fresh transport from whatever locator this `Light` was opened
/// with. Supplied by the registry at construction time; absent for test
/// lights that don't need reopen behaviour exercised.
pub type ReopenFn = Arc<dyn Fn() -> Result<Box<dyn Transport>> + Send + Sync>;

/// One open device: identity, driver, transport, and last-commanded state.
///
/// The transport and driver are never exposed directly; all writes go
/// through [`Light::write_frames`] so a single per-`Light` mutex always
/// serializes access — one lock guarding one open device handle.
pub struct Light {
    pub id: LightId,
    pub vendor_id: u16,
    pub product_id: u16,
    pub os_path: Option<String>,
    pub serial: Option<String>,
    pub logical_name: String,
    pub led_count: u16,
    pub keepalive: Keepalive,
    pub write_timeout: Duration,
    driver: Arc<dyn DeviceDriver>,
    transport: Mutex<Box<dyn Transport>>,
    state: Mutex<LightState>,
    reopen_fn: Option<ReopenFn>,
}

impl Light {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: LightId,
        vendor_id: u16,
        product_id: u16,
        os_path: Option<String>,
        serial: Option<String>,
        logical_name: String,
        led_count: u16,
        keepalive: Keepalive,
        driver: Arc<dyn DeviceDriver>,
        transport: Box<dyn Transport>,
        write_timeout: Duration,
    ) -> Self {
        Self {
            id,
            vendor_id,
            product_id,
            os_path,
            serial,
            logical_name,
            led_count,
            keepalive,
            write_timeout,
            driver,
            transport: Mutex::new(transport),
            state: Mutex::new(LightState {
                commanded: CommandedState::Off,
                last_written: None,
            }),
            reopen_fn: None,
        }
    }

    #[must_use]
    pub fn with_reopen(mut self, reopen_fn: ReopenFn) -> Self {
        self.reopen_fn = Some(reopen_fn);
        self
    }

    /// Close the current handle and rebuild it from the stored locator.
    /// Lights with no `reopen_fn` (e.g. test doubles) treat reopen as a
    /// no-op success — there is nothing to rebuild.
    pub fn reopen(&self) -> Result<()> {
        let Some(reopen_fn) = &self.reopen_fn else {
            return Ok(());
        };
        self.close();
        let fresh = reopen_fn()?;
        *self.transport.lock() = fresh;
        Ok(())
    }

    #[must_use]
    pub fn driver(&self) -> &Arc<dyn DeviceDriver> {
        &self.driver
    }

    /// Write each `Frame` in order, holding this `Light`'s mutex for the
    /// duration — the FIFO ordering guarantee callers (the effect engine)
    /// rely on.
    pub fn write_frames(&self, frames: &[Vec<u8>]) -> Result<()> {
        let mut transport = self.transport.lock();
        for frame in frames {
            transport.write(frame)?;
        }
        Ok(())
    }

    pub fn close(&self) {
        log::info!("closing {}", self.logical_name);
        self.transport.lock().close();
    }

    #[must_use]
    pub fn commanded_state(&self) -> CommandedState {
        self.state.lock().commanded.clone()
    }

    pub fn set_commanded_state(&self, commanded: CommandedState) {
        self.state.lock().commanded = commanded;
    }

    /// Record the most recent `(colour, led)` pair actually written, so the
    /// keep-alive task can replay it without needing to remember anything
    /// itself.
    pub fn record_write(&self, color: Colour, led: LedIndex) {
        self.state.lock().last_written = Some((color, led));
    }

    #[must_use]
    pub fn last_write(&self) -> Option<(Colour, LedIndex)> {
        self.state.lock().last_written
    }

    /// Colour surfaced by `list()`: `None` when the light is off or has
    /// never been commanded.
    #[must_use]
    pub fn last_color(&self) -> Option<Colour> {
        match &self.state.lock().commanded {
            CommandedState::Off => None,
            CommandedState::Solid(c) => Some(*c),
            CommandedState::Effect(_) => self.state.lock().last_written.map(|(c, _)| c),
        }
    }
}

impl Drop for Light {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::blynclight::BlynclightDriver;
    use crate::transport::testing::RecordingTransport;

    fn test_light() -> (Light, RecordingTransport) {
        let transport = RecordingTransport::new();
        let light = Light::new(
            LightId(1),
            0x2C0D,
            0x0001,
            None,
            None,
            "Blynclight".into(),
            1,
            Keepalive::Stateless,
            Arc::new(BlynclightDriver),
            Box::new(transport.clone()),
            Duration::from_millis(200),
        );
        (light, transport)
    }

    #[test]
    fn write_frames_records_in_order() {
        let (light, recorder) = test_light();
        light
            .write_frames(&[vec![1, 2, 3], vec![4, 5, 6]])
            .unwrap();
        assert_eq!(recorder.frames(), vec![vec![1, 2, 3], vec![4, 5, 6]]);
    }

    #[test]
    fn last_color_reflects_commanded_state() {
        let (light, _recorder) = test_light();
        assert_eq!(light.last_color(), None);
        light.set_commanded_state(CommandedState::Solid(Colour::WHITE));
        assert_eq!(light.last_color(), Some(Colour::WHITE));
        light.set_commanded_state(CommandedState::Off);
        assert_eq!(light.last_color(), None);
    }

    #[test]
    fn close_is_idempotent() {
        let (light, recorder) = test_light();
        light.close();
        light.close();
        assert!(recorder.is_closed());
    }
}
