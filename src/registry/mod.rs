//! Device enumeration, per-device ownership, and snapshot publication.
//!
//! The registry is the only owner of a [`Light`]'s driver and OS handle.
//! It enumerates on a dedicated poll thread — one thread, channel-driven,
//! rather than a timer per device — and publishes new snapshots atomically
//! so readers never observe a mid-mutation view.
mod light;
mod source;

pub use light::{CommandedState, Light, LightId};
pub use source::{DeviceSource, DiscoveredDevice, HidDeviceSource, SerialDeviceSource};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::RwLock;
use regex::Regex;
use serde::Serialize;

use crate::color::Colour;
use crate::config::CoreConfig;
use crate::driver;
use crate::driver::serial_text::SerialTextDriver;
use crate::error::{LumenError, Result};
use crate::transport::hid::HidTransport;
use crate::transport::serial::SerialTransport;
use crate::transport::Transport;

/// Stable-within-a-snapshot identity record, as returned by `list()` and
/// delivered to plug/unplug callbacks.
#[derive(Debug, Clone, Serialize)]
pub struct LightIdentity {
    pub index: usize,
    pub logical_name: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub serial: Option<String>,
    pub is_acquired: bool,
    pub last_color: Option<Colour>,
}

/// Atomically-published view of all currently-open lights.
#[derive(Default)]
pub struct Snapshot {
    lights: Vec<Arc<Light>>,
}

impl Snapshot {
    #[must_use]
    pub fn len(&self) -> usize {
        self.lights.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    #[must_use]
    pub fn all(&self) -> Vec<Arc<Light>> {
        self.lights.clone()
    }

    #[must_use]
    pub fn by_index(&self, i: usize) -> Option<Arc<Light>> {
        self.lights.get(i).cloned()
    }

    /// Exact-name match, with an optional 1-based `count` selecting the Nth
    /// duplicate. Unknown names produce an empty result, never an error.
    #[must_use]
    pub fn by_name(&self, name: &str, count: Option<usize>) -> Vec<Arc<Light>> {
        let matches: Vec<Arc<Light>> = self
            .lights
            .iter()
            .filter(|l| l.logical_name == name)
            .cloned()
            .collect();
        match count {
            None => matches,
            Some(n) if n >= 1 => matches.get(n - 1).cloned().into_iter().collect(),
            Some(_) => Vec::new(),
        }
    }

    /// Regex match against `logical_name`. Regex misses produce an empty
    /// Selection, never an error (the error is surfaced at construction
    /// time of the pattern itself, not at match time).
    #[must_use]
    pub fn by_pattern(&self, re: &Regex) -> Vec<Arc<Light>> {
        self.lights
            .iter()
            .filter(|l| re.is_match(&l.logical_name))
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn identities(&self) -> Vec<LightIdentity> {
        self.lights
            .iter()
            .enumerate()
            .map(|(index, l)| LightIdentity {
                index,
                logical_name: l.logical_name.clone(),
                vendor_id: l.vendor_id,
                product_id: l.product_id,
                serial: l.serial.clone(),
                is_acquired: true,
                last_color: l.last_color(),
            })
            .collect()
    }
}

type PlugCallback = Box<dyn Fn(&LightIdentity) + Send + Sync>;
type RemovedHook = Box<dyn Fn(LightId) + Send + Sync>;

#[derive(Default)]
struct Callbacks {
    plugged: Vec<PlugCallback>,
    unplugged: Vec<PlugCallback>,
    removed: Vec<RemovedHook>,
}

/// Owns device enumeration, the live set of [`Light`]s, and the poll thread.
pub struct Registry {
    snapshot: Arc<RwLock<Arc<Snapshot>>>,
    callbacks: Arc<Mutex<Callbacks>>,
    config: CoreConfig,
    next_id: Arc<AtomicU64>,
    hid_source: Box<dyn DeviceSource>,
    serial_source: Box<dyn DeviceSource>,
    poll_stop: Option<mpsc::Sender<()>>,
    poll_handle: Option<thread::JoinHandle<()>>,
}

use parking_lot::Mutex;

impl Registry {
    /// Enumerate once; never polls. Useful for one-shot callers and tests.
    #[must_use]
    pub fn new(config: CoreConfig) -> Self {
        Self::with_sources(
            config,
            Box::new(HidDeviceSource),
            Box::new(SerialDeviceSource),
        )
    }

    #[must_use]
    pub fn with_sources(
        config: CoreConfig,
        hid_source: Box<dyn DeviceSource>,
        serial_source: Box<dyn DeviceSource>,
    ) -> Self {
        let mut registry = Self {
            snapshot: Arc::new(RwLock::new(Arc::new(Snapshot::default()))),
            callbacks: Arc::new(Mutex::new(Callbacks::default())),
            config,
            next_id: Arc::new(AtomicU64::new(1)),
            hid_source,
            serial_source,
            poll_stop: None,
            poll_handle: None,
        };
        registry.enumerate_once();
        registry
    }

    /// Enumerate once, then spawn the dedicated poll thread (default 1s
    /// interval). Dropping or calling [`Registry::shutdown`] stops the
    /// thread.
    #[must_use]
    pub fn with_poller(config: CoreConfig) -> Self {
        let mut registry = Self::new(config);
        registry.start_poller();
        registry
    }

    pub(crate) fn start_poller(&mut self) {
        if self.poll_handle.is_some() {
            return;
        }
        let (tx, rx) = mpsc::channel::<()>();
        let snapshot = Arc::clone(&self.snapshot);
        let callbacks = Arc::clone(&self.callbacks);
        let next_id = Arc::clone(&self.next_id);
        let config = self.config.clone();
        let hid_source = self.hid_source.clone_box();
        let serial_source = self.serial_source.clone_box();
        let interval = self.config.poll_interval;

        let handle = thread::Builder::new()
            .name("lumenctl-registry-poll".into())
            .spawn(move || loop {
                match rx.recv_timeout(interval) {
                    Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
                    Err(mpsc::RecvTimeoutError::Timeout) => {
                        let new = enumerate(
                            hid_source.as_ref(),
                            serial_source.as_ref(),
                            &config,
                            &next_id,
                        );
                        publish(&snapshot, &callbacks, new);
                    }
                }
            })
            .expect("failed to spawn registry poll thread");

        self.poll_stop = Some(tx);
        self.poll_handle = Some(handle);
    }

    fn enumerate_once(&mut self) {
        let new = enumerate(
            self.hid_source.as_ref(),
            self.serial_source.as_ref(),
            &self.config,
            &self.next_id,
        );
        publish(&self.snapshot, &self.callbacks, new);
    }

    /// Force a synchronous re-enumeration outside the poll cadence (used by
    /// tests and by callers that want a deterministic refresh point).
    pub fn refresh(&mut self) {
        self.enumerate_once();
    }

    #[must_use]
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.read().clone()
    }

    #[must_use]
    pub fn list(&self) -> Vec<LightIdentity> {
        self.snapshot().identities()
    }

    pub fn on_light_plugged<F>(&self, cb: F)
    where
        F: Fn(&LightIdentity) + Send + Sync + 'static,
    {
        self.callbacks.lock().plugged.push(Box::new(cb));
    }

    pub fn on_light_unplugged<F>(&self, cb: F)
    where
        F: Fn(&LightIdentity) + Send + Sync + 'static,
    {
        self.callbacks.lock().unplugged.push(Box::new(cb));
    }

    /// Internal-only hook fired with a bare `LightId` on unplug, separate
    /// from [`Registry::on_light_unplugged`]'s `LightIdentity` callback —
    /// lets `Controller` tell the effect engine to cancel that Light's
    /// Tasks without the registry depending on the engine's types.
    pub(crate) fn on_light_removed<F>(&self, cb: F)
    where
        F: Fn(LightId) + Send + Sync + 'static,
    {
        self.callbacks.lock().removed.push(Box::new(cb));
    }

    /// Stop the poller, close every handle. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.poll_stop.take() {
            drop(tx);
        }
        if let Some(handle) = self.poll_handle.take() {
            let _ = handle.join();
        }
        let empty = Arc::new(Snapshot::default());
        *self.snapshot.write() = empty;
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn enumerate(
    hid_source: &dyn DeviceSource,
    serial_source: &dyn DeviceSource,
    config: &CoreConfig,
    next_id: &AtomicU64,
) -> Vec<Arc<Light>> {
    let mut lights = Vec::new();

    for dev in hid_source.enumerate() {
        let Some(driver) = driver::find_driver(dev.vendor_id, dev.product_id) else {
            continue;
        };
        match open_hid_light(&dev, driver, config, next_id) {
            Ok(light) => {
                log::info!(
                    "opened {} at {:04x}:{:04x}",
                    light.logical_name,
                    light.vendor_id,
                    light.product_id
                );
                lights.push(Arc::new(light));
            }
            Err(e) => {
                log::warn!(
                    "skipping HID device {:04x}:{:04x}: {e}",
                    dev.vendor_id,
                    dev.product_id
                );
            }
        }
    }

    for dev in serial_source.enumerate() {
        let Some(port_name) = dev.port_name.clone() else {
            continue;
        };
        if !serial_text_port_matches(&port_name, config) {
            continue;
        }
        match open_serial_light(&port_name, config, next_id) {
            Ok(light) => {
                log::info!("opened {} on {port_name}", light.logical_name);
                lights.push(Arc::new(light));
            }
            Err(e) => log::warn!("skipping serial device {port_name}: {e}"),
        }
    }

    lights
}

fn serial_text_port_matches(port_name: &str, config: &CoreConfig) -> bool {
    config
        .serial_port_pattern
        .as_ref()
        .map_or(true, |re| re.is_match(port_name))
}

fn open_hid_light(
    dev: &DiscoveredDevice,
    driver: Box<dyn driver::DeviceDriver>,
    config: &CoreConfig,
    next_id: &AtomicU64,
) -> Result<Light> {
    let transport: Box<dyn Transport> = Box::new(HidTransport::open(
        dev.vendor_id,
        dev.product_id,
        dev.path.as_deref(),
        config.write_timeout,
    )?);
    let identity = driver.identity();
    let logical_name = identity.logical_name.to_string();
    let id = LightId(next_id.fetch_add(1, Ordering::Relaxed));
    let reopen_vendor_id = dev.vendor_id;
    let reopen_product_id = dev.product_id;
    let reopen_path = dev.path.clone();
    let reopen_write_timeout = config.write_timeout;
    let reopen: light::ReopenFn = Arc::new(move || {
        HidTransport::open(
            reopen_vendor_id,
            reopen_product_id,
            reopen_path.as_deref(),
            reopen_write_timeout,
        )
        .map(|t| Box::new(t) as Box<dyn Transport>)
    });
    Ok(Light::new(
        id,
        dev.vendor_id,
        dev.product_id,
        dev.path.clone(),
        dev.serial.clone(),
        logical_name,
        identity.led_count,
        identity.keepalive,
        Arc::from(driver),
        transport,
        config.write_timeout,
    )
    .with_reopen(reopen))
}

fn open_serial_light(
    port_name: &str,
    config: &CoreConfig,
    next_id: &AtomicU64,
) -> Result<Light> {
    let driver: Box<dyn driver::DeviceDriver> = Box::new(SerialTextDriver);
    let transport: Box<dyn Transport> = Box::new(SerialTransport::open(
        port_name,
        config.serial_baud_rate,
        config.write_timeout,
    )?);
    let identity = driver.identity();
    let id = LightId(next_id.fetch_add(1, Ordering::Relaxed));
    let reopen_port_name = port_name.to_string();
    let reopen_baud_rate = config.serial_baud_rate;
    let reopen_timeout = config.write_timeout;
    let reopen: light::ReopenFn = Arc::new(move || {
        SerialTransport::open(&reopen_port_name, reopen_baud_rate, reopen_timeout)
            .map(|t| Box::new(t) as Box<dyn Transport>)
    });
    Ok(Light::new(
        id,
        identity.vendor_id,
        identity.product_id,
        Some(port_name.to_string()),
        None,
        identity.logical_name.to_string(),
        identity.led_count,
        identity.keepalive,
        Arc::from(driver),
        transport,
        config.write_timeout,
    )
    .with_reopen(reopen))
}

fn publish(
    snapshot: &Arc<RwLock<Arc<Snapshot>>>,
    callbacks: &Arc<Mutex<Callbacks>>,
    new_lights: Vec<Arc<Light>>,
) {
    let old = snapshot.read().clone();

    let plugged: Vec<Arc<Light>> = new_lights
        .iter()
        .filter(|l| !old.lights.iter().any(|o| matches_device(o, l)))
        .cloned()
        .collect();
    let unplugged: Vec<Arc<Light>> = old
        .lights
        .iter()
        .filter(|o| !new_lights.iter().any(|l| matches_device(o, l)))
        .cloned()
        .collect();

    let new_snapshot = Arc::new(Snapshot { lights: new_lights });
    *snapshot.write() = new_snapshot.clone();

    let cbs = callbacks.lock();
    for light in &plugged {
        let identity = identity_for(&new_snapshot, light);
        log::info!(
            "plugged: {} ({:04x}:{:04x})",
            identity.logical_name,
            identity.vendor_id,
            identity.product_id
        );
        for cb in &cbs.plugged {
            cb(&identity);
        }
    }
    for light in &unplugged {
        let identity = identity_for(&new_snapshot, light);
        log::info!(
            "unplugged: {} ({:04x}:{:04x})",
            identity.logical_name,
            identity.vendor_id,
            identity.product_id
        );
        for cb in &cbs.unplugged {
            cb(&identity);
        }
        for hook in &cbs.removed {
            hook(light.id);
        }
    }
}

fn matches_device(a: &Light, b: &Light) -> bool {
    a.vendor_id == b.vendor_id
        && a.product_id == b.product_id
        && a.os_path == b.os_path
        && a.serial == b.serial
}

fn identity_for(snapshot: &Snapshot, light: &Arc<Light>) -> LightIdentity {
    let index = snapshot
        .lights
        .iter()
        .position(|l| Arc::ptr_eq(l, light))
        .unwrap_or(0);
    LightIdentity {
        index,
        logical_name: light.logical_name.clone(),
        vendor_id: light.vendor_id,
        product_id: light.product_id,
        serial: light.serial.clone(),
        is_acquired: true,
        last_color: light.last_color(),
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(CoreConfig::default())
    }
}

/// The default serial port name pattern used to recognise text-over-serial
/// devices.
pub fn default_serial_pattern() -> Result<Regex> {
    Regex::new(r"(?i)usbserial|usbmodem|ttyACM|ttyUSB|COM\d+").map_err(LumenError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::source::FakeDeviceSource;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn s5_plug_event_fires_exactly_once_and_list_grows() {
        let fake_hid = FakeDeviceSource::empty();
        let fake_serial = FakeDeviceSource::empty();
        let mut registry = Registry::with_sources(
            CoreConfig::default(),
            Box::new(fake_hid.clone()),
            Box::new(fake_serial),
        );
        assert_eq!(registry.list().len(), 0);

        let plug_count = Arc::new(AtomicUsize::new(0));
        let plug_count_cb = Arc::clone(&plug_count);
        registry.on_light_plugged(move |_identity| {
            plug_count_cb.fetch_add(1, Ordering::SeqCst);
        });

        fake_hid.push(DiscoveredDevice {
            vendor_id: driver::luxafor::VENDOR_ID,
            product_id: driver::luxafor::PRODUCT_ID,
            path: None,
            serial: None,
            port_name: None,
        });

        let before = registry.list().len();
        registry.refresh();
        let after = registry.list().len();

        assert_eq!(plug_count.load(Ordering::SeqCst), 1);
        assert!(after > before);
    }

    #[test]
    fn lookup_by_name_with_duplicate_count() {
        let fake_hid = FakeDeviceSource::empty();
        fake_hid.push(DiscoveredDevice {
            vendor_id: driver::luxafor::VENDOR_ID,
            product_id: driver::luxafor::PRODUCT_ID,
            path: Some("p1".into()),
            serial: None,
            port_name: None,
        });
        fake_hid.push(DiscoveredDevice {
            vendor_id: driver::luxafor::VENDOR_ID,
            product_id: driver::luxafor::PRODUCT_ID,
            path: Some("p2".into()),
            serial: None,
            port_name: None,
        });
        let registry = Registry::with_sources(
            CoreConfig::default(),
            Box::new(fake_hid),
            Box::new(FakeDeviceSource::empty()),
        );
        let snap = registry.snapshot();
        assert_eq!(snap.by_name("Luxafor", None).len(), 2);
        assert_eq!(snap.by_name("Luxafor", Some(1)).len(), 1);
        assert_eq!(snap.by_name("nonexistent", None).len(), 0);
    }

    #[test]
    fn lookup_by_pattern_never_errors_on_miss() {
        let registry = Registry::new(CoreConfig::default());
        let re = Regex::new("^nothing-matches-this$").unwrap();
        assert!(registry.snapshot().by_pattern(&re).is_empty());
    }
}
