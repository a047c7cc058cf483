//! Device enumeration, abstracted behind a trait so the registry's plug/
//! unplug and lookup logic can be tested without touching real hardware —
//! separating "what devices exist" from "how do we ask the OS what's
//! plugged in".
use std::sync::{Arc, Mutex};

/// One device as reported by enumeration, before any driver has matched it.
#[derive(Debug, Clone, Default)]
pub struct DiscoveredDevice {
    pub vendor_id: u16,
    pub product_id: u16,
    pub path: Option<String>,
    pub serial: Option<String>,
    pub port_name: Option<String>,
}

/// A source of [`DiscoveredDevice`]s: real HID/serial enumeration in
/// production, a fixed or mutable list in tests.
pub trait DeviceSource: Send + Sync {
    fn enumerate(&self) -> Vec<DiscoveredDevice>;

    /// Needed because the registry's poll thread owns its sources by value;
    /// implemented trivially for the zero-sized real sources and by cloning
    /// the shared inner list for `FakeDeviceSource`.
    fn clone_box(&self) -> Box<dyn DeviceSource>;
}

/// Real HID enumeration via `hidapi`.
pub struct HidDeviceSource;

impl DeviceSource for HidDeviceSource {
    fn enumerate(&self) -> Vec<DiscoveredDevice> {
        let Ok(api) = hidapi::HidApi::new() else {
            return Vec::new();
        };
        api.device_list()
            .map(|info| DiscoveredDevice {
                vendor_id: info.vendor_id(),
                product_id: info.product_id(),
                path: info.path().to_str().ok().map(str::to_string),
                serial: info.serial_number().map(str::to_string),
                port_name: None,
            })
            .collect()
    }

    fn clone_box(&self) -> Box<dyn DeviceSource> {
        Box::new(Self)
    }
}

/// Real serial port enumeration via `serialport`.
pub struct SerialDeviceSource;

impl DeviceSource for SerialDeviceSource {
    fn enumerate(&self) -> Vec<DiscoveredDevice> {
        serialport::available_ports()
            .unwrap_or_default()
            .into_iter()
            .map(|p| DiscoveredDevice {
                vendor_id: 0,
                product_id: 0,
                path: None,
                serial: None,
                port_name: Some(p.port_name),
            })
            .collect()
    }

    fn clone_box(&self) -> Box<dyn DeviceSource> {
        Box::new(Self)
    }
}

/// Test double: an injectable, mutable device list. Cheap to clone — the
/// inner `Vec` is shared, so pushing to one handle is visible to every
/// clone (including the one the registry's poll thread owns).
#[derive(Clone, Default)]
pub struct FakeDeviceSource {
    devices: Arc<Mutex<Vec<DiscoveredDevice>>>,
}

impl FakeDeviceSource {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn push(&self, device: DiscoveredDevice) {
        self.devices.lock().unwrap().push(device);
    }

    pub fn clear(&self) {
        self.devices.lock().unwrap().clear();
    }
}

impl DeviceSource for FakeDeviceSource {
    fn enumerate(&self) -> Vec<DiscoveredDevice> {
        self.devices.lock().unwrap().clone()
    }

    fn clone_box(&self) -> Box<dyn DeviceSource> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_source_shares_state_across_clones() {
        let source = FakeDeviceSource::empty();
        let clone = source.clone();
        source.push(DiscoveredDevice {
            vendor_id: 1,
            product_id: 2,
            ..Default::default()
        });
        assert_eq!(clone.enumerate().len(), 1);
    }
}
