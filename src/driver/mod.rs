//! Device drivers: one implementation per supported product family,
//! translating semantic commands into the exact byte layout that family's
//! firmware expects. Every encoder function here is pure and infallible —
//! getting the produced [`Frame`]s onto the wire is the caller's job.
pub mod blinkstick;
pub mod blynclight;
pub mod luxafor;
pub mod mute;
pub mod programmable64;
pub mod serial_text;

use crate::color::{Colour, LedIndex};
use crate::transport::Frame;

/// Whether a device family's firmware auto-quiesces without a periodic
/// refresh frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keepalive {
    /// Firmware holds the last commanded state until the next write.
    Stateless,
    /// Firmware reverts to dark unless refreshed at least every
    /// `interval_s` seconds.
    Stateful { interval_s: u32 },
}

/// Which physical wire type a driver's device sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Hid,
    Serial,
}

/// Static facts about a product family, independent of any open device.
#[derive(Debug, Clone)]
pub struct Identity {
    pub vendor_id: u16,
    pub product_id: u16,
    pub logical_name: &'static str,
    pub led_count: u16,
    pub transport_kind: TransportKind,
    pub keepalive: Keepalive,
}

/// The command surface every device family implements identically; only
/// the byte layout produced differs.
pub trait DeviceDriver: Send + Sync {
    fn identity(&self) -> Identity;

    /// Quantise an input colour to whatever precision this family's wire
    /// format actually supports, before any `encode_*` call. The default is
    /// the identity (full 8-bit channels); the 2-byte "mute" family overrides
    /// this to threshold each channel to a single bit.
    fn quantize(&self, color: Colour) -> Colour {
        color
    }

    /// Encode a steady solid colour on `led`. A `Frame` per physical write;
    /// for single-report families this is always exactly one `Frame`.
    fn encode_solid(&self, color: Colour, led: LedIndex) -> Vec<Frame>;

    /// Encode the "off" command for `led`.
    fn encode_off(&self, led: LedIndex) -> Vec<Frame>;

    /// Encode the periodic keep-alive refresh for `color` on `led`, if this
    /// family is stateful. Returns `None` for stateless families — the
    /// engine never calls this for a `Keepalive::Stateless` driver, but the
    /// method still exists so callers don't need to special-case by family.
    fn encode_keepalive(&self, color: Colour, led: LedIndex) -> Option<Frame>;

    /// Encode a hardware-native blink, for the minority of families whose
    /// firmware implements it directly. `None` means the engine must
    /// synthesise blink from `encode_solid`/`encode_off`.
    fn encode_blink_native(
        &self,
        _on: Colour,
        _off: Colour,
        _speed: BlinkSpeed,
        _led: LedIndex,
    ) -> Option<Vec<Frame>> {
        None
    }
}

/// Native blink speed, shared vocabulary across families that support it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlinkSpeed {
    Slow,
    Medium,
    Fast,
}

/// One entry in the static registration table: a `(vendor_id, product_id)`
/// pair and a constructor for the driver that handles it.
pub struct DriverEntry {
    pub vendor_id: u16,
    pub product_id: u16,
    pub construct: fn() -> Box<dyn DeviceDriver>,
}

/// The compile-time list of supported drivers, in registration order.
///
/// Registration order is the tie-break when more than one entry matches a
/// `(vendor_id, product_id)` pair: the first match in this slice wins.
#[must_use]
pub fn registration_table() -> &'static [DriverEntry] {
    &[
        DriverEntry {
            vendor_id: blynclight::VENDOR_ID,
            product_id: blynclight::PRODUCT_ID,
            construct: || Box::new(blynclight::BlynclightDriver),
        },
        DriverEntry {
            vendor_id: programmable64::VENDOR_ID,
            product_id: programmable64::PRODUCT_ID,
            construct: || Box::new(programmable64::Programmable64Driver),
        },
        DriverEntry {
            vendor_id: luxafor::VENDOR_ID,
            product_id: luxafor::PRODUCT_ID,
            construct: || Box::new(luxafor::LuxaforDriver),
        },
        DriverEntry {
            vendor_id: blinkstick::VENDOR_ID,
            product_id: blinkstick::PRODUCT_ID,
            construct: || Box::new(blinkstick::BlinkstickDriver::default()),
        },
        DriverEntry {
            vendor_id: mute::VENDOR_ID,
            product_id: mute::PRODUCT_ID,
            construct: || Box::new(mute::MuteDriver),
        },
        // The text-over-serial family has no USB vendor/product id (it
        // enumerates as a serial port, matched by name pattern instead);
        // `registry` constructs it directly rather than through this table.
    ]
}

/// Look up the driver for a `(vendor_id, product_id)` pair, honouring
/// registration order when more than one entry could match (stable, tested
/// by [`tests::registration_order_is_stable`]).
#[must_use]
pub fn find_driver(vendor_id: u16, product_id: u16) -> Option<Box<dyn DeviceDriver>> {
    registration_table()
        .iter()
        .find(|e| e.vendor_id == vendor_id && e.product_id == product_id)
        .map(|e| (e.construct)())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_order_is_stable() {
        let table = registration_table();
        let order: Vec<(u16, u16)> = table.iter().map(|e| (e.vendor_id, e.product_id)).collect();
        let order_again: Vec<(u16, u16)> = registration_table()
            .iter()
            .map(|e| (e.vendor_id, e.product_id))
            .collect();
        assert_eq!(order, order_again);
    }

    #[test]
    fn unknown_pair_yields_no_driver() {
        assert!(find_driver(0xFFFF, 0xFFFF).is_none());
    }
}
