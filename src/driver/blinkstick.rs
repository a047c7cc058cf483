//! BlinkStick-style family: variable-length reports selected by a leading
//! report-id byte, 24-bit colour written as G,R,B (not R,G,B). Firmware
//! never implements blink — [`DeviceDriver::encode_blink_native`] keeps the
//! default `None` implementation, so the engine always synthesises it.
use crate::color::{Colour, LedIndex};
use crate::driver::{DeviceDriver, Identity, Keepalive, TransportKind};
use crate::transport::Frame;

pub const VENDOR_ID: u16 = 0x20A0;
pub const PRODUCT_ID: u16 = 0x41E5;

const REPORT_INDEXED: u8 = 5;
const REPORT_DATAFRAME_BASE: u8 = 6; // 6 = 8 LEDs, 7 = 16, 8 = 32, 9 = 64

/// A BlinkStick device with a configurable LED count (single-LED,
/// 8/16/32/64-LED variants all share the same wire format family).
pub struct BlinkstickDriver {
    led_count: u16,
}

impl Default for BlinkstickDriver {
    fn default() -> Self {
        Self { led_count: 8 }
    }
}

impl BlinkstickDriver {
    #[must_use]
    pub fn with_led_count(led_count: u16) -> Self {
        Self { led_count }
    }

    fn dataframe_report_id(&self) -> u8 {
        match self.led_count {
            0..=8 => REPORT_DATAFRAME_BASE,
            9..=16 => REPORT_DATAFRAME_BASE + 1,
            17..=32 => REPORT_DATAFRAME_BASE + 2,
            _ => REPORT_DATAFRAME_BASE + 3,
        }
    }

    fn dataframe(&self, color: Colour) -> Frame {
        let slots = self.dataframe_report_id_slot_count();
        let mut buf = Vec::with_capacity(2 + slots * 3);
        buf.push(self.dataframe_report_id());
        buf.push(0); // channel
        for _ in 0..slots {
            buf.extend_from_slice(&[color.g, color.r, color.b]);
        }
        buf
    }

    fn dataframe_report_id_slot_count(&self) -> usize {
        match self.dataframe_report_id() - REPORT_DATAFRAME_BASE {
            0 => 8,
            1 => 16,
            2 => 32,
            _ => 64,
        }
    }

    fn indexed(&self, color: Colour, led: LedIndex) -> Frame {
        vec![REPORT_INDEXED, 0, led.0 as u8, color.g, color.r, color.b]
    }
}

impl DeviceDriver for BlinkstickDriver {
    fn identity(&self) -> Identity {
        Identity {
            vendor_id: VENDOR_ID,
            product_id: PRODUCT_ID,
            logical_name: "BlinkStick",
            led_count: self.led_count,
            transport_kind: TransportKind::Hid,
            keepalive: Keepalive::Stateless,
        }
    }

    fn encode_solid(&self, color: Colour, led: LedIndex) -> Vec<Frame> {
        if led.is_all() {
            vec![self.dataframe(color)]
        } else {
            vec![self.indexed(color, led)]
        }
    }

    fn encode_off(&self, led: LedIndex) -> Vec<Frame> {
        self.encode_solid(Colour::BLACK, led)
    }

    fn encode_keepalive(&self, _color: Colour, _led: LedIndex) -> Option<Frame> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn p8_eight_led_dataframe_shape_and_order() {
        let d = BlinkstickDriver::default();
        let frame = &d.encode_solid(Colour::new(10, 20, 30), LedIndex::ALL)[0];
        assert_eq!(frame.len(), 2 + 8 * 3);
        assert_eq!(frame[0], REPORT_DATAFRAME_BASE);
        // First LED slot starts at offset 2: G, R, B.
        assert_eq!(&frame[2..5], &[20, 10, 30]);
    }

    #[test]
    fn indexed_report_encodes_grb() {
        let d = BlinkstickDriver::default();
        let frame = &d.encode_solid(Colour::new(10, 20, 30), LedIndex::new(3))[0];
        assert_eq!(frame, &vec![REPORT_INDEXED, 0, 3, 20, 10, 30]);
    }

    #[test]
    fn blink_is_never_native() {
        let d = BlinkstickDriver::default();
        assert!(d
            .encode_blink_native(
                Colour::WHITE,
                Colour::BLACK,
                crate::driver::BlinkSpeed::Fast,
                LedIndex::ALL
            )
            .is_none());
    }

    #[test]
    fn larger_variants_select_higher_report_ids() {
        assert_eq!(BlinkstickDriver::with_led_count(16).dataframe_report_id(), 7);
        assert_eq!(BlinkstickDriver::with_led_count(32).dataframe_report_id(), 8);
        assert_eq!(BlinkstickDriver::with_led_count(64).dataframe_report_id(), 9);
    }
}
