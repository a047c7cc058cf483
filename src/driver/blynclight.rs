//! 9-byte HID family (Embrava Blynclight and compatibles).
//!
//! Wire layout, all 9 bytes:
//!
//! ```text
//! [0]  0x00            report id
//! [1]  R
//! [2]  B
//! [3]  G               channel order on the wire is R,B,G, not R,G,B
//! [4]  bit7: off        bit0: hardware dim (unused, software pre-scales)
//! [5]  bit0: flash
//! [6]  speed            1, 2, 4 are the only legal flash speeds
//! [7]  0xFF
//! [8]  0x22
//! ```
//!
//! Colours reaching [`BlynclightDriver::encode_solid`] are already
//! dim-scaled by the controller; this driver never applies its own
//! brightness scaling, only the off/flash/speed control bits.
use crate::color::{Colour, LedIndex};
use crate::driver::{BlinkSpeed, DeviceDriver, Identity, Keepalive, TransportKind};
use crate::transport::Frame;

pub const VENDOR_ID: u16 = 0x2C0D;
pub const PRODUCT_ID: u16 = 0x0001;
pub const REPORT_LEN: usize = 9;

/// Legal flash speed codes; anything else induces strobe on real hardware
/// and must never be emitted.
const LEGAL_SPEEDS: [u8; 3] = [1, 2, 4];

pub struct BlynclightDriver;

impl BlynclightDriver {
    fn base_report(color: Colour) -> [u8; REPORT_LEN] {
        let mut buf = [0u8; REPORT_LEN];
        buf[0] = 0x00;
        buf[1] = color.r;
        buf[2] = color.b;
        buf[3] = color.g;
        buf[7] = 0xFF;
        buf[8] = 0x22;
        buf
    }

    fn speed_code(speed: BlinkSpeed) -> u8 {
        match speed {
            BlinkSpeed::Fast => LEGAL_SPEEDS[0],
            BlinkSpeed::Medium => LEGAL_SPEEDS[1],
            BlinkSpeed::Slow => LEGAL_SPEEDS[2],
        }
    }
}

impl DeviceDriver for BlynclightDriver {
    fn identity(&self) -> Identity {
        Identity {
            vendor_id: VENDOR_ID,
            product_id: PRODUCT_ID,
            logical_name: "Blynclight",
            led_count: 1,
            transport_kind: TransportKind::Hid,
            keepalive: Keepalive::Stateless,
        }
    }

    fn encode_solid(&self, color: Colour, _led: LedIndex) -> Vec<Frame> {
        vec![Self::base_report(color).to_vec()]
    }

    fn encode_off(&self, _led: LedIndex) -> Vec<Frame> {
        let mut buf = Self::base_report(Colour::BLACK);
        buf[4] = 0x80; // off bit
        vec![buf.to_vec()]
    }

    fn encode_keepalive(&self, _color: Colour, _led: LedIndex) -> Option<Frame> {
        None // stateless family, no keep-alive task ever runs
    }

    fn encode_blink_native(
        &self,
        on: Colour,
        _off: Colour,
        speed: BlinkSpeed,
        _led: LedIndex,
    ) -> Option<Vec<Frame>> {
        let mut buf = Self::base_report(on);
        buf[5] = 0x01; // flash bit
        buf[6] = Self::speed_code(speed);
        Some(vec![buf.to_vec()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s1_red_full_dim() {
        let d = BlynclightDriver;
        let frames = d.encode_solid(Colour::new(255, 0, 0), LedIndex::ALL);
        assert_eq!(frames, vec![vec![0x00, 0xFF, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFF, 0x22]]);
    }

    #[test]
    fn s2_red_half_dim_already_scaled() {
        // Controller pre-scales; driver just encodes the scaled value.
        let scaled = Colour::new(255, 0, 0).scale(0.5);
        let d = BlynclightDriver;
        let frames = d.encode_solid(scaled, LedIndex::ALL);
        assert_eq!(frames, vec![vec![0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFF, 0x22]]);
    }

    #[test]
    fn p7_round_trip_offsets() {
        let d = BlynclightDriver;
        let frame = &d.encode_solid(Colour::new(10, 20, 30), LedIndex::ALL)[0];
        assert_eq!(frame[0], 0x00);
        assert_eq!((frame[1], frame[3], frame[2]), (10, 20, 30)); // R,G,B recovered from 1,3,2
        assert_eq!((frame[7], frame[8]), (0xFF, 0x22));
    }

    #[test]
    fn only_legal_speeds_are_emitted() {
        let d = BlynclightDriver;
        for speed in [BlinkSpeed::Slow, BlinkSpeed::Medium, BlinkSpeed::Fast] {
            let frame = d
                .encode_blink_native(Colour::WHITE, Colour::BLACK, speed, LedIndex::ALL)
                .unwrap();
            assert!(LEGAL_SPEEDS.contains(&frame[0][6]));
        }
    }
}
