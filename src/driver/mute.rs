//! 2-byte "mute" HID family: 3-bit colour only (R, G, B each a single bit),
//! plus dim/blink bits.
//!
//! ```text
//! [0] bit0=R bit1=G bit2=B bit3=dim bit4=blink
//! [1] reserved, always 0
//! ```
//!
//! Callers must quantise input colours via [`DeviceDriver::quantize`] before
//! calling `encode_solid`; this driver's `encode_*` methods assume that has
//! already happened and simply threshold again defensively.
//!
//! The documented 4-byte read report (button touch state) is not
//! implemented — this family's `Transport::read` is never called by the
//! engine in normal operation.
use crate::color::{Colour, LedIndex};
use crate::driver::{BlinkSpeed, DeviceDriver, Identity, Keepalive, TransportKind};
use crate::transport::Frame;

pub const VENDOR_ID: u16 = 0x0483;
pub const PRODUCT_ID: u16 = 0x5750;
pub const REPORT_LEN: usize = 2;

const BIT_R: u8 = 0b0000_0001;
const BIT_G: u8 = 0b0000_0010;
const BIT_B: u8 = 0b0000_0100;
const BIT_BLINK: u8 = 0b0001_0000;

pub struct MuteDriver;

fn channel_bit(channel: u8) -> bool {
    channel >= 128
}

fn color_bits(color: Colour) -> u8 {
    let mut bits = 0;
    if channel_bit(color.r) {
        bits |= BIT_R;
    }
    if channel_bit(color.g) {
        bits |= BIT_G;
    }
    if channel_bit(color.b) {
        bits |= BIT_B;
    }
    bits
}

impl DeviceDriver for MuteDriver {
    fn identity(&self) -> Identity {
        Identity {
            vendor_id: VENDOR_ID,
            product_id: PRODUCT_ID,
            logical_name: "Mute",
            led_count: 1,
            transport_kind: TransportKind::Hid,
            keepalive: Keepalive::Stateless,
        }
    }

    fn quantize(&self, color: Colour) -> Colour {
        let bit = |c: u8| if channel_bit(c) { 255 } else { 0 };
        Colour::new(bit(color.r), bit(color.g), bit(color.b))
    }

    fn encode_solid(&self, color: Colour, _led: LedIndex) -> Vec<Frame> {
        vec![vec![color_bits(color), 0]]
    }

    fn encode_off(&self, _led: LedIndex) -> Vec<Frame> {
        vec![vec![0, 0]]
    }

    fn encode_keepalive(&self, _color: Colour, _led: LedIndex) -> Option<Frame> {
        None
    }

    fn encode_blink_native(
        &self,
        on: Colour,
        _off: Colour,
        _speed: BlinkSpeed,
        _led: LedIndex,
    ) -> Option<Vec<Frame>> {
        // Fixed hardware blink rate; this family has no speed bits to set.
        Some(vec![vec![color_bits(on) | BIT_BLINK, 0]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantizes_to_primary_colors() {
        let d = MuteDriver;
        assert_eq!(d.quantize(Colour::new(200, 10, 250)), Colour::new(255, 0, 255));
        assert_eq!(d.quantize(Colour::BLACK), Colour::BLACK);
    }

    #[test]
    fn encode_solid_sets_only_color_bits() {
        let d = MuteDriver;
        let quantized = d.quantize(Colour::new(255, 0, 255));
        let frame = &d.encode_solid(quantized, LedIndex::ALL)[0];
        assert_eq!(frame, &vec![BIT_R | BIT_B, 0]);
        assert_eq!(frame.len(), REPORT_LEN);
    }

    #[test]
    fn off_clears_all_bits() {
        let d = MuteDriver;
        assert_eq!(d.encode_off(LedIndex::ALL)[0], vec![0, 0]);
    }
}
