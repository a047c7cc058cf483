//! 8-byte Luxafor-style family.
//!
//! ```text
//! [0] command selector: 1=steady, 2=fade, 3=strobe, 4=wave, 5=pattern
//! [1] LED mask: 0xFF = all LEDs, else the 1-based LED number
//! [2] R
//! [3] G
//! [4] B
//! [5..8] command-specific trailing bytes (speed/repeat/unused)
//! ```
use crate::color::{Colour, LedIndex};
use crate::driver::{BlinkSpeed, DeviceDriver, Identity, Keepalive, TransportKind};
use crate::transport::Frame;

pub const VENDOR_ID: u16 = 0x04D8;
pub const PRODUCT_ID: u16 = 0xF372;
pub const LED_COUNT: u16 = 6;
pub const REPORT_LEN: usize = 8;

const CMD_STEADY: u8 = 1;
const CMD_STROBE: u8 = 3;

pub struct LuxaforDriver;

fn led_mask(led: LedIndex) -> u8 {
    if led.is_all() {
        0xFF
    } else {
        led.0 as u8
    }
}

fn speed_byte(speed: BlinkSpeed) -> u8 {
    match speed {
        BlinkSpeed::Slow => 10,
        BlinkSpeed::Medium => 50,
        BlinkSpeed::Fast => 100,
    }
}

impl DeviceDriver for LuxaforDriver {
    fn identity(&self) -> Identity {
        Identity {
            vendor_id: VENDOR_ID,
            product_id: PRODUCT_ID,
            logical_name: "Luxafor",
            led_count: LED_COUNT,
            transport_kind: TransportKind::Hid,
            keepalive: Keepalive::Stateless,
        }
    }

    fn encode_solid(&self, color: Colour, led: LedIndex) -> Vec<Frame> {
        let mut buf = [0u8; REPORT_LEN];
        buf[0] = CMD_STEADY;
        buf[1] = led_mask(led);
        buf[2] = color.r;
        buf[3] = color.g;
        buf[4] = color.b;
        vec![buf.to_vec()]
    }

    fn encode_off(&self, led: LedIndex) -> Vec<Frame> {
        self.encode_solid(Colour::BLACK, led)
    }

    fn encode_keepalive(&self, _color: Colour, _led: LedIndex) -> Option<Frame> {
        None
    }

    fn encode_blink_native(
        &self,
        on: Colour,
        _off: Colour,
        speed: BlinkSpeed,
        led: LedIndex,
    ) -> Option<Vec<Frame>> {
        let mut buf = [0u8; REPORT_LEN];
        buf[0] = CMD_STROBE;
        buf[1] = led_mask(led);
        buf[2] = on.r;
        buf[3] = on.g;
        buf[4] = on.b;
        buf[5] = speed_byte(speed);
        buf[6] = 0; // repeat: 0 = infinite, engine-driven count is layered on top
        Some(vec![buf.to_vec()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solid_all_leds() {
        let d = LuxaforDriver;
        let frame = &d.encode_solid(Colour::new(1, 2, 3), LedIndex::ALL)[0];
        assert_eq!(frame, &vec![CMD_STEADY, 0xFF, 1, 2, 3, 0, 0, 0]);
    }

    #[test]
    fn solid_single_led_uses_led_number() {
        let d = LuxaforDriver;
        let frame = &d.encode_solid(Colour::new(1, 2, 3), LedIndex::new(4))[0];
        assert_eq!(frame[1], 4);
    }

    #[test]
    fn off_is_steady_black() {
        let d = LuxaforDriver;
        let frame = &d.encode_off(LedIndex::ALL)[0];
        assert_eq!(frame, &vec![CMD_STEADY, 0xFF, 0, 0, 0, 0, 0, 0]);
    }
}
