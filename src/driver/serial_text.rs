//! Text-over-serial family: a short ASCII command terminated by a line
//! separator. Firmware is stateless. This family has no USB vendor/product
//! id — it enumerates as a serial port and is matched by port name pattern
//! in [`crate::registry`] rather than through the driver registration table.
use crate::color::{Colour, LedIndex};
use crate::driver::{DeviceDriver, Identity, Keepalive, TransportKind};
use crate::transport::serial::terminate_line;
use crate::transport::Frame;

/// Sentinel: this family carries no USB identity.
pub const VENDOR_ID: u16 = 0;
pub const PRODUCT_ID: u16 = 0;

pub struct SerialTextDriver;

fn led_token(led: LedIndex) -> String {
    if led.is_all() {
        "ALL".to_string()
    } else {
        led.0.to_string()
    }
}

impl DeviceDriver for SerialTextDriver {
    fn identity(&self) -> Identity {
        Identity {
            vendor_id: VENDOR_ID,
            product_id: PRODUCT_ID,
            logical_name: "SerialText",
            led_count: 1,
            transport_kind: TransportKind::Serial,
            keepalive: Keepalive::Stateless,
        }
    }

    fn encode_solid(&self, color: Colour, led: LedIndex) -> Vec<Frame> {
        let cmd = format!(
            "COLOR {} {} {} {}",
            color.r,
            color.g,
            color.b,
            led_token(led)
        );
        vec![terminate_line(&cmd)]
    }

    fn encode_off(&self, led: LedIndex) -> Vec<Frame> {
        vec![terminate_line(&format!("OFF {}", led_token(led)))]
    }

    fn encode_keepalive(&self, _color: Colour, _led: LedIndex) -> Option<Frame> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_solid_is_line_terminated_ascii() {
        let d = SerialTextDriver;
        let frame = &d.encode_solid(Colour::new(1, 2, 3), LedIndex::ALL)[0];
        assert_eq!(frame, b"COLOR 1 2 3 ALL\n");
    }

    #[test]
    fn encode_off_names_the_led() {
        let d = SerialTextDriver;
        let frame = &d.encode_off(LedIndex::new(2))[0];
        assert_eq!(frame, b"OFF 2\n");
    }
}
