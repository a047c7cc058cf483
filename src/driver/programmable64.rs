//! 64-byte programmable family (checksummed step-program controllers).
//!
//! Frame layout (64 bytes total):
//!
//! ```text
//! [0]      command byte (0x10 = "load and run program")
//! [1..57]  eight 8-byte steps: r, g, b (PWM 0..=100), on_tenths, off_tenths,
//!          fade flag, reserved (2 bytes, always 0)
//! [57..59] reserved (0)
//! [59..62] pad, must be 0xFFFFFF
//! [62..64] checksum: big-endian u16 sum of bytes [0..62)
//! ```
//!
//! This is a stateful family: firmware reverts to dark unless refreshed,
//! with `interval_s <= 15`. PWM is clamped to `[0, 100]` rather than the
//! `[0, 255]` some firmware revisions also accept.
use crate::color::{Colour, LedIndex};
use crate::driver::{DeviceDriver, Identity, Keepalive, TransportKind};
use crate::transport::Frame;

pub const VENDOR_ID: u16 = 0x27BB;
pub const PRODUCT_ID: u16 = 0x3BCA;
pub const FRAME_LEN: usize = 64;
pub const STEP_COUNT: usize = 8;
const STEP_LEN: usize = 7;
const STEPS_START: usize = 1;
const PAD_START: usize = 59;
const CHECKSUM_START: usize = 62;

/// "Hold indefinitely" sentinel for a step's on-duration.
const HOLD_FOREVER: u8 = 0xFF;

pub struct Programmable64Driver;

#[derive(Clone, Copy)]
struct Step {
    color: Colour,
    on_tenths: u8,
    off_tenths: u8,
    fade: bool,
}

impl Step {
    fn write(self, buf: &mut [u8]) {
        buf[0] = clamp_pwm(self.color.r);
        buf[1] = clamp_pwm(self.color.g);
        buf[2] = clamp_pwm(self.color.b);
        buf[3] = self.on_tenths;
        buf[4] = self.off_tenths;
        buf[5] = u8::from(self.fade);
        buf[6] = 0;
    }
}

/// Clamp a channel to the documented `[0, 100]` PWM range.
fn clamp_pwm(channel: u8) -> u8 {
    channel.min(100)
}

fn build_program(steps: &[Step; STEP_COUNT]) -> [u8; FRAME_LEN] {
    let mut buf = [0u8; FRAME_LEN];
    buf[0] = 0x10;
    for (i, step) in steps.iter().enumerate() {
        let start = STEPS_START + i * STEP_LEN;
        step.write(&mut buf[start..start + STEP_LEN]);
    }
    buf[PAD_START..PAD_START + 3].copy_from_slice(&[0xFF, 0xFF, 0xFF]);

    let sum: u32 = buf[0..CHECKSUM_START].iter().map(|&b| u32::from(b)).sum();
    let sum = sum as u16;
    buf[CHECKSUM_START] = (sum >> 8) as u8;
    buf[CHECKSUM_START + 1] = (sum & 0xFF) as u8;
    buf
}

fn solid_program(color: Colour) -> [u8; FRAME_LEN] {
    let step = Step {
        color,
        on_tenths: HOLD_FOREVER,
        off_tenths: 0,
        fade: false,
    };
    build_program(&[step; STEP_COUNT])
}

impl DeviceDriver for Programmable64Driver {
    fn identity(&self) -> Identity {
        Identity {
            vendor_id: VENDOR_ID,
            product_id: PRODUCT_ID,
            logical_name: "Programmable64",
            led_count: 1,
            transport_kind: TransportKind::Hid,
            keepalive: Keepalive::Stateful { interval_s: 15 },
        }
    }

    fn encode_solid(&self, color: Colour, _led: LedIndex) -> Vec<Frame> {
        vec![solid_program(color).to_vec()]
    }

    fn encode_off(&self, _led: LedIndex) -> Vec<Frame> {
        vec![solid_program(Colour::BLACK).to_vec()]
    }

    fn encode_keepalive(&self, color: Colour, _led: LedIndex) -> Option<Frame> {
        Some(solid_program(color).to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checksum_of(frame: &[u8]) -> u16 {
        let sum: u32 = frame[0..CHECKSUM_START].iter().map(|&b| u32::from(b)).sum();
        sum as u16
    }

    #[test]
    fn p6_checksum_matches_sum_of_preceding_bytes() {
        let d = Programmable64Driver;
        for (r, g, b) in [(0, 0, 0), (10, 20, 30), (255, 255, 255), (100, 100, 100)] {
            let frame = &d.encode_solid(Colour::new(r, g, b), LedIndex::ALL)[0];
            assert_eq!(frame.len(), FRAME_LEN);
            let expected = checksum_of(frame);
            let actual = (u16::from(frame[62]) << 8) | u16::from(frame[63]);
            assert_eq!(actual, expected);
        }
    }

    #[test]
    fn pwm_channels_are_clamped_to_0_100() {
        let d = Programmable64Driver;
        let frame = &d.encode_solid(Colour::new(255, 255, 255), LedIndex::ALL)[0];
        assert_eq!(&frame[STEPS_START..STEPS_START + 3], &[100, 100, 100]);
    }

    #[test]
    fn pad_field_is_0xffffff() {
        let d = Programmable64Driver;
        let frame = &d.encode_solid(Colour::BLACK, LedIndex::ALL)[0];
        assert_eq!(&frame[PAD_START..PAD_START + 3], &[0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn keepalive_interval_is_within_15_seconds() {
        let d = Programmable64Driver;
        let Keepalive::Stateful { interval_s } = d.identity().keepalive else {
            panic!("expected stateful keepalive");
        };
        assert!(interval_s <= 15);
    }

    #[test]
    fn s4_keepalive_packets_match_commanded_colour() {
        let d = Programmable64Driver;
        let a = d.encode_keepalive(Colour::new(10, 20, 30), LedIndex::ALL).unwrap();
        let b = d.encode_keepalive(Colour::new(10, 20, 30), LedIndex::ALL).unwrap();
        assert_eq!(a, b);
        assert_eq!(&a[STEPS_START..STEPS_START + 3], &[10, 20, 30]);
    }
}
