//! Colour and LED-index primitives shared by every driver.
use serde::{Deserialize, Serialize};

/// An RGB colour value, 8 bits per channel, R,G,B order at the API boundary.
///
/// Individual drivers reorder channels for their own wire format; this type
/// never encodes a wire order itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Colour {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Colour {
    pub const BLACK: Self = Self { r: 0, g: 0, b: 0 };
    pub const WHITE: Self = Self {
        r: 255,
        g: 255,
        b: 255,
    };

    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    #[must_use]
    pub const fn is_dark(self) -> bool {
        self.r == 0 && self.g == 0 && self.b == 0
    }

    /// Multiplicative channel scaling by a dim factor in `[0.0, 1.0]`.
    ///
    /// Each channel is multiplied, rounded to nearest, and clamped to
    /// `[0, 255]` (P9). `dim` outside `[0.0, 1.0]` is clamped first so the
    /// result never overflows or underflows regardless of caller input.
    #[must_use]
    pub fn scale(self, dim: f32) -> Self {
        let dim = dim.clamp(0.0, 1.0);
        let chan = |c: u8| ((f32::from(c) * dim).round().clamp(0.0, 255.0)) as u8;
        Self {
            r: chan(self.r),
            g: chan(self.g),
            b: chan(self.b),
        }
    }
}

/// LED selector on a multi-LED device.
///
/// `0` means "all LEDs on this device"; `1..=N` target an individual LED,
/// where `N` is `Light::led_count`. Values above `N` are clamped away by
/// [`LedIndex::validate`] rather than treated as an error (P11).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedIndex(pub u16);

impl LedIndex {
    pub const ALL: Self = Self(0);

    #[must_use]
    pub const fn new(idx: u16) -> Self {
        Self(idx)
    }

    #[must_use]
    pub const fn is_all(self) -> bool {
        self.0 == 0
    }

    /// Validate this index against a device's LED count.
    ///
    /// Returns `None` when `self` addresses an LED beyond `led_count`
    /// (per P11, callers must log a warning and no-op rather than error).
    /// `led=0` ("all") and any `led` in `1..=led_count` validate.
    #[must_use]
    pub const fn validate(self, led_count: u16) -> Option<Self> {
        if self.0 == 0 || self.0 <= led_count {
            Some(self)
        } else {
            None
        }
    }
}

impl Default for LedIndex {
    fn default() -> Self {
        Self::ALL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_identity_and_black() {
        let c = Colour::new(200, 10, 255);
        assert_eq!(c.scale(1.0), c);
        assert_eq!(c.scale(0.0), Colour::BLACK);
    }

    #[test]
    fn scale_rounds_to_nearest() {
        // 255 * 0.5 = 127.5 -> rounds to 128.
        assert_eq!(Colour::new(255, 0, 0).scale(0.5), Colour::new(128, 0, 0));
    }

    #[test]
    fn scale_clamps_out_of_range_dim() {
        let c = Colour::new(10, 20, 30);
        assert_eq!(c.scale(2.0), c);
        assert_eq!(c.scale(-1.0), Colour::BLACK);
    }

    #[test]
    fn led_index_all_is_zero() {
        assert!(LedIndex::ALL.is_all());
        assert_eq!(LedIndex::default(), LedIndex::ALL);
    }

    #[test]
    fn led_index_validate_boundary() {
        assert_eq!(LedIndex::new(0).validate(4), Some(LedIndex::new(0)));
        assert_eq!(LedIndex::new(4).validate(4), Some(LedIndex::new(4)));
        assert_eq!(LedIndex::new(5).validate(4), None);
    }
}
