//! Pure effect descriptors and the built-in effect library.
//!
//! An `Effect` never touches a device; it is data the [`crate::effect::engine::EffectEngine`]
//! interprets. One cycle through `frames` is one repetition; `repeat_count`
//! says how many times the engine loops the cycle (`0` = forever).
pub mod engine;

use std::time::Duration;

use crate::color::{Colour, LedIndex};
use crate::driver::BlinkSpeed;

/// Relative importance of a running task; governs `apply` replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Low,
    Normal,
    High,
}

impl Default for Priority {
    fn default() -> Self {
        Self::Normal
    }
}

#[derive(Debug, Clone)]
pub struct Effect {
    pub name: &'static str,
    /// One cycle's (colour, dwell) pairs.
    pub frames: Vec<(Colour, Duration)>,
    /// `0` = loop forever; `N >= 1` = play the cycle N times then quiesce.
    pub repeat_count: u32,
    pub priority: Priority,
    pub led: LedIndex,
    /// Only set by `blink`/`fli`: lets the engine try
    /// `DeviceDriver::encode_blink_native` before falling back to
    /// frame-by-frame synthesis.
    pub blink_speed: Option<BlinkSpeed>,
    /// Index into `frames` of the "off" half-cycle, if one exists. The
    /// engine writes this frame via `DeviceDriver::encode_off` instead of
    /// `encode_solid` — only `blink` sets this (its off colour defaults to
    /// black and represents "lamp off", not an arbitrary solid colour).
    pub off_frame_index: Option<usize>,
}

impl Effect {
    #[must_use]
    pub fn is_steady(&self) -> bool {
        self.name == "steady"
    }

    /// Scale every frame's colour by `dim` and retarget to `led` — used by
    /// `Controller::Selection::apply_effect` so callers never have to
    /// pre-scale an effect's frames by hand.
    #[must_use]
    pub fn scaled(mut self, dim: f32, led: LedIndex) -> Self {
        for (color, _) in &mut self.frames {
            *color = color.scale(dim);
        }
        self.led = led;
        self
    }
}

fn speed_dwell(speed: BlinkSpeed) -> Duration {
    match speed {
        BlinkSpeed::Slow => Duration::from_millis(500),
        BlinkSpeed::Medium => Duration::from_millis(250),
        BlinkSpeed::Fast => Duration::from_millis(100),
    }
}

/// One frame, played once, no keep-alive task of its own (the engine starts
/// one separately when the driver is stateful). A degenerate effect: never
/// scheduled as a long-running task. `dwell` is normally
/// `CoreConfig::default_dwell` — it has no effect on `steady` itself (the
/// engine never schedules a second frame) but is recorded so callers don't
/// have to special-case the single-frame effect's shape.
#[must_use]
pub fn steady(color: Colour, led: LedIndex, dwell: Duration) -> Effect {
    Effect {
        name: "steady",
        frames: vec![(color, dwell)],
        repeat_count: 1,
        priority: Priority::Normal,
        led,
        blink_speed: None,
        off_frame_index: None,
    }
}

/// Alternates `on_color`/lamp-off. `count = 0` runs until cancelled.
///
/// The off half-cycle is always written via `DeviceDriver::encode_off`, not
/// `encode_solid(off_color, led)` — `off_color` only labels the frame for
/// display purposes, since a driver's "off" command is not always
/// bit-identical to its solid-black encoding.
#[must_use]
pub fn blink(
    on_color: Colour,
    off_color: Colour,
    count: u32,
    speed: BlinkSpeed,
    led: LedIndex,
) -> Effect {
    let dwell = speed_dwell(speed);
    Effect {
        name: "blink",
        frames: vec![(on_color, dwell), (off_color, dwell)],
        repeat_count: count,
        priority: Priority::Normal,
        led,
        blink_speed: Some(speed),
        off_frame_index: Some(1),
    }
}

/// Two-colour alternation identical in shape to `blink` but without an
/// implicit black off-colour — both colours are caller-chosen and both are
/// written via `encode_solid`.
#[must_use]
pub fn fli(color_a: Colour, color_b: Colour, count: u32, speed: BlinkSpeed, led: LedIndex) -> Effect {
    let dwell = speed_dwell(speed);
    Effect {
        name: "fli",
        frames: vec![(color_a, dwell), (color_b, dwell)],
        repeat_count: count,
        priority: Priority::Normal,
        led,
        off_frame_index: None,
        blink_speed: Some(speed),
    }
}

/// Samples three phase-offset sines to produce a cycling hue sweep.
///
/// `center`/`width` bound each channel's swing (clamped to `[0, 255]`);
/// `scale` is a multiplier applied to that width before clamping.
#[must_use]
pub fn spectrum(
    steps: usize,
    frequency: f32,
    phase: f32,
    scale: f32,
    count: u32,
    led: LedIndex,
) -> Effect {
    let steps = steps.max(1);
    let center = 127.5_f32;
    let width = 127.5_f32 * scale;
    let dwell = Duration::from_millis(50);
    let frames = (0..steps)
        .map(|i| {
            let t = i as f32 / steps as f32;
            let chan = |offset: f32| -> u8 {
                let s = (std::f32::consts::TAU * frequency * t + phase + offset).sin();
                (center + width * s).round().clamp(0.0, 255.0) as u8
            };
            let color = Colour::new(chan(0.0), chan(std::f32::consts::TAU / 3.0), chan(2.0 * std::f32::consts::TAU / 3.0));
            (color, dwell)
        })
        .collect();
    Effect {
        name: "spectrum",
        frames,
        repeat_count: count,
        priority: Priority::Normal,
        led,
        blink_speed: None,
        off_frame_index: None,
    }
}

/// Ramps black→target→target black in `step_max / step` frames.
#[must_use]
pub fn gradient(target: Colour, step: u8, count: u32, led: LedIndex) -> Effect {
    let step = step.max(1);
    let dwell = Duration::from_millis(50);
    let steps_up: Vec<u8> = (0..=255u16).step_by(step as usize).map(|v| v as u8).collect();
    let mut frames: Vec<(Colour, Duration)> = steps_up
        .iter()
        .map(|&level| (target.scale(f32::from(level) / 255.0), dwell))
        .collect();
    let down: Vec<(Colour, Duration)> = steps_up
        .iter()
        .rev()
        .map(|&level| (target.scale(f32::from(level) / 255.0), dwell))
        .collect();
    frames.extend(down);
    Effect {
        name: "gradient",
        frames,
        repeat_count: count,
        priority: Priority::Normal,
        led,
        blink_speed: None,
        off_frame_index: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steady_is_a_single_frame() {
        let e = steady(Colour::WHITE, LedIndex::ALL, Duration::from_millis(250));
        assert!(e.is_steady());
        assert_eq!(e.frames.len(), 1);
        assert_eq!(e.repeat_count, 1);
    }

    #[test]
    fn blink_uses_speed_dwell_table() {
        let e = blink(Colour::WHITE, Colour::BLACK, 2, BlinkSpeed::Medium, LedIndex::ALL);
        assert_eq!(e.frames.len(), 2);
        assert_eq!(e.frames[0].1, Duration::from_millis(250));
        assert_eq!(e.repeat_count, 2);
        assert_eq!(e.off_frame_index, Some(1));
    }

    #[test]
    fn spectrum_channels_stay_in_range() {
        let e = spectrum(64, 1.0, 0.0, 1.0, 0, LedIndex::ALL);
        assert_eq!(e.frames.len(), 64);
        for (c, _) in &e.frames {
            assert!(c.r <= 255 && c.g <= 255 && c.b <= 255);
        }
    }

    #[test]
    fn gradient_starts_and_ends_near_black() {
        let e = gradient(Colour::new(200, 0, 0), 51, 1, LedIndex::ALL);
        assert_eq!(e.frames.first().unwrap().0, Colour::BLACK);
        assert_eq!(e.frames.last().unwrap().0, Colour::BLACK);
    }
}
