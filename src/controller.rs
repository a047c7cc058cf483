//! Thin, deterministic façade over the registry and effect engine: the
//! public library surface a CLI or HTTP binding would call.
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use regex::Regex;

use crate::color::{Colour, LedIndex};
use crate::config::CoreConfig;
use crate::driver::BlinkSpeed;
use crate::effect::engine::EffectEngine;
use crate::effect::{self, Effect};
use crate::registry::{Light, LightIdentity, Registry};

fn parse_speed(speed: &str) -> BlinkSpeed {
    match speed {
        "slow" => BlinkSpeed::Slow,
        "fast" => BlinkSpeed::Fast,
        _ => BlinkSpeed::Medium,
    }
}

/// Immutable snapshot of matched Lights, with chainable operations.
///
/// Every operation returns `&Self` so calls can be chained; an empty
/// Selection makes every operation a logged no-op rather than an error.
pub struct Selection {
    lights: Vec<Arc<Light>>,
    engine: EffectEngine,
    default_dwell: Duration,
}

impl Selection {
    fn new(lights: Vec<Arc<Light>>, engine: EffectEngine, default_dwell: Duration) -> Self {
        Self {
            lights,
            engine,
            default_dwell,
        }
    }

    #[must_use]
    pub fn lights(&self) -> &[Arc<Light>] {
        &self.lights
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    fn guard_empty(&self, op: &str) -> bool {
        if self.lights.is_empty() {
            log::debug!("{op} on empty Selection: no-op");
            true
        } else {
            false
        }
    }

    fn schedule_timeout(&self, timeout: Option<Duration>) {
        let Some(duration) = timeout else { return };
        let engine = self.engine.clone();
        let lights = self.lights.clone();
        thread::spawn(move || {
            thread::sleep(duration);
            for light in lights {
                engine.stop(light);
            }
        });
    }

    pub fn turn_on(&self, color: Colour, led: LedIndex, dim: f32, timeout: Option<Duration>) -> &Self {
        if self.guard_empty("turn_on") {
            return self;
        }
        let scaled = color.scale(dim);
        for light in &self.lights {
            self.engine
                .apply(Arc::clone(light), effect::steady(scaled, led, self.default_dwell));
        }
        self.schedule_timeout(timeout);
        self
    }

    pub fn turn_off(&self) -> &Self {
        if self.guard_empty("turn_off") {
            return self;
        }
        for light in &self.lights {
            self.engine.stop(Arc::clone(light));
        }
        self
    }

    #[allow(clippy::too_many_arguments)]
    pub fn blink(
        &self,
        color: Colour,
        off_color: Colour,
        count: u32,
        speed: &str,
        led: LedIndex,
        dim: f32,
        timeout: Option<Duration>,
    ) -> &Self {
        if self.guard_empty("blink") {
            return self;
        }
        let on = color.scale(dim);
        let off = off_color.scale(dim);
        let speed = parse_speed(speed);
        for light in &self.lights {
            self.engine
                .apply(Arc::clone(light), effect::blink(on, off, count, speed, led));
        }
        self.schedule_timeout(timeout);
        self
    }

    pub fn apply_effect(&self, effect: Effect, led: LedIndex, dim: f32) -> &Self {
        if self.guard_empty("apply_effect") {
            return self;
        }
        let scaled = effect.scaled(dim, led);
        for light in &self.lights {
            self.engine.apply(Arc::clone(light), scaled.clone());
        }
        self
    }
}

/// User-facing façade: produces Selections against the live Registry and
/// owns the single `EffectEngine` every Selection dispatches through.
pub struct Controller {
    registry: Mutex<Registry>,
    engine: EffectEngine,
    default_dwell: Duration,
}

impl Controller {
    #[must_use]
    pub fn new(config: CoreConfig) -> Self {
        let default_dwell = config.default_dwell;
        let engine = EffectEngine::start();
        let mut registry = Registry::new(config);
        let hook_engine = engine.clone();
        registry.on_light_removed(move |light_id| hook_engine.notify_device_removed(light_id));
        registry.start_poller();
        Self {
            registry: Mutex::new(registry),
            engine,
            default_dwell,
        }
    }

    fn select(&self, lights: Vec<Arc<Light>>) -> Selection {
        Selection::new(lights, self.engine.clone(), self.default_dwell)
    }

    #[must_use]
    pub fn all(&self) -> Selection {
        self.select(self.registry.lock().snapshot().all())
    }

    #[must_use]
    pub fn first(&self) -> Selection {
        let lights = self.registry.lock().snapshot().by_index(0).into_iter().collect();
        self.select(lights)
    }

    #[must_use]
    pub fn by_index(&self, indices: &[usize]) -> Selection {
        let snapshot = self.registry.lock().snapshot();
        let lights = indices.iter().filter_map(|&i| snapshot.by_index(i)).collect();
        self.select(lights)
    }

    #[must_use]
    pub fn by_name(&self, name: &str, count: Option<usize>) -> Selection {
        let lights = self.registry.lock().snapshot().by_name(name, count);
        self.select(lights)
    }

    #[must_use]
    pub fn by_pattern(&self, pattern: &Regex) -> Selection {
        let lights = self.registry.lock().snapshot().by_pattern(pattern);
        self.select(lights)
    }

    pub fn on_light_plugged<F>(&self, cb: F)
    where
        F: Fn(&LightIdentity) + Send + Sync + 'static,
    {
        self.registry.lock().on_light_plugged(cb);
    }

    pub fn on_light_unplugged<F>(&self, cb: F)
    where
        F: Fn(&LightIdentity) + Send + Sync + 'static,
    {
        self.registry.lock().on_light_unplugged(cb);
    }

    #[must_use]
    pub fn list(&self) -> Vec<LightIdentity> {
        self.registry.lock().list()
    }

    /// Deterministic: returns only after every Task has run its finaliser.
    pub fn shutdown(&self) {
        self.engine.shutdown();
        self.registry.lock().shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::blynclight::BlynclightDriver;
    use crate::transport::testing::RecordingTransport;
    use std::sync::atomic::{AtomicU64, Ordering};

    static NEXT: AtomicU64 = AtomicU64::new(1);

    fn test_selection() -> (Selection, RecordingTransport) {
        let transport = RecordingTransport::new();
        let light = Light::new(
            crate::registry::LightId(NEXT.fetch_add(1, Ordering::Relaxed)),
            0x2C0D,
            0x0001,
            None,
            None,
            "Blynclight".into(),
            1,
            crate::driver::Keepalive::Stateless,
            Arc::new(BlynclightDriver),
            Box::new(transport.clone()),
            Duration::from_millis(50),
        );
        let engine = EffectEngine::start();
        (
            Selection::new(vec![Arc::new(light)], engine, Duration::from_millis(250)),
            transport,
        )
    }

    #[test]
    fn s1_turn_on_red_full_dim() {
        let (selection, transport) = test_selection();
        selection.turn_on(Colour::new(255, 0, 0), LedIndex::ALL, 1.0, None);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(
            transport.frames(),
            vec![vec![0x00, 0xFF, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFF, 0x22]]
        );
    }

    #[test]
    fn s2_turn_on_half_dim() {
        let (selection, transport) = test_selection();
        selection.turn_on(Colour::new(255, 0, 0), LedIndex::ALL, 0.5, None);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(
            transport.frames(),
            vec![vec![0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFF, 0x22]]
        );
    }

    #[test]
    fn empty_selection_operations_are_noops() {
        let engine = EffectEngine::start();
        let selection = Selection::new(Vec::new(), engine, Duration::from_millis(250));
        selection.turn_on(Colour::WHITE, LedIndex::ALL, 1.0, None);
        assert!(selection.is_empty());
    }
}
