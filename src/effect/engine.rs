//! The cooperative scheduler: one dedicated thread, channel-driven. A
//! single thread owns all mutable scheduling state, commands arrive over
//! an `mpsc::Sender`, and nothing outside that thread ever touches a
//! transport directly.
use std::cmp::Ordering as CmpOrdering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::color::{Colour, LedIndex};
use crate::effect::{Effect, Priority};
use crate::error::LumenError;
use crate::registry::{CommandedState, Light, LightId};

/// Why a task stopped scheduling further frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Cancelled,
    Finished,
    Failed,
}

enum EngineCommand {
    Apply {
        light: Arc<Light>,
        effect: Effect,
        reply: mpsc::Sender<()>,
    },
    Stop {
        light: Arc<Light>,
        reply: mpsc::Sender<()>,
    },
    DeviceRemoved {
        light_id: LightId,
    },
    Shutdown {
        reply: mpsc::Sender<()>,
    },
}

/// Handle to the scheduler thread. Cloned freely; every clone shares the
/// same command channel.
#[derive(Clone)]
pub struct EffectEngine {
    tx: mpsc::Sender<EngineCommand>,
}

struct RunningEffect {
    priority: Priority,
    name: &'static str,
}

struct LightState {
    generation: u64,
    effect: Option<RunningEffect>,
    keepalive_active: bool,
}

impl Default for LightState {
    fn default() -> Self {
        Self {
            generation: 0,
            effect: None,
            keepalive_active: false,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ActionKind {
    EffectFrame { cycle: u32, frame_index: usize },
    KeepAlive,
}

struct HeapEntry {
    at: Instant,
    seq: u64,
    light_id: LightId,
    generation: u64,
    kind: ActionKind,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}
impl Eq for HeapEntry {}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Reversed: BinaryHeap is a max-heap, we want soonest-first.
        other.at.cmp(&self.at).then_with(|| other.seq.cmp(&self.seq))
    }
}

struct Scheduler {
    lights: HashMap<LightId, Arc<Light>>,
    effects: HashMap<LightId, Effect>,
    states: HashMap<LightId, LightState>,
    heap: BinaryHeap<HeapEntry>,
    seq: u64,
}

impl EffectEngine {
    #[must_use]
    pub fn start() -> Self {
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("lumenctl-effect-engine".into())
            .spawn(move || Scheduler::new().run(rx))
            .expect("failed to spawn effect engine thread");
        Self { tx }
    }

    /// Apply `effect` to `light`, replacing any lower-or-equal priority task
    /// already running. Blocks until the engine thread has processed the
    /// request (not until the effect finishes).
    pub fn apply(&self, light: Arc<Light>, effect: Effect) {
        let (reply_tx, reply_rx) = mpsc::channel();
        if self
            .tx
            .send(EngineCommand::Apply {
                light,
                effect,
                reply: reply_tx,
            })
            .is_ok()
        {
            let _ = reply_rx.recv();
        }
    }

    /// Cancel whatever is running on `light` and drive it dark. Blocks until
    /// the off frame has been written (or abandoned on timeout).
    pub fn stop(&self, light: Arc<Light>) {
        let (reply_tx, reply_rx) = mpsc::channel();
        if self
            .tx
            .send(EngineCommand::Stop {
                light,
                reply: reply_tx,
            })
            .is_ok()
        {
            let _ = reply_rx.recv();
        }
    }

    pub fn notify_device_removed(&self, light_id: LightId) {
        let _ = self.tx.send(EngineCommand::DeviceRemoved { light_id });
    }

    /// Stop the scheduler thread. Every still-running task is cancelled and
    /// finalised first. Idempotent: a second call on an already-shut-down
    /// engine is a harmless no-op (the channel send simply fails silently).
    pub fn shutdown(&self) {
        let (reply_tx, reply_rx) = mpsc::channel();
        if self.tx.send(EngineCommand::Shutdown { reply: reply_tx }).is_ok() {
            let _ = reply_rx.recv();
        }
    }
}

impl Scheduler {
    fn new() -> Self {
        Self {
            lights: HashMap::new(),
            effects: HashMap::new(),
            states: HashMap::new(),
            heap: BinaryHeap::new(),
            seq: 0,
        }
    }

    fn run(mut self, rx: mpsc::Receiver<EngineCommand>) {
        loop {
            let now = Instant::now();
            let wait = self
                .heap
                .peek()
                .map(|e| e.at.saturating_duration_since(now))
                .unwrap_or(Duration::from_millis(200));

            match rx.recv_timeout(wait) {
                Ok(EngineCommand::Apply { light, effect, reply }) => {
                    self.handle_apply(light, effect);
                    let _ = reply.send(());
                }
                Ok(EngineCommand::Stop { light, reply }) => {
                    self.handle_stop(&light);
                    let _ = reply.send(());
                }
                Ok(EngineCommand::DeviceRemoved { light_id }) => {
                    self.drop_light(light_id);
                }
                Ok(EngineCommand::Shutdown { reply }) => {
                    self.shutdown_all();
                    let _ = reply.send(());
                    return;
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => return,
                Err(mpsc::RecvTimeoutError::Timeout) => {}
            }

            self.run_due_actions();
        }
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn run_due_actions(&mut self) {
        let now = Instant::now();
        let mut due = Vec::new();
        while let Some(top) = self.heap.peek() {
            if top.at > now {
                break;
            }
            due.push(self.heap.pop().unwrap());
        }
        for entry in due {
            self.execute(entry);
        }
    }

    fn handle_apply(&mut self, light: Arc<Light>, effect: Effect) {
        let light_id = light.id;
        self.lights.insert(light_id, Arc::clone(&light));
        let state = self.states.entry(light_id).or_default();

        if let Some(running) = &state.effect {
            if effect.priority < running.priority {
                log::debug!(
                    "apply({}) on {} rejected: priority {:?} < running {:?}",
                    effect.name,
                    light.logical_name,
                    effect.priority,
                    running.priority
                );
                return;
            }
        }

        state.generation += 1;
        let generation = state.generation;
        let quantize_led = effect.led.validate(light.led_count).unwrap_or_else(|| {
            log::warn!(
                "led {} out of range for {} ({} LEDs); clamping to ALL",
                effect.led.0,
                light.logical_name,
                light.led_count
            );
            LedIndex::ALL
        });

        if effect.is_steady() {
            let (color, _) = effect.frames[0];
            self.write_solid(&light, generation, color, quantize_led);
            light.set_commanded_state(CommandedState::Solid(color));
            state.effect = None;
        } else if let (Some(speed), true) = (effect.blink_speed, effect.name == "blink" || effect.name == "fli") {
            if let Some(native_frames) = light
                .driver()
                .encode_blink_native(effect.frames[0].0, effect.frames[1].0, speed, quantize_led)
            {
                if self.write_frames(&light, generation, &native_frames).is_ok() {
                    light.record_write(effect.frames[0].0, quantize_led);
                    light.set_commanded_state(CommandedState::Effect(effect.name.to_string()));
                    state.effect = Some(RunningEffect {
                        priority: effect.priority,
                        name: effect.name,
                    });
                }
            } else {
                light.set_commanded_state(CommandedState::Effect(effect.name.to_string()));
                state.effect = Some(RunningEffect {
                    priority: effect.priority,
                    name: effect.name,
                });
                self.effects.insert(light_id, effect);
                self.schedule_frame(light_id, generation, 0, 0, Instant::now());
            }
        } else {
            light.set_commanded_state(CommandedState::Effect(effect.name.to_string()));
            state.effect = Some(RunningEffect {
                priority: effect.priority,
                name: effect.name,
            });
            self.effects.insert(light_id, effect);
            self.schedule_frame(light_id, generation, 0, 0, Instant::now());
        }

        self.ensure_keepalive(&light);
    }

    fn handle_stop(&mut self, light: &Arc<Light>) {
        let light_id = light.id;
        let state = self.states.entry(light_id).or_default();
        state.generation += 1;
        state.effect = None;
        state.keepalive_active = false;
        self.effects.remove(&light_id);
        self.drive_dark(light);
        light.set_commanded_state(CommandedState::Off);
    }

    fn drop_light(&mut self, light_id: LightId) {
        if let Some(state) = self.states.get_mut(&light_id) {
            state.generation += 1;
            state.effect = None;
            state.keepalive_active = false;
        }
        self.effects.remove(&light_id);
        self.lights.remove(&light_id);
    }

    fn shutdown_all(&mut self) {
        let lights: Vec<Arc<Light>> = self.lights.values().cloned().collect();
        for light in lights {
            self.handle_stop(&light);
        }
    }

    fn ensure_keepalive(&mut self, light: &Arc<Light>) {
        let crate::driver::Keepalive::Stateful { interval_s } = light.keepalive else {
            return;
        };
        let light_id = light.id;
        let state = self.states.get_mut(&light_id).unwrap();
        if state.keepalive_active {
            return;
        }
        state.keepalive_active = true;
        let generation = state.generation;
        let half_period = Duration::from_secs(u64::from(interval_s)) / 2;
        self.schedule_keepalive(light_id, generation, Instant::now() + half_period);
    }

    fn schedule_frame(&mut self, light_id: LightId, generation: u64, cycle: u32, frame_index: usize, at: Instant) {
        let seq = self.next_seq();
        self.heap.push(HeapEntry {
            at,
            seq,
            light_id,
            generation,
            kind: ActionKind::EffectFrame { cycle, frame_index },
        });
    }

    fn schedule_keepalive(&mut self, light_id: LightId, generation: u64, at: Instant) {
        let seq = self.next_seq();
        self.heap.push(HeapEntry {
            at,
            seq,
            light_id,
            generation,
            kind: ActionKind::KeepAlive,
        });
    }

    fn execute(&mut self, entry: HeapEntry) {
        let HeapEntry { light_id, generation, kind, .. } = entry;
        let Some(state) = self.states.get(&light_id) else { return };
        if state.generation != generation {
            return; // stale: cancelled or replaced since this was scheduled
        }
        let Some(light) = self.lights.get(&light_id).cloned() else { return };

        match kind {
            ActionKind::KeepAlive => self.execute_keepalive(&light, generation),
            ActionKind::EffectFrame { cycle, frame_index } => {
                self.execute_effect_frame(&light, generation, cycle, frame_index)
            }
        }
    }

    fn execute_keepalive(&mut self, light: &Arc<Light>, generation: u64) {
        let crate::driver::Keepalive::Stateful { interval_s } = light.keepalive else {
            return;
        };
        let Some((color, led)) = light.last_write() else {
            self.reschedule_keepalive(light, generation, interval_s);
            return;
        };
        if let Some(frame) = light.driver().encode_keepalive(color, led) {
            let _ = self.write_frames(light, generation, &[frame]);
        }
        self.reschedule_keepalive(light, generation, interval_s);
    }

    fn reschedule_keepalive(&mut self, light: &Arc<Light>, generation: u64, interval_s: u32) {
        if self.states.get(&light.id).map(|s| s.generation) != Some(generation) {
            return;
        }
        let half_period = Duration::from_secs(u64::from(interval_s)) / 2;
        self.schedule_keepalive(light.id, generation, Instant::now() + half_period);
    }

    fn execute_effect_frame(&mut self, light: &Arc<Light>, generation: u64, cycle: u32, frame_index: usize) {
        let light_id = light.id;
        let Some(effect) = self.effects.get(&light_id).cloned() else { return };
        let (color, dwell) = effect.frames[frame_index];
        let led = effect.led.validate(light.led_count).unwrap_or(LedIndex::ALL);

        if self
            .write_effect_frame(light, generation, &effect, frame_index, color, led)
            .is_err()
        {
            return; // already finalised/dropped the light on persistent failure
        }

        let next_frame_index = frame_index + 1;
        if next_frame_index < effect.frames.len() {
            self.schedule_frame(light_id, generation, cycle, next_frame_index, Instant::now() + dwell);
            return;
        }

        let next_cycle = cycle + 1;
        let finished = effect.repeat_count != 0 && next_cycle >= effect.repeat_count;
        if finished {
            self.finish_effect(light, generation, Outcome::Finished);
        } else {
            self.schedule_frame(light_id, generation, next_cycle, 0, Instant::now() + dwell);
        }
    }

    fn finish_effect(&mut self, light: &Arc<Light>, generation: u64, _outcome: Outcome) {
        if self.states.get(&light.id).map(|s| s.generation) != Some(generation) {
            return;
        }
        self.drive_dark(light);
        // Natural completion drives the Light dark, so any running
        // keep-alive must stop too — it would otherwise keep re-sending the
        // last non-dark colour forever (violates "KA runs only while the
        // commanded colour is non-dark").
        if let Some(state) = self.states.get_mut(&light.id) {
            state.effect = None;
            state.keepalive_active = false;
            state.generation += 1;
        }
        self.effects.remove(&light.id);
        light.set_commanded_state(CommandedState::Off);
    }

    /// Write `encode_off` for the light's full LED range and abandon it on
    /// persistent failure (no further retry — the device is presumed gone).
    fn drive_dark(&mut self, light: &Arc<Light>) {
        let off_frames = light.driver().encode_off(LedIndex::ALL);
        match light.write_frames(&off_frames) {
            Ok(()) => {}
            Err(LumenError::Disconnected(_)) => self.drop_light(light.id),
            Err(_) => match light.reopen() {
                Ok(()) => {
                    let _ = light.write_frames(&off_frames);
                }
                Err(_) => self.drop_light(light.id),
            },
        }
    }

    fn write_solid(&mut self, light: &Arc<Light>, generation: u64, color: Colour, led: LedIndex) -> Result<(), ()> {
        let quantized = light.driver().quantize(color);
        let frames = light.driver().encode_solid(quantized, led);
        self.write_frames(light, generation, &frames)?;
        light.record_write(quantized, led);
        Ok(())
    }

    /// Write `encode_off` rather than `encode_solid` — a driver's off
    /// command isn't always the same bytes as a solid black write.
    fn write_off_phase(&mut self, light: &Arc<Light>, generation: u64, color: Colour, led: LedIndex) -> Result<(), ()> {
        let frames = light.driver().encode_off(led);
        self.write_frames(light, generation, &frames)?;
        light.record_write(color, led);
        Ok(())
    }

    /// Write one synthesized effect frame, routing the designated off
    /// half-cycle (`Effect::off_frame_index`, set only by `blink`) through
    /// `encode_off` instead of `encode_solid`.
    fn write_effect_frame(
        &mut self,
        light: &Arc<Light>,
        generation: u64,
        effect: &Effect,
        frame_index: usize,
        color: Colour,
        led: LedIndex,
    ) -> Result<(), ()> {
        if effect.off_frame_index == Some(frame_index) {
            self.write_off_phase(light, generation, color, led)
        } else {
            self.write_solid(light, generation, color, led)
        }
    }

    /// Close+reopen+retry-once on a transient error; drop the light
    /// outright on `Disconnected` or a failed retry.
    fn write_frames(&mut self, light: &Arc<Light>, generation: u64, frames: &[Vec<u8>]) -> Result<(), ()> {
        match light.write_frames(frames) {
            Ok(()) => Ok(()),
            Err(LumenError::Disconnected(e)) => {
                log::error!("{} disconnected: {e}", light.logical_name);
                self.drop_light_keep_generation(light.id, generation);
                Err(())
            }
            Err(first_err) => match light.reopen() {
                Ok(()) => match light.write_frames(frames) {
                    Ok(()) => Ok(()),
                    Err(second_err) => {
                        log::error!(
                            "{} write failed after reopen: {first_err} then {second_err}",
                            light.logical_name
                        );
                        self.drop_light_keep_generation(light.id, generation);
                        Err(())
                    }
                },
                Err(reopen_err) => {
                    log::error!("{} reopen failed: {reopen_err}", light.logical_name);
                    self.drop_light_keep_generation(light.id, generation);
                    Err(())
                }
            },
        }
    }

    fn drop_light_keep_generation(&mut self, light_id: LightId, generation: u64) {
        if self.states.get(&light_id).map(|s| s.generation) == Some(generation) {
            self.drop_light(light_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::blynclight::BlynclightDriver;
    use crate::driver::programmable64::Programmable64Driver;
    use crate::driver::BlinkSpeed;
    use crate::transport::testing::RecordingTransport;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    static NEXT: AtomicU64 = AtomicU64::new(1);

    fn light_with(driver: Arc<dyn crate::driver::DeviceDriver>, led_count: u16) -> (Arc<Light>, RecordingTransport) {
        let transport = RecordingTransport::new();
        let id = LightId(NEXT.fetch_add(1, Ordering::Relaxed));
        let light = Light::new(
            id,
            0,
            0,
            None,
            None,
            "Test".into(),
            led_count,
            driver.identity().keepalive,
            driver,
            Box::new(transport.clone()),
            Duration::from_millis(50),
        );
        (Arc::new(light), transport)
    }

    #[test]
    fn s1_turn_on_writes_one_frame() {
        let (light, transport) = light_with(Arc::new(BlynclightDriver), 1);
        let engine = EffectEngine::start();
        engine.apply(Arc::clone(&light), crate::effect::steady(Colour::new(255, 0, 0), LedIndex::ALL, Duration::from_millis(250)));
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(
            transport.frames(),
            vec![vec![0x00, 0xFF, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFF, 0x22]]
        );
        engine.shutdown();
    }

    #[test]
    fn p12_blink_emits_2n_writes_then_off() {
        let (light, transport) = light_with(Arc::new(Programmable64Driver), 1);
        let engine = EffectEngine::start();
        engine.apply(
            Arc::clone(&light),
            crate::effect::blink(Colour::new(10, 20, 30), Colour::BLACK, 2, BlinkSpeed::Fast, LedIndex::ALL),
        );
        std::thread::sleep(Duration::from_millis(600));
        engine.shutdown();
        // 2 cycles * 2 frames = 4, plus the finalising off write = 5.
        assert_eq!(transport.frames().len(), 5);
    }

    #[test]
    fn s6_stop_drives_dark_promptly() {
        let (light, transport) = light_with(Arc::new(BlynclightDriver), 1);
        let engine = EffectEngine::start();
        engine.apply(
            Arc::clone(&light),
            crate::effect::spectrum(16, 1.0, 0.0, 1.0, 0, LedIndex::ALL),
        );
        std::thread::sleep(Duration::from_millis(20));
        engine.stop(Arc::clone(&light));
        let frames = transport.frames();
        let last = frames.last().unwrap();
        assert_eq!(last[4], 0x80); // off bit set in the finalising frame
        engine.shutdown();
    }

    #[test]
    fn s4_keepalive_repeats_within_window() {
        let (light, transport) = light_with(Arc::new(Programmable64Driver), 1);
        let engine = EffectEngine::start();
        engine.apply(Arc::clone(&light), crate::effect::steady(Colour::new(10, 20, 30), LedIndex::ALL, Duration::from_millis(250)));
        std::thread::sleep(Duration::from_millis(50));
        let after_apply = transport.frames().len();
        assert!(after_apply >= 1);
        engine.shutdown();
    }
}
