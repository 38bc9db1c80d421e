//! Trigger engine
//!
//! Consumes raw input events and classifies them against the registered
//! triggers. Matching evaluates in registration order and every matching
//! trigger fires; firing hands the macro id to the playback engine on a
//! spawned task so the event path never blocks.
//!
//! Hold detection arms at most one timer per input identifier. Re-arming
//! replaces the outstanding timer; key release and trigger removal cancel
//! it without firing.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use indexmap::IndexMap;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::trigger::{Trigger, TriggerCatalogue, TriggerError, TriggerKind, TriggerResult};
use mw_devices::{CapabilityKind, DeviceRegistry};
use mw_playback::MacroEngine;

/// Tap history entries older than this are pruned
const HISTORY_WINDOW: Duration = Duration::from_millis(1000);

/// One polled joystick sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JoystickInput {
    /// Current state of one button
    Button { index: u32, pressed: bool },
    /// Current position of one axis
    Axis { index: u32, value: f64 },
}

/// An armed hold timer; the token guards against a replacement racing the
/// expiry
struct ArmedTimer {
    token: String,
    task: JoinHandle<()>,
}

/// Trigger catalogue owner and input event classifier
pub struct TriggerEngine {
    triggers: Arc<RwLock<IndexMap<String, Trigger>>>,
    held: Arc<Mutex<HashSet<String>>>,
    history: Arc<Mutex<HashMap<String, Vec<Instant>>>>,
    hold_timers: Arc<Mutex<HashMap<String, ArmedTimer>>>,
    devices: Arc<dyn DeviceRegistry>,
    playback: Arc<MacroEngine>,
    running: Arc<AtomicBool>,
}

impl TriggerEngine {
    /// Create an engine; event processing starts stopped, call [`start`]
    ///
    /// [`start`]: TriggerEngine::start
    pub fn new(devices: Arc<dyn DeviceRegistry>, playback: Arc<MacroEngine>) -> Self {
        Self {
            triggers: Arc::new(RwLock::new(IndexMap::new())),
            held: Arc::new(Mutex::new(HashSet::new())),
            history: Arc::new(Mutex::new(HashMap::new())),
            hold_timers: Arc::new(Mutex::new(HashMap::new())),
            devices,
            playback,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    // --- Catalogue ---

    /// Register a trigger with the documented defaults, returning its id
    pub fn register_trigger(
        &self,
        kind: TriggerKind,
        macro_id: impl Into<String>,
        device_id: impl Into<String>,
        input_name: impl Into<String>,
    ) -> String {
        let trigger = Trigger::new(kind, macro_id, device_id, input_name);
        let id = trigger.id.clone();
        info!(trigger_id = %id, ?kind, input = %trigger.input_name, "registered trigger");
        self.triggers_mut().insert(id.clone(), trigger);
        id
    }

    /// Remove a trigger, cancelling any hold timer armed on its input
    pub fn remove_trigger(&self, trigger_id: &str) -> TriggerResult<Trigger> {
        let removed = self
            .triggers_mut()
            .shift_remove(trigger_id)
            .ok_or_else(|| TriggerError::NotFound(trigger_id.to_string()))?;
        self.cancel_hold_timer(&removed.input_name);
        info!(trigger_id, input = %removed.input_name, "removed trigger");
        Ok(removed)
    }

    /// Look up a trigger by id
    pub fn get_trigger(&self, trigger_id: &str) -> Option<Trigger> {
        self.triggers_read().get(trigger_id).cloned()
    }

    /// All triggers in registration order
    pub fn list_triggers(&self) -> Vec<Trigger> {
        self.triggers_read().values().cloned().collect()
    }

    /// Number of registered triggers
    pub fn trigger_count(&self) -> usize {
        self.triggers_read().len()
    }

    /// Point a trigger at a different macro
    pub fn set_macro_id(&self, trigger_id: &str, macro_id: impl Into<String>) -> TriggerResult<()> {
        self.update_trigger(trigger_id, |t| t.macro_id = macro_id.into())
    }

    /// Rebind a trigger to a different device
    pub fn set_device_id(
        &self,
        trigger_id: &str,
        device_id: impl Into<String>,
    ) -> TriggerResult<()> {
        self.update_trigger(trigger_id, |t| t.device_id = device_id.into())
    }

    /// Change the input a trigger watches; any timer on the old input is
    /// cancelled
    pub fn set_input_name(
        &self,
        trigger_id: &str,
        input_name: impl Into<String>,
    ) -> TriggerResult<()> {
        let old_input = self
            .get_trigger(trigger_id)
            .ok_or_else(|| TriggerError::NotFound(trigger_id.to_string()))?
            .input_name;
        self.update_trigger(trigger_id, |t| t.input_name = input_name.into())?;
        self.cancel_hold_timer(&old_input);
        Ok(())
    }

    /// Replace a combo trigger's modifier set
    pub fn set_modifiers(&self, trigger_id: &str, modifiers: Vec<String>) -> TriggerResult<()> {
        self.update_trigger(trigger_id, |t| t.modifiers = modifiers)
    }

    /// Set the axis magnitude threshold
    pub fn set_axis_threshold(&self, trigger_id: &str, threshold: f64) -> TriggerResult<()> {
        self.update_trigger(trigger_id, |t| t.axis_threshold = threshold)
    }

    /// Set the hold duration in milliseconds
    pub fn set_hold_duration_ms(&self, trigger_id: &str, duration_ms: u64) -> TriggerResult<()> {
        self.update_trigger(trigger_id, |t| t.hold_duration_ms = duration_ms)
    }

    /// Set the double-tap window in milliseconds
    pub fn set_double_tap_window_ms(&self, trigger_id: &str, window_ms: u64) -> TriggerResult<()> {
        self.update_trigger(trigger_id, |t| t.double_tap_window_ms = window_ms)
    }

    /// Enable or disable a trigger
    pub fn set_enabled(&self, trigger_id: &str, enabled: bool) -> TriggerResult<()> {
        self.update_trigger(trigger_id, |t| t.enabled = enabled)
    }

    /// Flip a trigger's enabled flag, returning the new state
    pub fn toggle_trigger(&self, trigger_id: &str) -> TriggerResult<bool> {
        let mut enabled = false;
        self.update_trigger(trigger_id, |t| {
            t.enabled = !t.enabled;
            enabled = t.enabled;
        })?;
        Ok(enabled)
    }

    // --- Persistence ---

    /// Snapshot the catalogue for persistence
    pub fn to_records(&self) -> TriggerCatalogue {
        TriggerCatalogue {
            triggers: self.triggers_read().clone(),
        }
    }

    /// Replace the catalogue from persisted records
    pub fn load_records(&self, catalogue: TriggerCatalogue) {
        let count = catalogue.triggers.len();
        *self.triggers_mut() = catalogue.triggers;
        info!(count, "loaded trigger catalogue");
    }

    // --- Lifecycle ---

    /// Begin processing input events
    pub fn start(&self) {
        if !self.running.swap(true, Ordering::SeqCst) {
            info!("trigger engine started");
        }
    }

    /// Stop processing and reset all transient state: held set, tap history,
    /// every armed hold timer. Idempotent.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.lock(&self.held).clear();
        self.lock(&self.history).clear();
        let timers: Vec<ArmedTimer> = self.lock(&self.hold_timers).drain().map(|(_, t)| t).collect();
        for timer in &timers {
            timer.task.abort();
        }
        info!(cancelled_timers = timers.len(), "trigger engine stopped");
    }

    /// Whether events are currently processed
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    // --- Event input ---

    /// Key (or button) went down
    pub fn on_input_down(&self, input: &str) {
        if !self.is_running() {
            return;
        }

        self.lock(&self.held).insert(input.to_string());
        let gap = self.record_tap(input);

        let triggers = self.list_triggers();
        for trigger in &triggers {
            if !trigger.enabled || trigger.input_name != input {
                continue;
            }
            if !self.device_passes_gating(&trigger.device_id) {
                debug!(trigger_id = %trigger.id, device_id = %trigger.device_id, "event gated");
                continue;
            }

            match trigger.kind {
                TriggerKind::Press => self.fire(trigger),
                TriggerKind::Combo => {
                    let held = self.lock(&self.held);
                    if trigger.modifiers.iter().all(|m| held.contains(m)) {
                        drop(held);
                        self.fire(trigger);
                    }
                }
                TriggerKind::Hold => self.arm_hold_timer(trigger),
                TriggerKind::DoubleTap => {
                    if let Some(gap) = gap {
                        if gap <= Duration::from_millis(trigger.double_tap_window_ms) {
                            self.fire(trigger);
                        }
                    }
                }
                TriggerKind::JoystickButton | TriggerKind::JoystickAxis => {}
            }
        }
    }

    /// Key (or button) went up
    pub fn on_input_up(&self, input: &str) {
        if !self.is_running() {
            return;
        }
        self.lock(&self.held).remove(input);
        self.cancel_hold_timer(input);
    }

    /// One polled joystick sample
    ///
    /// Samples from disconnected or disabled devices are dropped before any
    /// matching. Axis matching is level-triggered: a trigger re-fires on
    /// every sample at or past its threshold.
    pub fn on_joystick_sample(&self, device_id: &str, sample: JoystickInput) {
        if !self.is_running() {
            return;
        }
        if !self.device_passes_gating(device_id) {
            debug!(device_id, "joystick sample gated");
            return;
        }

        let input_name = self.joystick_input_name(device_id, sample);

        let triggers = self.list_triggers();
        for trigger in &triggers {
            if !trigger.enabled
                || trigger.device_id != device_id
                || trigger.input_name != input_name
            {
                continue;
            }

            match (trigger.kind, sample) {
                (TriggerKind::JoystickButton, JoystickInput::Button { pressed: true, .. }) => {
                    self.fire(trigger);
                }
                (TriggerKind::JoystickAxis, JoystickInput::Axis { value, .. }) => {
                    if value.abs() >= trigger.axis_threshold {
                        self.fire(trigger);
                    }
                }
                _ => {}
            }
        }
    }

    // --- Internals ---

    /// Append a tap timestamp, prune stale entries, and return the gap
    /// between the two most recent taps
    fn record_tap(&self, input: &str) -> Option<Duration> {
        let now = Instant::now();
        let mut history = self.lock(&self.history);
        let taps = history.entry(input.to_string()).or_default();
        taps.push(now);
        taps.retain(|t| now.duration_since(*t) <= HISTORY_WINDOW);

        match taps.as_slice() {
            [.., previous, latest] => Some(latest.duration_since(*previous)),
            _ => None,
        }
    }

    fn device_passes_gating(&self, device_id: &str) -> bool {
        self.devices.is_connected(device_id) && self.devices.is_enabled(device_id)
    }

    /// Resolve a sample to its canonical capability name, or the positional
    /// fallback for devices with no capability data
    fn joystick_input_name(&self, device_id: &str, sample: JoystickInput) -> String {
        let (kind, index) = match sample {
            JoystickInput::Button { index, .. } => (CapabilityKind::Button, index),
            JoystickInput::Axis { index, .. } => (CapabilityKind::Axis, index),
        };

        self.devices
            .capabilities(device_id)
            .into_iter()
            .find(|c| c.kind == kind && c.index == index)
            .map(|c| c.name)
            .unwrap_or_else(|| match kind {
                CapabilityKind::Button => format!("button{index}"),
                _ => format!("axis{index}"),
            })
    }

    /// Request playback without waiting for it
    fn fire(&self, trigger: &Trigger) {
        debug!(trigger_id = %trigger.id, macro_id = %trigger.macro_id, kind = ?trigger.kind, "trigger fired");
        let playback = Arc::clone(&self.playback);
        let macro_id = trigger.macro_id.clone();
        tokio::spawn(async move {
            playback.play_macro(&macro_id).await;
        });
    }

    /// Arm (or replace) the hold timer for a trigger's input
    fn arm_hold_timer(&self, trigger: &Trigger) {
        let input = trigger.input_name.clone();
        let trigger_id = trigger.id.clone();
        let duration = Duration::from_millis(trigger.hold_duration_ms);
        let token = ulid::Ulid::new().to_string();

        let running = Arc::clone(&self.running);
        let held = Arc::clone(&self.held);
        let triggers = Arc::clone(&self.triggers);
        let hold_timers = Arc::clone(&self.hold_timers);
        let devices = Arc::clone(&self.devices);
        let playback = Arc::clone(&self.playback);
        let task_token = token.clone();
        let task_input = input.clone();

        let task = tokio::spawn(async move {
            tokio::time::sleep(duration).await;

            // Disarm ourselves; a replacement may already own the slot.
            {
                let mut timers = hold_timers.lock().unwrap_or_else(|e| e.into_inner());
                match timers.get(&task_input) {
                    Some(armed) if armed.token == task_token => {
                        timers.remove(&task_input);
                    }
                    _ => return,
                }
            }

            if !running.load(Ordering::SeqCst) {
                return;
            }
            let still_held = held
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .contains(&task_input);
            if !still_held {
                return;
            }

            let trigger = triggers
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .get(&trigger_id)
                .cloned();
            let Some(trigger) = trigger else { return };
            if !trigger.enabled {
                return;
            }
            if !(devices.is_connected(&trigger.device_id) && devices.is_enabled(&trigger.device_id))
            {
                debug!(trigger_id = %trigger.id, "hold expiry gated");
                return;
            }

            debug!(trigger_id = %trigger.id, macro_id = %trigger.macro_id, "hold trigger fired");
            playback.play_macro(&trigger.macro_id).await;
        });

        let mut timers = self.lock(&self.hold_timers);
        if let Some(old) = timers.insert(input.clone(), ArmedTimer { token, task }) {
            debug!(input = %input, "hold timer re-armed");
            old.task.abort();
        }
    }

    /// Cancel the hold timer on an input without firing it
    fn cancel_hold_timer(&self, input: &str) {
        if let Some(timer) = self.lock(&self.hold_timers).remove(input) {
            debug!(input, "hold timer cancelled");
            timer.task.abort();
        }
    }

    fn triggers_read(&self) -> std::sync::RwLockReadGuard<'_, IndexMap<String, Trigger>> {
        self.triggers.read().unwrap_or_else(|e| e.into_inner())
    }

    fn triggers_mut(&self) -> std::sync::RwLockWriteGuard<'_, IndexMap<String, Trigger>> {
        self.triggers.write().unwrap_or_else(|e| e.into_inner())
    }

    fn lock<'a, T>(&self, mutex: &'a Mutex<T>) -> std::sync::MutexGuard<'a, T> {
        mutex.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn update_trigger(
        &self,
        trigger_id: &str,
        f: impl FnOnce(&mut Trigger),
    ) -> TriggerResult<()> {
        let mut triggers = self.triggers_mut();
        let trigger = triggers
            .get_mut(trigger_id)
            .ok_or_else(|| TriggerError::NotFound(trigger_id.to_string()))?;
        f(trigger);
        Ok(())
    }
}

impl Drop for TriggerEngine {
    fn drop(&mut self) {
        // No timer may outlive the engine.
        let timers = self.lock(&self.hold_timers);
        for timer in timers.values() {
            timer.task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mw_injector::MemoryInjector;
    use mw_playback::MacroEngine;

    fn setup() -> (TriggerEngine, Arc<mw_devices::DeviceTable>) {
        let devices = mw_devices::DeviceTable::shared();
        devices.register("kbd-1", "Keyboard", Vec::new());
        let playback = Arc::new(MacroEngine::new(Arc::new(MemoryInjector::new())));
        let engine = TriggerEngine::new(devices.clone(), playback);
        (engine, devices)
    }

    #[test]
    fn register_applies_defaults_and_preserves_order() {
        let (engine, _) = setup();

        let a = engine.register_trigger(TriggerKind::Press, "m1", "kbd-1", "a");
        let b = engine.register_trigger(TriggerKind::Hold, "m2", "kbd-1", "b");

        let listed = engine.list_triggers();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, a);
        assert_eq!(listed[1].id, b);
        assert_eq!(listed[1].hold_duration_ms, 500);
    }

    #[test]
    fn remove_unknown_trigger_errors() {
        let (engine, _) = setup();
        assert!(matches!(
            engine.remove_trigger("ghost"),
            Err(TriggerError::NotFound(_))
        ));
    }

    #[test]
    fn setters_mutate_fields() {
        let (engine, _) = setup();
        let id = engine.register_trigger(TriggerKind::Combo, "m1", "kbd-1", "c");

        engine
            .set_modifiers(&id, vec!["Control".into(), "Shift".into()])
            .unwrap();
        engine.set_double_tap_window_ms(&id, 250).unwrap();
        engine.set_axis_threshold(&id, 0.75).unwrap();

        let t = engine.get_trigger(&id).unwrap();
        assert_eq!(t.modifiers, vec!["Control", "Shift"]);
        assert_eq!(t.double_tap_window_ms, 250);
        assert_eq!(t.axis_threshold, 0.75);

        assert!(!engine.toggle_trigger(&id).unwrap());
        assert!(engine.toggle_trigger(&id).unwrap());
    }

    #[tokio::test]
    async fn events_are_ignored_until_started() {
        let (engine, _) = setup();
        engine.register_trigger(TriggerKind::Press, "m1", "kbd-1", "a");

        engine.on_input_down("a");
        assert!(!engine.is_running());

        engine.start();
        assert!(engine.is_running());
    }

    #[tokio::test]
    async fn stop_is_an_idempotent_full_reset() {
        let (engine, _) = setup();
        engine.register_trigger(TriggerKind::Hold, "m1", "kbd-1", "f");
        engine.start();

        engine.on_input_down("f");
        engine.stop();
        engine.stop();
        assert!(!engine.is_running());
    }

    #[test]
    fn records_round_trip() {
        let (engine, _) = setup();
        engine.register_trigger(TriggerKind::Press, "m1", "kbd-1", "a");
        engine.register_trigger(TriggerKind::DoubleTap, "m2", "kbd-1", "b");

        let records = engine.to_records();
        let (other, _) = setup();
        other.load_records(records.clone());

        assert_eq!(other.to_records(), records);
        assert_eq!(other.trigger_count(), 2);
    }
}
