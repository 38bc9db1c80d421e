//! Macro engine
//!
//! Owns the macro catalogue and the table of live playback sessions. Each
//! session is a spawned task walking the action list; stop requests travel
//! over a watch channel and are observed at pass and action boundaries. Per
//! macro id at most one session exists: playing an already-playing macro
//! stops the old session and starts over.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use dashmap::DashMap;
use indexmap::IndexMap;
use thiserror::Error;
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::action::{Action, ActionKind};
use crate::keymap::native_key;
use crate::model::{Macro, MacroCatalogue};
use mw_injector::InputInjector;

/// Settle pause after taps and clicks, for platform stability
const SETTLE: Duration = Duration::from_millis(50);

/// Playback errors
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("Macro not found: {0}")]
    MacroNotFound(String),

    #[error("Action not found: {action_id} in macro {macro_id}")]
    ActionNotFound { macro_id: String, action_id: String },

    #[error("Action position {index} out of range (len {len})")]
    PositionOutOfRange { index: usize, len: usize },
}

/// Result type for catalogue operations
pub type PlaybackResult<T> = Result<T, PlaybackError>;

/// Snapshot of one live session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    /// Macro being played
    pub macro_id: String,
    /// Pass currently in progress (1-based)
    pub pass: u32,
}

/// Handle to a live session; dropping out of the table is IDLE
struct SessionHandle {
    session_id: String,
    stop: watch::Sender<bool>,
    pass: Arc<AtomicU32>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Signal stop and wait for the task to observe it
    async fn cancel(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.task.await {
            if e.is_panic() {
                warn!("playback session panicked during cancel");
            }
        }
    }
}

/// Macro catalogue owner and playback session runner
pub struct MacroEngine {
    macros: RwLock<IndexMap<String, Macro>>,
    sessions: Arc<DashMap<String, SessionHandle>>,
    /// Serializes session start/stop so concurrent requests for one macro
    /// cannot race past the at-most-one-session guarantee
    lifecycle: Mutex<()>,
    injector: Arc<dyn InputInjector>,
}

impl MacroEngine {
    /// Create an engine driving the given injector
    pub fn new(injector: Arc<dyn InputInjector>) -> Self {
        Self {
            macros: RwLock::new(IndexMap::new()),
            sessions: Arc::new(DashMap::new()),
            lifecycle: Mutex::new(()),
            injector,
        }
    }

    // --- Catalogue ---

    /// Create an empty macro, returning its id
    pub fn create_macro(&self, name: impl Into<String>) -> String {
        let mac = Macro::new(name);
        let id = mac.id.clone();
        info!(macro_id = %id, name = %mac.name, "created macro");
        self.macros_mut().insert(id.clone(), mac);
        id
    }

    /// Look up a macro by id
    pub fn get_macro(&self, macro_id: &str) -> Option<Macro> {
        self.macros_read().get(macro_id).cloned()
    }

    /// All macros in creation order
    pub fn list_macros(&self) -> Vec<Macro> {
        self.macros_read().values().cloned().collect()
    }

    /// Number of stored macros
    pub fn macro_count(&self) -> usize {
        self.macros_read().len()
    }

    /// Rename a macro
    pub fn rename_macro(&self, macro_id: &str, name: impl Into<String>) -> PlaybackResult<()> {
        self.update_macro(macro_id, |m| {
            m.name = name.into();
        })
    }

    /// Replace a macro's description
    pub fn set_description(
        &self,
        macro_id: &str,
        description: impl Into<String>,
    ) -> PlaybackResult<()> {
        self.update_macro(macro_id, |m| {
            m.description = description.into();
        })
    }

    /// Set the repeat count (0 = until stopped)
    pub fn set_repeat_count(&self, macro_id: &str, repeat_count: u32) -> PlaybackResult<()> {
        self.update_macro(macro_id, |m| {
            m.repeat_count = repeat_count;
        })
    }

    /// Enable or disable a macro
    pub fn set_enabled(&self, macro_id: &str, enabled: bool) -> PlaybackResult<()> {
        self.update_macro(macro_id, |m| {
            m.enabled = enabled;
        })
    }

    /// Flip a macro's enabled flag, returning the new state
    pub fn toggle_macro(&self, macro_id: &str) -> PlaybackResult<bool> {
        let mut enabled = false;
        self.update_macro(macro_id, |m| {
            m.enabled = !m.enabled;
            enabled = m.enabled;
        })?;
        Ok(enabled)
    }

    /// Delete a macro, stopping any active session for it first
    pub async fn delete_macro(&self, macro_id: &str) -> PlaybackResult<Macro> {
        self.stop_macro(macro_id).await;
        let removed = self
            .macros_mut()
            .shift_remove(macro_id)
            .ok_or_else(|| PlaybackError::MacroNotFound(macro_id.to_string()))?;
        info!(macro_id, name = %removed.name, "deleted macro");
        Ok(removed)
    }

    /// Append an action to the end of a macro's sequence
    pub fn append_action(&self, macro_id: &str, action: Action) -> PlaybackResult<()> {
        self.update_macro(macro_id, |m| {
            m.actions.push(action);
        })
    }

    /// Remove an action by id
    pub fn remove_action(&self, macro_id: &str, action_id: &str) -> PlaybackResult<Action> {
        let mut removed = None;
        self.update_macro(macro_id, |m| {
            if let Some(pos) = m.actions.iter().position(|a| a.id == action_id) {
                removed = Some(m.actions.remove(pos));
            }
        })?;
        removed.ok_or_else(|| PlaybackError::ActionNotFound {
            macro_id: macro_id.to_string(),
            action_id: action_id.to_string(),
        })
    }

    /// Move an action from one position to another, preserving the rest of
    /// the order
    pub fn move_action(&self, macro_id: &str, from: usize, to: usize) -> PlaybackResult<()> {
        let mut result = Ok(());
        self.update_macro(macro_id, |m| {
            let len = m.actions.len();
            if from >= len || to >= len {
                result = Err(PlaybackError::PositionOutOfRange {
                    index: from.max(to),
                    len,
                });
                return;
            }
            let action = m.actions.remove(from);
            m.actions.insert(to, action);
        })?;
        result
    }

    // --- Persistence ---

    /// Snapshot the catalogue for persistence
    pub fn to_records(&self) -> MacroCatalogue {
        MacroCatalogue {
            macros: self.macros_read().clone(),
        }
    }

    /// Replace the catalogue from persisted records
    ///
    /// Intended for load at startup; live sessions keep the macro they
    /// started with.
    pub fn load_records(&self, catalogue: MacroCatalogue) {
        let count = catalogue.macros.len();
        *self.macros_mut() = catalogue.macros;
        info!(count, "loaded macro catalogue");
    }

    // --- Playback ---

    /// Start (or restart) playback of a macro
    ///
    /// Missing or disabled macros log and no-op. An active session for the
    /// same macro is stopped and fully drained before the new one starts, so
    /// at most one session per macro id ever runs.
    pub async fn play_macro(&self, macro_id: &str) {
        let mac = match self.get_macro(macro_id) {
            Some(m) => m,
            None => {
                warn!(macro_id, "cannot play: macro not found");
                return;
            }
        };
        if !mac.enabled {
            debug!(macro_id, "cannot play: macro disabled");
            return;
        }

        let _lifecycle = self.lifecycle.lock().await;

        // Restart semantics: supersede any session already playing this id.
        if let Some((_, existing)) = self.sessions.remove(macro_id) {
            debug!(macro_id, "restarting: stopping existing session");
            existing.cancel().await;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let pass = Arc::new(AtomicU32::new(0));
        let session_id = ulid::Ulid::new().to_string();

        info!(macro_id, name = %mac.name, repeat = mac.repeat_count, "starting playback");

        // The session only begins once its handle is in the table, so even
        // an instantly-finishing session finds its own entry to clear.
        let (ready_tx, ready_rx) = oneshot::channel::<()>();
        let injector = Arc::clone(&self.injector);
        let sessions = Arc::clone(&self.sessions);
        let session_pass = Arc::clone(&pass);
        let task_session_id = session_id.clone();
        let task = tokio::spawn(async move {
            let _ = ready_rx.await;
            run_session(mac, injector, stop_rx, session_pass, sessions, task_session_id).await;
        });

        self.sessions.insert(
            macro_id.to_string(),
            SessionHandle {
                session_id,
                stop: stop_tx,
                pass,
                task,
            },
        );
        let _ = ready_tx.send(());
    }

    /// Stop a macro's session, waiting until it is idle; no-op if idle
    pub async fn stop_macro(&self, macro_id: &str) {
        let _lifecycle = self.lifecycle.lock().await;
        if let Some((_, handle)) = self.sessions.remove(macro_id) {
            debug!(macro_id, "stopping playback");
            handle.cancel().await;
        }
    }

    /// Stop every live session
    pub async fn stop_all(&self) {
        let ids: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            self.stop_macro(&id).await;
        }
    }

    /// Whether a session is live for the macro
    pub fn is_playing(&self, macro_id: &str) -> bool {
        self.sessions.contains_key(macro_id)
    }

    /// Snapshot of all live sessions
    pub fn active_sessions(&self) -> Vec<ActiveSession> {
        self.sessions
            .iter()
            .map(|e| ActiveSession {
                macro_id: e.key().clone(),
                pass: e.value().pass.load(Ordering::Relaxed),
            })
            .collect()
    }

    // --- Internals ---

    fn macros_read(&self) -> std::sync::RwLockReadGuard<'_, IndexMap<String, Macro>> {
        self.macros.read().unwrap_or_else(|e| e.into_inner())
    }

    fn macros_mut(&self) -> std::sync::RwLockWriteGuard<'_, IndexMap<String, Macro>> {
        self.macros.write().unwrap_or_else(|e| e.into_inner())
    }

    fn update_macro(&self, macro_id: &str, f: impl FnOnce(&mut Macro)) -> PlaybackResult<()> {
        let mut macros = self.macros_mut();
        let mac = macros
            .get_mut(macro_id)
            .ok_or_else(|| PlaybackError::MacroNotFound(macro_id.to_string()))?;
        f(mac);
        mac.touch();
        Ok(())
    }
}

/// One playback session: R passes over the action list, stop observed
/// between passes and actions
async fn run_session(
    mac: Macro,
    injector: Arc<dyn InputInjector>,
    mut stop: watch::Receiver<bool>,
    pass_counter: Arc<AtomicU32>,
    sessions: Arc<DashMap<String, SessionHandle>>,
    session_id: String,
) {
    let repeat = mac.repeat_count;
    let mut pass = 0u32;

    if mac.actions.is_empty() {
        debug!(macro_id = %mac.id, "macro has no actions, nothing to play");
    } else {
        'session: loop {
            if *stop.borrow() {
                break;
            }
            if repeat != 0 && pass >= repeat {
                break;
            }
            pass += 1;
            pass_counter.store(pass, Ordering::Relaxed);
            debug!(macro_id = %mac.id, pass, "starting pass");

            for action in &mac.actions {
                if *stop.borrow() {
                    break 'session;
                }
                execute_action(action, injector.as_ref(), &mut stop).await;
            }
        }
    }

    debug!(macro_id = %mac.id, passes = pass, "playback idle");

    // Only clear the table entry if it still belongs to this session; a
    // restart may already have replaced it.
    sessions.remove_if(&mac.id, |_, handle| handle.session_id == session_id);
}

/// Execute one action; injector failures degrade the action to a no-op
async fn execute_action(
    action: &Action,
    injector: &dyn InputInjector,
    stop: &mut watch::Receiver<bool>,
) {
    match action.kind {
        ActionKind::TimerDelay => {
            // The one point with immediate cancellation: the sleep races the
            // stop channel.
            tokio::select! {
                _ = sleep(Duration::from_millis(action.duration_ms)) => {}
                _ = stop.changed() => {
                    debug!(action_id = %action.id, "delay interrupted by stop");
                }
            }
        }
        ActionKind::KeyTap => {
            let key = native_key(&action.input_name);
            log_injection(injector.tap_key(&key).await, "key-tap", &key);
            sleep(SETTLE).await;
        }
        ActionKind::KeyHold => {
            let key = native_key(&action.input_name);
            log_injection(injector.hold_key(&key).await, "key-hold", &key);
            sleep(Duration::from_millis(action.duration_ms)).await;
        }
        ActionKind::KeyRelease => {
            let key = native_key(&action.input_name);
            log_injection(injector.release_key(&key).await, "key-release", &key);
        }
        ActionKind::MouseClick => {
            let button = action.value.as_str().unwrap_or("left");
            log_injection(injector.click(button).await, "mouse-click", button);
            sleep(SETTLE).await;
        }
        ActionKind::MouseMove => {
            let x = action.value.get("x").and_then(|v| v.as_i64());
            let y = action.value.get("y").and_then(|v| v.as_i64());
            match (x, y) {
                (Some(x), Some(y)) => {
                    log_injection(
                        injector.move_cursor(x as i32, y as i32).await,
                        "mouse-move",
                        "",
                    );
                }
                _ => warn!(action_id = %action.id, "mouse-move without coordinates, skipping"),
            }
        }
        ActionKind::JoystickButton | ActionKind::JoystickAxis => {
            // No writable joystick surface on the host.
            debug!(action_id = %action.id, kind = ?action.kind, "joystick output unsupported, skipping");
        }
    }
}

fn log_injection(result: mw_injector::InjectorResult, kind: &str, detail: &str) {
    if let Err(e) = result {
        warn!(kind, detail, error = %e, "injection failed, action skipped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn engine() -> MacroEngine {
        MacroEngine::new(Arc::new(mw_injector::MemoryInjector::new()))
    }

    #[test]
    fn create_and_list_preserve_order() {
        let engine = engine();
        let a = engine.create_macro("a");
        let b = engine.create_macro("b");

        let listed = engine.list_macros();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, a);
        assert_eq!(listed[1].id, b);
    }

    #[test]
    fn setters_touch_modified_timestamp() {
        let engine = engine();
        let id = engine.create_macro("m");
        let before = engine.get_macro(&id).unwrap().modified_at;

        engine.set_repeat_count(&id, 3).unwrap();
        let mac = engine.get_macro(&id).unwrap();
        assert_eq!(mac.repeat_count, 3);
        assert!(mac.modified_at >= before);
    }

    #[test]
    fn unknown_macro_errors_not_found() {
        let engine = engine();
        assert!(matches!(
            engine.rename_macro("nope", "x"),
            Err(PlaybackError::MacroNotFound(_))
        ));
    }

    #[test]
    fn action_list_mutations_keep_order() {
        let engine = engine();
        let id = engine.create_macro("m");

        for name in ["KeyA", "KeyB", "KeyC"] {
            engine
                .append_action(&id, Action::tap("kbd-1", name))
                .unwrap();
        }

        engine.move_action(&id, 2, 0).unwrap();
        let names: Vec<String> = engine
            .get_macro(&id)
            .unwrap()
            .actions
            .iter()
            .map(|a| a.input_name.clone())
            .collect();
        assert_eq!(names, vec!["KeyC", "KeyA", "KeyB"]);

        let ka = engine.get_macro(&id).unwrap().actions[1].id.clone();
        let removed = engine.remove_action(&id, &ka).unwrap();
        assert_eq!(removed.input_name, "KeyA");
        assert_eq!(engine.get_macro(&id).unwrap().actions.len(), 2);
    }

    #[test]
    fn move_action_rejects_out_of_range() {
        let engine = engine();
        let id = engine.create_macro("m");
        engine
            .append_action(&id, Action::tap("kbd-1", "KeyA"))
            .unwrap();

        assert!(matches!(
            engine.move_action(&id, 0, 5),
            Err(PlaybackError::PositionOutOfRange { .. })
        ));
    }

    #[test]
    fn toggle_flips_enabled() {
        let engine = engine();
        let id = engine.create_macro("m");

        assert!(!engine.toggle_macro(&id).unwrap());
        assert!(engine.toggle_macro(&id).unwrap());
    }

    #[test]
    fn records_round_trip() {
        let engine = engine();
        let id = engine.create_macro("m");
        engine
            .append_action(
                &id,
                Action::new(ActionKind::MouseClick, "mouse-1", "").with_value(json!("right")),
            )
            .unwrap();

        let records = engine.to_records();
        let other = self::engine();
        other.load_records(records.clone());

        assert_eq!(other.to_records(), records);
        assert_eq!(other.get_macro(&id).unwrap().actions.len(), 1);
    }

    #[tokio::test]
    async fn play_missing_or_disabled_is_a_no_op() {
        let engine = engine();
        engine.play_macro("ghost").await;
        assert!(engine.active_sessions().is_empty());

        let id = engine.create_macro("m");
        engine.set_enabled(&id, false).unwrap();
        engine.play_macro(&id).await;
        assert!(!engine.is_playing(&id));
    }

    #[tokio::test]
    async fn stop_macro_is_idempotent() {
        let engine = engine();
        let id = engine.create_macro("m");

        engine.stop_macro(&id).await;
        engine.stop_macro(&id).await;
        assert!(!engine.is_playing(&id));
    }
}
