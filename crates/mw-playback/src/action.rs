//! Action types
//!
//! Actions are the building blocks of macros. Each one simulates a single
//! input (key, mouse, joystick) or pauses playback for a fixed duration.

use serde::{Deserialize, Serialize};

/// What a single action does during playback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    /// Press and release a key
    KeyTap,

    /// Press a key and keep it held for the action's duration
    KeyHold,

    /// Release a previously held key
    KeyRelease,

    /// Joystick button output; no writable surface exists, executed as a no-op
    JoystickButton,

    /// Joystick axis output; no writable surface exists, executed as a no-op
    JoystickAxis,

    /// Move the cursor to absolute coordinates taken from `value`
    MouseMove,

    /// Click the mouse button named by `value`
    MouseClick,

    /// Suspend the session for the action's duration
    TimerDelay,
}

fn new_id() -> String {
    ulid::Ulid::new().to_string()
}

/// One atomic step of a macro
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Unique action id
    #[serde(default = "new_id")]
    pub id: String,

    /// What this action does
    pub kind: ActionKind,

    /// Device the action is associated with (informational for playback)
    #[serde(default)]
    pub device_id: String,

    /// Logical input name (e.g. "ArrowUp"); translated before injection
    #[serde(default)]
    pub input_name: String,

    /// Kind-specific payload: button name for clicks, `{x, y}` for moves
    #[serde(default)]
    pub value: serde_json::Value,

    /// Duration in milliseconds for delays and holds
    #[serde(default)]
    pub duration_ms: u64,
}

impl Action {
    /// Create an action with a fresh id and empty payload
    pub fn new(kind: ActionKind, device_id: impl Into<String>, input_name: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            kind,
            device_id: device_id.into(),
            input_name: input_name.into(),
            value: serde_json::Value::Null,
            duration_ms: 0,
        }
    }

    /// Set the kind-specific payload
    pub fn with_value(mut self, value: serde_json::Value) -> Self {
        self.value = value;
        self
    }

    /// Set the duration in milliseconds
    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Shorthand for a timer-delay action
    pub fn delay(duration_ms: u64) -> Self {
        Self::new(ActionKind::TimerDelay, "", "").with_duration_ms(duration_ms)
    }

    /// Shorthand for a key tap
    pub fn tap(device_id: impl Into<String>, input_name: impl Into<String>) -> Self {
        Self::new(ActionKind::KeyTap, device_id, input_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_round_trip_as_kebab_case() {
        let json = serde_json::to_string(&ActionKind::KeyTap).unwrap();
        assert_eq!(json, "\"key-tap\"");

        let kind: ActionKind = serde_json::from_str("\"timer-delay\"").unwrap();
        assert_eq!(kind, ActionKind::TimerDelay);
    }

    #[test]
    fn record_missing_fields_takes_defaults() {
        let action: Action = serde_json::from_str(r#"{"kind": "key-tap"}"#).unwrap();

        assert!(!action.id.is_empty());
        assert_eq!(action.kind, ActionKind::KeyTap);
        assert_eq!(action.device_id, "");
        assert_eq!(action.input_name, "");
        assert!(action.value.is_null());
        assert_eq!(action.duration_ms, 0);
    }

    #[test]
    fn builders_set_payload_and_duration() {
        let action = Action::new(ActionKind::MouseMove, "kbd-1", "")
            .with_value(serde_json::json!({"x": 100, "y": 200}));
        assert_eq!(action.value["x"], 100);

        let delay = Action::delay(250);
        assert_eq!(delay.kind, ActionKind::TimerDelay);
        assert_eq!(delay.duration_ms, 250);
    }
}
