//! Trigger definition
//!
//! A Trigger ties one input pattern on one device to a target macro. The
//! struct doubles as its persisted record; missing numeric fields fall back
//! to the documented defaults (threshold 0.5, hold 500 ms, double-tap
//! window 300 ms).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use mw_storage::Persisted;

/// Trigger errors
#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("Trigger not found: {0}")]
    NotFound(String),
}

/// Result type for trigger catalogue operations
pub type TriggerResult<T> = Result<T, TriggerError>;

/// Input pattern a trigger matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TriggerKind {
    /// Fires on key down
    Press,

    /// Fires when the input stays held for the hold duration
    Hold,

    /// Fires when two downs land within the double-tap window
    DoubleTap,

    /// Fires on key down while every listed modifier is held
    Combo,

    /// Fires while the named joystick button is pressed
    JoystickButton,

    /// Fires on every sample with |value| at or past the threshold
    JoystickAxis,
}

fn new_id() -> String {
    ulid::Ulid::new().to_string()
}

fn default_enabled() -> bool {
    true
}

fn default_axis_threshold() -> f64 {
    0.5
}

fn default_hold_duration_ms() -> u64 {
    500
}

fn default_double_tap_window_ms() -> u64 {
    300
}

/// A stored trigger rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    /// Unique trigger id
    #[serde(default = "new_id")]
    pub id: String,

    /// Pattern this trigger matches
    pub kind: TriggerKind,

    /// Macro to play on a match
    #[serde(default)]
    pub macro_id: String,

    /// Device whose gating state applies to this trigger
    #[serde(default)]
    pub device_id: String,

    /// Input the pattern watches (key name, or joystick capability name)
    #[serde(default)]
    pub input_name: String,

    /// Modifier inputs that must be held for combo triggers
    #[serde(default)]
    pub modifiers: Vec<String>,

    /// Axis magnitude threshold for joystick-axis triggers
    #[serde(default = "default_axis_threshold")]
    pub axis_threshold: f64,

    /// Hold time before a hold trigger fires
    #[serde(default = "default_hold_duration_ms")]
    pub hold_duration_ms: u64,

    /// Maximum gap between taps for a double-tap trigger
    #[serde(default = "default_double_tap_window_ms")]
    pub double_tap_window_ms: u64,

    /// Disabled triggers never match
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Trigger {
    /// Create a trigger with the documented defaults
    pub fn new(
        kind: TriggerKind,
        macro_id: impl Into<String>,
        device_id: impl Into<String>,
        input_name: impl Into<String>,
    ) -> Self {
        Self {
            id: new_id(),
            kind,
            macro_id: macro_id.into(),
            device_id: device_id.into(),
            input_name: input_name.into(),
            modifiers: Vec::new(),
            axis_threshold: default_axis_threshold(),
            hold_duration_ms: default_hold_duration_ms(),
            double_tap_window_ms: default_double_tap_window_ms(),
            enabled: default_enabled(),
        }
    }
}

/// The trigger catalogue as persisted: trigger id -> record, in registration
/// order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerCatalogue {
    pub triggers: IndexMap<String, Trigger>,
}

impl Persisted for TriggerCatalogue {
    const KEY: &'static str = "macroweave.triggers";
    const VERSION: u32 = 1;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_trigger_applies_documented_defaults() {
        let trigger = Trigger::new(TriggerKind::Hold, "macro-1", "kbd-1", "f");

        assert_eq!(trigger.axis_threshold, 0.5);
        assert_eq!(trigger.hold_duration_ms, 500);
        assert_eq!(trigger.double_tap_window_ms, 300);
        assert!(trigger.enabled);
        assert!(trigger.modifiers.is_empty());
    }

    #[test]
    fn record_missing_fields_takes_defaults() {
        let trigger: Trigger =
            serde_json::from_str(r#"{"kind": "double-tap", "input_name": "q"}"#).unwrap();

        assert!(!trigger.id.is_empty());
        assert_eq!(trigger.kind, TriggerKind::DoubleTap);
        assert_eq!(trigger.double_tap_window_ms, 300);
        assert_eq!(trigger.hold_duration_ms, 500);
        assert!(trigger.enabled);
    }

    #[test]
    fn kinds_round_trip_as_kebab_case() {
        let json = serde_json::to_string(&TriggerKind::JoystickAxis).unwrap();
        assert_eq!(json, "\"joystick-axis\"");

        let kind: TriggerKind = serde_json::from_str("\"double-tap\"").unwrap();
        assert_eq!(kind, TriggerKind::DoubleTap);
    }

    #[test]
    fn catalogue_round_trips_preserving_registration_order() {
        let mut catalogue = TriggerCatalogue::default();
        for input in ["a", "b", "c"] {
            let t = Trigger::new(TriggerKind::Press, "m", "kbd-1", input);
            catalogue.triggers.insert(t.id.clone(), t);
        }

        let json = serde_json::to_string(&catalogue).unwrap();
        let restored: TriggerCatalogue = serde_json::from_str(&json).unwrap();

        assert_eq!(restored, catalogue);
        let inputs: Vec<_> = restored
            .triggers
            .values()
            .map(|t| t.input_name.as_str())
            .collect();
        assert_eq!(inputs, vec!["a", "b", "c"]);
    }
}
