//! Device registry
//!
//! The engines never talk to hardware directly; they ask a [`DeviceRegistry`]
//! whether a device is connected and enabled, and what inputs it exposes.
//! Discovery itself (HID enumeration, hotplug) lives outside this crate —
//! whatever performs it keeps a [`DeviceTable`] up to date.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Kind of input a device capability exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    /// A named key (keyboard-style input)
    Key,
    /// A momentary button, addressed by index
    Button,
    /// An analog axis, addressed by index
    Axis,
}

/// One input exposed by a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    /// Canonical input name (e.g. "KeyA", "button0", "axis1")
    pub name: String,
    /// What kind of input this is
    pub kind: CapabilityKind,
    /// Index within its kind, for buttons and axes
    pub index: u32,
    /// Value range for axes, `None` for keys and buttons
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<(f64, f64)>,
}

impl Capability {
    /// A key capability
    pub fn key(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: CapabilityKind::Key,
            index: 0,
            range: None,
        }
    }

    /// A button capability at the given index
    pub fn button(name: impl Into<String>, index: u32) -> Self {
        Self {
            name: name.into(),
            kind: CapabilityKind::Button,
            index,
            range: None,
        }
    }

    /// An axis capability at the given index
    pub fn axis(name: impl Into<String>, index: u32, range: (f64, f64)) -> Self {
        Self {
            name: name.into(),
            kind: CapabilityKind::Axis,
            index,
            range: Some(range),
        }
    }
}

/// Connectivity and capability queries the engines rely on
///
/// Events from a device that is not both connected and enabled are dropped
/// before trigger matching (gating).
pub trait DeviceRegistry: Send + Sync {
    /// Whether the device is currently attached
    fn is_connected(&self, device_id: &str) -> bool;

    /// Whether the user has the device enabled
    fn is_enabled(&self, device_id: &str) -> bool;

    /// Inputs the device exposes, in device order; empty for unknown devices
    fn capabilities(&self, device_id: &str) -> Vec<Capability>;
}

/// One tracked device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceEntry {
    /// Stable device identifier
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Whether the device is attached right now
    pub connected: bool,
    /// Whether the user has it enabled
    pub enabled: bool,
    /// Inputs the device exposes, in device order
    #[serde(default)]
    pub capabilities: Vec<Capability>,
}

/// In-memory [`DeviceRegistry`] implementation
///
/// Shared by handle; the discovery side mutates it, the engines only query.
#[derive(Default)]
pub struct DeviceTable {
    devices: DashMap<String, DeviceEntry>,
}

impl DeviceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience: a shared handle
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Add or replace a device; newly registered devices start connected and
    /// enabled
    pub fn register(
        &self,
        id: impl Into<String>,
        name: impl Into<String>,
        capabilities: Vec<Capability>,
    ) {
        let id = id.into();
        let entry = DeviceEntry {
            id: id.clone(),
            name: name.into(),
            connected: true,
            enabled: true,
            capabilities,
        };
        info!(device_id = %id, name = %entry.name, "registered device");
        self.devices.insert(id, entry);
    }

    /// Forget a device entirely
    pub fn remove(&self, device_id: &str) -> Option<DeviceEntry> {
        let removed = self.devices.remove(device_id).map(|(_, e)| e);
        if removed.is_some() {
            info!(device_id, "removed device");
        }
        removed
    }

    /// Mark a device attached or detached
    pub fn set_connected(&self, device_id: &str, connected: bool) {
        if let Some(mut entry) = self.devices.get_mut(device_id) {
            entry.connected = connected;
            debug!(device_id, connected, "device connectivity changed");
        }
    }

    /// Enable or disable a device
    pub fn set_enabled(&self, device_id: &str, enabled: bool) {
        if let Some(mut entry) = self.devices.get_mut(device_id) {
            entry.enabled = enabled;
            debug!(device_id, enabled, "device enabled state changed");
        }
    }

    /// Look up a device entry
    pub fn get(&self, device_id: &str) -> Option<DeviceEntry> {
        self.devices.get(device_id).map(|e| e.value().clone())
    }

    /// All tracked devices
    pub fn all(&self) -> Vec<DeviceEntry> {
        self.devices.iter().map(|e| e.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

impl DeviceRegistry for DeviceTable {
    fn is_connected(&self, device_id: &str) -> bool {
        self.devices
            .get(device_id)
            .map(|e| e.connected)
            .unwrap_or(false)
    }

    fn is_enabled(&self, device_id: &str) -> bool {
        self.devices
            .get(device_id)
            .map(|e| e.enabled)
            .unwrap_or(false)
    }

    fn capabilities(&self, device_id: &str) -> Vec<Capability> {
        self.devices
            .get(device_id)
            .map(|e| e.capabilities.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pad_capabilities() -> Vec<Capability> {
        vec![
            Capability::button("button0", 0),
            Capability::button("button1", 1),
            Capability::axis("axis0", 0, (-1.0, 1.0)),
        ]
    }

    #[test]
    fn unknown_device_is_gated() {
        let table = DeviceTable::new();
        assert!(!table.is_connected("ghost"));
        assert!(!table.is_enabled("ghost"));
        assert!(table.capabilities("ghost").is_empty());
    }

    #[test]
    fn registered_device_starts_connected_and_enabled() {
        let table = DeviceTable::new();
        table.register("pad-1", "Test Pad", pad_capabilities());

        assert!(table.is_connected("pad-1"));
        assert!(table.is_enabled("pad-1"));
        assert_eq!(table.capabilities("pad-1").len(), 3);
    }

    #[test]
    fn connectivity_and_enabled_toggle_independently() {
        let table = DeviceTable::new();
        table.register("pad-1", "Test Pad", pad_capabilities());

        table.set_connected("pad-1", false);
        assert!(!table.is_connected("pad-1"));
        assert!(table.is_enabled("pad-1"));

        table.set_connected("pad-1", true);
        table.set_enabled("pad-1", false);
        assert!(table.is_connected("pad-1"));
        assert!(!table.is_enabled("pad-1"));
    }

    #[test]
    fn capabilities_preserve_device_order() {
        let table = DeviceTable::new();
        table.register("pad-1", "Test Pad", pad_capabilities());

        let caps = table.capabilities("pad-1");
        assert_eq!(caps[0].name, "button0");
        assert_eq!(caps[1].name, "button1");
        assert_eq!(caps[2].name, "axis0");
        assert_eq!(caps[2].range, Some((-1.0, 1.0)));
    }

    #[test]
    fn remove_forgets_device() {
        let table = DeviceTable::new();
        table.register("pad-1", "Test Pad", Vec::new());
        assert_eq!(table.len(), 1);

        let removed = table.remove("pad-1").unwrap();
        assert_eq!(removed.id, "pad-1");
        assert!(table.is_empty());
        assert!(!table.is_connected("pad-1"));
    }
}
