//! Daemon configuration
//!
//! Loaded from a YAML file; a missing file means defaults. The device list
//! seeds the device table at boot, standing in for a discovery layer.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

fn default_data_dir() -> PathBuf {
    PathBuf::from(".macroweave")
}

fn default_log_filter() -> String {
    "info".to_string()
}

/// A device known at boot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Stable device identifier
    pub id: String,
    /// Human-readable name
    #[serde(default)]
    pub name: String,
}

/// Top-level daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Directory holding the persisted catalogues
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Default log filter, overridable via RUST_LOG
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Devices registered at boot
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_filter: default_log_filter(),
            devices: Vec::new(),
        }
    }
}

impl DaemonConfig {
    /// Load the config file; absent files fall back to defaults
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_defaults() {
        let config = DaemonConfig::load("/definitely/not/here.yaml").unwrap();
        assert_eq!(config.data_dir, PathBuf::from(".macroweave"));
        assert_eq!(config.log_filter, "info");
        assert!(config.devices.is_empty());
    }

    #[test]
    fn yaml_fields_parse_with_defaults_for_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("macroweave.yaml");
        std::fs::write(
            &path,
            "data_dir: /var/lib/macroweave\ndevices:\n  - id: kbd-1\n    name: Main Keyboard\n",
        )
        .unwrap();

        let config = DaemonConfig::load(&path).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/macroweave"));
        assert_eq!(config.log_filter, "info");
        assert_eq!(config.devices.len(), 1);
        assert_eq!(config.devices[0].id, "kbd-1");
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("macroweave.yaml");
        std::fs::write(&path, "data_dir: [not: a: path").unwrap();

        assert!(DaemonConfig::load(&path).is_err());
    }
}
