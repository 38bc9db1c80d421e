//! Macro definition
//!
//! A Macro is a named, ordered action sequence with a repeat count. The
//! struct doubles as its persisted record; missing fields on load fall back
//! to the documented defaults.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::action::Action;
use mw_storage::Persisted;

fn new_id() -> String {
    ulid::Ulid::new().to_string()
}

fn default_enabled() -> bool {
    true
}

fn default_repeat() -> u32 {
    1
}

/// A stored macro
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Macro {
    /// Unique macro id
    #[serde(default = "new_id")]
    pub id: String,

    /// Human-readable name
    #[serde(default)]
    pub name: String,

    /// Ordered action sequence; order is semantically significant
    #[serde(default)]
    pub actions: Vec<Action>,

    /// Full passes per playback: 0 repeats until stopped, N >= 1 runs exactly N
    #[serde(default = "default_repeat")]
    pub repeat_count: u32,

    /// Disabled macros never start playback
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Free-form description
    #[serde(default)]
    pub description: String,

    /// Creation timestamp
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    #[serde(default = "Utc::now")]
    pub modified_at: DateTime<Utc>,
}

impl Macro {
    /// Create an empty macro with the given name
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            name: name.into(),
            actions: Vec::new(),
            repeat_count: default_repeat(),
            enabled: default_enabled(),
            description: String::new(),
            created_at: now,
            modified_at: now,
        }
    }

    /// Record a mutation
    pub fn touch(&mut self) {
        self.modified_at = Utc::now();
    }
}

/// The macro catalogue as persisted: macro id -> record, insertion-ordered
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MacroCatalogue {
    pub macros: IndexMap<String, Macro>,
}

impl Persisted for MacroCatalogue {
    const KEY: &'static str = "macroweave.macros";
    const VERSION: u32 = 1;
}
