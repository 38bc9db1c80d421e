//! Versioned JSON document store

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported format version for {key}: found {found}, expected {expected}")]
    UnsupportedVersion {
        key: String,
        found: u32,
        expected: u32,
    },
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Envelope wrapping a persisted payload with its key and format version
///
/// On-disk shape:
/// ```json
/// {
///   "version": 1,
///   "key": "macroweave.macros",
///   "data": { ... }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Versioned<T> {
    /// Format version of the payload
    pub version: u32,
    /// Document key (also the file name)
    pub key: String,
    /// The payload
    pub data: T,
}

impl<T> Versioned<T> {
    /// Wrap a payload in an envelope
    pub fn new(key: impl Into<String>, data: T, version: u32) -> Self {
        Self {
            version,
            key: key.into(),
            data,
        }
    }
}

/// Types that know how to live in the store
///
/// Implementors pick a stable key and bump VERSION on breaking payload
/// changes. Missing fields inside the payload are not a version bump; they
/// are filled by serde defaults at load time.
pub trait Persisted: Serialize + DeserializeOwned {
    /// Document key for this type
    const KEY: &'static str;
    /// Current format version
    const VERSION: u32;
}

/// Document store rooted at `<data_dir>/store/`
#[derive(Debug, Clone)]
pub struct Store {
    dir: PathBuf,
}

impl Store {
    /// Create a store under the given data directory
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            dir: data_dir.as_ref().join("store"),
        }
    }

    /// Path of the file backing a key
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    /// Whether a document exists for the key
    pub async fn exists(&self, key: &str) -> bool {
        self.path_for(key).exists()
    }

    async fn ensure_dir(&self) -> StoreResult<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir).await?;
            debug!(dir = %self.dir.display(), "created store directory");
        }
        Ok(())
    }

    /// Load a persisted document, or `None` if it was never saved
    ///
    /// A payload with an unexpected major version is refused rather than
    /// half-parsed.
    pub async fn load<T: Persisted>(&self) -> StoreResult<Option<T>> {
        let path = self.path_for(T::KEY);
        if !path.exists() {
            debug!(key = T::KEY, "no document on disk");
            return Ok(None);
        }

        let content = fs::read_to_string(&path).await?;
        let envelope: Versioned<serde_json::Value> = serde_json::from_str(&content)?;

        if envelope.version != T::VERSION {
            return Err(StoreError::UnsupportedVersion {
                key: T::KEY.to_string(),
                found: envelope.version,
                expected: T::VERSION,
            });
        }

        let data: T = serde_json::from_value(envelope.data)?;
        debug!(key = T::KEY, version = envelope.version, "loaded document");
        Ok(Some(data))
    }

    /// Load a persisted document, falling back to its default when absent
    pub async fn load_or_default<T: Persisted + Default>(&self) -> StoreResult<T> {
        match self.load().await {
            Ok(Some(data)) => Ok(data),
            Ok(None) => Ok(T::default()),
            Err(e) => Err(e),
        }
    }

    /// Save a document, replacing any previous version atomically
    pub async fn save<T: Persisted>(&self, data: &T) -> StoreResult<()> {
        self.ensure_dir().await?;

        let envelope = Versioned::new(T::KEY, data, T::VERSION);
        let content = serde_json::to_string_pretty(&envelope)?;

        let path = self.path_for(T::KEY);
        let tmp = self.path_for(&format!("{}.tmp", T::KEY));

        fs::write(&tmp, &content).await?;
        fs::rename(&tmp, &path).await?;

        debug!(key = T::KEY, version = T::VERSION, "saved document");
        Ok(())
    }

    /// Delete a document; absent documents are left alone
    pub async fn delete(&self, key: &str) -> StoreResult<()> {
        let path = self.path_for(key);
        if path.exists() {
            fs::remove_file(&path).await?;
            debug!(key, "deleted document");
        }
        Ok(())
    }

    /// List the keys of all stored documents
    pub async fn keys(&self) -> StoreResult<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if !is_file {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if name.ends_with(".tmp") {
                    warn!(file = name, "leftover temp file in store");
                    continue;
                }
                keys.push(name.to_string());
            }
        }
        Ok(keys)
    }
}
