//! Persisted user preferences.
//!
//! Preferences are a single JSON blob stored under a fixed key. Storage is
//! abstracted behind [`PreferenceStore`]; the CLI uses [`FilePreferenceStore`]
//! which keeps one `<key>.json` file per key in the XDG data directory.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::Channel;

/// Key holding the dashboard preference blob
pub const PREFERENCES_KEY: &str = "mozilla-sa-dashboard";

/// The persisted preference blob
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<Channel>,
}

impl Preferences {
    /// Decode a stored blob, returning `None` when it is malformed
    pub fn parse(raw: &str) -> Option<Self> {
        match serde_json::from_str(raw) {
            Ok(prefs) => Some(prefs),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring malformed preferences");
                None
            }
        }
    }
}

/// Key-value storage for string blobs
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Stores each key as `<dir>/<key>.json`
#[derive(Debug, Clone)]
pub struct FilePreferenceStore {
    dir: PathBuf,
}

impl FilePreferenceStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(Error::Preferences(format!("invalid key: {:?}", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Preferences(format!(
                "failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            Error::Preferences(format!("failed to create {}: {}", self.dir.display(), e))
        })?;

        // Write then rename so a crash never leaves a truncated blob
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)
            .and_then(|_| std::fs::rename(&tmp, &path))
            .map_err(|e| {
                Error::Preferences(format!("failed to write {}: {}", path.display(), e))
            })
    }
}

/// In-memory store, used by tests and one-shot runs
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with one value
    pub fn with_value(key: &str, value: &str) -> Self {
        let store = Self::new();
        if let Ok(mut values) = store.values.lock() {
            values.insert(key.to_string(), value.to_string());
        }
        store
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self
            .values
            .lock()
            .map_err(|_| Error::Preferences("preference lock poisoned".to_string()))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| Error::Preferences("preference lock poisoned".to_string()))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
