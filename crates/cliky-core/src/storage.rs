//! Persisted local store.
//!
//! String-keyed entries, each value independently JSON-encoded, so a
//! corrupt entry only costs that one field its value.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Entry names, one per logical field group.
pub mod keys {
    pub const TARGET_RATE: &str = "cliky_cps";
    pub const JITTER: &str = "cliky_randomness";
    pub const HUMANIZATION: &str = "cliky_humanization";
    pub const TOGGLE_BINDING: &str = "cliky_key";
    pub const CLICK_MODE: &str = "cliky_click_mode";
    pub const MACRO_PART1: &str = "cliky_macro_p1";
    pub const MACRO_PART2: &str = "cliky_macro_p2";
    pub const MACRO_DODGE: &str = "cliky_macro_dodge";
    pub const MACRO_SAFE_POCKET: &str = "cliky_macro_sp";
    pub const MACRO_QUICK_USE: &str = "cliky_macro_qu";
    pub const MACRO_DELAY: &str = "cliky_macro_delay";
    pub const OVERLAY_POSITION: &str = "cliky_overlay_pos";
}

/// Raw string-keyed storage backend.
pub trait KeyValueStore: Send + Sync {
    /// Raw (still JSON-encoded) value for `key`.
    fn get(&self, key: &str) -> Option<String>;

    /// Write several entries as one batch.
    fn set_all(&self, entries: Vec<(String, String)>) -> StorageResult<()>;

    fn set(&self, key: &str, value: String) -> StorageResult<()> {
        self.set_all(vec![(key.to_string(), value)])
    }
}

/// Decode the entry for `key`, or return `default` if it is missing or
/// unparsable. Sibling entries are never affected.
pub fn load_or_default<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str, default: T) -> T {
    let Some(raw) = store.get(key) else {
        debug!(key, "No stored value, using default");
        return default;
    };
    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            warn!(key, error = %e, "Corrupt stored value, using default");
            default
        }
    }
}

/// Encode and write a single entry.
pub fn save_value<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) -> StorageResult<()> {
    store.set(key, serde_json::to_string(value)?)
}

/// Get the app data directory for cliky.
pub fn get_app_data_dir() -> PathBuf {
    let base = dirs_next::data_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("cliky")
}

/// Store backed by a single JSON object file, rewritten on every batch.
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl JsonFileStore {
    /// Default location: `<data dir>/cliky/store.json`.
    pub fn default_path() -> PathBuf {
        get_app_data_dir().join("store.json")
    }

    /// Open the store at `path`. A missing file starts empty; a file that is
    /// not a JSON object is set aside and the store starts empty too.
    pub fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let json = fs::read_to_string(&path)?;
            match serde_json::from_str::<BTreeMap<String, String>>(&json) {
                Ok(entries) => {
                    debug!(?path, count = entries.len(), "Loaded store");
                    entries
                }
                Err(e) => {
                    let backup = path.with_extension("json.corrupt");
                    warn!(?path, error = %e, "Store file unreadable, starting empty");
                    if let Err(e) = fs::rename(&path, &backup) {
                        warn!(?backup, error = %e, "Failed to set aside corrupt store");
                    }
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_file(&self, entries: &BTreeMap<String, String>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
                info!(?parent, "Created store directory");
            }
        }
        let json = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn set_all(&self, batch: Vec<(String, String)>) -> StorageResult<()> {
        let mut entries = self.entries.lock().unwrap();
        for (key, value) in batch {
            entries.insert(key, value);
        }
        self.write_file(&entries)?;
        debug!(path = ?self.path, "Store written");
        Ok(())
    }
}

/// In-memory store, for tests and for running without a data directory.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoded value of an entry, for assertions.
    pub fn value(&self, key: &str) -> Option<serde_json::Value> {
        self.get(key).and_then(|raw| serde_json::from_str(&raw).ok())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn set_all(&self, batch: Vec<(String, String)>) -> StorageResult<()> {
        self.entries.lock().unwrap().extend(batch);
        Ok(())
    }
}
