//! Persistent key-value stores for trial results
//!
//! [`FileStore`] keeps every entry of a project in one JSON file. Entries
//! are decoded individually on read so one malformed entry only costs a
//! miss. Writes stay in memory until [`CacheStore::sync`], which replaces
//! the file atomically.

use crate::computation::TrialResult;
use crate::error::{RelentlessError, RelentlessResult};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// On-disk format version
const STORE_VERSION: u32 = 1;

/// Durable key to result map
pub trait CacheStore: Send + Sync {
    /// Look up a stored result
    fn get(&self, key: &str) -> RelentlessResult<Option<TrialResult>>;

    /// Stage a result for the next sync
    fn put(&self, key: &str, result: &TrialResult) -> RelentlessResult<()>;

    /// Flush staged writes to durable storage
    fn sync(&self) -> RelentlessResult<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    stored_at: DateTime<Utc>,
    result: TrialResult,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    entries: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Default)]
struct FileState {
    loaded: bool,
    dirty: bool,
    entries: BTreeMap<String, serde_json::Value>,
}

/// Single-file JSON store, loaded on first access
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    state: Mutex<FileState>,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: Mutex::new(FileState::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of entries, including ones not yet synced
    pub fn len(&self) -> usize {
        self.with_state(|state| state.entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut FileState) -> R) -> R {
        let mut state = self.state.lock();
        if !state.loaded {
            state.entries = load_entries(&self.path);
            state.loaded = true;
        }
        f(&mut state)
    }
}

/// Read the store file; anything unreadable starts an empty cache
fn load_entries(path: &Path) -> BTreeMap<String, serde_json::Value> {
    if !path.exists() {
        return BTreeMap::new();
    }

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!("Ignoring unreadable cache {}: {}", path.display(), e);
            return BTreeMap::new();
        }
    };

    match serde_json::from_str::<CacheFile>(&content) {
        Ok(file) if file.version == STORE_VERSION => {
            debug!("Loaded {} cache entries from {}", file.entries.len(), path.display());
            file.entries
        }
        Ok(file) => {
            warn!(
                "Ignoring cache {} with unsupported version {}",
                path.display(),
                file.version
            );
            BTreeMap::new()
        }
        Err(e) => {
            warn!("Ignoring malformed cache {}: {}", path.display(), e);
            BTreeMap::new()
        }
    }
}

impl CacheStore for FileStore {
    fn get(&self, key: &str) -> RelentlessResult<Option<TrialResult>> {
        let raw = self.with_state(|state| state.entries.get(key).cloned());
        match raw {
            None => Ok(None),
            Some(value) => {
                let entry: CacheEntry = serde_json::from_value(value)?;
                Ok(Some(entry.result))
            }
        }
    }

    fn put(&self, key: &str, result: &TrialResult) -> RelentlessResult<()> {
        let value = serde_json::to_value(CacheEntry {
            stored_at: Utc::now(),
            result: result.clone(),
        })?;
        self.with_state(|state| {
            state.entries.insert(key.to_string(), value);
            state.dirty = true;
        });
        Ok(())
    }

    fn sync(&self) -> RelentlessResult<()> {
        self.with_state(|state| {
            if !state.dirty {
                return Ok(());
            }

            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent).map_err(|e| {
                    RelentlessError::io(format!("creating cache directory {}", parent.display()), e)
                })?;
            }

            let file = CacheFile {
                version: STORE_VERSION,
                entries: state.entries.clone(),
            };
            let content = serde_json::to_string(&file)?;

            let tmp = self.path.with_extension(format!("{}.tmp", Uuid::new_v4()));
            fs::write(&tmp, content)
                .map_err(|e| RelentlessError::io(format!("writing cache {}", tmp.display()), e))?;
            fs::rename(&tmp, &self.path).map_err(|e| {
                RelentlessError::io(format!("replacing cache {}", self.path.display()), e)
            })?;

            state.dirty = false;
            debug!("Synced {} cache entries to {}", state.entries.len(), self.path.display());
            Ok(())
        })
    }
}

/// In-memory store, lost when dropped
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, TrialResult>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> RelentlessResult<Option<TrialResult>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn put(&self, key: &str, result: &TrialResult) -> RelentlessResult<()> {
        self.entries.lock().insert(key.to_string(), result.clone());
        Ok(())
    }

    fn sync(&self) -> RelentlessResult<()> {
        Ok(())
    }
}
