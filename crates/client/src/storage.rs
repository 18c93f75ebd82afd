//! Persistent key-value store backing the session and organization state.
//!
//! The store is a dumb synchronous string surface with no ownership rules of
//! its own: the session manager owns the token and profile keys, the
//! organization context manager owns the selection key, and nothing else
//! writes them.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use thiserror::Error;

/// Storage keys. Values are raw strings (tokens) or JSON documents.
pub mod keys {
    pub const ACCESS_TOKEN: &str = "access_token_key";
    pub const REFRESH_TOKEN: &str = "refresh_token_key";
    /// JSON-serialized `UserProfile`.
    pub const USER: &str = "user_key";
    /// JSON-serialized `OrganizationMembership`.
    pub const SELECTED_ORG: &str = "selected_org_key";
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The write would exceed the store's capacity.
    #[error("storage quota exceeded writing '{key}'")]
    QuotaExceeded { key: String },

    #[error("storage I/O failed: {0}")]
    Io(String),
}

/// Synchronous, durable key-value surface.
///
/// Writes may fail (quota, I/O); callers treat that as non-fatal and carry on
/// with in-memory state.
pub trait KeyValueStore: Send + Sync + core::fmt::Debug {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Process-local store, used by tests and headless runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that rejects writes once keys plus values exceed `quota_bytes`.
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A panic while holding this lock cannot leave the map half-written.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.lock();

        if let Some(quota) = self.quota_bytes {
            let used: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if used + key.len() + value.len() > quota {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                });
            }
        }

        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.lock().remove(key);
        Ok(())
    }
}

/// JSON-file store: a single object mapping keys to string values.
///
/// Every read goes back to the file so writes made by another process sharing
/// the file are visible on the next read. Writes replace the file atomically
/// (temp file + rename). A missing or corrupt file reads as empty.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                StorageError::Io(format!("failed to create {}: {e}", parent.display()))
            })?;
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    /// Open the store at `{data_dir}/findesk/storage.json`.
    pub fn open_default() -> anyhow::Result<Self> {
        let path = default_store_path()?;
        Self::open(&path).with_context(|| format!("failed to open store at {}", path.display()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> BTreeMap<String, String> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), "failed to read store: {err}");
                return BTreeMap::new();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|err| {
            tracing::warn!(path = %self.path.display(), "store file is corrupt, reading as empty: {err}");
            BTreeMap::new()
        })
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> std::io::Result<()> {
        let payload = serde_json::to_vec_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, payload)?;
        fs::rename(&tmp, &self.path)
    }

    fn update<F>(&self, key: &str, mutate: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut entries = self.read_all();
        mutate(&mut entries);
        self.write_all(&entries).map_err(|err| match err.kind() {
            std::io::ErrorKind::StorageFull | std::io::ErrorKind::QuotaExceeded => {
                StorageError::QuotaExceeded {
                    key: key.to_string(),
                }
            }
            _ => StorageError::Io(format!("{}: {err}", self.path.display())),
        })
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.read_all().remove(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.update(key, |entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        if !self.read_all().contains_key(key) {
            return Ok(());
        }
        self.update(key, |entries| {
            entries.remove(key);
        })
    }
}

/// Resolve the default store path: `{app_data_dir}/findesk/storage.json`.
pub fn default_store_path() -> anyhow::Result<PathBuf> {
    let base = dirs::data_dir()
        .or_else(|| {
            dirs::home_dir().map(|mut h| {
                h.push(".local");
                h.push("share");
                h
            })
        })
        .context("failed to resolve OS app data directory - tried data_dir() and home_dir()/.local/share")?;

    let mut path = base;
    path.push("findesk");
    path.push("storage.json");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store_path(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!(
            "findesk-storage-{}-{}-{name}",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        path.push("storage.json");
        path
    }

    #[test]
    fn memory_store_get_set_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get(keys::ACCESS_TOKEN), None);

        store.set(keys::ACCESS_TOKEN, "abc").unwrap();
        assert_eq!(store.get(keys::ACCESS_TOKEN).as_deref(), Some("abc"));

        store.remove(keys::ACCESS_TOKEN).unwrap();
        assert_eq!(store.get(keys::ACCESS_TOKEN), None);
        // Removing an absent key is a no-op.
        store.remove(keys::ACCESS_TOKEN).unwrap();
    }

    #[test]
    fn memory_store_enforces_quota_but_allows_overwrite_within_budget() {
        let store = MemoryStore::with_quota(40);
        store.set("a", "0123456789").unwrap();
        store.set("a", "9876543210").unwrap();

        let err = store.set("b", &"x".repeat(64)).unwrap_err();
        assert_eq!(err, StorageError::QuotaExceeded { key: "b".into() });
        assert_eq!(store.get("b"), None);
        assert_eq!(store.get("a").as_deref(), Some("9876543210"));
    }

    #[test]
    fn file_store_persists_across_instances() {
        let path = temp_store_path("persist");
        let first = FileStore::open(&path).unwrap();
        first.set(keys::REFRESH_TOKEN, "r-1").unwrap();
        first.set(keys::USER, "{\"id\":1}").unwrap();

        let second = FileStore::open(&path).unwrap();
        assert_eq!(second.get(keys::REFRESH_TOKEN).as_deref(), Some("r-1"));

        second.remove(keys::REFRESH_TOKEN).unwrap();
        assert_eq!(first.get(keys::REFRESH_TOKEN), None);
        assert_eq!(first.get(keys::USER).as_deref(), Some("{\"id\":1}"));

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn corrupt_file_reads_as_empty_and_is_replaced_on_write() {
        let path = temp_store_path("corrupt");
        let store = FileStore::open(&path).unwrap();
        fs::write(&path, "{ not json").unwrap();

        assert_eq!(store.get(keys::ACCESS_TOKEN), None);
        store.set(keys::ACCESS_TOKEN, "fresh").unwrap();
        assert_eq!(store.get(keys::ACCESS_TOKEN).as_deref(), Some("fresh"));

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}
