//! Persisted session identity
//!
//! The slot and session ids live in a small string key-value store so the
//! next launch can resume instead of handshaking again.

use crate::error::{Error, Result};
use indexmap::IndexMap;
use roomsync_core::{PlayerId, SessionId, SessionIdentity};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Key holding the player slot id
pub const SLOT_KEY: &str = "session.player";
/// Key holding the session id
pub const SESSION_KEY: &str = "session.id";

/// String key-value storage that survives restarts
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    fn remove(&mut self, key: &str) -> Result<()>;
}

/// Load the stored identity; both ids must be present
pub fn load_identity(store: &dyn KeyValueStore) -> Option<SessionIdentity> {
    let slot = store.get(SLOT_KEY).filter(|s| !s.is_empty())?;
    let session = store.get(SESSION_KEY).unwrap_or_default();
    if session.is_empty() {
        debug!(slot = %slot, "stored slot has no session id");
    }
    Some(SessionIdentity::new(PlayerId::new(slot), SessionId::new(session)))
}

pub fn persist_identity(store: &mut dyn KeyValueStore, identity: &SessionIdentity) -> Result<()> {
    store.set(SLOT_KEY, identity.slot.as_str())?;
    store.set(SESSION_KEY, identity.session.as_str())
}

pub fn clear_identity(store: &mut dyn KeyValueStore) -> Result<()> {
    store.remove(SLOT_KEY)?;
    store.remove(SESSION_KEY)
}

/// Volatile store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: IndexMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.shift_remove(key);
        Ok(())
    }
}

/// Store persisted as a RON map, rewritten on every change
#[derive(Debug, Clone)]
pub struct RonFileStore {
    path: PathBuf,
    entries: IndexMap<String, String>,
}

impl RonFileStore {
    /// Open the store, starting empty if the file is missing or unreadable
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(content) => ron::from_str(&content).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "identity file unreadable, starting fresh");
                IndexMap::new()
            }),
            Err(_) => IndexMap::new(),
        };
        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<()> {
        let content = ron::ser::to_string_pretty(&self.entries, ron::ser::PrettyConfig::default())
            .map_err(|e| Error::Store(e.to_string()))?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| Error::Store(e.to_string()))?;
            }
        }
        fs::write(&self.path, content).map_err(|e| Error::Store(e.to_string()))
    }
}

impl KeyValueStore for RonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        if self.entries.shift_remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("roomsync-{}-{}.ron", name, std::process::id()))
    }

    #[test]
    fn test_identity_round_trip_in_memory() {
        let mut store = MemoryStore::new();
        assert!(load_identity(&store).is_none());

        persist_identity(&mut store, &SessionIdentity::new("p7", "abc123")).unwrap();
        let identity = load_identity(&store).unwrap();
        assert_eq!(identity.slot.as_str(), "p7");
        assert_eq!(identity.session.as_str(), "abc123");

        clear_identity(&mut store).unwrap();
        assert!(load_identity(&store).is_none());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let path = temp_path("reopen");
        let _ = fs::remove_file(&path);
        {
            let mut store = RonFileStore::open(&path);
            persist_identity(&mut store, &SessionIdentity::new("p2", "u-9")).unwrap();
        }
        let store = RonFileStore::open(&path);
        let identity = load_identity(&store).unwrap();
        assert_eq!(identity.to_string(), "p2/u-9");
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let path = temp_path("corrupt");
        fs::write(&path, "{{ not ron").unwrap();
        let store = RonFileStore::open(&path);
        assert!(load_identity(&store).is_none());
        let _ = fs::remove_file(&path);
    }
}
