//! Full-snapshot persistence for registry state.
//!
//! Registries rewrite their entire map on every mutation. The store is
//! a seam so tests can swap the JSON file for an in-memory slot.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Mutex,
};

use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

/// Snapshot persistence error.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot read failed: {0}")]
    Read(String),
    #[error("snapshot write failed: {0}")]
    Write(String),
    #[error("snapshot malformed: {0}")]
    Malformed(String),
}

/// Load/save seam for one registry's full state.
pub trait SnapshotStore<T>: Send + Sync {
    /// Load the last saved snapshot. `None` means nothing was ever saved.
    fn load(&self) -> Result<Option<T>, SnapshotError>;

    /// Replace the snapshot. Returns only after the data is durable.
    fn save(&self, value: &T) -> Result<(), SnapshotError>;
}

/// Snapshot store backed by a pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct JsonSnapshotStore {
    path: PathBuf,
}

impl JsonSnapshotStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Default state directory (`~/.agent-relay`).
#[must_use]
pub fn default_state_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".agent-relay"))
}

impl<T: Serialize + DeserializeOwned> SnapshotStore<T> for JsonSnapshotStore {
    fn load(&self) -> Result<Option<T>, SnapshotError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(SnapshotError::Read(format!("{}: {err}", self.path.display())));
            }
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|err| SnapshotError::Malformed(format!("{}: {err}", self.path.display())))
    }

    fn save(&self, value: &T) -> Result<(), SnapshotError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|err| SnapshotError::Write(format!("{}: {err}", parent.display())))?;
        }
        let raw = serde_json::to_string_pretty(value)
            .map_err(|err| SnapshotError::Write(err.to_string()))?;
        std::fs::write(&self.path, raw)
            .map_err(|err| SnapshotError::Write(format!("{}: {err}", self.path.display())))
    }
}

/// In-memory snapshot store for tests and ephemeral deployments.
///
/// Values round-trip through JSON so serde behavior matches the file
/// store exactly.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    slot: Mutex<Option<String>>,
}

impl MemorySnapshotStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T: Serialize + DeserializeOwned> SnapshotStore<T> for MemorySnapshotStore {
    fn load(&self) -> Result<Option<T>, SnapshotError> {
        let slot = self
            .slot
            .lock()
            .map_err(|err| SnapshotError::Read(err.to_string()))?;
        slot.as_deref()
            .map(|raw| {
                serde_json::from_str(raw).map_err(|err| SnapshotError::Malformed(err.to_string()))
            })
            .transpose()
    }

    fn save(&self, value: &T) -> Result<(), SnapshotError> {
        let raw =
            serde_json::to_string(value).map_err(|err| SnapshotError::Write(err.to_string()))?;
        let mut slot = self
            .slot
            .lock()
            .map_err(|err| SnapshotError::Write(err.to_string()))?;
        *slot = Some(raw);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonSnapshotStore::new(dir.path().join("absent.json"));
        let loaded: Option<HashMap<String, u32>> = store.load().unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonSnapshotStore::new(dir.path().join("state").join("data.json"));

        let mut value = HashMap::new();
        value.insert("alpha".to_string(), 1_u32);
        SnapshotStore::save(&store, &value).unwrap();

        let loaded: Option<HashMap<String, u32>> = store.load().unwrap();
        assert_eq!(loaded.unwrap(), value);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = JsonSnapshotStore::new(&path);
        let loaded: Result<Option<HashMap<String, u32>>, _> = store.load();
        assert!(matches!(loaded, Err(SnapshotError::Malformed(_))));
    }

    #[test]
    fn test_memory_roundtrip() {
        let store = MemorySnapshotStore::new();
        let loaded: Option<Vec<String>> = store.load().unwrap();
        assert!(loaded.is_none());

        let value = vec!["a".to_string(), "b".to_string()];
        SnapshotStore::save(&store, &value).unwrap();
        let loaded: Option<Vec<String>> = store.load().unwrap();
        assert_eq!(loaded.unwrap(), value);
    }
}
