//! Engine persistence.
//!
//! Documents are JSON wrapped in an envelope carrying a BLAKE3 hash of the
//! payload. Writes are atomic (write to `.tmp`, rename into place); a file
//! whose hash does not match on load is renamed to `.quarantined` and
//! reported as corrupt.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::EngineSnapshot;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("corrupt document at {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("version conflict: expected {expected}, stored {found}")]
    VersionConflict { expected: u64, found: u64 },

    #[error("store lock poisoned")]
    Poisoned,
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    saved_at: DateTime<Utc>,
    data_hash: String,
    payload: T,
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn hash_payload<T: Serialize>(payload: &T) -> Result<String, StoreError> {
    Ok(blake3::hash(&serde_json::to_vec(payload)?).to_hex().to_string())
}

/// Serialize `payload` into an envelope and atomically replace `path`.
pub fn write_json_atomic<T: Serialize>(path: &Path, payload: &T) -> Result<(), StoreError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(io_err(dir))?;
    }
    let envelope = Envelope {
        saved_at: Utc::now(),
        data_hash: hash_payload(payload)?,
        payload,
    };
    let json = serde_json::to_string_pretty(&envelope)?;

    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, json).map_err(io_err(&tmp_path))?;
    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        io_err(path)(e)
    })
}

/// Read an envelope written by [`write_json_atomic`]. A missing file is
/// `Ok(None)`.
pub fn read_json<T: Serialize + DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_err(path)(e)),
    };
    let envelope: Envelope<T> = match serde_json::from_str(&text) {
        Ok(env) => env,
        Err(e) => return Err(quarantine(path, format!("unreadable: {e}"))),
    };
    if hash_payload(&envelope.payload)? != envelope.data_hash {
        return Err(quarantine(path, "hash mismatch".into()));
    }
    Ok(Some(envelope.payload))
}

fn quarantine(path: &Path, reason: String) -> StoreError {
    let target = path.with_extension("json.quarantined");
    match fs::rename(path, &target) {
        Ok(()) => tracing::warn!(path = %path.display(), %reason, "quarantined corrupt document"),
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to quarantine corrupt document"),
    }
    StoreError::Corrupt {
        path: path.to_path_buf(),
        reason,
    }
}

// ─── Model store ─────────────────────────────────────────────────────

pub trait ModelStore: Send + Sync {
    fn load(&self) -> Result<Option<EngineSnapshot>, StoreError>;
    fn save(&self, snapshot: &EngineSnapshot) -> Result<(), StoreError>;
}

#[derive(Debug, Clone)]
pub struct JsonModelStore {
    path: PathBuf,
}

impl JsonModelStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ModelStore for JsonModelStore {
    fn load(&self) -> Result<Option<EngineSnapshot>, StoreError> {
        read_json(&self.path)
    }

    fn save(&self, snapshot: &EngineSnapshot) -> Result<(), StoreError> {
        write_json_atomic(&self.path, snapshot)?;
        tracing::info!(path = %self.path.display(), models = snapshot.ensemble.len(), "engine saved");
        Ok(())
    }
}

/// In-process store for hosts that keep the engine in memory.
#[derive(Debug, Default)]
pub struct MemoryModelStore {
    slot: Mutex<Option<EngineSnapshot>>,
}

impl ModelStore for MemoryModelStore {
    fn load(&self) -> Result<Option<EngineSnapshot>, StoreError> {
        Ok(self.slot.lock().map_err(|_| StoreError::Poisoned)?.clone())
    }

    fn save(&self, snapshot: &EngineSnapshot) -> Result<(), StoreError> {
        *self.slot.lock().map_err(|_| StoreError::Poisoned)? = Some(snapshot.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SyntheticDataSource;
    use crate::domain::GameSpec;
    use crate::engine::test_support::small_engine;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Doc {
        value: u32,
    }

    #[test]
    fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let got: Option<Doc> = read_json(&dir.path().join("nope.json")).unwrap();
        assert!(got.is_none());
    }

    #[test]
    fn write_then_read_leaves_no_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/doc.json");
        write_json_atomic(&path, &Doc { value: 3 }).unwrap();
        assert!(!path.with_extension("json.tmp").exists());
        assert_eq!(read_json::<Doc>(&path).unwrap(), Some(Doc { value: 3 }));
    }

    #[test]
    fn tampered_file_is_quarantined() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        write_json_atomic(&path, &Doc { value: 3 }).unwrap();
        let text = fs::read_to_string(&path).unwrap().replace("\"value\": 3", "\"value\": 4");
        fs::write(&path, text).unwrap();

        let err = read_json::<Doc>(&path).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
        assert!(!path.exists());
        assert!(path.with_extension("json.quarantined").exists());
    }

    #[test]
    fn engine_snapshot_survives_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonModelStore::new(dir.path().join("engine.json"));
        assert!(store.load().unwrap().is_none());

        let mut engine = small_engine();
        engine
            .train(&SyntheticDataSource::new(GameSpec::LOTO7, 20, 1).generate())
            .unwrap();
        store.save(&engine.snapshot().unwrap()).unwrap();

        let mut restored = small_engine();
        restored.restore(store.load().unwrap().unwrap()).unwrap();
        assert_eq!(restored.status().models, engine.status().models);
        assert_eq!(restored.frequencies(), engine.frequencies());
    }
}
