//! Persisted learning state with optimistic versioning.
//!
//! The state is read once when the manager starts and rewritten wholesale at
//! the end of each stage. Every save names the version it expects to replace;
//! a mismatch fails with [`StoreError::VersionConflict`] instead of silently
//! overwriting another writer's progress. A missing document is version 0.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use lotolab_core::store::{read_json, write_json_atomic, StoreError};
use serde::{Deserialize, Serialize};

use super::insights::{PatternInsights, StageAnalysis};

/// What one completed stage contributed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageInsights {
    pub recorded_at: DateTime<Utc>,
    pub analysis: StageAnalysis,
    pub feature_weights: BTreeMap<String, f64>,
    pub pattern_insights: PatternInsights,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningState {
    /// In completion order.
    pub stages_completed: Vec<String>,
    pub accumulated_insights: BTreeMap<String, StageInsights>,
    /// EMA-merged across stages.
    pub feature_weights: BTreeMap<String, f64>,
    /// Latest value per key.
    pub pattern_adjustments: PatternInsights,
    pub last_updated: Option<DateTime<Utc>>,
    pub version: u64,
}

impl LearningState {
    pub fn is_completed(&self, stage_id: &str) -> bool {
        self.stages_completed.iter().any(|s| s == stage_id)
    }

    /// Empty state that continues the version sequence.
    pub fn cleared(&self) -> Self {
        Self {
            version: self.version,
            ..Self::default()
        }
    }
}

// ─── Stores ──────────────────────────────────────────────────────────

pub trait StateStore: Send + Sync {
    fn load(&self) -> Result<Option<LearningState>, StoreError>;

    /// Replace the stored state if its version is `expected_version`. The
    /// written document carries `expected_version + 1`, which is returned.
    fn save(&self, state: &LearningState, expected_version: u64) -> Result<u64, StoreError>;
}

fn check_version(stored: Option<&LearningState>, expected: u64) -> Result<(), StoreError> {
    let found = stored.map_or(0, |s| s.version);
    if found != expected {
        return Err(StoreError::VersionConflict { expected, found });
    }
    Ok(())
}

/// JSON document on disk, written atomically.
#[derive(Debug)]
pub struct JsonStateStore {
    path: PathBuf,
    // Serializes check-then-write within one process.
    lock: Mutex<()>,
}

impl JsonStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for JsonStateStore {
    fn load(&self) -> Result<Option<LearningState>, StoreError> {
        read_json(&self.path)
    }

    fn save(&self, state: &LearningState, expected_version: u64) -> Result<u64, StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let stored: Option<LearningState> = read_json(&self.path)?;
        check_version(stored.as_ref(), expected_version)?;

        let next = expected_version + 1;
        let mut doc = state.clone();
        doc.version = next;
        write_json_atomic(&self.path, &doc)?;
        tracing::debug!(path = %self.path.display(), version = next, "learning state saved");
        Ok(next)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStateStore {
    slot: Mutex<Option<LearningState>>,
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<Option<LearningState>, StoreError> {
        Ok(self.slot.lock().map_err(|_| StoreError::Poisoned)?.clone())
    }

    fn save(&self, state: &LearningState, expected_version: u64) -> Result<u64, StoreError> {
        let mut slot = self.slot.lock().map_err(|_| StoreError::Poisoned)?;
        check_version(slot.as_ref(), expected_version)?;
        let next = expected_version + 1;
        let mut doc = state.clone();
        doc.version = next;
        *slot = Some(doc);
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with(stage: &str) -> LearningState {
        LearningState {
            stages_completed: vec![stage.to_string()],
            feature_weights: BTreeMap::from([("sum_importance".to_string(), 0.5)]),
            last_updated: Some(Utc::now()),
            ..Default::default()
        }
    }

    #[test]
    fn json_store_round_trip_bumps_version() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStateStore::new(dir.path().join("state.json"));
        assert!(store.load().unwrap().is_none());

        let v1 = store.save(&state_with("stage1_fixed_10"), 0).unwrap();
        assert_eq!(v1, 1);
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.version, 1);
        assert!(loaded.is_completed("stage1_fixed_10"));
        assert_eq!(loaded.feature_weights["sum_importance"], 0.5);

        assert_eq!(store.save(&loaded, 1).unwrap(), 2);
    }

    #[test]
    fn stale_writer_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStateStore::new(dir.path().join("state.json"));
        store.save(&state_with("a"), 0).unwrap();
        store.save(&state_with("b"), 1).unwrap();

        let err = store.save(&state_with("c"), 1).unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { expected: 1, found: 2 }));
        assert!(store.load().unwrap().unwrap().is_completed("b"));
    }

    #[test]
    fn memory_store_conflicts_on_fresh_slot() {
        let store = MemoryStateStore::default();
        let err = store.save(&state_with("a"), 3).unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { expected: 3, found: 0 }));
        assert_eq!(store.save(&state_with("a"), 0).unwrap(), 1);
    }

    #[test]
    fn cleared_keeps_version() {
        let mut s = state_with("a");
        s.version = 7;
        let c = s.cleared();
        assert!(c.stages_completed.is_empty());
        assert!(c.feature_weights.is_empty());
        assert_eq!(c.version, 7);
    }
}
