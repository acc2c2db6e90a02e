//! Checkpoint persistence: one JSON file per checkpoint, named by its
//! UUID, in a configured directory. Enforces a capacity ceiling and a
//! retention window.

use crate::error::CheckpointError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// A persisted snapshot of a process's recoverable state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateCheckpoint {
    pub checkpoint_id: Uuid,
    pub process_name: String,
    pub timestamp: DateTime<Utc>,
    pub rt_state: Value,
    pub datastore_snapshot: Value,
    pub eventbus_queue_snapshot: Vec<String>,
    pub checkpoint_size_bytes: u64,
    pub is_complete: bool,
}

impl StateCheckpoint {
    /// A fresh, incomplete checkpoint stamped with the current time
    /// and a new random UUID.
    pub fn create(process_name: impl Into<String>) -> Self {
        Self {
            checkpoint_id: Uuid::new_v4(),
            process_name: process_name.into(),
            timestamp: Utc::now(),
            rt_state: Value::Null,
            datastore_snapshot: Value::Null,
            eventbus_queue_snapshot: Vec::new(),
            checkpoint_size_bytes: 0,
            is_complete: false,
        }
    }
}

/// A directory-backed store of [`StateCheckpoint`] files, bounded to
/// `max_checkpoints` by deleting the oldest first.
pub struct CheckpointStore {
    dir: PathBuf,
    max_checkpoints: usize,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>, max_checkpoints: usize) -> Result<Self, CheckpointError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, max_checkpoints })
    }

    fn path_for(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Serialize `cp` to its file, then enforce the capacity ceiling.
    pub fn save(&self, cp: &StateCheckpoint) -> Result<(), CheckpointError> {
        let bytes = serde_json::to_vec_pretty(cp)?;
        fs::write(self.path_for(cp.checkpoint_id), &bytes)?;
        self.enforce_capacity()?;
        Ok(())
    }

    pub fn load(&self, id: Uuid) -> Result<StateCheckpoint, CheckpointError> {
        let path = self.path_for(id);
        let bytes = fs::read(&path).map_err(|_| CheckpointError::NotFound(id))?;
        let cp = serde_json::from_slice(&bytes)?;
        Ok(cp)
    }

    /// The most recently-created checkpoint, or `None` if the store
    /// is empty.
    pub fn load_latest(&self) -> Result<Option<StateCheckpoint>, CheckpointError> {
        match self.list()?.last() {
            Some(id) => Ok(Some(self.load(*id)?)),
            None => Ok(None),
        }
    }

    /// UUIDs of every checkpoint in the store, oldest-first by mtime.
    pub fn list(&self) -> Result<Vec<Uuid>, CheckpointError> {
        let mut entries: Vec<(std::time::SystemTime, Uuid)> = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            let Some(id) = file_stem_as_uuid(&path) else {
                continue;
            };
            let mtime = entry.metadata()?.modified()?;
            entries.push((mtime, id));
        }
        entries.sort_by_key(|(mtime, _)| *mtime);
        Ok(entries.into_iter().map(|(_, id)| id).collect())
    }

    fn enforce_capacity(&self) -> Result<(), CheckpointError> {
        let ids = self.list()?;
        if ids.len() <= self.max_checkpoints {
            return Ok(());
        }
        let excess = ids.len() - self.max_checkpoints;
        for id in &ids[..excess] {
            let _ = fs::remove_file(self.path_for(*id));
        }
        Ok(())
    }

    /// Delete every checkpoint older than `retention_hours`.
    pub fn cleanup_expired(&self, retention_hours: u64) -> Result<usize, CheckpointError> {
        let retention = chrono::Duration::hours(retention_hours as i64);
        let now = Utc::now();
        let mut removed = 0;
        for id in self.list()? {
            if let Ok(cp) = self.load(id) {
                if now - cp.timestamp > retention {
                    let _ = fs::remove_file(self.path_for(id));
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    /// True iff the checkpoint's file exists, parses, and contains the
    /// required fields. A size mismatch between the recorded and
    /// actual byte count is logged, not treated as a failure.
    pub fn verify(&self, id: Uuid) -> bool {
        let path = self.path_for(id);
        let Ok(bytes) = fs::read(&path) else {
            return false;
        };
        let Ok(cp) = serde_json::from_slice::<StateCheckpoint>(&bytes) else {
            return false;
        };
        if cp.checkpoint_size_bytes != 0 && cp.checkpoint_size_bytes != bytes.len() as u64 {
            tracing::warn!(
                checkpoint = %id,
                recorded = cp.checkpoint_size_bytes,
                actual = bytes.len(),
                "checkpoint size mismatch"
            );
        }
        true
    }
}

fn file_stem_as_uuid(path: &Path) -> Option<Uuid> {
    if path.extension()?.to_str()? != "json" {
        return None;
    }
    Uuid::parse_str(path.file_stem()?.to_str()?).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path(), 10).unwrap();
        let cp = StateCheckpoint::create("rt");
        store.save(&cp).unwrap();
        let loaded = store.load(cp.checkpoint_id).unwrap();
        assert_eq!(loaded.checkpoint_id, cp.checkpoint_id);
        assert_eq!(loaded.process_name, "rt");
    }

    #[test]
    fn load_missing_checkpoint_fails() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path(), 10).unwrap();
        assert!(matches!(store.load(Uuid::new_v4()), Err(CheckpointError::NotFound(_))));
    }

    #[test]
    fn capacity_enforced_oldest_first() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path(), 2).unwrap();
        for _ in 0..3 {
            let cp = StateCheckpoint::create("rt");
            store.save(&cp).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert_eq!(store.list().unwrap().len(), 2);
    }

    #[test]
    fn verify_detects_malformed_file() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path(), 10).unwrap();
        let id = Uuid::new_v4();
        fs::write(dir.path().join(format!("{id}.json")), b"not json").unwrap();
        assert!(!store.verify(id));
    }

    #[test]
    fn list_is_empty_for_fresh_store() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path(), 10).unwrap();
        assert!(store.list().unwrap().is_empty());
        assert!(store.load_latest().unwrap().is_none());
    }
}
