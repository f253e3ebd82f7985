//! JSON snapshot persistence

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::{CaseRecord, CaseStore};

/// Serializable image of the whole store.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub next_request_id: u64,
    pub next_objection_id: u64,
    pub next_message_id: u64,
    pub records: Vec<CaseRecord>,
}

/// Read a snapshot; `None` when the file does not exist yet.
pub fn load(path: &Path) -> Result<Option<StoreSnapshot>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    let snapshot = serde_json::from_str(&content).context("Failed to parse snapshot")?;
    Ok(Some(snapshot))
}

/// Write a snapshot via temp file + rename so readers never see half a file.
pub fn save(path: &Path, snapshot: &StoreSnapshot) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).context("Failed to create data directory")?;
    }
    let tmp = path.with_extension("json.tmp");
    let content = serde_json::to_vec(snapshot).context("Failed to serialize snapshot")?;
    fs::write(&tmp, content).context("Failed to write snapshot")?;
    fs::rename(&tmp, path).context("Failed to move snapshot into place")?;
    Ok(())
}

/// Save `store` if it changed since the last flush. Returns whether a write
/// happened. A failed save leaves the store dirty for the next attempt.
pub fn flush(store: &CaseStore, path: &Path) -> Result<bool> {
    if !store.take_dirty() {
        return Ok(false);
    }
    if let Err(e) = save(path, &store.snapshot()) {
        store.mark_dirty();
        return Err(e);
    }
    tracing::debug!("Flushed store to {}", path.display());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::*;

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("store.json");
        assert!(load(&path).unwrap().is_none());

        let (store, _clock) = store_with_clock();
        let case = file_request(&store);
        save(&path, &store.snapshot()).unwrap();

        let loaded = load(&path).unwrap().unwrap();
        assert_eq!(loaded.next_request_id, 1);
        assert_eq!(loaded.records[0].case.case_ref(), case);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_failed_flush_is_retried() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let path = blocker.join("store.json");

        let (store, _clock) = store_with_clock();
        file_request(&store);
        assert!(flush(&store, &path).is_err());

        std::fs::remove_file(&blocker).unwrap();
        assert!(flush(&store, &path).unwrap());
        assert_eq!(load(&path).unwrap().unwrap().records.len(), 1);
        assert!(!flush(&store, &path).unwrap());
    }
}
