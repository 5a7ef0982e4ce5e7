// SPDX-License-Identifier: MIT

//! Point-in-time checkpoints of `MaterializedState`, grounded on the
//! teacher's `storage::snapshot` module: an atomic temp-then-rename write
//! and a bounded `.bak` rotation so a crash mid-write never corrupts the
//! last good snapshot.

use crate::error::StorageError;
use crate::state::MaterializedState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const SNAPSHOT_FILE_NAME: &str = "snapshot.json";
const MAX_BAK_FILES: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub seq: u64,
    pub state: MaterializedState,
    pub created_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(seq: u64, state: MaterializedState, created_at: DateTime<Utc>) -> Self {
        Self { version: 1, seq, state, created_at }
    }
}

fn snapshot_path(dir: &Path) -> PathBuf {
    dir.join(SNAPSHOT_FILE_NAME)
}

fn bak_path(dir: &Path, generation: usize) -> PathBuf {
    dir.join(format!("{SNAPSHOT_FILE_NAME}.bak{generation}"))
}

/// Rotates `snapshot.json` → `.bak1` → `.bak2` → `.bak3`, dropping the
/// oldest generation, before the new snapshot is written in its place.
fn rotate_bak_path(dir: &Path) -> Result<(), StorageError> {
    let oldest = bak_path(dir, MAX_BAK_FILES);
    if oldest.exists() {
        std::fs::remove_file(&oldest)?;
    }
    for generation in (1..MAX_BAK_FILES).rev() {
        let from = bak_path(dir, generation);
        if from.exists() {
            std::fs::rename(&from, bak_path(dir, generation + 1))?;
        }
    }
    let current = snapshot_path(dir);
    if current.exists() {
        std::fs::rename(&current, bak_path(dir, 1))?;
    }
    Ok(())
}

/// Writes a snapshot via write-to-`*.tmp`-then-rename so readers never
/// observe a partially written file, rotating the previous snapshot into
/// `.bak1` first.
pub fn write_snapshot(dir: &Path, snapshot: &Snapshot) -> Result<(), StorageError> {
    std::fs::create_dir_all(dir)?;
    rotate_bak_path(dir)?;

    let tmp_path = dir.join(format!("{SNAPSHOT_FILE_NAME}.tmp"));
    let payload = serde_json::to_vec_pretty(snapshot)?;
    std::fs::write(&tmp_path, &payload)?;
    std::fs::rename(&tmp_path, snapshot_path(dir))?;
    Ok(())
}

/// Loads the latest snapshot, if one exists. A missing directory or file is
/// not an error — a fresh deployment starts from an empty state replayed
/// entirely from the WAL.
pub fn load_latest(dir: &Path) -> Result<Option<Snapshot>, StorageError> {
    let path = snapshot_path(dir);
    if !path.exists() {
        return Ok(None);
    }
    let bytes = std::fs::read(&path)?;
    let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
    Ok(Some(snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let snap = Snapshot::new(1, MaterializedState::new(), Utc::now());
        write_snapshot(dir.path(), &snap).unwrap();

        let loaded = load_latest(dir.path()).unwrap().unwrap();
        assert_eq!(loaded.seq, 1);
    }

    #[test]
    fn rotation_keeps_at_most_three_generations() {
        let dir = tempfile::tempdir().unwrap();
        for seq in 1..=5u64 {
            let snap = Snapshot::new(seq, MaterializedState::new(), Utc::now());
            write_snapshot(dir.path(), &snap).unwrap();
        }
        assert!(bak_path(dir.path(), 1).exists());
        assert!(bak_path(dir.path(), 2).exists());
        assert!(bak_path(dir.path(), 3).exists());
        assert!(!bak_path(dir.path(), 4).exists());

        let latest = load_latest(dir.path()).unwrap().unwrap();
        assert_eq!(latest.seq, 5);
    }

    #[test]
    fn missing_snapshot_is_none_not_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_latest(dir.path()).unwrap().is_none());
    }
}
