// SPDX-License-Identifier: MIT

//! The file-backed Review Queue layout from §6: a single JSON array on
//! disk with an atomic write protocol, for deployments that run without a
//! database. Grounded on the same write-to-temp-then-rename idiom as
//! `snapshot.rs`; corruption is treated as empty rather than fatal, per the
//! design note in §9.

use crate::error::StorageError;
use fleet_core::ReviewItem;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};

/// A single-writer-per-workspace JSON-array review queue file. The
/// in-process mutex enforces the single-writer constraint within this
/// daemon instance; the spec's "single-writer lease per workspace" across
/// processes is an operational deployment constraint, not something this
/// type can enforce on its own.
pub struct FileReviewQueue {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileReviewQueue {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the queue. A missing file is an empty queue. Invalid JSON is
    /// also treated as an empty queue (§9: "corruption ... is treated as
    /// empty, and the next write is authoritative") rather than propagated
    /// as an error.
    pub fn load(&self) -> Vec<ReviewItem> {
        let Ok(bytes) = std::fs::read(&self.path) else {
            return Vec::new();
        };
        match serde_json::from_slice(&bytes) {
            Ok(items) => items,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), %err, "review queue file is corrupt, treating as empty");
                Vec::new()
            }
        }
    }

    /// Writes the whole queue atomically via write-to-`*.tmp`-then-rename.
    pub fn save(&self, items: &[ReviewItem]) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock();
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        let payload = serde_json::to_vec_pretty(items)?;
        std::fs::write(&tmp_path, &payload)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fleet_core::AgentId;

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let queue = FileReviewQueue::new(dir.path().join("reviews.json"));
        let review = ReviewItem::new(79, 10, "feature/x".into(), AgentId::new("agent-1"), Utc::now());
        queue.save(std::slice::from_ref(&review)).unwrap();

        let loaded = queue.load();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].review_id, review.review_id);
    }

    #[test]
    fn missing_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let queue = FileReviewQueue::new(dir.path().join("nonexistent.json"));
        assert!(queue.load().is_empty());
    }

    #[test]
    fn corrupt_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reviews.json");
        std::fs::write(&path, b"not json at all").unwrap();
        let queue = FileReviewQueue::new(path);
        assert!(queue.load().is_empty());
    }
}
