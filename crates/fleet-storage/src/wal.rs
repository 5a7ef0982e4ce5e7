// SPDX-License-Identifier: MIT

//! Append-only event log backing the Claim Store's durability, grounded on
//! the teacher's `storage::wal` module: every successful mutation's
//! post-image event is appended here before the handler returns, and the
//! log is replayed over a base snapshot on startup.

use crate::error::StorageError;
use fleet_core::Event;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub struct Wal {
    file: Mutex<File>,
    path: PathBuf,
}

impl Wal {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { file: Mutex::new(file), path })
    }

    /// Appends one event as a single JSON line, flushing before returning.
    /// Called while the `ClaimStore`'s state mutex is held, so appends from
    /// concurrent transactions never interleave within a line.
    pub fn append(&self, event: &Event) -> Result<(), StorageError> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');
        let mut file = self.file.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// Reads every event recorded since the file was last truncated. A
    /// line that fails to parse is logged and skipped rather than aborting
    /// replay — a half-written final line from a crash mid-append should
    /// not block startup.
    pub fn replay(path: impl AsRef<Path>) -> Result<Vec<Event>, StorageError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(path)?);
        let mut events = Vec::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Event>(&line) {
                Ok(event) => events.push(event),
                Err(err) => tracing::warn!(lineno, %err, path = %path.display(), "skipping unreadable wal line"),
            }
        }
        Ok(events)
    }

    /// Truncates the log to empty, called after a snapshot checkpoint has
    /// durably captured everything recorded so far.
    pub fn truncate(&self) -> Result<(), StorageError> {
        let mut file = self.file.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fleet_core::{Machine, MachineId};
    use std::collections::BTreeSet;

    #[test]
    fn append_then_replay_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.wal");
        let wal = Wal::open(&path).unwrap();

        let machine = Machine::new(MachineId::new("host-1"), "host-1".into(), BTreeSet::from([1]), Utc::now());
        let event = Event::MachineRegistered { machine };
        wal.append(&event).unwrap();

        let replayed = Wal::replay(&path).unwrap();
        assert_eq!(replayed.len(), 1);
        assert_eq!(replayed[0].name(), "machine.registered");
    }

    #[test]
    fn replay_of_missing_file_is_empty() {
        let events = Wal::replay("/nonexistent/path/events.wal").unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn truncate_empties_the_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.wal");
        let wal = Wal::open(&path).unwrap();
        let machine = Machine::new(MachineId::new("host-1"), "host-1".into(), BTreeSet::new(), Utc::now());
        wal.append(&Event::MachineRegistered { machine }).unwrap();
        wal.truncate().unwrap();
        assert!(Wal::replay(&path).unwrap().is_empty());
    }
}
