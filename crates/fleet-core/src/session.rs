// SPDX-License-Identifier: MIT

//! Session rows (§3): one agent's attempt at a project, bound to a
//! machine/slot.

use crate::define_uuid_id;
use crate::machine::MachineId;
use crate::task::TaskId;
use crate::ProjectNumber;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

define_uuid_id! {
    /// Unique identifier for a session.
    pub struct SessionId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Paused,
    Completed,
    Failed,
    Stalled,
    Archived,
}

impl SessionStatus {
    /// Statuses that count as occupying a `(machine_id, slot)` pair (§3:
    /// "a session in `{completed, failed, archived}` does not occupy its
    /// slot").
    pub fn occupies_slot(self) -> bool {
        matches!(self, SessionStatus::Active | SessionStatus::Paused | SessionStatus::Stalled)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Failed)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionStatus::Active => "active",
            SessionStatus::Paused => "paused",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
            SessionStatus::Stalled => "stalled",
            SessionStatus::Archived => "archived",
        };
        write!(f, "{s}")
    }
}

/// One attempt at `mark_stalled`/`mark_failed`/`recover`, kept for the
/// `failure-info` recovery recommendations (§7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryAttempt {
    pub at: DateTime<Utc>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecoveryInfo {
    pub attempts: u32,
    pub history: Vec<RecoveryAttempt>,
}

/// Structured failure detail recorded at `metadata.failure` on every
/// terminal failure (§7 "User-visible failure behavior").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureDetail {
    pub reason: String,
    pub error_details: Option<serde_json::Value>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionId,
    pub project_id: ProjectNumber,
    pub machine_id: MachineId,
    pub slot: Option<u32>,
    pub status: SessionStatus,
    pub last_heartbeat: DateTime<Utc>,
    pub current_task_id: Option<TaskId>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub recovery: RecoveryInfo,
    #[serde(default)]
    pub failure: Option<FailureDetail>,
}

impl Session {
    pub fn new(
        project_id: ProjectNumber,
        machine_id: MachineId,
        slot: Option<u32>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: SessionId::new(),
            project_id,
            machine_id,
            slot,
            status: SessionStatus::Active,
            last_heartbeat: now,
            current_task_id: None,
            started_at: now,
            completed_at: None,
            metadata: HashMap::new(),
            recovery: RecoveryInfo::default(),
            failure: None,
        }
    }

    /// `(machine_id, slot)` identity, used by the Slot Scheduler's
    /// uniqueness predicate (§4.D). `None` when the session was created
    /// without a slot (e.g. a failed assignment rolled back per §5).
    pub fn slot_key(&self) -> Option<(MachineId, u32)> {
        self.slot.map(|s| (self.machine_id.clone(), s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn occupies_slot_matches_section_3_invariant() {
        assert!(SessionStatus::Active.occupies_slot());
        assert!(SessionStatus::Paused.occupies_slot());
        assert!(SessionStatus::Stalled.occupies_slot());
        assert!(!SessionStatus::Completed.occupies_slot());
        assert!(!SessionStatus::Failed.occupies_slot());
        assert!(!SessionStatus::Archived.occupies_slot());
    }

    #[test]
    fn terminal_statuses_are_completed_and_failed_only() {
        assert!(SessionStatus::Completed.is_terminal());
        assert!(SessionStatus::Failed.is_terminal());
        assert!(!SessionStatus::Archived.is_terminal());
        assert!(!SessionStatus::Stalled.is_terminal());
    }
}
