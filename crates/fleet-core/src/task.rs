// SPDX-License-Identifier: MIT

//! Task rows and the legal-transition table from §3.

use crate::session::SessionId;
use crate::{define_uuid_id, ProjectNumber};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

define_uuid_id! {
    /// Unique identifier for a task.
    pub struct TaskId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Blocked,
    Completed,
    Failed,
}

impl TaskStatus {
    /// The transition table in §3: `pending → {in_progress, blocked,
    /// completed}`, `in_progress → {completed, failed, blocked, pending}`,
    /// `blocked → {pending, in_progress}`, `failed → {pending}`,
    /// `completed → ∅`.
    pub fn can_transition_to(self, to: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, to),
            (Pending, InProgress)
                | (Pending, Blocked)
                | (Pending, Completed)
                | (InProgress, Completed)
                | (InProgress, Failed)
                | (InProgress, Blocked)
                | (InProgress, Pending)
                | (Blocked, Pending)
                | (Blocked, InProgress)
                | (Failed, Pending)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// A sub-step within a session, tracked independently (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: TaskId,
    pub session_id: SessionId,
    pub project_id: ProjectNumber,
    pub status: TaskStatus,
    pub github_issue_id: Option<u64>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub error_message: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Task {
    pub fn new(session_id: SessionId, project_id: ProjectNumber, github_issue_id: Option<u64>) -> Self {
        Self {
            task_id: TaskId::new(),
            session_id,
            project_id,
            status: TaskStatus::Pending,
            github_issue_id,
            started_at: None,
            completed_at: None,
            error_message: None,
            metadata: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::TaskStatus::*;
    use yare::parameterized;

    #[parameterized(
        pending_to_in_progress = { Pending, InProgress, true },
        pending_to_blocked = { Pending, Blocked, true },
        pending_to_completed = { Pending, Completed, true },
        pending_to_failed = { Pending, Failed, false },
        in_progress_to_completed = { InProgress, Completed, true },
        in_progress_to_failed = { InProgress, Failed, true },
        in_progress_to_blocked = { InProgress, Blocked, true },
        in_progress_to_pending = { InProgress, Pending, true },
        blocked_to_pending = { Blocked, Pending, true },
        blocked_to_in_progress = { Blocked, InProgress, true },
        blocked_to_completed = { Blocked, Completed, false },
        failed_to_pending = { Failed, Pending, true },
        failed_to_in_progress = { Failed, InProgress, false },
        completed_to_anything = { Completed, Pending, false },
        completed_to_in_progress = { Completed, InProgress, false },
    )]
    fn transition_legality(from: super::TaskStatus, to: super::TaskStatus, expected: bool) {
        assert_eq!(from.can_transition_to(to), expected);
    }

    #[test]
    fn completed_is_terminal() {
        assert!(Completed.is_terminal());
        assert!(!Pending.is_terminal());
        assert!(!Failed.is_terminal());
    }
}
