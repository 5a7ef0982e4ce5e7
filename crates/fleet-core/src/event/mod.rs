// SPDX-License-Identifier: MIT

//! Events that flow across the Event Bus (§4.F).
//!
//! Serializes with `{"type": "session.created", ...}` tagging, mirroring
//! the teacher's `oj_core::Event` convention of a single flat enum with a
//! `name()` dispatch method rather than one type per topic.

mod dispatch;

pub use dispatch::Room;

use crate::machine::Machine;
use crate::project_claim::{ProjectClaim, ProjectNumber};
use crate::review::ReviewItem;
use crate::session::Session;
use crate::task::Task;
use crate::workspace::WorkspaceOrchestration;
use serde::{Deserialize, Serialize};

/// Events that trigger dashboard updates. Topics in §4.F are `session.*`,
/// `task.*`, `machine.*`, `review.*`, `orchestration.*`, `project.*`,
/// `worktree.*` — one variant family per topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    #[serde(rename = "session.created")]
    SessionCreated { session: Session },
    #[serde(rename = "session.heartbeat")]
    SessionHeartbeat { session: Session },
    #[serde(rename = "session.updated")]
    SessionUpdated { session: Session },
    #[serde(rename = "session.stalled")]
    SessionStalled { session: Session },
    #[serde(rename = "session.failed")]
    SessionFailed { session: Session },
    #[serde(rename = "session.completed")]
    SessionCompleted { session: Session },
    #[serde(rename = "session.archived")]
    SessionArchived { session: Session },

    #[serde(rename = "task.transitioned")]
    TaskTransitioned { task: Task },

    #[serde(rename = "project.claimed")]
    ProjectClaimed { claim: ProjectClaim },
    #[serde(rename = "project.claim_released")]
    ProjectClaimReleased { claim: ProjectClaim },

    #[serde(rename = "machine.registered")]
    MachineRegistered { machine: Machine },
    #[serde(rename = "machine.heartbeat")]
    MachineHeartbeat { machine: Machine },
    #[serde(rename = "machine.offline")]
    MachineOffline { machine: Machine },

    #[serde(rename = "review.enqueued")]
    ReviewEnqueued { review: ReviewItem },
    #[serde(rename = "review.claimed")]
    ReviewClaimed { review: ReviewItem },
    #[serde(rename = "review.updated")]
    ReviewUpdated { review: ReviewItem },
    #[serde(rename = "review.released")]
    ReviewReleased { review: ReviewItem },
    #[serde(rename = "review.claim_timed_out")]
    ReviewClaimTimedOut { review: ReviewItem },

    #[serde(rename = "orchestration.updated")]
    OrchestrationUpdated { orchestration: WorkspaceOrchestration },

    #[serde(rename = "project.event")]
    ProjectEvent { project_number: ProjectNumber, payload: serde_json::Value },

    #[serde(rename = "worktree.status_updated")]
    WorktreeStatusUpdated { project_number: ProjectNumber, status: serde_json::Value },
}
