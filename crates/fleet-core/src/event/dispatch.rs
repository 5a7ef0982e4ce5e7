// SPDX-License-Identifier: MIT

//! Event dispatch methods — topic, room, and a dotted name for logging,
//! mirroring the teacher's `Event::name()`/`Event::log_summary()` split.

use super::Event;
use crate::project_claim::ProjectNumber;
use crate::workspace::WorkspaceId;

/// A dashboard subscription room: `workspace:{id}` or `project:{number}`
/// (§4.F).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Room {
    Workspace(WorkspaceId),
    Project(ProjectNumber),
}

impl std::fmt::Display for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Room::Workspace(id) => write!(f, "workspace:{id}"),
            Room::Project(n) => write!(f, "project:{n}"),
        }
    }
}

impl Event {
    /// A dotted name for logging and for the wire-level `{"type": ...}`
    /// tag, e.g. `"session.stalled"`.
    pub fn name(&self) -> &'static str {
        match self {
            Event::SessionCreated { .. } => "session.created",
            Event::SessionHeartbeat { .. } => "session.heartbeat",
            Event::SessionUpdated { .. } => "session.updated",
            Event::SessionStalled { .. } => "session.stalled",
            Event::SessionFailed { .. } => "session.failed",
            Event::SessionCompleted { .. } => "session.completed",
            Event::SessionArchived { .. } => "session.archived",
            Event::TaskTransitioned { .. } => "task.transitioned",
            Event::ProjectClaimed { .. } => "project.claimed",
            Event::ProjectClaimReleased { .. } => "project.claim_released",
            Event::MachineRegistered { .. } => "machine.registered",
            Event::MachineHeartbeat { .. } => "machine.heartbeat",
            Event::MachineOffline { .. } => "machine.offline",
            Event::ReviewEnqueued { .. } => "review.enqueued",
            Event::ReviewClaimed { .. } => "review.claimed",
            Event::ReviewUpdated { .. } => "review.updated",
            Event::ReviewReleased { .. } => "review.released",
            Event::ReviewClaimTimedOut { .. } => "review.claim_timed_out",
            Event::OrchestrationUpdated { .. } => "orchestration.updated",
            Event::ProjectEvent { .. } => "project.event",
            Event::WorktreeStatusUpdated { .. } => "worktree.status_updated",
        }
    }

    /// The `session.*`/`task.*`/... topic prefix this event belongs to.
    pub fn topic(&self) -> &'static str {
        match self {
            Event::SessionCreated { .. }
            | Event::SessionHeartbeat { .. }
            | Event::SessionUpdated { .. }
            | Event::SessionStalled { .. }
            | Event::SessionFailed { .. }
            | Event::SessionCompleted { .. }
            | Event::SessionArchived { .. } => "session",
            Event::TaskTransitioned { .. } => "task",
            Event::ProjectClaimed { .. } | Event::ProjectClaimReleased { .. } => "project",
            Event::MachineRegistered { .. } | Event::MachineHeartbeat { .. } | Event::MachineOffline { .. } => {
                "machine"
            }
            Event::ReviewEnqueued { .. }
            | Event::ReviewClaimed { .. }
            | Event::ReviewUpdated { .. }
            | Event::ReviewReleased { .. }
            | Event::ReviewClaimTimedOut { .. } => "review",
            Event::OrchestrationUpdated { .. } => "orchestration",
            Event::ProjectEvent { .. } => "project",
            Event::WorktreeStatusUpdated { .. } => "worktree",
        }
    }

    /// The dashboard room(s) interested in this event, if any. Most
    /// events are routed by project; orchestration events are routed by
    /// workspace.
    pub fn rooms(&self) -> Vec<Room> {
        match self {
            Event::SessionCreated { session }
            | Event::SessionHeartbeat { session }
            | Event::SessionUpdated { session }
            | Event::SessionStalled { session }
            | Event::SessionFailed { session }
            | Event::SessionCompleted { session }
            | Event::SessionArchived { session } => vec![Room::Project(session.project_id)],
            Event::TaskTransitioned { task } => vec![Room::Project(task.project_id)],
            Event::ProjectClaimed { claim } | Event::ProjectClaimReleased { claim } => {
                vec![Room::Project(claim.project_number)]
            }
            Event::MachineRegistered { .. } | Event::MachineHeartbeat { .. } | Event::MachineOffline { .. } => {
                vec![]
            }
            Event::ReviewEnqueued { review }
            | Event::ReviewClaimed { review }
            | Event::ReviewUpdated { review }
            | Event::ReviewReleased { review }
            | Event::ReviewClaimTimedOut { review } => vec![Room::Project(review.project_number)],
            Event::OrchestrationUpdated { orchestration } => {
                vec![Room::Workspace(orchestration.workspace_id.clone())]
            }
            Event::ProjectEvent { project_number, .. } => vec![Room::Project(*project_number)],
            Event::WorktreeStatusUpdated { project_number, .. } => vec![Room::Project(*project_number)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::WorkspaceOrchestration;
    use chrono::Utc;

    #[test]
    fn orchestration_event_routes_to_workspace_room() {
        let ws = WorkspaceOrchestration::new(WorkspaceId::new("team-a"), 3, Utc::now());
        let event = Event::OrchestrationUpdated { orchestration: ws };
        assert_eq!(event.rooms(), vec![Room::Workspace(WorkspaceId::new("team-a"))]);
        assert_eq!(event.topic(), "orchestration");
    }
}
