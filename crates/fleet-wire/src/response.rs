// SPDX-License-Identifier: MIT

//! Response bodies for the Control API, including the `{status_code,
//! error_kind, message, details?}` error shape from §6/§7 — the direct
//! analogue of the teacher's `Response` enum (`Ok`/`Pong`/`Hello`/`Error`/
//! `Job`), generalized from one flat tagged enum per socket message to one
//! struct per HTTP resource, with the same `ErrorResponse` shape serving
//! every non-2xx reply.

use chrono::{DateTime, Utc};
use fleet_core::{
    AgentId, IssueNumber, MachineId, MachineStatus, ProjectNumber, ReviewId, ReviewStatus, SessionId, SessionStatus,
    TaskId, TaskStatus,
};
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_id: SessionId,
    pub project_id: ProjectNumber,
    pub machine_id: MachineId,
    pub slot: Option<u32>,
    pub status: SessionStatus,
    pub last_heartbeat: DateTime<Utc>,
    pub current_task_id: Option<TaskId>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub recovery_attempts: u32,
}

impl From<&fleet_core::Session> for SessionView {
    fn from(s: &fleet_core::Session) -> Self {
        Self {
            session_id: s.session_id,
            project_id: s.project_id,
            machine_id: s.machine_id.clone(),
            slot: s.slot,
            status: s.status,
            last_heartbeat: s.last_heartbeat,
            current_task_id: s.current_task_id,
            started_at: s.started_at,
            completed_at: s.completed_at,
            recovery_attempts: s.recovery.attempts,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    pub task_id: TaskId,
    pub session_id: SessionId,
    pub project_id: ProjectNumber,
    pub status: TaskStatus,
    pub github_issue_id: Option<u64>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl From<&fleet_core::Task> for TaskView {
    fn from(t: &fleet_core::Task) -> Self {
        Self {
            task_id: t.task_id,
            session_id: t.session_id,
            project_id: t.project_id,
            status: t.status,
            github_issue_id: t.github_issue_id,
            started_at: t.started_at,
            completed_at: t.completed_at,
            error_message: t.error_message.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineView {
    pub machine_id: MachineId,
    pub hostname: String,
    pub slots: BTreeSet<u32>,
    pub status: MachineStatus,
    pub last_heartbeat: DateTime<Utc>,
}

impl From<&fleet_core::Machine> for MachineView {
    fn from(m: &fleet_core::Machine) -> Self {
        Self {
            machine_id: m.machine_id.clone(),
            hostname: m.hostname.clone(),
            slots: m.slots.clone(),
            status: m.status,
            last_heartbeat: m.last_heartbeat,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineAvailability {
    pub machine_id: MachineId,
    pub total: usize,
    pub occupied: usize,
    pub free_slots: Vec<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewView {
    pub review_id: ReviewId,
    pub project_number: ProjectNumber,
    pub issue_number: IssueNumber,
    pub branch_name: String,
    pub completed_by_agent_id: AgentId,
    pub status: ReviewStatus,
    pub enqueued_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub feedback: Option<String>,
}

impl From<&fleet_core::ReviewItem> for ReviewView {
    fn from(r: &fleet_core::ReviewItem) -> Self {
        Self {
            review_id: r.review_id,
            project_number: r.project_number,
            issue_number: r.issue_number,
            branch_name: r.branch_name.clone(),
            completed_by_agent_id: r.completed_by_agent_id.clone(),
            status: r.status,
            enqueued_at: r.enqueued_at,
            claimed_at: r.claimed_at,
            completed_at: r.completed_at,
            feedback: r.feedback.clone(),
        }
    }
}

/// Recovery guidance returned by `/sessions/{id}/failure-info` (§7:
/// "`failure-info` summarizes these plus a set of recovery
/// recommendations").
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureInfoView {
    pub reason: Option<String>,
    pub error_details: Option<serde_json::Value>,
    pub failed_at: Option<DateTime<Utc>>,
    pub recovery_attempts: u32,
    pub recommendations: Vec<String>,
}

/// Partial-success shape for `link_to_project` (§7: "returns 200 with a
/// `warnings[]` array, not an error").
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkOutcomeView {
    pub warnings: Vec<String>,
}

/// `/sessions/{id}/health` (§6): a cheaper, non-mutating liveness check
/// than `failure-info`, derived from the same `T_session` threshold the
/// Liveness Monitor uses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionHealthView {
    pub healthy: bool,
    pub seconds_since_heartbeat: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimView {
    pub project_number: ProjectNumber,
    pub issue_number: IssueNumber,
    pub claimed_by_agent_id: AgentId,
    pub claimed_at: DateTime<Utc>,
}

impl From<&fleet_core::ProjectClaim> for ClaimView {
    fn from(c: &fleet_core::ProjectClaim) -> Self {
        Self {
            project_number: c.project_number,
            issue_number: c.issue_number,
            claimed_by_agent_id: c.claimed_by_agent_id.clone(),
            claimed_at: c.claimed_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceView {
    pub workspace_id: fleet_core::WorkspaceId,
    pub running: u32,
    pub desired: u32,
    pub last_updated: DateTime<Utc>,
}

impl From<&fleet_core::WorkspaceOrchestration> for WorkspaceView {
    fn from(w: &fleet_core::WorkspaceOrchestration) -> Self {
        Self { workspace_id: w.workspace_id.clone(), running: w.running, desired: w.desired, last_updated: w.last_updated }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthView {
    pub status: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedHealthView {
    pub status: &'static str,
    pub claim_store_reachable: bool,
    pub sessions: usize,
    pub machines_online: usize,
    pub pending_reviews: usize,
}

/// The error shape from §6: `{status_code, error_kind, message, details?}`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub status_code: u16,
    pub error_kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}
