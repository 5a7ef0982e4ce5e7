// SPDX-License-Identifier: MIT

//! Request bodies for the Control API (§4.G, §6). One struct per
//! endpoint, `camelCase` on the wire to match the dashboard client,
//! matching the request-type convention the `goose-server` examples use
//! for their axum handlers (the teacher's own wire crate shapes a socket
//! protocol, not HTTP bodies, so this module's *shape* is grounded there
//! instead while keeping the teacher's serde conventions).

use chrono::{DateTime, Utc};
use fleet_core::{AgentId, IssueNumber, MachineId, ProjectNumber, SessionStatus, TaskStatus};
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub project_id: ProjectNumber,
    pub machine_id: MachineId,
    pub slot: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSessionRequest {
    #[serde(default)]
    pub status: Option<SessionStatus>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkFailedRequest {
    pub reason: String,
    #[serde(default)]
    pub error_details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkStalledRequest {
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub session_id: fleet_core::SessionId,
    pub project_id: ProjectNumber,
    #[serde(default)]
    pub github_issue_id: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionTaskRequest {
    pub to: TaskStatus,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterMachineRequest {
    pub machine_id: MachineId,
    pub hostname: String,
    pub slots: Vec<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignSlotRequest {
    pub session_id: fleet_core::SessionId,
    #[serde(default)]
    pub slot: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueReviewRequest {
    pub project_number: ProjectNumber,
    pub issue_number: IssueNumber,
    pub branch_name: String,
    pub completed_by_agent_id: AgentId,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReviewStatusRequest {
    pub status: fleet_core::ReviewStatus,
    #[serde(default)]
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectEventIngestRequest {
    pub project_number: ProjectNumber,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorktreeStatusRequest {
    pub status: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetDesiredCountRequest {
    pub desired: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimWorkUnitRequest {
    pub project_number: ProjectNumber,
    pub issue_number: IssueNumber,
    pub agent_id: AgentId,
}

/// Shared across a few requests that need a caller-asserted timestamp for
/// idempotent retries rather than trusting the server's clock exclusively
/// (§5: re-submitting the same heartbeat is safe).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatRequest {
    #[serde(default)]
    pub at: Option<DateTime<Utc>>,
}
