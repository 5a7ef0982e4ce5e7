// SPDX-License-Identifier: MIT

//! Project claims (§3): an exclusive assertion of ownership over a work
//! unit, keyed by `(project_number, issue_number)`.

use crate::define_str_id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A project number, e.g. a source-forge project board identifier.
pub type ProjectNumber = u64;
/// An issue number within a project.
pub type IssueNumber = u64;

define_str_id! {
    /// Identifier of the agent holding (or proposing) a claim.
    pub struct AgentId;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectClaim {
    pub project_number: ProjectNumber,
    pub issue_number: IssueNumber,
    pub claimed_by_agent_id: AgentId,
    pub claimed_at: DateTime<Utc>,
}

impl ProjectClaim {
    pub fn new(
        project_number: ProjectNumber,
        issue_number: IssueNumber,
        claimed_by_agent_id: AgentId,
        now: DateTime<Utc>,
    ) -> Self {
        Self { project_number, issue_number, claimed_by_agent_id, claimed_at: now }
    }

    pub fn key(&self) -> (ProjectNumber, IssueNumber) {
        (self.project_number, self.issue_number)
    }
}
