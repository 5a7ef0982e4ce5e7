// SPDX-License-Identifier: MIT

//! The source-forge seam (§9): "a forge interface with the methods
//! `{create_issue, link_to_project, close_issue, get_repo_id}`". The core
//! consumes only success/failure and issue identifiers (§1) — it never
//! speaks the upstream host's protocol directly.

use crate::project_claim::{IssueNumber, ProjectNumber};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForgeError {
    #[error("forge unreachable: {0}")]
    Unavailable(String),
    #[error("forge rejected request: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone)]
pub struct IssueRef {
    pub project_number: ProjectNumber,
    pub issue_number: IssueNumber,
    pub repo_id: String,
}

/// Outcome of linking an issue to a project. §7: "Partial success in
/// linking an issue to a project returns 200 with a `warnings[]` array,
/// not an error" — `warnings` carries exactly that.
#[derive(Debug, Clone, Default)]
pub struct LinkOutcome {
    pub warnings: Vec<String>,
}

#[async_trait]
pub trait Forge: Send + Sync {
    async fn create_issue(&self, project_number: ProjectNumber, title: &str, body: &str) -> Result<IssueRef, ForgeError>;
    async fn link_to_project(&self, issue: &IssueRef, project_number: ProjectNumber) -> Result<LinkOutcome, ForgeError>;
    async fn close_issue(&self, issue: &IssueRef) -> Result<(), ForgeError>;
    async fn get_repo_id(&self, project_number: ProjectNumber) -> Result<String, ForgeError>;
}

/// The only forge variant named in §9: a GraphQL v4 adapter. The core
/// never implements this itself — it is consumed via the trait above by
/// whatever out-of-scope component configures it (§1).
pub struct GraphQlV4Forge {
    pub endpoint: String,
}

#[async_trait]
impl Forge for GraphQlV4Forge {
    async fn create_issue(&self, project_number: ProjectNumber, _title: &str, _body: &str) -> Result<IssueRef, ForgeError> {
        Err(ForgeError::Unavailable(format!(
            "GraphQL v4 forge at {} not wired for project {project_number} in this build",
            self.endpoint
        )))
    }

    async fn link_to_project(&self, issue: &IssueRef, _project_number: ProjectNumber) -> Result<LinkOutcome, ForgeError> {
        Err(ForgeError::Unavailable(format!("GraphQL v4 forge not wired for issue {}", issue.issue_number)))
    }

    async fn close_issue(&self, issue: &IssueRef) -> Result<(), ForgeError> {
        Err(ForgeError::Unavailable(format!("GraphQL v4 forge not wired for issue {}", issue.issue_number)))
    }

    async fn get_repo_id(&self, project_number: ProjectNumber) -> Result<String, ForgeError> {
        Err(ForgeError::Unavailable(format!(
            "GraphQL v4 forge at {} not wired for project {project_number} in this build",
            self.endpoint
        )))
    }
}
