// SPDX-License-Identifier: MIT

//! Review Items (§3, §4.E): completed-but-unreviewed work units queued for
//! operator/reviewer action.

use crate::define_uuid_id;
use crate::project_claim::{AgentId, IssueNumber, ProjectNumber};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

define_uuid_id! {
    /// Unique identifier for a review item.
    pub struct ReviewId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    InReview,
    Approved,
    Rejected,
}

impl ReviewStatus {
    /// Statuses that count as "open" for the at-most-one-claim invariant
    /// (§3: "at most one review in `{pending, in_review}` per
    /// `(project_number, issue_number)`").
    pub fn is_open(self) -> bool {
        matches!(self, ReviewStatus::Pending | ReviewStatus::InReview)
    }
}

impl std::fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::InReview => "in_review",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Rejected => "rejected",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewItem {
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

impl ReviewItem {
    pub fn new(
        project_number: ProjectNumber,
        issue_number: IssueNumber,
        branch_name: String,
        completed_by_agent_id: AgentId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            review_id: ReviewId::new(),
            project_number,
            issue_number,
            branch_name,
            completed_by_agent_id,
            status: ReviewStatus::Pending,
            enqueued_at: now,
            claimed_at: None,
            completed_at: None,
            feedback: None,
        }
    }

    pub fn work_unit_key(&self) -> (ProjectNumber, IssueNumber) {
        (self.project_number, self.issue_number)
    }
}
