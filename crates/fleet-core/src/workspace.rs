// SPDX-License-Identifier: MIT

//! Workspace Orchestration rows (§3, §4.H): a tenant-like scope that owns
//! an orchestrator loop and a desired agent count.

use crate::define_str_id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

define_str_id! {
    /// Identifier of a workspace, chosen by the operator (e.g. a team or
    /// product slug), never generated.
    pub struct WorkspaceId;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceOrchestration {
    pub workspace_id: WorkspaceId,
    pub running: u32,
    pub desired: u32,
    pub last_updated: DateTime<Utc>,
}

impl WorkspaceOrchestration {
    pub fn new(workspace_id: WorkspaceId, desired: u32, now: DateTime<Utc>) -> Self {
        Self { workspace_id, running: 0, desired, last_updated: now }
    }
}
