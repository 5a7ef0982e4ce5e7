// SPDX-License-Identifier: MIT

//! List-endpoint query parameters (§6): status/project/machine filters and
//! a `limit ≤ 100` pagination cap, shared by every `GET /sessions`-style
//! endpoint.

use fleet_core::{MachineId, ProjectNumber, SessionStatus};
use serde::Deserialize;

pub const MAX_PAGE_LIMIT: u32 = 100;
pub const DEFAULT_PAGE_LIMIT: u32 = 50;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionListQuery {
    #[serde(default)]
    pub status: Option<SessionStatus>,
    #[serde(default)]
    pub project_id: Option<ProjectNumber>,
    #[serde(default)]
    pub machine_id: Option<MachineId>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

impl SessionListQuery {
    /// Clamps `limit` to the §6 cap, defaulting when absent.
    pub fn effective_limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_PAGE_LIMIT).min(MAX_PAGE_LIMIT)
    }

    pub fn effective_offset(&self) -> u32 {
        self.offset.unwrap_or(0)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewListQuery {
    #[serde(default)]
    pub status: Option<fleet_core::ReviewStatus>,
    #[serde(default)]
    pub project_number: Option<ProjectNumber>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

impl ReviewListQuery {
    pub fn effective_limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_PAGE_LIMIT).min(MAX_PAGE_LIMIT)
    }

    pub fn effective_offset(&self) -> u32 {
        self.offset.unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_limit_clamps_to_max() {
        let q = SessionListQuery { status: None, project_id: None, machine_id: None, limit: Some(500), offset: None };
        assert_eq!(q.effective_limit(), MAX_PAGE_LIMIT);
    }

    #[test]
    fn effective_limit_defaults_when_absent() {
        let q = SessionListQuery { status: None, project_id: None, machine_id: None, limit: None, offset: None };
        assert_eq!(q.effective_limit(), DEFAULT_PAGE_LIMIT);
    }
}
