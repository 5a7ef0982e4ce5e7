// SPDX-License-Identifier: MIT

//! The WebSocket gateway's message vocabulary (§6 "Push transport"),
//! shaped exactly like the teacher's `oj_wire::Response` tagged enum:
//! one flat `#[serde(tag = "type")]` enum per direction, rather than a
//! type per message.

use fleet_core::ProjectNumber;
use serde::{Deserialize, Serialize};

/// Messages a dashboard client sends.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    Subscribe { workspace_id: String },
    Unsubscribe,
    #[serde(rename_all = "camelCase")]
    SubscribeProjects { project_numbers: Vec<ProjectNumber> },
}

/// Messages the gateway pushes to a dashboard client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    #[serde(rename = "project.event")]
    ProjectEvent { project_number: ProjectNumber, payload: serde_json::Value },
    #[serde(rename = "orchestration.global")]
    OrchestrationGlobal { workspaces: Vec<serde_json::Value> },
    #[serde(rename = "orchestration.workspace")]
    OrchestrationWorkspace { workspace_id: String, running: u32, desired: u32 },
    #[serde(rename = "subscribed")]
    Subscribed { room: String },
    #[serde(rename = "unsubscribed")]
    Unsubscribed { room: String },
    #[serde(rename = "error")]
    Error { message: String },
}
