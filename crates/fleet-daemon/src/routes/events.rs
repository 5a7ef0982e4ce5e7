// SPDX-License-Identifier: MIT

//! `/api/events` (§6): ingestion endpoints for events that fan out over
//! the Event Bus but own no Claim Store row (§4.A's `ProjectEvent`/
//! `WorktreeStatusUpdated` arms are no-ops in `apply_event` for exactly
//! this reason) — a GitHub webhook relay or a CI runner pushes here, the
//! WebSocket gateway pushes it straight on to subscribed dashboards.

use crate::app::App;
use axum::extract::{Path, State};
use axum::routing::{post, put};
use axum::{Json, Router};
use fleet_core::{Event, ProjectNumber};
use fleet_wire::{ProjectEventIngestRequest, WorktreeStatusRequest};
use std::sync::Arc;

async fn ingest_project_event(State(app): State<Arc<App>>, Json(body): Json<ProjectEventIngestRequest>) {
    app.event_bus.publish(Event::ProjectEvent { project_number: body.project_number, payload: body.payload });
}

async fn put_worktree_status(
    State(app): State<Arc<App>>,
    Path(project_number): Path<ProjectNumber>,
    Json(body): Json<WorktreeStatusRequest>,
) {
    app.set_worktree_status(project_number, body.status.clone());
    app.event_bus.publish(Event::WorktreeStatusUpdated { project_number, status: body.status });
}

async fn get_worktree_status(State(app): State<Arc<App>>, Path(project_number): Path<ProjectNumber>) -> Json<serde_json::Value> {
    Json(app.worktree_status(project_number).unwrap_or(serde_json::Value::Null))
}

pub fn routes(app: Arc<App>) -> Router {
    Router::new()
        .route("/api/events/project", post(ingest_project_event))
        .route("/api/events/worktree/{project_number}", put(put_worktree_status).get(get_worktree_status))
        .with_state(app)
}
