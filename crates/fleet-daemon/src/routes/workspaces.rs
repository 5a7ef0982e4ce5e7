// SPDX-License-Identifier: MIT

//! `/workspaces` resource (§6, §4.H): the Control API's write path onto
//! the Orchestrator Loop — `set_desired` is the only mutation a caller
//! can make directly; `running` only moves via `reconcile`'s own tick.

use crate::app::App;
use crate::error::{ApiError, ApiResult};
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use fleet_core::{DomainError, WorkspaceId};
use fleet_wire::{SetDesiredCountRequest, WorkspaceView};
use std::sync::Arc;

async fn list(State(app): State<Arc<App>>) -> Json<Vec<WorkspaceView>> {
    Json(app.store.read(|s| s.workspaces.values().map(WorkspaceView::from).collect()))
}

async fn get_one(State(app): State<Arc<App>>, Path(workspace_id): Path<WorkspaceId>) -> ApiResult<Json<WorkspaceView>> {
    let found = app
        .store
        .read(|s| s.workspaces.get(&workspace_id).cloned())
        .ok_or_else(|| ApiError(DomainError::not_found(format!("workspace {workspace_id}"))))?;
    Ok(Json(WorkspaceView::from(&found)))
}

async fn set_desired(
    State(app): State<Arc<App>>,
    Path(workspace_id): Path<WorkspaceId>,
    Json(body): Json<SetDesiredCountRequest>,
) -> ApiResult<Json<WorkspaceView>> {
    let updated = app.orchestrator.set_desired(&app, workspace_id, body.desired).map_err(ApiError)?;
    Ok(Json(WorkspaceView::from(&updated)))
}

/// Operator-triggered reconciliation, distinct from the background tick
/// `main.rs` drives on `orchestrator_tick_interval` — useful for forcing
/// a reaction to a just-issued `set_desired` rather than waiting for the
/// next tick.
async fn reconcile(State(app): State<Arc<App>>, Path(workspace_id): Path<WorkspaceId>) -> ApiResult<Json<WorkspaceView>> {
    app.orchestrator.reconcile(&app, &workspace_id, app.now());
    let found = app
        .store
        .read(|s| s.workspaces.get(&workspace_id).cloned())
        .ok_or_else(|| ApiError(DomainError::not_found(format!("workspace {workspace_id}"))))?;
    Ok(Json(WorkspaceView::from(&found)))
}

pub fn routes(app: Arc<App>) -> Router {
    Router::new()
        .route("/workspaces", get(list))
        .route("/workspaces/{id}", get(get_one))
        .route("/workspaces/{id}/desired", post(set_desired))
        .route("/workspaces/{id}/reconcile", post(reconcile))
        .with_state(app)
}
