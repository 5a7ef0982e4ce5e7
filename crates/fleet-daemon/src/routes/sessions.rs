// SPDX-License-Identifier: MIT

//! `/sessions` resource (§6): create/list/get/update/soft-delete, plus the
//! heartbeat, failure, and recovery sub-resources. Handlers are thin:
//! parse, call into `state_machine::session`/`scheduler`, map the result
//! through `fleet_wire`'s view types.

use crate::app::App;
use crate::error::{ApiError, ApiResult};
use crate::state_machine::session;
use axum::extract::{Path, Query, State};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use fleet_core::{MachineId, ProjectNumber, SessionId, SessionStatus};
use fleet_wire::{
    CreateSessionRequest, FailureInfoView, HeartbeatRequest, MarkFailedRequest, MarkStalledRequest, SessionHealthView,
    SessionListQuery, SessionView, UpdateSessionRequest,
};
use std::sync::Arc;

async fn create(State(app): State<Arc<App>>, Json(body): Json<CreateSessionRequest>) -> ApiResult<Json<SessionView>> {
    let created = session::create_session(&app, body.project_id, body.machine_id, body.slot).map_err(ApiError)?;
    Ok(Json(SessionView::from(&created)))
}

async fn list(State(app): State<Arc<App>>, Query(query): Query<SessionListQuery>) -> Json<Vec<SessionView>> {
    Json(filtered_sessions(&app, &query))
}

fn filtered_sessions(app: &App, query: &SessionListQuery) -> Vec<SessionView> {
    let mut rows: Vec<_> = app.store.read(|s| {
        s.sessions
            .values()
            .filter(|row| query.status.map(|st| row.status == st).unwrap_or(true))
            .filter(|row| query.project_id.map(|p| row.project_id == p).unwrap_or(true))
            .filter(|row| query.machine_id.as_ref().map(|m| &row.machine_id == m).unwrap_or(true))
            .cloned()
            .collect::<Vec<_>>()
    });
    rows.sort_by_key(|s| s.started_at);
    rows.into_iter()
        .skip(query.effective_offset() as usize)
        .take(query.effective_limit() as usize)
        .map(|s| SessionView::from(&s))
        .collect()
}

async fn get_one(State(app): State<Arc<App>>, Path(session_id): Path<SessionId>) -> ApiResult<Json<SessionView>> {
    let found = app
        .store
        .read(|s| s.sessions.get(&session_id).cloned())
        .ok_or_else(|| ApiError(fleet_core::DomainError::not_found(format!("session {session_id}"))))?;
    Ok(Json(SessionView::from(&found)))
}

async fn update(
    State(app): State<Arc<App>>,
    Path(session_id): Path<SessionId>,
    Json(body): Json<UpdateSessionRequest>,
) -> ApiResult<Json<SessionView>> {
    let updated = session::update_session(&app, session_id, body.status, body.metadata).map_err(ApiError)?;
    Ok(Json(SessionView::from(&updated)))
}

/// Soft-delete (§6): archives a terminal session rather than removing its
/// row, per §9's decision that archived sessions never TTL-expire.
async fn soft_delete(State(app): State<Arc<App>>, Path(session_id): Path<SessionId>) -> ApiResult<Json<SessionView>> {
    let archived = session::archive_session(&app, session_id).map_err(ApiError)?;
    Ok(Json(SessionView::from(&archived)))
}

async fn heartbeat(
    State(app): State<Arc<App>>,
    Path(session_id): Path<SessionId>,
    Json(body): Json<HeartbeatRequest>,
) -> ApiResult<Json<SessionView>> {
    let at = body.at.unwrap_or_else(|| app.now());
    let updated = session::heartbeat(&app, session_id, at).map_err(ApiError)?;
    Ok(Json(SessionView::from(&updated)))
}

async fn mark_failed(
    State(app): State<Arc<App>>,
    Path(session_id): Path<SessionId>,
    Json(body): Json<MarkFailedRequest>,
) -> ApiResult<Json<SessionView>> {
    let updated = session::mark_failed(&app, session_id, body.reason, body.error_details).map_err(ApiError)?;
    Ok(Json(SessionView::from(&updated)))
}

async fn mark_stalled(
    State(app): State<Arc<App>>,
    Path(session_id): Path<SessionId>,
    Json(body): Json<MarkStalledRequest>,
) -> ApiResult<Json<SessionView>> {
    let updated = session::mark_stalled(&app, session_id, body.reason).map_err(ApiError)?;
    Ok(Json(SessionView::from(&updated)))
}

/// §6 `/sessions/{id}/recover`: the operator-driven counterpart to an
/// agent's own heartbeat — clears `stalled` the same way a heartbeat
/// would, at the time the operator issued the command rather than a
/// caller-asserted one.
async fn recover(State(app): State<Arc<App>>, Path(session_id): Path<SessionId>) -> ApiResult<Json<SessionView>> {
    let now = app.now();
    let updated = session::heartbeat(&app, session_id, now).map_err(ApiError)?;
    Ok(Json(SessionView::from(&updated)))
}

/// §6 `/sessions/{id}/prepare-recovery`: a read-only preview of what
/// `recover` would report via `failure-info`, so an operator can inspect
/// recovery recommendations before committing to the action.
async fn prepare_recovery(State(app): State<Arc<App>>, Path(session_id): Path<SessionId>) -> ApiResult<Json<FailureInfoView>> {
    failure_info(State(app), Path(session_id)).await
}

async fn failure_info(State(app): State<Arc<App>>, Path(session_id): Path<SessionId>) -> ApiResult<Json<FailureInfoView>> {
    let found = app
        .store
        .read(|s| s.sessions.get(&session_id).cloned())
        .ok_or_else(|| ApiError(fleet_core::DomainError::not_found(format!("session {session_id}"))))?;

    let stuck_tasks = app.store.read(|s| {
        s.tasks
            .values()
            .filter(|t| t.session_id == session_id && t.status == fleet_core::TaskStatus::InProgress)
            .count()
    });

    let mut recommendations = Vec::new();
    if found.failure.is_some() {
        recommendations.push("retry with a fresh session if the failure reason is transient".to_string());
    }
    if stuck_tasks > 0 {
        recommendations.push(format!("{stuck_tasks} task(s) still in_progress — consider failing them before retrying"));
    }
    if found.recovery.attempts > 2 {
        recommendations.push("repeated recovery attempts — consider escalating to an operator".to_string());
    }

    Ok(Json(FailureInfoView {
        reason: found.failure.as_ref().map(|f| f.reason.clone()),
        error_details: found.failure.as_ref().and_then(|f| f.error_details.clone()),
        failed_at: found.failure.as_ref().map(|f| f.at),
        recovery_attempts: found.recovery.attempts,
        recommendations,
    }))
}

async fn health(State(app): State<Arc<App>>, Path(session_id): Path<SessionId>) -> ApiResult<Json<SessionHealthView>> {
    let found = app
        .store
        .read(|s| s.sessions.get(&session_id).cloned())
        .ok_or_else(|| ApiError(fleet_core::DomainError::not_found(format!("session {session_id}"))))?;
    let seconds_since_heartbeat = (app.now() - found.last_heartbeat).num_seconds();
    let healthy = !found.status.is_terminal() && seconds_since_heartbeat < app.config.t_session.as_secs() as i64;
    Ok(Json(SessionHealthView { healthy, seconds_since_heartbeat }))
}

async fn stale(State(app): State<Arc<App>>) -> Json<Vec<SessionView>> {
    Json(list_by_status(&app, SessionStatus::Stalled))
}

async fn active(State(app): State<Arc<App>>) -> Json<Vec<SessionView>> {
    Json(list_by_status(&app, SessionStatus::Active))
}

async fn failed(State(app): State<Arc<App>>) -> Json<Vec<SessionView>> {
    Json(list_by_status(&app, SessionStatus::Failed))
}

fn list_by_status(app: &App, status: SessionStatus) -> Vec<SessionView> {
    app.store.read(|s| s.sessions.values().filter(|row| row.status == status).map(SessionView::from).collect())
}

async fn by_project(State(app): State<Arc<App>>, Path(project_id): Path<ProjectNumber>) -> Json<Vec<SessionView>> {
    Json(app.store.read(|s| s.sessions.values().filter(|row| row.project_id == project_id).map(SessionView::from).collect()))
}

async fn by_machine(State(app): State<Arc<App>>, Path(machine_id): Path<MachineId>) -> Json<Vec<SessionView>> {
    Json(app.store.read(|s| s.sessions.values().filter(|row| row.machine_id == machine_id).map(SessionView::from).collect()))
}

pub fn routes(app: Arc<App>) -> Router {
    Router::new()
        .route("/sessions", post(create).get(list))
        .route("/sessions/stale", get(stale))
        .route("/sessions/active", get(active))
        .route("/sessions/failed", get(failed))
        .route("/sessions/by-project/{id}", get(by_project))
        .route("/sessions/by-machine/{id}", get(by_machine))
        .route("/sessions/{id}", get(get_one).patch(update).delete(soft_delete))
        .route("/sessions/{id}/heartbeat", post(heartbeat))
        .route("/sessions/{id}/mark-failed", post(mark_failed))
        .route("/sessions/{id}/mark-stalled", post(mark_stalled))
        .route("/sessions/{id}/recover", post(recover))
        .route("/sessions/{id}/prepare-recovery", post(prepare_recovery))
        .route("/sessions/{id}/failure-info", get(failure_info))
        .route("/sessions/{id}/health", get(health))
        .with_state(app)
}
