// SPDX-License-Identifier: MIT

//! `/tasks` resource (§6, §4.B): creation and the single `transition`
//! endpoint that drives the task state machine forward.

use crate::app::App;
use crate::error::{ApiError, ApiResult};
use crate::state_machine::task;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use fleet_core::{DomainError, ProjectNumber, SessionId, TaskId, TaskStatus};
use fleet_wire::{CreateTaskRequest, TaskView, TransitionTaskRequest};
use std::sync::Arc;

async fn create(State(app): State<Arc<App>>, Json(body): Json<CreateTaskRequest>) -> ApiResult<Json<TaskView>> {
    let created = task::create_task(&app, body.session_id, body.project_id, body.github_issue_id).map_err(ApiError)?;
    Ok(Json(TaskView::from(&created)))
}

async fn list(State(app): State<Arc<App>>) -> Json<Vec<TaskView>> {
    Json(app.store.read(|s| s.tasks.values().map(TaskView::from).collect()))
}

async fn get_one(State(app): State<Arc<App>>, Path(task_id): Path<TaskId>) -> ApiResult<Json<TaskView>> {
    let found = app
        .store
        .read(|s| s.tasks.get(&task_id).cloned())
        .ok_or_else(|| ApiError(DomainError::not_found(format!("task {task_id}"))))?;
    Ok(Json(TaskView::from(&found)))
}

async fn transition(
    State(app): State<Arc<App>>,
    Path(task_id): Path<TaskId>,
    Json(body): Json<TransitionTaskRequest>,
) -> ApiResult<Json<TaskView>> {
    let updated = task::transition_task(&app, task_id, body.to, body.error_message).map_err(ApiError)?;
    Ok(Json(TaskView::from(&updated)))
}

async fn start(State(app): State<Arc<App>>, Path(task_id): Path<TaskId>) -> ApiResult<Json<TaskView>> {
    let updated = task::transition_task(&app, task_id, TaskStatus::InProgress, None).map_err(ApiError)?;
    Ok(Json(TaskView::from(&updated)))
}

async fn complete(State(app): State<Arc<App>>, Path(task_id): Path<TaskId>) -> ApiResult<Json<TaskView>> {
    let updated = task::transition_task(&app, task_id, TaskStatus::Completed, None).map_err(ApiError)?;
    Ok(Json(TaskView::from(&updated)))
}

async fn fail(
    State(app): State<Arc<App>>,
    Path(task_id): Path<TaskId>,
    Json(body): Json<TransitionTaskRequest>,
) -> ApiResult<Json<TaskView>> {
    let reason = body.error_message.ok_or_else(|| ApiError(DomainError::validation("fail requires error_message")))?;
    let updated = task::transition_task(&app, task_id, TaskStatus::Failed, Some(reason)).map_err(ApiError)?;
    Ok(Json(TaskView::from(&updated)))
}

async fn by_session(State(app): State<Arc<App>>, Path(session_id): Path<SessionId>) -> Json<Vec<TaskView>> {
    Json(app.store.read(|s| s.tasks.values().filter(|t| t.session_id == session_id).map(TaskView::from).collect()))
}

async fn by_project(State(app): State<Arc<App>>, Path(project_id): Path<ProjectNumber>) -> Json<Vec<TaskView>> {
    Json(app.store.read(|s| s.tasks.values().filter(|t| t.project_id == project_id).map(TaskView::from).collect()))
}

pub fn routes(app: Arc<App>) -> Router {
    Router::new()
        .route("/tasks", post(create).get(list))
        .route("/tasks/by-session/{id}", get(by_session))
        .route("/tasks/by-project/{id}", get(by_project))
        .route("/tasks/{id}", get(get_one))
        .route("/tasks/{id}/transition", post(transition))
        .route("/tasks/{id}/start", post(start))
        .route("/tasks/{id}/complete", post(complete))
        .route("/tasks/{id}/fail", post(fail))
        .with_state(app)
}
