// SPDX-License-Identifier: MIT

//! `/claims` resource (§6, §4.A): the pending-work half of the
//! claim/lease protocol, keyed by `(projectNumber, issueNumber)` rather
//! than a synthetic id.

use crate::app::App;
use crate::error::{ApiError, ApiResult};
use crate::project_claims;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use fleet_core::{IssueNumber, ProjectNumber};
use fleet_wire::{ClaimView, ClaimWorkUnitRequest};
use serde::Deserialize;
use std::sync::Arc;

async fn claim(State(app): State<Arc<App>>, Json(body): Json<ClaimWorkUnitRequest>) -> ApiResult<Json<ClaimView>> {
    let claim = project_claims::claim_work_unit(&app, body.project_number, body.issue_number, body.agent_id).map_err(ApiError)?;
    Ok(Json(ClaimView::from(&claim)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListClaimsQuery {
    #[serde(default)]
    project_number: Option<ProjectNumber>,
}

async fn list(State(app): State<Arc<App>>, Query(query): Query<ListClaimsQuery>) -> Json<Vec<ClaimView>> {
    let rows = project_claims::list_claims(&app, query.project_number);
    Json(rows.iter().map(ClaimView::from).collect())
}

async fn get_one(
    State(app): State<Arc<App>>,
    Path((project_number, issue_number)): Path<(ProjectNumber, IssueNumber)>,
) -> ApiResult<Json<ClaimView>> {
    let found = project_claims::get_claim(&app, project_number, issue_number)
        .ok_or_else(|| ApiError(fleet_core::DomainError::not_found(format!("claim for {project_number}/{issue_number}"))))?;
    Ok(Json(ClaimView::from(&found)))
}

async fn release(
    State(app): State<Arc<App>>,
    Path((project_number, issue_number)): Path<(ProjectNumber, IssueNumber)>,
) -> ApiResult<()> {
    project_claims::release_claim(&app, project_number, issue_number).map_err(ApiError)?;
    Ok(())
}

pub fn routes(app: Arc<App>) -> Router {
    Router::new()
        .route("/claims", post(claim).get(list))
        .route("/claims/{project_number}/{issue_number}", get(get_one).delete(release))
        .with_state(app)
}
