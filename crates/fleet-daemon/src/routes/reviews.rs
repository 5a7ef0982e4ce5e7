// SPDX-License-Identifier: MIT

//! `/reviews` resource (§6, §4.E): the Claim Store-backed Review Queue.
//! `escalate_timed_out_claims` is not exposed here — it's driven by the
//! Liveness Monitor's tick, not a Control API caller.

use crate::app::App;
use crate::error::{ApiError, ApiResult};
use crate::review_queue;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use fleet_core::ReviewId;
use fleet_wire::{EnqueueReviewRequest, ReviewListQuery, ReviewView, UpdateReviewStatusRequest};
use std::sync::Arc;

async fn enqueue(State(app): State<Arc<App>>, Json(body): Json<EnqueueReviewRequest>) -> ApiResult<Json<ReviewView>> {
    let review = review_queue::enqueue(&app, body.project_number, body.issue_number, body.branch_name, body.completed_by_agent_id)
        .map_err(ApiError)?;
    Ok(Json(ReviewView::from(&review)))
}

async fn list(State(app): State<Arc<App>>, Query(query): Query<ReviewListQuery>) -> Json<Vec<ReviewView>> {
    let rows = review_queue::list(&app, query.project_number, query.status);
    let page = rows
        .into_iter()
        .skip(query.effective_offset() as usize)
        .take(query.effective_limit() as usize)
        .collect::<Vec<_>>();
    Json(page.iter().map(ReviewView::from).collect())
}

async fn get_one(State(app): State<Arc<App>>, Path(review_id): Path<ReviewId>) -> ApiResult<Json<ReviewView>> {
    let found = app
        .store
        .read(|s| s.reviews.get(&review_id).cloned())
        .ok_or_else(|| ApiError(fleet_core::DomainError::not_found(format!("review {review_id}"))))?;
    Ok(Json(ReviewView::from(&found)))
}

async fn claim(State(app): State<Arc<App>>, Path(review_id): Path<ReviewId>) -> ApiResult<Json<ReviewView>> {
    let claimed = review_queue::claim(&app, review_id).map_err(ApiError)?;
    Ok(Json(ReviewView::from(&claimed)))
}

async fn update_status(
    State(app): State<Arc<App>>,
    Path(review_id): Path<ReviewId>,
    Json(body): Json<UpdateReviewStatusRequest>,
) -> ApiResult<Json<ReviewView>> {
    let updated = review_queue::update_status(&app, review_id, body.status, body.feedback).map_err(ApiError)?;
    Ok(Json(ReviewView::from(&updated)))
}

async fn release(State(app): State<Arc<App>>, Path(review_id): Path<ReviewId>) -> ApiResult<Json<ReviewView>> {
    let released = review_queue::release_claim(&app, review_id).map_err(ApiError)?;
    Ok(Json(ReviewView::from(&released)))
}

async fn stats(State(app): State<Arc<App>>) -> Json<serde_json::Value> {
    let (pending, in_review) = app.store.read(|s| {
        (
            s.reviews.values().filter(|r| r.status == fleet_core::ReviewStatus::Pending).count(),
            s.reviews.values().filter(|r| r.status == fleet_core::ReviewStatus::InReview).count(),
        )
    });
    Json(serde_json::json!({ "pending": pending, "inReview": in_review }))
}

pub fn routes(app: Arc<App>) -> Router {
    Router::new()
        .route("/reviews", post(enqueue).get(list))
        .route("/reviews/stats", get(stats))
        .route("/reviews/{id}", get(get_one))
        .route("/reviews/{id}/claim", post(claim))
        .route("/reviews/{id}/status", post(update_status))
        .route("/reviews/{id}/release", post(release))
        .with_state(app)
}
