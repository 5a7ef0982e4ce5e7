// SPDX-License-Identifier: MIT

//! Maps `fleet_core::DomainError` onto the HTTP error shape from §6:
//! `{status_code, error_kind, message, details?}`. Grounded on the
//! teacher's `ConnectionError` → `Response::Error{message}` mapping in
//! `listener/mod.rs`, generalized from a single message field to the
//! full structured shape this spec's Control API requires.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use fleet_core::{ConflictKind, DomainError};
use fleet_wire::ErrorResponse;

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub DomainError);

fn status_code_for(err: &DomainError) -> StatusCode {
    match err {
        DomainError::Validation(_) => StatusCode::BAD_REQUEST,
        DomainError::AuthRequired | DomainError::AuthInvalid => StatusCode::UNAUTHORIZED,
        DomainError::NotFound(_) => StatusCode::NOT_FOUND,
        DomainError::Conflict(_) => StatusCode::CONFLICT,
        DomainError::IllegalTransition { .. } => StatusCode::BAD_REQUEST,
        DomainError::DependencyUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        DomainError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        DomainError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn details_for(err: &DomainError) -> Option<serde_json::Value> {
    match err {
        DomainError::IllegalTransition { from, to } => Some(serde_json::json!({ "from": from, "to": to })),
        DomainError::Conflict(ConflictKind::SlotOccupied) => Some(serde_json::json!({ "conflict": "slot_occupied" })),
        DomainError::Conflict(ConflictKind::DuplicateClaim) => Some(serde_json::json!({ "conflict": "duplicate_claim" })),
        DomainError::Conflict(ConflictKind::ConcurrentModification) => {
            Some(serde_json::json!({ "conflict": "concurrent_modification" }))
        }
        DomainError::Conflict(ConflictKind::ReviewAlreadyClaimed) => {
            Some(serde_json::json!({ "conflict": "review_already_claimed" }))
        }
        DomainError::Internal { correlation_id, .. } => Some(serde_json::json!({ "correlationId": correlation_id })),
        _ => None,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_code_for(&self.0);
        if matches!(self.0, DomainError::Internal { .. }) {
            tracing::error!(error = %self.0, "internal error");
        } else {
            tracing::debug!(error = %self.0, kind = self.0.kind_tag(), "request rejected");
        }
        let body = ErrorResponse {
            status_code: status.as_u16(),
            error_kind: self.0.kind_tag().to_string(),
            message: self.0.to_string(),
            details: details_for(&self.0),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
