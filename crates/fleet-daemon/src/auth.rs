// SPDX-License-Identifier: MIT

//! `X-Api-Key` authentication middleware (§6), generalized from
//! `goose-server`'s single shared-secret `X-Secret-Key` check to a
//! configured set of accepted keys, matched per request rather than per
//! connection.

use crate::app::App;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;

const API_KEY_HEADER: &str = "x-api-key";

/// Rejects any request without a known `X-Api-Key` header. Health probes
/// are mounted outside this middleware layer entirely (§4.G: "Read-only
/// probes ... bypass any rate limiter" — and, per §6, bypass auth too).
pub async fn require_api_key(State(app): State<Arc<App>>, request: Request, next: Next) -> Response {
    let presented = request.headers().get(API_KEY_HEADER).and_then(|v| v.to_str().ok());

    match presented {
        Some(key) if app.config.is_known_api_key(key) => next.run(request).await,
        Some(_) => unauthorized("invalid api key"),
        None => unauthorized("missing x-api-key header"),
    }
}

fn unauthorized(message: &str) -> Response {
    use axum::response::IntoResponse;
    let body = fleet_wire::ErrorResponse {
        status_code: StatusCode::UNAUTHORIZED.as_u16(),
        error_kind: "AuthRequired".to_string(),
        message: message.to_string(),
        details: None,
    };
    (StatusCode::UNAUTHORIZED, axum::Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_name_is_lowercase_for_header_map_lookup() {
        // axum's HeaderName comparisons are case-insensitive, but the
        // constant is kept lowercase to match how it is written in configs
        // and docs.
        assert_eq!(API_KEY_HEADER, API_KEY_HEADER.to_lowercase());
    }
}
