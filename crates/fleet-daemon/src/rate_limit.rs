// SPDX-License-Identifier: MIT

//! Per-API-key rate limiting (§4.G: "Rate limiting is per key, not per
//! IP"). Built on `governor`'s keyed rate limiter, the crate the wider
//! pack reaches for whenever it needs a token bucket rather than hand
//! rolling one (`odgrim-abathur-swarm`, `omendb-omen`).

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use governor::clock::{Clock as GovernorClock, DefaultClock};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

type KeyedLimiter = RateLimiter<String, governor::state::keyed::DefaultKeyedStateStore<String>, DefaultClock>;

/// Shared across the axum router via `Extension`/`State`; one bucket per
/// presented `X-Api-Key`, refilled at `requests_per_second`.
pub struct ApiKeyRateLimiter {
    limiter: KeyedLimiter,
}

impl ApiKeyRateLimiter {
    pub fn new(requests_per_second: NonZeroU32) -> Self {
        Self { limiter: RateLimiter::keyed(Quota::per_second(requests_per_second)) }
    }

    pub fn check(&self, api_key: &str) -> bool {
        self.limiter.check_key(&api_key.to_string()).is_ok()
    }
}

/// Runs after `auth::require_api_key`, so the header is known present and
/// valid by the time this middleware sees the request. Health/ready/live
/// probes are mounted outside both layers (§4.G).
pub async fn enforce(State(limiter): State<Arc<ApiKeyRateLimiter>>, request: Request, next: Next) -> Response {
    let api_key = request.headers().get("x-api-key").and_then(|v| v.to_str().ok()).unwrap_or("").to_string();

    if limiter.check(&api_key) {
        next.run(request).await
    } else {
        rate_limited()
    }
}

fn rate_limited() -> Response {
    let body = fleet_wire::ErrorResponse {
        status_code: StatusCode::TOO_MANY_REQUESTS.as_u16(),
        error_kind: "RateLimited".to_string(),
        message: "too many requests for this api key".to_string(),
        details: None,
    };
    (StatusCode::TOO_MANY_REQUESTS, axum::Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_keys_have_independent_budgets() {
        let limiter = ApiKeyRateLimiter::new(NonZeroU32::new(1).unwrap());
        assert!(limiter.check("key-a"));
        assert!(!limiter.check("key-a"));
        assert!(limiter.check("key-b"));
    }

    #[test]
    fn governor_clock_reports_monotonic_now() {
        let clock = DefaultClock::default();
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }
}
