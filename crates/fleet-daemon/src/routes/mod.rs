// SPDX-License-Identifier: MIT

//! Control API route composition (§6), mirroring `goose-server`'s
//! `routes::configure` — one `Router` per resource, merged here, each
//! built with its own `.with_state(app.clone())`.

pub mod claims;
pub mod events;
pub mod health;
pub mod machines;
pub mod reviews;
pub mod sessions;
pub mod tasks;
pub mod workspaces;

use crate::app::App;
use axum::Router;
use std::sync::Arc;

/// Every authenticated, rate-limited resource route. `health` is mounted
/// separately by `main.rs`, outside the auth/rate-limit middleware stack
/// (§6: "Health paths bypass"; §4.G: "Read-only probes ... bypass any rate
/// limiter").
pub fn configure(app: Arc<App>) -> Router {
    Router::new()
        .merge(sessions::routes(app.clone()))
        .merge(machines::routes(app.clone()))
        .merge(tasks::routes(app.clone()))
        .merge(reviews::routes(app.clone()))
        .merge(claims::routes(app.clone()))
        .merge(workspaces::routes(app.clone()))
        .merge(events::routes(app))
}
