// SPDX-License-Identifier: MIT

//! `fleetd`: the coordination-plane server (§2). Boots the Claim Store,
//! wires the Control API and the `/orchestration` push transport behind
//! auth and per-key rate limiting, and starts the three tick-driven
//! actors (§5: "independent concurrent actors") — the Liveness Monitor
//! (§4.C), the per-workspace Orchestrator Loop (§4.H), and the
//! housekeeping sweep (§4.A, §4.E) — each on its own `tokio::spawn`ed
//! loop against the real `SystemClock`.
//!
//! Grounded on `goose-server`'s `commands::agent::run`: the same
//! listener-bind / `CorsLayer` / `middleware::from_fn_with_state` /
//! `axum::serve(...).with_graceful_shutdown(...)` shape, generalized from
//! one HTTP server to one HTTP server plus three background actors
//! sharing the same `App`.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

mod app;
mod auth;
mod config;
mod error;
mod event_bus;
mod housekeeping;
mod liveness;
mod orchestrator;
mod project_claims;
mod rate_limit;
mod review_queue;
mod routes;
mod scheduler;
mod state_machine;
mod ws_gateway;

use app::App;
use axum::middleware;
use config::Config;
use fleet_core::{Clock, SystemClock};
use fleet_storage::ClaimStore;
use orchestrator::NullSupervisor;
use rate_limit::ApiKeyRateLimiter;
use std::num::NonZeroU32;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    #[allow(clippy::expect_used)]
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
    #[allow(clippy::expect_used)]
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

    tokio::select! {
        _ = sigint.recv() => {},
        _ = sigterm.recv() => {},
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

/// Spawns the Liveness Monitor (§4.C) as its own tick-driven task, ticked
/// by `app.clock` so tests elsewhere can swap in a `FakeClock` without
/// this loop ever knowing the difference (§9: "Event loop with callbacks
/// ... → parallel actors ... ticked by an injected clock").
fn spawn_liveness_actor(app: Arc<App>, cancel: tokio_util::sync::CancellationToken) {
    let interval = app.config.liveness_tick_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let report = liveness::tick(&app, app.now());
                    if report.sessions_marked_stale > 0 || report.machines_marked_offline > 0 || report.reviews_escalated > 0 {
                        tracing::info!(
                            sessions_marked_stale = report.sessions_marked_stale,
                            machines_marked_offline = report.machines_marked_offline,
                            reviews_escalated = report.reviews_escalated,
                            "liveness tick"
                        );
                    }
                }
            }
        }
    });
}

/// Spawns the Orchestrator Loop (§4.H): one reconciliation pass per
/// registered workspace per tick. `desired` is written by the Control API
/// (`routes::workspaces::set_desired`); this loop is the only writer of
/// `running` for workspaces it reconciles (§4.H).
fn spawn_orchestrator_actor(app: Arc<App>, cancel: tokio_util::sync::CancellationToken) {
    let interval = app.config.orchestrator_tick_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let workspace_ids: Vec<_> = app.store.read(|s| s.workspaces.keys().cloned().collect());
                    for workspace_id in workspace_ids {
                        app.orchestrator.reconcile(&app, &workspace_id, app.now());
                    }
                }
            }
        }
    });
}

/// Spawns the housekeeping sweep (§4.A TTL indexes, §4.E review
/// retention). Runs far less often than the other two actors; its own
/// default cadence is an hour, not the 30s/5s defaults above.
fn spawn_housekeeping_actor(app: Arc<App>, cancel: tokio_util::sync::CancellationToken) {
    let interval = app.config.housekeeping_tick_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let report = housekeeping::tick(&app, app.now());
                    if report.sessions_purged > 0 || report.workspaces_purged > 0 || report.reviews_pruned > 0 {
                        tracing::info!(
                            sessions_purged = report.sessions_purged,
                            tasks_cascaded = report.tasks_cascaded,
                            workspaces_purged = report.workspaces_purged,
                            reviews_pruned = report.reviews_pruned,
                            "housekeeping sweep"
                        );
                    }
                }
            }
        }
    });
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env();
    let store = ClaimStore::open(&config.storage_dir)?;
    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(SystemClock);
    let rate_limit_per_second = NonZeroU32::new(config.rate_limit_per_second).unwrap_or(NonZeroU32::MIN);
    let bind_address = config.bind_address.clone();

    let app = App::with_supervisor(config, store, clock, Box::new(NullSupervisor));
    let limiter = Arc::new(ApiKeyRateLimiter::new(rate_limit_per_second));

    let cancel = tokio_util::sync::CancellationToken::new();
    spawn_liveness_actor(app.clone(), cancel.clone());
    spawn_orchestrator_actor(app.clone(), cancel.clone());
    spawn_housekeeping_actor(app.clone(), cancel.clone());

    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    // Health probes bypass both auth and rate limiting (§4.G, §6); the
    // `/orchestration` WebSocket upgrade is likewise mounted outside the
    // REST-oriented middleware stack, same as the teacher's tunnel/ws
    // endpoints sit beside `check_token`-guarded routes rather than
    // through them.
    let authenticated_api = routes::configure(app.clone())
        .layer(middleware::from_fn_with_state(limiter, rate_limit::enforce))
        .layer(middleware::from_fn_with_state(app.clone(), auth::require_api_key));

    let router = axum::Router::new()
        .merge(routes::health::routes(app.clone()))
        .merge(ws_gateway::routes(app.clone()))
        .merge(authenticated_api)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    let local_addr = listener.local_addr()?;
    info!(%local_addr, "fleetd listening");

    axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;

    cancel.cancel();
    info!("fleetd shutdown complete");
    Ok(())
}

fn main() -> ExitCode {
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("fatal: failed to start async runtime: {err}");
            return ExitCode::from(1);
        }
    };

    match runtime.block_on(run()) {
        Ok(()) => ExitCode::from(0),
        Err(err) => {
            eprintln!("fatal: {err}");
            // §6: exit 2 is reserved for an unrecoverable Claim Store
            // disconnect; every other init failure is exit 1.
            if err.downcast_ref::<fleet_storage::StorageError>().is_some() {
                ExitCode::from(2)
            } else {
                ExitCode::from(1)
            }
        }
    }
}
