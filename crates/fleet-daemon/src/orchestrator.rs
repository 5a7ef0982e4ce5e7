// SPDX-License-Identifier: MIT

//! The Orchestrator Loop (§4.H): per-workspace reconciliation of
//! `running` against `desired`. §1's Non-goals rule out in-process
//! execution of the agent workload — actually starting/stopping a
//! worker process is delegated to the externalized agent-worker crate
//! (§10.1), so this module owns only the counting, the restart cap, and
//! the grace-period bookkeeping, issuing `start`/`stop` intents through
//! the `WorkerSupervisor` seam rather than spawning anything itself.
//!
//! Mirrors the teacher's `engine::monitor` tick-and-reconcile shape,
//! generalized from "one cron/watch per job" to "one desired/running
//! count per workspace".

use crate::app::App;
use chrono::{DateTime, Utc};
use fleet_core::{DomainError, DomainResult, Event, WorkspaceId, WorkspaceOrchestration};
use parking_lot::Mutex;
use std::collections::HashMap;

/// The externalized boundary to whatever actually starts and stops
/// worker processes (tmux/docker/k8s, per §10.1 — not this crate's
/// concern). Injectable so the reconciliation logic is testable without
/// a real process manager, the same way `Clock` is injectable.
pub trait WorkerSupervisor: Send + Sync {
    fn start_worker(&self, workspace_id: &WorkspaceId);
    /// `force`: past `T_stop_grace`, a graceful stop must escalate.
    fn stop_worker(&self, workspace_id: &WorkspaceId, force: bool);
}

/// No-op supervisor for configurations that track desired/running purely
/// as bookkeeping without an attached process manager.
pub struct NullSupervisor;

impl WorkerSupervisor for NullSupervisor {
    fn start_worker(&self, _workspace_id: &WorkspaceId) {}
    fn stop_worker(&self, _workspace_id: &WorkspaceId, _force: bool) {}
}

/// Tracks, per workspace, how long a graceful stop has been pending and
/// how many unsolicited restarts have happened in the current window —
/// state the loop itself owns (§5: "The Orchestrator Loop's local
/// process table is owned by its loop task").
#[derive(Default)]
struct WorkspaceRuntime {
    stop_requested_at: Option<DateTime<Utc>>,
    restarts_in_window: u32,
    window_started_at: Option<DateTime<Utc>>,
}

pub struct Orchestrator {
    supervisor: Box<dyn WorkerSupervisor>,
    runtimes: Mutex<HashMap<WorkspaceId, WorkspaceRuntime>>,
}

impl Orchestrator {
    pub fn new(supervisor: Box<dyn WorkerSupervisor>) -> Self {
        Self { supervisor, runtimes: Mutex::new(HashMap::new()) }
    }

    /// Registers a workspace and sets its desired count, creating the row
    /// if absent. The Control API's write path for `SetDesiredCountRequest`
    /// (§6).
    pub fn set_desired(&self, app: &App, workspace_id: WorkspaceId, desired: u32) -> DomainResult<WorkspaceOrchestration> {
        let now = app.now();
        let (orchestration, event) = app.store.transact(|state| {
            let orchestration = state
                .workspaces
                .entry(workspace_id.clone())
                .or_insert_with(|| WorkspaceOrchestration::new(workspace_id.clone(), desired, now));
            orchestration.desired = desired;
            orchestration.last_updated = now;
            let orchestration = orchestration.clone();
            Ok((orchestration.clone(), Event::OrchestrationUpdated { orchestration }))
        })?;
        app.event_bus.publish(event);
        Ok(orchestration)
    }

    /// An unsolicited worker exit: decrements `running` and, subject to
    /// the restart cap, the next tick restarts it (§4.H).
    pub fn record_unsolicited_exit(&self, app: &App, workspace_id: &WorkspaceId, now: DateTime<Utc>) -> DomainResult<()> {
        {
            let mut runtimes = self.runtimes.lock();
            let runtime = runtimes.entry(workspace_id.clone()).or_default();
            let window_start = *runtime.window_started_at.get_or_insert(now);
            if now - window_start > chrono::Duration::minutes(10) {
                runtime.restarts_in_window = 0;
                runtime.window_started_at = Some(now);
            }
            runtime.restarts_in_window += 1;
        }
        self.bump_running(app, workspace_id, -1, now)
    }

    /// One reconciliation tick for `workspace_id` (§4.H). Starts workers
    /// to close a `running < desired` gap; on `running > desired`, issues
    /// a graceful stop and escalates to a forced stop after
    /// `t_stop_grace` has elapsed since the first such tick. Storage
    /// failures are logged rather than propagated — ticks are best-effort
    /// and the next tick retries.
    pub fn reconcile(&self, app: &App, workspace_id: &WorkspaceId, now: DateTime<Utc>) {
        let restart_cap = app.config.restart_cap;
        let t_stop_grace = chrono::Duration::from_std(app.config.t_stop_grace).unwrap_or_default();

        let snapshot = app.store.read(|state| state.workspaces.get(workspace_id).cloned());
        let Some(orchestration) = snapshot else { return };

        if orchestration.running < orchestration.desired {
            let deficit = orchestration.desired - orchestration.running;
            let allowed = {
                let mut runtimes = self.runtimes.lock();
                let runtime = runtimes.entry(workspace_id.clone()).or_default();
                deficit.min(restart_cap.saturating_sub(runtime.restarts_in_window))
            };
            for _ in 0..allowed {
                self.supervisor.start_worker(workspace_id);
            }
            if allowed > 0 {
                if let Err(err) = self.bump_running(app, workspace_id, allowed as i64, now) {
                    tracing::warn!(%workspace_id, %err, "failed to record started workers");
                }
            }
        } else if orchestration.running > orchestration.desired {
            let (requested_at, force) = {
                let mut runtimes = self.runtimes.lock();
                let runtime = runtimes.entry(workspace_id.clone()).or_default();
                let requested_at = *runtime.stop_requested_at.get_or_insert(now);
                (requested_at, now - requested_at > t_stop_grace)
            };
            let _ = requested_at;

            self.supervisor.stop_worker(workspace_id, force);
            if force {
                if let Err(err) = self.bump_running(app, workspace_id, -1, now) {
                    tracing::warn!(%workspace_id, %err, "failed to record forced stop");
                }
                self.runtimes.lock().entry(workspace_id.clone()).or_default().stop_requested_at = None;
            }
        } else {
            if let Some(runtime) = self.runtimes.lock().get_mut(workspace_id) {
                runtime.stop_requested_at = None;
            }
        }
    }

    fn bump_running(&self, app: &App, workspace_id: &WorkspaceId, delta: i64, now: DateTime<Utc>) -> DomainResult<()> {
        let (_, event) = app.store.transact(|state| {
            let orchestration = state
                .workspaces
                .get_mut(workspace_id)
                .ok_or_else(|| DomainError::not_found(format!("workspace {workspace_id}")))?;
            orchestration.running = (orchestration.running as i64 + delta).max(0) as u32;
            orchestration.last_updated = now;
            let orchestration = orchestration.clone();
            Ok((orchestration.clone(), Event::OrchestrationUpdated { orchestration }))
        })?;
        app.event_bus.publish(event);
        Ok(())
    }
}
