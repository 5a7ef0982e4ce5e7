// SPDX-License-Identifier: MIT

//! `/machines` resource (§6): CRUD, availability, heartbeat, and the
//! Slot Scheduler's `assign`/`release` operations exposed as
//! `assign-session`/`release-session`.

use crate::app::App;
use crate::error::{ApiError, ApiResult};
use crate::scheduler;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use fleet_core::{DomainError, Event, Machine, MachineId, MachineStatus};
use fleet_wire::{AssignSlotRequest, MachineAvailability, MachineView, RegisterMachineRequest};
use serde::Deserialize;
use std::sync::Arc;

async fn create(State(app): State<Arc<App>>, Json(body): Json<RegisterMachineRequest>) -> ApiResult<Json<MachineView>> {
    let now = app.now();
    let (machine, event) = app
        .store
        .transact(|state| {
            if state.machines.contains_key(&body.machine_id) {
                return Err(DomainError::Conflict(fleet_core::ConflictKind::DuplicateClaim));
            }
            let machine = Machine::new(body.machine_id.clone(), body.hostname.clone(), body.slots.iter().copied().collect(), now);
            state.machines.insert(machine.machine_id.clone(), machine.clone());
            Ok((machine.clone(), Event::MachineRegistered { machine }))
        })
        .map_err(ApiError)?;
    app.event_bus.publish(event);
    Ok(Json(MachineView::from(&machine)))
}

async fn list(State(app): State<Arc<App>>) -> Json<Vec<MachineView>> {
    Json(app.store.read(|s| s.machines.values().map(MachineView::from).collect()))
}

async fn get_one(State(app): State<Arc<App>>, Path(machine_id): Path<MachineId>) -> ApiResult<Json<MachineView>> {
    let found = app
        .store
        .read(|s| s.machines.get(&machine_id).cloned())
        .ok_or_else(|| ApiError(DomainError::not_found(format!("machine {machine_id}"))))?;
    Ok(Json(MachineView::from(&found)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateMachineRequest {
    #[serde(default)]
    status: Option<MachineStatus>,
}

async fn update(
    State(app): State<Arc<App>>,
    Path(machine_id): Path<MachineId>,
    Json(body): Json<UpdateMachineRequest>,
) -> ApiResult<Json<MachineView>> {
    let (machine, event) = app
        .store
        .transact(|state| {
            let updated = fleet_storage::find_and_update(&mut state.machines, &machine_id, |_| true, |m| {
                if let Some(status) = body.status {
                    m.status = status;
                }
            })
            .ok_or_else(|| DomainError::not_found(format!("machine {machine_id}")))?;
            Ok((updated.clone(), Event::MachineRegistered { machine: updated }))
        })
        .map_err(ApiError)?;
    app.event_bus.publish(event);
    Ok(Json(MachineView::from(&machine)))
}

async fn delete(State(app): State<Arc<App>>, Path(machine_id): Path<MachineId>) -> ApiResult<()> {
    app.store
        .transact(|state| {
            let machine =
                state.machines.remove(&machine_id).ok_or_else(|| DomainError::not_found(format!("machine {machine_id}")))?;
            Ok(((), Event::MachineOffline { machine }))
        })
        .map_err(ApiError)?;
    Ok(())
}

async fn available(State(app): State<Arc<App>>) -> Json<Vec<MachineAvailability>> {
    Json(scheduler::availability(&app, None))
}

async fn heartbeat(State(app): State<Arc<App>>, Path(machine_id): Path<MachineId>) -> ApiResult<Json<MachineView>> {
    let now: chrono::DateTime<chrono::Utc> = app.now();
    let (machine, event) = app
        .store
        .transact(|state| {
            let updated = fleet_storage::find_and_update(&mut state.machines, &machine_id, |_| true, |m| m.last_heartbeat = now)
                .ok_or_else(|| DomainError::not_found(format!("machine {machine_id}")))?;
            Ok((updated.clone(), Event::MachineHeartbeat { machine: updated }))
        })
        .map_err(ApiError)?;
    app.event_bus.publish(event);
    Ok(Json(MachineView::from(&machine)))
}

async fn assign_session(
    State(app): State<Arc<App>>,
    Path(machine_id): Path<MachineId>,
    Json(body): Json<AssignSlotRequest>,
) -> ApiResult<Json<MachineAvailability>> {
    scheduler::assign(&app, body.session_id, machine_id.clone(), body.slot).map_err(ApiError)?;
    let view = scheduler::availability(&app, Some(&machine_id)).into_iter().next();
    view.map(Json).ok_or_else(|| ApiError(DomainError::not_found(format!("machine {machine_id}"))))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReleaseSessionRequest {
    session_id: fleet_core::SessionId,
}

async fn release_session(
    State(app): State<Arc<App>>,
    Path(machine_id): Path<MachineId>,
    Json(body): Json<ReleaseSessionRequest>,
) -> ApiResult<Json<MachineAvailability>> {
    scheduler::release(&app, body.session_id).map_err(ApiError)?;
    let view = scheduler::availability(&app, Some(&machine_id)).into_iter().next();
    view.map(Json).ok_or_else(|| ApiError(DomainError::not_found(format!("machine {machine_id}"))))
}

pub fn routes(app: Arc<App>) -> Router {
    Router::new()
        .route("/machines", post(create).get(list))
        .route("/machines/available", get(available))
        .route("/machines/{machine_id}", get(get_one).patch(update).delete(delete))
        .route("/machines/{machine_id}/heartbeat", post(heartbeat))
        .route("/machines/{machine_id}/assign-session", post(assign_session))
        .route("/machines/{machine_id}/release-session", post(release_session))
        .with_state(app)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    /// `similar_asserts` pretty-prints a field-by-field diff on mismatch,
    /// which is worth the dependency on a view type this wide once it grows
    /// past a couple of fields — plain `assert_eq!` output on a failing
    /// `MachineView` comparison is otherwise a wall of Debug text.
    #[test]
    fn machine_view_mirrors_every_domain_field() {
        let now = chrono::Utc::now();
        let machine = fleet_core::Machine::new(MachineId::new("host-1"), "host-1.example".into(), BTreeSet::from([1, 2, 3]), now);

        let view = MachineView::from(&machine);
        let expected = MachineView {
            machine_id: MachineId::new("host-1"),
            hostname: "host-1.example".into(),
            slots: BTreeSet::from([1, 2, 3]),
            status: machine.status,
            last_heartbeat: now,
        };
        similar_asserts::assert_eq!(view, expected);
    }
}
