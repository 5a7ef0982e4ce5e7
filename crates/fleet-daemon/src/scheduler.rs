// SPDX-License-Identifier: MIT

//! The Slot Scheduler (§4.D): matches pending work to `(machine, slot)`
//! pairs, enforces slot uniqueness, and reports availability. Called
//! synchronously from the claim and release API paths (§2 data flow).
//!
//! `ClaimStore::transact` holds the state mutex for the whole closure, so
//! every scheduler operation here is already atomic with respect to every
//! other transaction without any extra predicate dance: the availability
//! check and the mutation happen under the same lock, which is what §4.D's
//! "a single `find_and_update` ... on conflict the operation fails with
//! `SlotOccupied`" amounts to in this single-process implementation.

use crate::app::App;
use fleet_core::{ConflictKind, DomainError, DomainResult, Event, MachineId, MachineStatus, SessionId};
use fleet_wire::MachineAvailability;

/// §4.D: assigns `(machine_id, slot)` to `session_id`. If `slot` is given,
/// verifies it is in the machine's slot set and unoccupied; otherwise
/// picks the lowest-numbered free slot. Returns `NotFound` for an unknown
/// machine or session, `Validation` for an offline machine, a slot not on
/// the machine, or no free slots, and `Conflict(SlotOccupied)` if the
/// chosen slot is held by another non-terminal session.
#[allow(clippy::expect_used)]
pub fn assign(app: &App, session_id: SessionId, machine_id: MachineId, slot: Option<u32>) -> DomainResult<(MachineId, u32)> {
    let (result, event) = app.store.transact(|state| {
        let machine = state.machines.get(&machine_id).ok_or_else(|| DomainError::not_found(format!("machine {machine_id}")))?;
        if machine.status != MachineStatus::Online {
            return Err(DomainError::validation(format!("machine {machine_id} is not online")));
        }
        if !state.sessions.contains_key(&session_id) {
            return Err(DomainError::not_found(format!("session {session_id}")));
        }

        let chosen_slot = match slot {
            Some(s) => {
                if !machine.slots.contains(&s) {
                    return Err(DomainError::validation(format!("slot {s} is not on machine {machine_id}")));
                }
                if let Some(occupant) = state.occupant_of_slot(&machine_id, s) {
                    if occupant.session_id != session_id {
                        return Err(DomainError::Conflict(ConflictKind::SlotOccupied));
                    }
                }
                s
            }
            None => machine
                .slots
                .iter()
                .find(|&&s| match state.occupant_of_slot(&machine_id, s) {
                    None => true,
                    Some(occupant) => occupant.session_id == session_id,
                })
                .copied()
                .ok_or_else(|| DomainError::validation(format!("no slots available on machine {machine_id}")))?,
        };

        let session = state.sessions.get_mut(&session_id).expect("checked above");
        session.machine_id = machine_id.clone();
        session.slot = Some(chosen_slot);
        let updated = session.clone();

        Ok(((machine_id.clone(), chosen_slot), Event::SessionUpdated { session: updated }))
    })?;
    app.event_bus.publish(event);
    Ok(result)
}

/// §4.D: idempotent — a no-op if the session has no slot to release.
pub fn release(app: &App, session_id: SessionId) -> DomainResult<()> {
    let (changed, event) = app.store.transact(|state| {
        let session = state.sessions.get_mut(&session_id).ok_or_else(|| DomainError::not_found(format!("session {session_id}")))?;
        if session.slot.is_none() {
            let unchanged = session.clone();
            return Ok((false, Event::SessionUpdated { session: unchanged }));
        }
        session.slot = None;
        let updated = session.clone();
        Ok((true, Event::SessionUpdated { session: updated }))
    })?;
    if changed {
        app.event_bus.publish(event);
    }
    Ok(())
}

/// §4.D: availability per machine, sorted by free slot count descending.
/// `machine_id` narrows to a single machine when given.
pub fn availability(app: &App, machine_id: Option<&MachineId>) -> Vec<MachineAvailability> {
    app.store.read(|state| {
        let mut views: Vec<MachineAvailability> = state
            .machines
            .values()
            .filter(|m| machine_id.map(|id| &m.machine_id == id).unwrap_or(true))
            .map(|m| {
                let free_slots: Vec<u32> =
                    m.slots.iter().copied().filter(|&s| state.occupant_of_slot(&m.machine_id, s).is_none()).collect();
                MachineAvailability {
                    machine_id: m.machine_id.clone(),
                    total: m.slots.len(),
                    occupied: m.slots.len() - free_slots.len(),
                    free_slots,
                }
            })
            .collect();
        views.sort_by(|a, b| b.free_slots.len().cmp(&a.free_slots.len()));
        views
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::state_machine::session::create_session;
    use fleet_core::{FakeClock, Machine};
    use fleet_storage::ClaimStore;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn test_app() -> (Arc<App>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = ClaimStore::open(dir.path()).unwrap();
        let clock = Arc::new(FakeClock::new());
        let config = Config::from_env();
        (App::new(config, store, clock), dir)
    }

    fn register_machine(app: &App, id: &str, slots: &[u32]) -> MachineId {
        let machine_id = MachineId::new(id);
        let machine = Machine::new(machine_id.clone(), id.into(), slots.iter().copied().collect::<BTreeSet<_>>(), app.now());
        app.store
            .transact(|state| {
                state.machines.insert(machine_id.clone(), machine.clone());
                Ok(((), Event::MachineRegistered { machine }))
            })
            .unwrap();
        machine_id
    }

    #[test]
    fn assign_picks_lowest_free_slot_when_unspecified() {
        let (app, _dir) = test_app();
        let machine_id = register_machine(&app, "host-1", &[1, 2, 3]);
        let session = create_session(&app, 1, machine_id.clone(), None).unwrap();
        let (_, slot) = assign(&app, session.session_id, machine_id, None).unwrap();
        assert_eq!(slot, 1);
    }

    #[test]
    fn assign_rejects_slot_already_held_by_another_session() {
        let (app, _dir) = test_app();
        let machine_id = register_machine(&app, "host-1", &[1]);
        let holder = create_session(&app, 1, machine_id.clone(), Some(1)).unwrap();
        let other = create_session(&app, 2, machine_id.clone(), None).unwrap();
        let err = assign(&app, other.session_id, machine_id, Some(1)).unwrap_err();
        assert_eq!(err, DomainError::Conflict(ConflictKind::SlotOccupied));
        let _ = holder;
    }

    #[test]
    fn release_is_idempotent() {
        let (app, _dir) = test_app();
        let machine_id = register_machine(&app, "host-1", &[1]);
        let session = create_session(&app, 1, machine_id, Some(1)).unwrap();
        release(&app, session.session_id).unwrap();
        release(&app, session.session_id).unwrap();
        let slot = app.store.read(|s| s.sessions.get(&session.session_id).unwrap().slot);
        assert_eq!(slot, None);
    }

    #[test]
    fn availability_sorts_by_free_slots_descending() {
        let (app, _dir) = test_app();
        let full = register_machine(&app, "host-full", &[1]);
        create_session(&app, 1, full, Some(1)).unwrap();
        register_machine(&app, "host-empty", &[1, 2, 3]);

        let views = availability(&app, None);
        assert_eq!(views[0].machine_id, MachineId::new("host-empty"));
        assert_eq!(views[0].free_slots.len(), 3);
        assert_eq!(views[1].machine_id, MachineId::new("host-full"));
        assert_eq!(views[1].free_slots.len(), 0);
    }
}
