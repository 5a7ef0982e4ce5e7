// SPDX-License-Identifier: MIT

//! Session operations (§4.B): `create_session`, `heartbeat`,
//! `update_session`, `complete_session`, `mark_failed`, `mark_stalled`.
//! Every write is one `ClaimStore::transact` call, so the predicate check
//! and the mutation are atomic with respect to every other transaction.

use crate::app::App;
use chrono::{DateTime, Utc};
use fleet_core::{
    ConflictKind, DomainError, DomainResult, Event, FailureDetail, MachineId, MachineStatus, ProjectNumber,
    RecoveryAttempt, Session, SessionId, SessionStatus,
};
use fleet_storage::find_and_update;
use std::collections::HashMap;

/// §4.B: fails with `NotFound` if no such machine, `Validation` if the
/// machine is not online or the requested slot is not on the machine,
/// `Conflict(SlotOccupied)` if another non-terminal session already holds
/// the `(machine_id, slot)` pair.
pub fn create_session(app: &App, project_id: ProjectNumber, machine_id: MachineId, slot: Option<u32>) -> DomainResult<Session> {
    let now = app.now();
    let (session, event) = app.store.transact(|state| {
        let machine = state.machines.get(&machine_id).ok_or_else(|| DomainError::not_found(format!("machine {machine_id}")))?;
        if machine.status != MachineStatus::Online {
            return Err(DomainError::validation(format!("machine {machine_id} is not online")));
        }
        if let Some(slot) = slot {
            if !machine.slots.contains(&slot) {
                return Err(DomainError::validation(format!("slot {slot} is not on machine {machine_id}")));
            }
            if state.occupant_of_slot(&machine_id, slot).is_some() {
                return Err(DomainError::Conflict(ConflictKind::SlotOccupied));
            }
        }
        let session = Session::new(project_id, machine_id.clone(), slot, now);
        state.sessions.insert(session.session_id, session.clone());
        Ok((session.clone(), Event::SessionCreated { session }))
    })?;
    app.event_bus.publish(event);
    Ok(session)
}

/// §4.B: idempotent under retry — `last_heartbeat` is the max of its
/// prior value and `at`, never regressing (§5, §8 invariant 5).
/// Transitions `stalled → active`. Fails with `IllegalTransition` if the
/// session is already terminal.
pub fn heartbeat(app: &App, session_id: SessionId, at: DateTime<Utc>) -> DomainResult<Session> {
    let (session, event) = app.store.transact(|state| {
        if !state.sessions.contains_key(&session_id) {
            return Err(DomainError::not_found(format!("session {session_id}")));
        }
        let updated = find_and_update(
            &mut state.sessions,
            &session_id,
            |s| !s.status.is_terminal(),
            |s| {
                if s.last_heartbeat < at {
                    s.last_heartbeat = at;
                }
                if s.status == SessionStatus::Stalled {
                    s.status = SessionStatus::Active;
                }
            },
        )
        .ok_or_else(|| DomainError::illegal_transition("terminal", "heartbeat"))?;
        Ok((updated.clone(), Event::SessionHeartbeat { session: updated }))
    })?;
    app.event_bus.publish(event);
    Ok(session)
}

/// §4.B: merges `metadata` (present keys overwrite, others untouched) and
/// optionally validates/sets `status`. A patched `status` may not cross the
/// terminal boundary either way: `complete_session`/`mark_failed` are the
/// only ops that enter `{completed, failed}` (they set `completed_at` along
/// with the status, per §3's "`completed_at` set iff `status ∈ {completed,
/// failed}`" invariant), and a session already in a terminal status cannot
/// be patched back out of it here, same as `heartbeat`'s terminal guard.
pub fn update_session(
    app: &App,
    session_id: SessionId,
    status: Option<SessionStatus>,
    metadata: Option<HashMap<String, serde_json::Value>>,
) -> DomainResult<Session> {
    if let Some(status) = status {
        if status.is_terminal() {
            return Err(DomainError::illegal_transition(
                "update_session",
                format!("{status} (use complete_session or mark_failed instead)"),
            ));
        }
    }
    let (session, event) = app.store.transact(|state| {
        if !state.sessions.contains_key(&session_id) {
            return Err(DomainError::not_found(format!("session {session_id}")));
        }
        let updated = find_and_update(
            &mut state.sessions,
            &session_id,
            |s| status.is_none() || !s.status.is_terminal(),
            |s| {
                if let Some(status) = status {
                    s.status = status;
                }
                if let Some(metadata) = metadata {
                    s.metadata.extend(metadata);
                }
            },
        )
        .ok_or_else(|| DomainError::illegal_transition("terminal", "update_session"))?;
        Ok((updated.clone(), Event::SessionUpdated { session: updated }))
    })?;
    app.event_bus.publish(event);
    Ok(session)
}

/// §4.B: terminal; sets `completed_at`, which by §3's invariant also means
/// the session no longer occupies its slot (the Slot Scheduler reads
/// `occupies_slot()`, it does not need a separate "release" write here).
pub fn complete_session(app: &App, session_id: SessionId, outcome: SessionStatus) -> DomainResult<Session> {
    if !matches!(outcome, SessionStatus::Completed | SessionStatus::Failed) {
        return Err(DomainError::validation("complete_session outcome must be completed or failed"));
    }
    let now = app.now();
    let (session, event) = app.store.transact(|state| {
        let updated = find_and_update(
            &mut state.sessions,
            &session_id,
            |s| !s.status.is_terminal(),
            |s| {
                s.status = outcome;
                s.completed_at = Some(now);
            },
        )
        .ok_or_else(|| DomainError::illegal_transition("terminal", outcome.to_string()))?;
        let event = if outcome == SessionStatus::Completed {
            Event::SessionCompleted { session: updated.clone() }
        } else {
            Event::SessionFailed { session: updated.clone() }
        };
        Ok((updated, event))
    })?;
    app.event_bus.publish(event);
    Ok(session)
}

/// §4.B: only legal from non-terminal states; records structured failure
/// detail at `metadata.failure` per §7's "User-visible failure behavior".
pub fn mark_failed(
    app: &App,
    session_id: SessionId,
    reason: String,
    error_details: Option<serde_json::Value>,
) -> DomainResult<Session> {
    let now = app.now();
    let (session, event) = app.store.transact(|state| {
        let updated = find_and_update(
            &mut state.sessions,
            &session_id,
            |s| !s.status.is_terminal(),
            |s| {
                s.status = SessionStatus::Failed;
                s.completed_at = Some(now);
                s.failure = Some(FailureDetail { reason: reason.clone(), error_details: error_details.clone(), at: now });
            },
        )
        .ok_or_else(|| DomainError::illegal_transition("terminal", "failed"))?;
        Ok((updated.clone(), Event::SessionFailed { session: updated }))
    })?;
    app.event_bus.publish(event);
    Ok(session)
}

/// §4.B: only legal from non-terminal states.
pub fn mark_stalled(app: &App, session_id: SessionId, reason: String) -> DomainResult<Session> {
    let now = app.now();
    let (session, event) = app.store.transact(|state| {
        let updated = find_and_update(
            &mut state.sessions,
            &session_id,
            |s| !s.status.is_terminal(),
            |s| {
                s.status = SessionStatus::Stalled;
                s.recovery.attempts += 1;
                s.recovery.history.push(RecoveryAttempt { at: now, reason: reason.clone() });
            },
        )
        .ok_or_else(|| DomainError::illegal_transition("terminal", "stalled"))?;
        Ok((updated.clone(), Event::SessionStalled { session: updated }))
    })?;
    app.event_bus.publish(event);
    Ok(session)
}

/// Archives a session, exempting it from the Claim Store's completed-
/// session TTL for good (§3, §9 decision: archived sessions never expire).
/// `archived ∉ {completed, failed}`, so `completed_at` is cleared along with
/// the status change — §3's "`completed_at` set iff `status ∈ {completed,
/// failed}`" invariant holds for every status, not just the terminal two.
pub fn archive_session(app: &App, session_id: SessionId) -> DomainResult<Session> {
    let (session, event) = app.store.transact(|state| {
        let updated = find_and_update(
            &mut state.sessions,
            &session_id,
            |s| s.status.is_terminal(),
            |s| {
                s.status = SessionStatus::Archived;
                s.completed_at = None;
            },
        )
        .ok_or_else(|| DomainError::illegal_transition("non_terminal", "archived"))?;
        Ok((updated.clone(), Event::SessionArchived { session: updated }))
    })?;
    app.event_bus.publish(event);
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use fleet_core::{FakeClock, Machine};
    use fleet_storage::ClaimStore;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn test_app() -> (Arc<App>, Arc<FakeClock>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = ClaimStore::open(dir.path()).unwrap();
        let clock = Arc::new(FakeClock::new());
        let mut config = Config::from_env();
        config.storage_dir = dir.path().to_path_buf();
        let app = App::new(config, store, clock.clone());
        (app, clock, dir)
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
    fn create_session_rejects_unknown_machine() {
        let (app, _clock, _dir) = test_app();
        let err = create_session(&app, 1, MachineId::new("ghost"), Some(1)).unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[test]
    fn create_session_rejects_occupied_slot() {
        let (app, _clock, _dir) = test_app();
        let machine_id = register_machine(&app, "host-1", &[1, 2]);
        create_session(&app, 1, machine_id.clone(), Some(1)).unwrap();
        let err = create_session(&app, 1, machine_id, Some(1)).unwrap_err();
        assert_eq!(err, DomainError::Conflict(ConflictKind::SlotOccupied));
    }

    #[test]
    fn heartbeat_never_regresses_and_clears_stalled() {
        let (app, clock, _dir) = test_app();
        let machine_id = register_machine(&app, "host-1", &[1]);
        let session = create_session(&app, 1, machine_id, Some(1)).unwrap();

        clock.advance(std::time::Duration::from_secs(6 * 60));
        let later = app.now();
        mark_stalled(&app, session.session_id, "no heartbeat".into()).unwrap();
        let updated = heartbeat(&app, session.session_id, later).unwrap();
        assert_eq!(updated.status, SessionStatus::Active);
        assert_eq!(updated.last_heartbeat, later);

        let earlier = later - chrono::Duration::minutes(1);
        let retried = heartbeat(&app, session.session_id, earlier).unwrap();
        assert_eq!(retried.last_heartbeat, later, "heartbeat must not regress last_heartbeat");
    }

    #[test]
    fn heartbeat_on_terminal_session_is_illegal() {
        let (app, _clock, _dir) = test_app();
        let machine_id = register_machine(&app, "host-1", &[1]);
        let session = create_session(&app, 1, machine_id, Some(1)).unwrap();
        complete_session(&app, session.session_id, SessionStatus::Completed).unwrap();

        let err = heartbeat(&app, session.session_id, app.now()).unwrap_err();
        assert!(matches!(err, DomainError::IllegalTransition { .. }));
    }

    #[test]
    fn update_session_rejects_a_terminal_status_patch() {
        let (app, _clock, _dir) = test_app();
        let machine_id = register_machine(&app, "host-1", &[1]);
        let session = create_session(&app, 1, machine_id, Some(1)).unwrap();

        let err = update_session(&app, session.session_id, Some(SessionStatus::Completed), None).unwrap_err();
        assert!(matches!(err, DomainError::IllegalTransition { .. }));
        let unchanged = app.store.read(|s| s.sessions.get(&session.session_id).unwrap().clone());
        assert_eq!(unchanged.status, SessionStatus::Active);
        assert!(unchanged.completed_at.is_none());
    }

    #[test]
    fn update_session_rejects_patching_a_terminal_session() {
        let (app, _clock, _dir) = test_app();
        let machine_id = register_machine(&app, "host-1", &[1]);
        let session = create_session(&app, 1, machine_id, Some(1)).unwrap();
        complete_session(&app, session.session_id, SessionStatus::Completed).unwrap();

        let err = update_session(&app, session.session_id, Some(SessionStatus::Active), None).unwrap_err();
        assert!(matches!(err, DomainError::IllegalTransition { .. }));
        let unchanged = app.store.read(|s| s.sessions.get(&session.session_id).unwrap().clone());
        assert_eq!(unchanged.status, SessionStatus::Completed);
        assert!(unchanged.completed_at.is_some());
    }

    #[test]
    fn complete_session_frees_its_slot() {
        let (app, _clock, _dir) = test_app();
        let machine_id = register_machine(&app, "host-1", &[1]);
        let session = create_session(&app, 1, machine_id.clone(), Some(1)).unwrap();
        complete_session(&app, session.session_id, SessionStatus::Completed).unwrap();

        // slot is free again because the completed session no longer
        // occupies it (§3 invariant).
        create_session(&app, 1, machine_id, Some(1)).unwrap();
    }

    #[test]
    fn archive_session_clears_completed_at() {
        let (app, _clock, _dir) = test_app();
        let machine_id = register_machine(&app, "host-1", &[1]);
        let session = create_session(&app, 1, machine_id, Some(1)).unwrap();
        complete_session(&app, session.session_id, SessionStatus::Completed).unwrap();

        let archived = archive_session(&app, session.session_id).unwrap();
        assert_eq!(archived.status, SessionStatus::Archived);
        assert!(archived.completed_at.is_none(), "archived is not in {{completed, failed}}, completed_at must be cleared");
    }

    #[test]
    fn archive_session_rejects_a_non_terminal_session() {
        let (app, _clock, _dir) = test_app();
        let machine_id = register_machine(&app, "host-1", &[1]);
        let session = create_session(&app, 1, machine_id, Some(1)).unwrap();

        let err = archive_session(&app, session.session_id).unwrap_err();
        assert!(matches!(err, DomainError::IllegalTransition { .. }));
    }
}
