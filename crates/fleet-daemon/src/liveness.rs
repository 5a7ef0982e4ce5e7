// SPDX-License-Identifier: MIT

//! The Liveness Monitor (§4.C): a fixed-cadence tick that reaps stale
//! sessions, marks unresponsive machines offline, and escalates review
//! claims that have timed out. Every pass is a bulk scan through
//! `ClaimStore::transact_many`, the housekeeping primitive (§4.A) — this
//! is the one place in the daemon where a non-atomic, multi-row mutation
//! is the documented behavior, same as `fleet_storage::housekeeping::sweep`.

use crate::app::App;
use crate::review_queue;
use chrono::{DateTime, Duration, Utc};
use fleet_core::{Event, MachineStatus, SessionStatus};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LivenessReport {
    pub sessions_marked_stale: usize,
    pub machines_marked_offline: usize,
    pub reviews_escalated: usize,
}

/// One tick at `now`. Order matches §4.C: stale sessions, then offline
/// machines (independently — a session on a newly-offline machine is
/// reaped by its own pass, not cascaded here), then timed-out review
/// claims.
pub fn tick(app: &App, now: DateTime<Utc>) -> LivenessReport {
    let t_session = duration_from_std(app.config.t_session);
    let t_machine = duration_from_std(app.config.t_machine);

    let stale_session_events = app
        .store
        .transact_many(|state| {
            state
                .sessions
                .values_mut()
                .filter(|s| matches!(s.status, SessionStatus::Active | SessionStatus::Paused) && now - s.last_heartbeat > t_session)
                .map(|s| {
                    s.status = SessionStatus::Stalled;
                    Event::SessionStalled { session: s.clone() }
                })
                .collect()
        })
        .unwrap_or_default();
    let sessions_marked_stale = stale_session_events.len();
    for event in stale_session_events {
        app.event_bus.publish(event);
    }

    let offline_machine_events = app
        .store
        .transact_many(|state| {
            state
                .machines
                .values_mut()
                .filter(|m| m.status == MachineStatus::Online && now - m.last_heartbeat > t_machine)
                .map(|m| {
                    m.status = MachineStatus::Offline;
                    Event::MachineOffline { machine: m.clone() }
                })
                .collect()
        })
        .unwrap_or_default();
    let machines_marked_offline = offline_machine_events.len();
    for event in offline_machine_events {
        app.event_bus.publish(event);
    }

    let reviews_escalated = review_queue::escalate_timed_out_claims(app, now).len();

    LivenessReport { sessions_marked_stale, machines_marked_offline, reviews_escalated }
}

fn duration_from_std(d: std::time::Duration) -> Duration {
    Duration::from_std(d).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::state_machine::session::create_session;
    use fleet_core::{FakeClock, Machine, MachineId};
    use fleet_storage::ClaimStore;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn test_app() -> (Arc<App>, Arc<FakeClock>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = ClaimStore::open(dir.path()).unwrap();
        let clock = Arc::new(FakeClock::new());
        let config = Config::from_env();
        let app = App::new(config, store, clock.clone());
        (app, clock, dir)
    }

    fn register_machine(app: &App, id: &str) -> MachineId {
        let machine_id = MachineId::new(id);
        let machine = Machine::new(machine_id.clone(), id.into(), BTreeSet::from([1, 2]), app.now());
        app.store
            .transact(|state| {
                state.machines.insert(machine_id.clone(), machine.clone());
                Ok(((), Event::MachineRegistered { machine }))
            })
            .unwrap();
        machine_id
    }

    #[test]
    fn stale_active_session_is_marked_stalled() {
        let (app, clock, _dir) = test_app();
        let machine_id = register_machine(&app, "host-1");
        let session = create_session(&app, 1, machine_id, Some(1)).unwrap();

        clock.advance(app.config.t_session + std::time::Duration::from_secs(1));
        let report = tick(&app, app.now());
        assert_eq!(report.sessions_marked_stale, 1);

        let updated = app.store.read(|s| s.sessions.get(&session.session_id).unwrap().clone());
        assert_eq!(updated.status, SessionStatus::Stalled);
    }

    #[test]
    fn fresh_heartbeat_keeps_session_active() {
        let (app, clock, _dir) = test_app();
        let machine_id = register_machine(&app, "host-1");
        create_session(&app, 1, machine_id, Some(1)).unwrap();

        clock.advance(std::time::Duration::from_secs(1));
        let report = tick(&app, app.now());
        assert_eq!(report.sessions_marked_stale, 0);
    }

    #[test]
    fn unresponsive_machine_is_marked_offline_without_touching_its_sessions() {
        let (app, clock, _dir) = test_app();
        let machine_id = register_machine(&app, "host-1");
        let session = create_session(&app, 1, machine_id.clone(), Some(1)).unwrap();

        clock.advance(app.config.t_machine + std::time::Duration::from_secs(1));
        let report = tick(&app, app.now());
        assert_eq!(report.machines_marked_offline, 1);

        let machine = app.store.read(|s| s.machines.get(&machine_id).unwrap().clone());
        assert_eq!(machine.status, MachineStatus::Offline);

        // the stale-session pass did independently reap it too, since its
        // heartbeat is equally far past t_session (which is shorter than
        // t_machine by default) — confirming §4.C's "not auto-transitioned
        // [directly]; the stale-session pass will reap them independently".
        let reaped = app.store.read(|s| s.sessions.get(&session.session_id).unwrap().clone());
        assert_eq!(reaped.status, SessionStatus::Stalled);
    }
}
