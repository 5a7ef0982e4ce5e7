// SPDX-License-Identifier: MIT

//! Thin tick wrapper around `fleet_storage::housekeeping::sweep` (§4.A,
//! §4.E retention): the daemon-side actor that gives the sweep a cadence,
//! the same seam `liveness::tick` gives the stale-session/offline-machine
//! scan.

use crate::app::App;
use chrono::{DateTime, Utc};
use fleet_storage::HousekeepingReport;

pub fn tick(app: &App, now: DateTime<Utc>) -> HousekeepingReport {
    match app.store.run_housekeeping(now) {
        Ok(report) => report,
        Err(err) => {
            tracing::warn!(%err, "housekeeping sweep failed");
            HousekeepingReport::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use fleet_core::{FakeClock, MachineId, ProjectNumber, Session, SessionStatus};
    use fleet_storage::ClaimStore;
    use std::sync::Arc;

    #[test]
    fn tick_purges_terminal_sessions_past_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let store = ClaimStore::open(dir.path()).unwrap();
        let clock = Arc::new(FakeClock::new());
        let config = Config::from_env();
        let app = App::new(config, store, clock.clone());

        let now = app.now();
        let mut session = Session::new(79 as ProjectNumber, MachineId::new("host-1"), Some(1), now);
        session.status = SessionStatus::Completed;
        session.completed_at = Some(now);
        let session_id = session.session_id;
        app.store
            .transact(|state| {
                state.sessions.insert(session_id, session.clone());
                Ok(((), fleet_core::Event::SessionCompleted { session }))
            })
            .unwrap();

        clock.advance(fleet_storage::housekeeping::COMPLETED_SESSION_TTL.to_std().unwrap() + std::time::Duration::from_secs(1));
        let report = tick(&app, app.now());
        assert_eq!(report.sessions_purged, 1);
        assert!(app.store.read(|s| s.sessions.is_empty()));
    }
}
