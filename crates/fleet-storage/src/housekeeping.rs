// SPDX-License-Identifier: MIT

//! The TTL/pruning sweep implied by the Claim Store's indexes (§4.A) and
//! the Review Queue's retention policy (§4.E). Run by a tick-driven actor
//! in `fleet-daemon`, grounded on the teacher's `update_many`-for-
//! housekeeping precedent — this is the one place a bulk, non-atomic
//! mutation is the documented behavior rather than a shortcut.

use crate::state::MaterializedState;
use chrono::{DateTime, Duration, Utc};
use fleet_core::{ReviewStatus, SessionStatus};

pub const COMPLETED_SESSION_TTL: Duration = Duration::days(30);
pub const IDLE_WORKSPACE_TTL: Duration = Duration::days(7);
pub const COMPLETED_REVIEW_TTL: Duration = Duration::days(7);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HousekeepingReport {
    pub sessions_purged: usize,
    pub tasks_cascaded: usize,
    pub workspaces_purged: usize,
    pub reviews_pruned: usize,
}

/// One housekeeping pass at `now`. Not atomic across row types — by design
/// (§4.A: `update_many` is "used only for housekeeping where individual row
/// identity is re-read afterwards").
pub fn sweep(state: &mut MaterializedState, now: DateTime<Utc>) -> HousekeepingReport {
    let mut report = HousekeepingReport::default();

    let expired_sessions: Vec<_> = state
        .sessions
        .iter()
        .filter(|(_, s)| {
            s.status != SessionStatus::Archived
                && s.status.is_terminal()
                && s.completed_at.is_some_and(|at| now - at > COMPLETED_SESSION_TTL)
        })
        .map(|(id, _)| *id)
        .collect();
    for session_id in &expired_sessions {
        state.sessions.remove(session_id);
        report.sessions_purged += 1;
    }
    let before = state.tasks.len();
    state.tasks.retain(|_, t| !expired_sessions.contains(&t.session_id));
    report.tasks_cascaded = before - state.tasks.len();

    let idle_workspaces: Vec<_> = state
        .workspaces
        .iter()
        .filter(|(_, w)| w.running == 0 && w.desired == 0 && now - w.last_updated > IDLE_WORKSPACE_TTL)
        .map(|(id, _)| id.clone())
        .collect();
    for workspace_id in idle_workspaces {
        state.workspaces.remove(&workspace_id);
        report.workspaces_purged += 1;
    }

    let expired_reviews: Vec<_> = state
        .reviews
        .iter()
        .filter(|(_, r)| {
            matches!(r.status, ReviewStatus::Approved | ReviewStatus::Rejected)
                && r.completed_at.is_some_and(|at| now - at > COMPLETED_REVIEW_TTL)
        })
        .map(|(id, _)| *id)
        .collect();
    for review_id in expired_reviews {
        state.reviews.remove(&review_id);
        report.reviews_pruned += 1;
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_core::{MachineId, ProjectNumber, Session, Task};

    fn project() -> ProjectNumber {
        79
    }

    #[test]
    fn purges_terminal_sessions_past_ttl_and_cascades_tasks() {
        let mut state = MaterializedState::new();
        let now = Utc::now();
        let mut session = Session::new(project(), MachineId::new("host-1"), Some(1), now - Duration::days(31));
        session.status = SessionStatus::Completed;
        session.completed_at = Some(now - Duration::days(31));
        let task = Task::new(session.session_id, project(), None);
        state.tasks.insert(task.task_id, task);
        state.sessions.insert(session.session_id, session);

        let report = sweep(&mut state, now);
        assert_eq!(report.sessions_purged, 1);
        assert_eq!(report.tasks_cascaded, 1);
        assert!(state.sessions.is_empty());
        assert!(state.tasks.is_empty());
    }

    #[test]
    fn archived_sessions_never_expire() {
        let mut state = MaterializedState::new();
        let now = Utc::now();
        let mut session = Session::new(project(), MachineId::new("host-1"), Some(1), now - Duration::days(400));
        session.status = SessionStatus::Archived;
        session.completed_at = Some(now - Duration::days(400));
        state.sessions.insert(session.session_id, session);

        let report = sweep(&mut state, now);
        assert_eq!(report.sessions_purged, 0);
        assert_eq!(state.sessions.len(), 1);
    }

    #[test]
    fn prunes_completed_reviews_past_retention() {
        use fleet_core::{AgentId, ReviewItem};

        let mut state = MaterializedState::new();
        let now = Utc::now();
        let mut review = ReviewItem::new(project(), 10, "feature/x".into(), AgentId::new("agent-1"), now - Duration::days(8));
        review.status = ReviewStatus::Approved;
        review.completed_at = Some(now - Duration::days(8));
        state.reviews.insert(review.review_id, review);

        let report = sweep(&mut state, now);
        assert_eq!(report.reviews_pruned, 1);
        assert!(state.reviews.is_empty());
    }
}
