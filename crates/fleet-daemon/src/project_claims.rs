// SPDX-License-Identifier: MIT

//! Project claims (§1, §3, §4.A): the exclusive, time-bounded assertion of
//! ownership over a `(project_number, issue_number)` work unit. This is
//! the other half of "the atomic claim/lease protocol for projects and
//! reviews" called out in §1 — the Review Queue (§4.E) is the
//! completed-work side, this module is the pending-work side.
//!
//! `claim_work_unit` follows the same contention precedent §4.E documents
//! for `enqueue`: "under contention the unique index rejects the loser,
//! who then reads and returns the winner" — here a second caller racing
//! for the same work unit gets back the existing claim rather than an
//! error, since both the winner and the loser agree on who owns the unit.

use crate::app::App;
use fleet_core::{AgentId, DomainError, DomainResult, Event, IssueNumber, ProjectClaim, ProjectNumber};
use fleet_storage::state::claim_key;

/// Claims a work unit for `agent_id`. If the unit is already claimed
/// (by this agent or another), returns the existing claim rather than
/// failing — the work unit is *pending* only when no claim exists (§3).
pub fn claim_work_unit(
    app: &App,
    project_number: ProjectNumber,
    issue_number: IssueNumber,
    agent_id: AgentId,
) -> DomainResult<ProjectClaim> {
    let now = app.now();
    let ((claim, newly_claimed), event) = app.store.transact(|state| {
        if let Some(existing) = state.claim_for(project_number, issue_number) {
            let existing = existing.clone();
            return Ok(((existing.clone(), false), Event::ProjectClaimed { claim: existing }));
        }
        let claim = ProjectClaim::new(project_number, issue_number, agent_id, now);
        state.project_claims.insert(claim_key(project_number, issue_number), claim.clone());
        Ok(((claim.clone(), true), Event::ProjectClaimed { claim }))
    })?;
    if newly_claimed {
        app.event_bus.publish(event);
    }
    Ok(claim)
}

/// Releases a claim on a work unit, e.g. an operator override or an agent
/// abandoning a project. `NotFound` if nothing is claimed for the pair.
pub fn release_claim(app: &App, project_number: ProjectNumber, issue_number: IssueNumber) -> DomainResult<()> {
    let (_, event) = app.store.transact(|state| {
        let claim = state
            .project_claims
            .remove(&claim_key(project_number, issue_number))
            .ok_or_else(|| DomainError::not_found(format!("claim for {project_number}/{issue_number}")))?;
        Ok(((), Event::ProjectClaimReleased { claim }))
    })?;
    app.event_bus.publish(event);
    Ok(())
}

/// The claim on a work unit, if any.
pub fn get_claim(app: &App, project_number: ProjectNumber, issue_number: IssueNumber) -> Option<ProjectClaim> {
    app.store.read(|state| state.claim_for(project_number, issue_number).cloned())
}

/// Every claim for a project, for the operator dashboard's "what's
/// already spoken for" view.
pub fn list_claims(app: &App, project_number: Option<ProjectNumber>) -> Vec<ProjectClaim> {
    app.store.read(|state| {
        state
            .project_claims
            .values()
            .filter(|c| project_number.map(|p| c.project_number == p).unwrap_or(true))
            .cloned()
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use fleet_core::FakeClock;
    use fleet_storage::ClaimStore;
    use std::sync::Arc;

    fn test_app() -> (Arc<App>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = ClaimStore::open(dir.path()).unwrap();
        let clock = Arc::new(FakeClock::new());
        let config = Config::from_env();
        (App::new(config, store, clock), dir)
    }

    #[test]
    fn claiming_the_same_work_unit_twice_returns_the_winner() {
        let (app, _dir) = test_app();
        let first = claim_work_unit(&app, 79, 10, AgentId::new("agent-1")).unwrap();
        let second = claim_work_unit(&app, 79, 10, AgentId::new("agent-2")).unwrap();
        assert_eq!(first.claimed_by_agent_id, second.claimed_by_agent_id);
        assert_eq!(list_claims(&app, Some(79)).len(), 1);
    }

    #[test]
    fn release_then_reclaim_succeeds_with_new_owner() {
        let (app, _dir) = test_app();
        claim_work_unit(&app, 79, 10, AgentId::new("agent-1")).unwrap();
        release_claim(&app, 79, 10).unwrap();
        let reclaimed = claim_work_unit(&app, 79, 10, AgentId::new("agent-2")).unwrap();
        assert_eq!(reclaimed.claimed_by_agent_id, AgentId::new("agent-2"));
    }

    #[test]
    fn releasing_an_unclaimed_unit_is_not_found() {
        let (app, _dir) = test_app();
        let err = release_claim(&app, 1, 1).unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }
}
