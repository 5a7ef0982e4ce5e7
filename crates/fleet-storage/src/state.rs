// SPDX-License-Identifier: MIT

//! The materialized view of every row type (§3) and the generic
//! find-and-update/update-many primitives (§4.A) that every higher-level
//! mutation is built from.
//!
//! Mirrors the teacher's `storage::state` module: one flat struct of
//! `HashMap`s, a single `apply_event` dispatch used both for live writes and
//! WAL replay, and domain modules (in `fleet-daemon`) that borrow `&mut
//! MaterializedState` inside a `ClaimStore::transact` closure rather than
//! taking their own locks.

use fleet_core::{
    Event, IssueNumber, Machine, MachineId, ProjectClaim, ProjectNumber, ReviewItem, Session,
    SessionId, Task, TaskId, WorkspaceId, WorkspaceOrchestration,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// `(project_number, issue_number)` as a JSON-object-safe string key.
/// `HashMap<(u64, u64), _>` cannot round-trip through `serde_json` (object
/// keys must be strings), so the composite key is flattened here instead of
/// reusing `fleet_core::id::CompositeKey`, which deliberately does not
/// implement `Serialize`.
pub fn claim_key(project_number: ProjectNumber, issue_number: IssueNumber) -> String {
    format!("{project_number}:{issue_number}")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaterializedState {
    pub machines: HashMap<MachineId, Machine>,
    pub sessions: HashMap<SessionId, Session>,
    pub tasks: HashMap<TaskId, Task>,
    pub project_claims: HashMap<String, ProjectClaim>,
    pub reviews: HashMap<fleet_core::ReviewId, ReviewItem>,
    pub workspaces: HashMap<WorkspaceId, WorkspaceOrchestration>,
}

impl MaterializedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one event into the materialized view. Every arm is a plain
    /// upsert by the row's own id, so replaying the same event twice (WAL
    /// replay after a crash mid-flush, or a duplicate publish) is a no-op
    /// on the second application — the same idempotency the teacher's
    /// `apply_event` documents.
    pub fn apply_event(&mut self, event: &Event) {
        match event {
            Event::SessionCreated { session }
            | Event::SessionHeartbeat { session }
            | Event::SessionUpdated { session }
            | Event::SessionStalled { session }
            | Event::SessionFailed { session }
            | Event::SessionCompleted { session }
            | Event::SessionArchived { session } => {
                self.sessions.insert(session.session_id, session.clone());
            }
            Event::TaskTransitioned { task } => {
                self.tasks.insert(task.task_id, task.clone());
            }
            Event::ProjectClaimed { claim } => {
                self.project_claims.insert(claim_key(claim.project_number, claim.issue_number), claim.clone());
            }
            Event::ProjectClaimReleased { claim } => {
                self.project_claims.remove(&claim_key(claim.project_number, claim.issue_number));
            }
            Event::MachineRegistered { machine }
            | Event::MachineHeartbeat { machine }
            | Event::MachineOffline { machine } => {
                self.machines.insert(machine.machine_id.clone(), machine.clone());
            }
            Event::ReviewEnqueued { review }
            | Event::ReviewClaimed { review }
            | Event::ReviewUpdated { review }
            | Event::ReviewReleased { review }
            | Event::ReviewClaimTimedOut { review } => {
                self.reviews.insert(review.review_id, review.clone());
            }
            Event::OrchestrationUpdated { orchestration } => {
                self.workspaces.insert(orchestration.workspace_id.clone(), orchestration.clone());
            }
            Event::ProjectEvent { .. } | Event::WorktreeStatusUpdated { .. } => {
                // Fan-out only; these carry no row of their own (§4.F).
            }
        }
    }

    /// The open review for a work unit, if any (§3: at most one review in
    /// `{pending, in_review}` per `(project_number, issue_number)`).
    pub fn open_review_for(&self, project_number: ProjectNumber, issue_number: IssueNumber) -> Option<&ReviewItem> {
        self.reviews
            .values()
            .find(|r| r.project_number == project_number && r.issue_number == issue_number && r.status.is_open())
    }

    /// The session currently holding `(machine_id, slot)`, if any (§3: at
    /// most one active/paused/stalled session per slot).
    pub fn occupant_of_slot(&self, machine_id: &MachineId, slot: u32) -> Option<&Session> {
        self.sessions
            .values()
            .find(|s| s.status.occupies_slot() && s.slot_key().as_ref() == Some(&(machine_id.clone(), slot)))
    }

    /// The claim on a work unit, if any (§3: `(project_number,
    /// issue_number)` unique).
    pub fn claim_for(&self, project_number: ProjectNumber, issue_number: IssueNumber) -> Option<&ProjectClaim> {
        self.project_claims.get(&claim_key(project_number, issue_number))
    }
}

/// Atomically matches and mutates one row, returning the post-image — the
/// `find_and_update` primitive of §4.A. Callers hold the `ClaimStore`'s
/// mutex for the duration (see `ClaimStore::transact`), so this function
/// itself does no locking; it is the predicate-then-mutate step that makes
/// the enclosing transaction a compare-and-set.
pub fn find_and_update<K, V, P, M>(table: &mut HashMap<K, V>, key: &K, predicate: P, mutate: M) -> Option<V>
where
    K: std::hash::Hash + Eq,
    V: Clone,
    P: FnOnce(&V) -> bool,
    M: FnOnce(&mut V),
{
    let row = table.get_mut(key)?;
    if !predicate(row) {
        return None;
    }
    mutate(row);
    Some(row.clone())
}

/// Inserts a row only if its key is free — the `insert` primitive of §4.A.
/// Returns `false` (without mutating) if the key already exists.
pub fn insert_if_absent<K, V>(table: &mut HashMap<K, V>, key: K, value: V) -> bool
where
    K: std::hash::Hash + Eq,
{
    if table.contains_key(&key) {
        return false;
    }
    table.insert(key, value);
    true
}

/// Non-atomic bulk mutation used only for housekeeping (§4.A): applies
/// `mutate` to every row matching `predicate` and returns how many were
/// touched. Individual row identity must be re-read by the caller afterward
/// if it matters — this is explicitly not a compare-and-set.
pub fn update_many<K, V, P, M>(table: &mut HashMap<K, V>, predicate: P, mutate: M) -> usize
where
    K: std::hash::Hash + Eq,
    P: Fn(&V) -> bool,
    M: Fn(&mut V),
{
    let mut touched = 0usize;
    for row in table.values_mut() {
        if predicate(row) {
            mutate(row);
            touched += 1;
        }
    }
    touched
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fleet_core::{Machine, MachineId, MachineStatus};
    use std::collections::BTreeSet;

    #[test]
    fn find_and_update_respects_predicate() {
        let mut machines = HashMap::new();
        let id = MachineId::new("host-1");
        machines.insert(
            id.clone(),
            Machine::new(id.clone(), "host-1".into(), BTreeSet::from([1, 2]), Utc::now()),
        );

        let missed = find_and_update(&mut machines, &id, |m| m.status == MachineStatus::Offline, |m| m.status = MachineStatus::Maintenance);
        assert!(missed.is_none());

        let hit = find_and_update(&mut machines, &id, |m| m.status == MachineStatus::Online, |m| m.status = MachineStatus::Maintenance);
        assert_eq!(hit.unwrap().status, MachineStatus::Maintenance);
    }

    #[test]
    fn insert_if_absent_rejects_duplicate_key() {
        let mut machines: HashMap<MachineId, Machine> = HashMap::new();
        let id = MachineId::new("host-1");
        let m = Machine::new(id.clone(), "host-1".into(), BTreeSet::new(), Utc::now());
        assert!(insert_if_absent(&mut machines, id.clone(), m.clone()));
        assert!(!insert_if_absent(&mut machines, id, m));
    }
}
