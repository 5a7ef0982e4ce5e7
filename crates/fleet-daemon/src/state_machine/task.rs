// SPDX-License-Identifier: MIT

//! Task operations (§4.B, §3 transition table). `transition_task` is the
//! only mutation here — tasks otherwise only come into being via
//! `create_task`, which does not itself move the state machine.

use crate::app::App;
use chrono::Utc;
use fleet_core::{DomainError, DomainResult, Event, ProjectNumber, SessionId, Task, TaskId, TaskStatus};
use fleet_storage::find_and_update;

pub fn create_task(app: &App, session_id: SessionId, project_id: ProjectNumber, github_issue_id: Option<u64>) -> DomainResult<Task> {
    let (task, event) = app.store.transact(|state| {
        if !state.sessions.contains_key(&session_id) {
            return Err(DomainError::not_found(format!("session {session_id}")));
        }
        let task = Task::new(session_id, project_id, github_issue_id);
        state.tasks.insert(task.task_id, task.clone());
        Ok((task.clone(), Event::TaskTransitioned { task }))
    })?;
    app.event_bus.publish(event);
    Ok(task)
}

/// §3/§4.B: validates `to` against `TaskStatus::can_transition_to`; on
/// `→ in_progress` sets `started_at` and the parent session's
/// `current_task_id`; on `→ {completed, failed}` clears
/// `current_task_id` if it pointed at this task; `→ failed` requires
/// `error_message`. An illegal transition leaves all state unchanged and
/// returns `IllegalTransition` (§8 invariant 4).
pub fn transition_task(app: &App, task_id: TaskId, to: TaskStatus, error_message: Option<String>) -> DomainResult<Task> {
    if to == TaskStatus::Failed && error_message.is_none() {
        return Err(DomainError::validation("transition to failed requires error_message"));
    }
    let now = app.now();
    let (task, event) = app.store.transact(|state| {
        let current = state.tasks.get(&task_id).ok_or_else(|| DomainError::not_found(format!("task {task_id}")))?;
        if !current.status.can_transition_to(to) {
            return Err(DomainError::illegal_transition(current.status.to_string(), to.to_string()));
        }
        let session_id = current.session_id;

        let updated = find_and_update(
            &mut state.tasks,
            &task_id,
            |t| t.status.can_transition_to(to),
            |t| {
                t.status = to;
                match to {
                    TaskStatus::InProgress => t.started_at = Some(t.started_at.unwrap_or(now)),
                    TaskStatus::Completed => t.completed_at = Some(now),
                    TaskStatus::Failed => {
                        t.completed_at = Some(now);
                        t.error_message = error_message.clone();
                    }
                    TaskStatus::Pending | TaskStatus::Blocked => {}
                }
            },
        )
        .ok_or_else(|| DomainError::illegal_transition(current.status.to_string(), to.to_string()))?;

        find_and_update(
            &mut state.sessions,
            &session_id,
            |_| true,
            |s| match to {
                TaskStatus::InProgress => s.current_task_id = Some(task_id),
                TaskStatus::Completed | TaskStatus::Failed if s.current_task_id == Some(task_id) => {
                    s.current_task_id = None;
                }
                _ => {}
            },
        );

        Ok((updated.clone(), Event::TaskTransitioned { task: updated }))
    })?;
    app.event_bus.publish(event);
    Ok(task)
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
    use yare::parameterized;

    fn test_app() -> (Arc<App>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = ClaimStore::open(dir.path()).unwrap();
        let clock = Arc::new(FakeClock::new());
        let config = Config::from_env();
        let app = App::new(config, store, clock);
        (app, dir)
    }

    fn session_and_task(app: &App) -> (SessionId, TaskId) {
        let machine_id = MachineId::new("host-1");
        let machine = Machine::new(machine_id.clone(), "host-1".into(), BTreeSet::from([1]), app.now());
        app.store
            .transact(|state| {
                state.machines.insert(machine_id.clone(), machine.clone());
                Ok(((), Event::MachineRegistered { machine }))
            })
            .unwrap();
        let session = create_session(app, 1, machine_id, Some(1)).unwrap();
        let task = create_task(app, session.session_id, 1, None).unwrap();
        (session.session_id, task.task_id)
    }

    #[test]
    fn in_progress_sets_session_current_task_id() {
        let (app, _dir) = test_app();
        let (session_id, task_id) = session_and_task(&app);
        transition_task(&app, task_id, TaskStatus::InProgress, None).unwrap();

        let current = app.store.read(|s| s.sessions.get(&session_id).unwrap().current_task_id);
        assert_eq!(current, Some(task_id));
    }

    #[test]
    fn completing_the_current_task_clears_session_pointer() {
        let (app, _dir) = test_app();
        let (session_id, task_id) = session_and_task(&app);
        transition_task(&app, task_id, TaskStatus::InProgress, None).unwrap();
        transition_task(&app, task_id, TaskStatus::Completed, None).unwrap();

        let current = app.store.read(|s| s.sessions.get(&session_id).unwrap().current_task_id);
        assert_eq!(current, None);
    }

    #[test]
    fn failed_transition_requires_error_message() {
        let (app, _dir) = test_app();
        let (_session_id, task_id) = session_and_task(&app);
        transition_task(&app, task_id, TaskStatus::InProgress, None).unwrap();
        let err = transition_task(&app, task_id, TaskStatus::Failed, None).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[parameterized(
        completed_to_in_progress = { TaskStatus::Completed, TaskStatus::InProgress },
        completed_to_pending = { TaskStatus::Completed, TaskStatus::Pending },
    )]
    fn illegal_transition_leaves_task_unchanged(terminal: TaskStatus, to: TaskStatus) {
        let (app, _dir) = test_app();
        let (_session_id, task_id) = session_and_task(&app);
        transition_task(&app, task_id, TaskStatus::InProgress, None).unwrap();
        transition_task(&app, task_id, terminal, None).unwrap();

        let before = app.store.read(|s| s.tasks.get(&task_id).unwrap().clone());
        let err = transition_task(&app, task_id, to, None).unwrap_err();
        assert!(matches!(err, DomainError::IllegalTransition { .. }));

        let after = app.store.read(|s| s.tasks.get(&task_id).unwrap().clone());
        assert_eq!(before.status, after.status);
        assert_eq!(before.completed_at, after.completed_at);
    }

    fn any_task_status() -> impl proptest::strategy::Strategy<Value = TaskStatus> {
        proptest::sample::select(vec![
            TaskStatus::Pending,
            TaskStatus::InProgress,
            TaskStatus::Blocked,
            TaskStatus::Completed,
            TaskStatus::Failed,
        ])
    }

    proptest::proptest! {
        /// §8 invariant 4, generalized over every reachable `(from, to)`
        /// pair instead of the two hand-picked ones above: a transition
        /// either succeeds and lands exactly on `to`, or fails and leaves
        /// the row's status and `completed_at` untouched — never a partial
        /// mutation.
        #[test]
        fn transition_task_matches_can_transition_to_oracle(targets in proptest::collection::vec(any_task_status(), 1..6)) {
            let (app, _dir) = test_app();
            let (_session_id, task_id) = session_and_task(&app);

            for to in targets {
                let before = app.store.read(|s| s.tasks.get(&task_id).expect("task exists").clone());
                let error_message = (to == TaskStatus::Failed).then(|| "boom".to_string());
                let expected_legal = before.status.can_transition_to(to);

                let result = transition_task(&app, task_id, to, error_message);
                let after = app.store.read(|s| s.tasks.get(&task_id).expect("task exists").clone());

                if expected_legal {
                    proptest::prop_assert!(result.is_ok());
                    proptest::prop_assert_eq!(after.status, to);
                } else {
                    proptest::prop_assert!(matches!(result, Err(DomainError::IllegalTransition { .. })));
                    proptest::prop_assert_eq!(after.status, before.status);
                    proptest::prop_assert_eq!(after.completed_at, before.completed_at);
                }
            }
        }
    }
}
