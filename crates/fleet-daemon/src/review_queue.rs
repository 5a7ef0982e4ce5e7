// SPDX-License-Identifier: MIT

//! The Review Queue's business logic (§4.E): enqueue, list, claim,
//! update status, release a stale claim. Built against `ClaimStore` the
//! same way every other state-machine module in this crate is — one
//! `transact` per operation, `find_and_update` as the compare-and-set.
//!
//! The Claim Store is the source of truth for every review row. When
//! `app.file_review_queue` is configured (§6: the file-layout fallback for
//! operators without a database), every mutating op here also writes the
//! full review set through to it via `sync_file_queue`, and `App` hydrates
//! the Claim Store from it at startup — see `fleet_daemon::app`.

use crate::app::App;
use chrono::{DateTime, Utc};
use fleet_core::{AgentId, DomainError, DomainResult, Event, IssueNumber, ProjectNumber, ReviewId, ReviewItem, ReviewStatus};
use fleet_storage::find_and_update;

/// Mirrors the current review set to the configured §6 file-layout queue,
/// a no-op when `app.file_review_queue` isn't set. This is a write-through
/// export, not a second source of truth — the Claim Store stays
/// authoritative, the file exists for operators running without a database
/// who want a human-editable, durable-across-restarts queue snapshot.
fn sync_file_queue(app: &App) {
    if let Some(file_queue) = &app.file_review_queue {
        let reviews = app.store.read(|state| state.reviews.values().cloned().collect::<Vec<_>>());
        if let Err(err) = file_queue.save(&reviews) {
            tracing::warn!(path = %file_queue.path().display(), %err, "failed to persist review queue file");
        }
    }
}

/// §4.E: returns the existing open review for the pair if one exists
/// (the contention precedent shared with `project_claims::claim_work_unit`
/// — the loser reads and returns the winner instead of erroring).
pub fn enqueue(
    app: &App,
    project_number: ProjectNumber,
    issue_number: IssueNumber,
    branch_name: String,
    completed_by_agent_id: AgentId,
) -> DomainResult<ReviewItem> {
    let now = app.now();
    let ((review, newly_enqueued), event) = app.store.transact(|state| {
        if let Some(existing) = state.open_review_for(project_number, issue_number) {
            let existing = existing.clone();
            return Ok(((existing.clone(), false), Event::ReviewEnqueued { review: existing }));
        }
        let review = ReviewItem::new(project_number, issue_number, branch_name, completed_by_agent_id, now);
        state.reviews.insert(review.review_id, review.clone());
        Ok(((review.clone(), true), Event::ReviewEnqueued { review }))
    })?;
    if newly_enqueued {
        app.event_bus.publish(event);
        sync_file_queue(app);
    }
    Ok(review)
}

/// §4.E: sorted by `enqueued_at` ascending. `project_number` narrows to
/// one project; `status` narrows to one status.
pub fn list(app: &App, project_number: Option<ProjectNumber>, status: Option<ReviewStatus>) -> Vec<ReviewItem> {
    app.store.read(|state| {
        let mut reviews: Vec<ReviewItem> = state
            .reviews
            .values()
            .filter(|r| project_number.map(|p| r.project_number == p).unwrap_or(true))
            .filter(|r| status.map(|s| r.status == s).unwrap_or(true))
            .cloned()
            .collect();
        reviews.sort_by_key(|r| r.enqueued_at);
        reviews
    })
}

/// §4.E: claims a pending review, or an `in_review` one whose claim has
/// timed out (`claimed_at < now − T_review`). `NotFound` if no review
/// matches either condition.
pub fn claim(app: &App, review_id: ReviewId) -> DomainResult<ReviewItem> {
    let now = app.now();
    let t_review = app.config.t_review;
    let (review, event) = app.store.transact(|state| {
        let updated = find_and_update(
            &mut state.reviews,
            &review_id,
            |r| {
                r.status == ReviewStatus::Pending
                    || (r.status == ReviewStatus::InReview
                        && r.claimed_at.is_some_and(|at| now - at > chrono::Duration::from_std(t_review).unwrap_or_default()))
            },
            |r| {
                r.status = ReviewStatus::InReview;
                r.claimed_at = Some(now);
            },
        )
        .ok_or_else(|| DomainError::not_found(format!("claimable review {review_id}")))?;
        Ok((updated.clone(), Event::ReviewClaimed { review: updated }))
    })?;
    app.event_bus.publish(event);
    sync_file_queue(app);
    Ok(review)
}

/// §4.E: `approved`/`rejected` are terminal and set `completed_at`; any
/// other status transition is legal only from `in_review`.
pub fn update_status(app: &App, review_id: ReviewId, new_status: ReviewStatus, feedback: Option<String>) -> DomainResult<ReviewItem> {
    let now = app.now();
    let (review, event) = app.store.transact(|state| {
        let updated = find_and_update(
            &mut state.reviews,
            &review_id,
            |r| r.status == ReviewStatus::InReview,
            |r| {
                r.status = new_status;
                if let Some(feedback) = feedback.clone() {
                    r.feedback = Some(feedback);
                }
                if matches!(new_status, ReviewStatus::Approved | ReviewStatus::Rejected) {
                    r.completed_at = Some(now);
                }
            },
        )
        .ok_or_else(|| DomainError::illegal_transition("not_in_review", new_status.to_string()))?;
        Ok((updated.clone(), Event::ReviewUpdated { review: updated }))
    })?;
    app.event_bus.publish(event);
    sync_file_queue(app);
    Ok(review)
}

/// §4.E: resets an `in_review` review back to `pending`, clearing
/// `claimed_at`. `IllegalTransition` from any other status.
pub fn release_claim(app: &App, review_id: ReviewId) -> DomainResult<ReviewItem> {
    let (review, event) = app.store.transact(|state| {
        let updated = find_and_update(
            &mut state.reviews,
            &review_id,
            |r| r.status == ReviewStatus::InReview,
            |r| {
                r.status = ReviewStatus::Pending;
                r.claimed_at = None;
            },
        )
        .ok_or_else(|| DomainError::illegal_transition("not_in_review", "pending"))?;
        Ok((updated.clone(), Event::ReviewReleased { review: updated }))
    })?;
    app.event_bus.publish(event);
    sync_file_queue(app);
    Ok(review)
}

/// §4.C: marks every `in_review` review whose claim has timed out with an
/// escalation event, without releasing it — the operator decides what
/// happens next. Called from the Liveness Monitor's tick, not from the
/// Control API. Uses `transact_many` since this is a bulk housekeeping
/// scan, not a single-row compare-and-set (§4.A).
pub fn escalate_timed_out_claims(app: &App, now: DateTime<Utc>) -> Vec<ReviewItem> {
    let t_review = chrono::Duration::from_std(app.config.t_review).unwrap_or_default();
    let events = app
        .store
        .transact_many(|state| {
            state
                .reviews
                .values()
                .filter(|r| r.status == ReviewStatus::InReview && r.claimed_at.is_some_and(|at| now - at > t_review))
                .map(|r| Event::ReviewClaimTimedOut { review: r.clone() })
                .collect()
        })
        .unwrap_or_default();

    let reviews: Vec<ReviewItem> = events
        .iter()
        .filter_map(|event| match event {
            Event::ReviewClaimTimedOut { review } => Some(review.clone()),
            _ => None,
        })
        .collect();
    for event in events {
        app.event_bus.publish(event);
    }
    reviews
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use fleet_core::FakeClock;
    use fleet_storage::ClaimStore;
    use std::sync::Arc;

    fn test_app() -> (Arc<App>, Arc<FakeClock>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = ClaimStore::open(dir.path()).unwrap();
        let clock = Arc::new(FakeClock::new());
        let config = Config::from_env();
        let app = App::new(config, store, clock.clone());
        (app, clock, dir)
    }

    #[test]
    fn enqueue_twice_for_the_same_unit_returns_the_first() {
        let (app, _clock, _dir) = test_app();
        let first = enqueue(&app, 79, 10, "feature/x".into(), AgentId::new("agent-1")).unwrap();
        let second = enqueue(&app, 79, 10, "feature/y".into(), AgentId::new("agent-2")).unwrap();
        assert_eq!(first.review_id, second.review_id);
        assert_eq!(list(&app, Some(79), None).len(), 1);
    }

    #[test]
    fn enqueue_after_completion_opens_a_new_review() {
        let (app, _clock, _dir) = test_app();
        let first = enqueue(&app, 79, 10, "feature/x".into(), AgentId::new("agent-1")).unwrap();
        claim(&app, first.review_id).unwrap();
        update_status(&app, first.review_id, ReviewStatus::Approved, None).unwrap();

        let second = enqueue(&app, 79, 10, "feature/z".into(), AgentId::new("agent-2")).unwrap();
        assert_ne!(first.review_id, second.review_id);
    }

    #[test]
    fn claim_then_update_status_sets_completed_at() {
        let (app, _clock, _dir) = test_app();
        let review = enqueue(&app, 79, 10, "feature/x".into(), AgentId::new("agent-1")).unwrap();
        claim(&app, review.review_id).unwrap();
        let approved = update_status(&app, review.review_id, ReviewStatus::Approved, Some("lgtm".into())).unwrap();
        assert_eq!(approved.status, ReviewStatus::Approved);
        assert!(approved.completed_at.is_some());
        assert_eq!(approved.feedback.as_deref(), Some("lgtm"));
    }

    #[test]
    fn claiming_a_pending_review_twice_fails_the_second_caller() {
        let (app, _clock, _dir) = test_app();
        let review = enqueue(&app, 79, 10, "feature/x".into(), AgentId::new("agent-1")).unwrap();
        claim(&app, review.review_id).unwrap();
        let err = claim(&app, review.review_id).unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[test]
    fn claim_reclaims_after_timeout() {
        let (app, clock, _dir) = test_app();
        let review = enqueue(&app, 79, 10, "feature/x".into(), AgentId::new("agent-1")).unwrap();
        claim(&app, review.review_id).unwrap();
        clock.advance(app.config.t_review + std::time::Duration::from_secs(1));
        let reclaimed = claim(&app, review.review_id).unwrap();
        assert_eq!(reclaimed.status, ReviewStatus::InReview);
    }

    #[test]
    fn release_claim_resets_to_pending() {
        let (app, _clock, _dir) = test_app();
        let review = enqueue(&app, 79, 10, "feature/x".into(), AgentId::new("agent-1")).unwrap();
        claim(&app, review.review_id).unwrap();
        let released = release_claim(&app, review.review_id).unwrap();
        assert_eq!(released.status, ReviewStatus::Pending);
        assert!(released.claimed_at.is_none());
    }

    #[test]
    fn escalate_timed_out_claims_emits_without_releasing() {
        let (app, clock, _dir) = test_app();
        let review = enqueue(&app, 79, 10, "feature/x".into(), AgentId::new("agent-1")).unwrap();
        claim(&app, review.review_id).unwrap();
        clock.advance(app.config.t_review + std::time::Duration::from_secs(1));

        let escalated = escalate_timed_out_claims(&app, app.now());
        assert_eq!(escalated.len(), 1);
        assert_eq!(escalated[0].status, ReviewStatus::InReview);
    }

    #[test]
    fn enqueue_writes_through_to_the_configured_file_queue() {
        let dir = tempfile::tempdir().unwrap();
        let store = ClaimStore::open(dir.path()).unwrap();
        let clock = Arc::new(FakeClock::new());
        let mut config = Config::from_env();
        config.review_queue_file = Some(dir.path().join("reviews.json"));
        let app = App::new(config, store, clock);

        let review = enqueue(&app, 79, 10, "feature/x".into(), AgentId::new("agent-1")).unwrap();

        let on_disk = app.file_review_queue.as_ref().unwrap().load();
        assert_eq!(on_disk.len(), 1);
        assert_eq!(on_disk[0].review_id, review.review_id);
    }

    #[test]
    fn startup_hydrates_the_claim_store_from_the_file_queue() {
        let dir = tempfile::tempdir().unwrap();
        let review_path = dir.path().join("reviews.json");
        let seed = fleet_core::ReviewItem::new(79, 10, "feature/x".into(), AgentId::new("agent-1"), chrono::Utc::now());
        fleet_storage::FileReviewQueue::new(review_path.clone()).save(std::slice::from_ref(&seed)).unwrap();

        let store = ClaimStore::open(dir.path()).unwrap();
        let clock = Arc::new(FakeClock::new());
        let mut config = Config::from_env();
        config.review_queue_file = Some(review_path);
        let app = App::new(config, store, clock);

        assert_eq!(list(&app, None, None).len(), 1);
        assert_eq!(list(&app, None, None)[0].review_id, seed.review_id);
    }
}
