// SPDX-License-Identifier: MIT

//! Process-wide state, owned by one `App` value constructed at startup and
//! passed explicitly to every handler and actor (§9: "Global singletons in
//! source → process-wide state S owned by an `App` value ... No ambient
//! access").

use crate::config::Config;
use crate::event_bus::EventBus;
use crate::orchestrator::{NullSupervisor, Orchestrator, WorkerSupervisor};
use fleet_core::{Clock, Event, ProjectNumber};
use fleet_storage::{ClaimStore, FileReviewQueue};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

pub struct App {
    pub store: ClaimStore,
    pub event_bus: EventBus,
    pub clock: Arc<dyn Clock + Send + Sync>,
    pub config: Config,
    /// The §6 file-layout review queue, present when `FLEETD_REVIEW_QUEUE_FILE`
    /// is configured. `review_queue::*` write-throughs this on every
    /// mutating operation; this struct hydrates the Claim Store from it at
    /// startup so the file is the durable side of a restart, not an inert
    /// mirror nobody reads.
    pub file_review_queue: Option<FileReviewQueue>,
    pub orchestrator: Orchestrator,
    /// Last-known worktree status per project (§6 `/api/events/worktree`),
    /// a cache rather than a Claim Store row — it's advisory scrape data a
    /// CI runner pushes, not state the domain model transitions on.
    worktree_status: Mutex<HashMap<ProjectNumber, serde_json::Value>>,
}

impl App {
    pub fn new(config: Config, store: ClaimStore, clock: Arc<dyn Clock + Send + Sync>) -> Arc<Self> {
        Self::with_supervisor(config, store, clock, Box::new(NullSupervisor))
    }

    /// Same as `new`, but with an explicit `WorkerSupervisor` — the seam
    /// `main.rs` uses to wire in a real process manager instead of the
    /// bookkeeping-only `NullSupervisor`.
    pub fn with_supervisor(
        config: Config,
        store: ClaimStore,
        clock: Arc<dyn Clock + Send + Sync>,
        supervisor: Box<dyn WorkerSupervisor>,
    ) -> Arc<Self> {
        let event_bus = EventBus::new(config.event_ring_buffer_size, config.subscriber_buffer_size);
        let file_review_queue = config.review_queue_file.clone().map(FileReviewQueue::new);
        if let Some(file_queue) = &file_review_queue {
            hydrate_review_queue_from_file(&store, file_queue);
        }
        let orchestrator = Orchestrator::new(supervisor);
        Arc::new(Self {
            store,
            event_bus,
            clock,
            config,
            file_review_queue,
            orchestrator,
            worktree_status: Mutex::new(HashMap::new()),
        })
    }

    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    pub fn set_worktree_status(&self, project_number: ProjectNumber, status: serde_json::Value) {
        self.worktree_status.lock().insert(project_number, status);
    }

    pub fn worktree_status(&self, project_number: ProjectNumber) -> Option<serde_json::Value> {
        self.worktree_status.lock().get(&project_number).cloned()
    }
}

/// Loads whatever the file-layout queue holds from a prior run and inserts
/// any review not already present in the Claim Store, so a restart with the
/// file configured doesn't silently drop reviews that were only ever
/// persisted there. Reviews the store already knows about are left alone.
fn hydrate_review_queue_from_file(store: &ClaimStore, file_queue: &FileReviewQueue) {
    let on_disk = file_queue.load();
    if on_disk.is_empty() {
        return;
    }
    let result = store.transact_many(|state| {
        let mut events = Vec::new();
        for review in on_disk {
            if !state.reviews.contains_key(&review.review_id) {
                state.reviews.insert(review.review_id, review.clone());
                events.push(Event::ReviewEnqueued { review });
            }
        }
        events
    });
    if let Err(err) = result {
        tracing::warn!(%err, "failed to hydrate review queue from file");
    }
}
