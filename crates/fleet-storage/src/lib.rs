// SPDX-License-Identifier: MIT

//! The Claim Store (§4.A): durable, atomically mutated rows for machines,
//! sessions, tasks, project claims, and review items, plus the file-based
//! review-queue layout from §6.
//!
//! Grounded on the teacher's `oj-storage`/`oj-daemon::storage` split: a
//! flat `MaterializedState`, an `apply_event` fold used for both live
//! writes and crash recovery, and atomic snapshot checkpoints with `.bak`
//! rotation.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod error;
pub mod housekeeping;
pub mod review_queue_file;
pub mod snapshot;
pub mod state;
pub mod store;
mod wal;

pub use error::StorageError;
pub use housekeeping::HousekeepingReport;
pub use review_queue_file::FileReviewQueue;
pub use snapshot::Snapshot;
pub use state::{claim_key, find_and_update, insert_if_absent, update_many, MaterializedState};
pub use store::ClaimStore;
pub use wal::Wal;
