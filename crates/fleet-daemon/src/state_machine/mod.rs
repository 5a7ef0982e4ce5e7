// SPDX-License-Identifier: MIT

//! The Session & Task State Machine (§4.B): enforces legal transitions,
//! writes through `ClaimStore::transact`, and publishes the post-image on
//! the Event Bus. Split by row type, matching how the teacher splits its
//! own mutation handlers (`listener/mutations/sessions.rs` vs
//! `listener/mutations/jobs.rs`) rather than one grab-bag module.

pub mod session;
pub mod task;
