// SPDX-License-Identifier: MIT

//! The error taxonomy shared by the state machine, scheduler, review queue,
//! and Claim Store (§7). `fleet-daemon` maps these onto HTTP status codes;
//! this crate only carries the kind and enough context to explain it.

use thiserror::Error;

/// A domain error, independent of any transport.
///
/// Variant names are the error *kinds* from §7, not internal type names —
/// they are what a caller (an operator, a retry loop) branches on.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("authentication required")]
    AuthRequired,

    #[error("invalid credentials")]
    AuthInvalid,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(ConflictKind),

    #[error("illegal transition from {from} to {to}")]
    IllegalTransition { from: String, to: String },

    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),

    #[error("rate limited")]
    RateLimited,

    #[error("internal error ({correlation_id}): {message}")]
    Internal { message: String, correlation_id: String },
}

/// The specific conflicts called out in §7 as 409 responses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConflictKind {
    #[error("slot already occupied")]
    SlotOccupied,
    #[error("duplicate claim")]
    DuplicateClaim,
    #[error("concurrent modification")]
    ConcurrentModification,
    #[error("review already claimed")]
    ReviewAlreadyClaimed,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn illegal_transition(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::IllegalTransition { from: from.into(), to: to.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into(), correlation_id: uuid::Uuid::new_v4().to_string() }
    }

    /// The §7 error-kind tag, independent of transport status code.
    pub fn kind_tag(&self) -> &'static str {
        match self {
            Self::Validation(_) => "Validation",
            Self::AuthRequired => "AuthRequired",
            Self::AuthInvalid => "AuthInvalid",
            Self::NotFound(_) => "NotFound",
            Self::Conflict(ConflictKind::SlotOccupied) => "SlotOccupied",
            Self::Conflict(ConflictKind::DuplicateClaim) => "DuplicateClaim",
            Self::Conflict(ConflictKind::ConcurrentModification) => "ConcurrentModification",
            Self::Conflict(ConflictKind::ReviewAlreadyClaimed) => "ReviewAlreadyClaimed",
            Self::IllegalTransition { .. } => "IllegalTransition",
            Self::DependencyUnavailable(_) => "DependencyUnavailable",
            Self::RateLimited => "RateLimited",
            Self::Internal { .. } => "Internal",
        }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
