// SPDX-License-Identifier: MIT

//! Storage-layer errors — durability failures, not domain rule violations.
//! A `StorageError` is always surfaced upward as
//! `DomainError::DependencyUnavailable` or `DomainError::internal` (§7); it
//! never crosses the Claim Store boundary as-is.

use fleet_core::DomainError;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("wal io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("snapshot directory has no readable snapshot and a non-empty wal: {0}")]
    Corrupt(String),
}

impl From<StorageError> for DomainError {
    fn from(err: StorageError) -> Self {
        DomainError::DependencyUnavailable(err.to_string())
    }
}
