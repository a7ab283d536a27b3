//! Error types for the sync engine.
//!
//! [`SyncError`] is what every save and load returns. Storage failures are
//! folded in through `From`, with a missing record lifted to
//! [`SyncError::NotFound`] so callers can tell client mistakes from store
//! failures without inspecting the storage error.

use cgraph_core::{CoreError, EntityKind, LawId};
use cgraph_storage::StorageError;
use thiserror::Error;

use crate::remap::DanglingReference;

/// Errors produced by the sync engine.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The request is malformed; nothing was written.
    #[error("validation error: {0}")]
    Validation(String),

    /// A referenced record does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: i64 },

    /// A pointer could not be resolved and the dangling policy is `Reject`.
    #[error("dangling reference: {0}")]
    DanglingReference(DanglingReference),

    /// The submitted law revision is stale.
    #[error("law {law} was modified concurrently (submitted revision {submitted}, stored {stored})")]
    Conflict {
        law: LawId,
        submitted: i64,
        stored: i64,
    },

    /// The store failed; the save was rolled back.
    #[error(transparent)]
    Store(StorageError),
}

impl From<StorageError> for SyncError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { kind, id } => SyncError::NotFound { kind, id },
            other => SyncError::Store(other),
        }
    }
}

impl From<CoreError> for SyncError {
    fn from(err: CoreError) -> Self {
        SyncError::Validation(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Validation(err.to_string())
    }
}
