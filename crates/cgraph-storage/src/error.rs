//! Storage error types for cgraph-storage.
//!
//! [`StorageError`] covers all anticipated failure modes in the storage layer:
//! SQLite and migration failures, serialization of JSON columns, missing
//! records, integrity violations, and misuse of administrative operations.

use cgraph_core::EntityKind;
use thiserror::Error;

/// Errors produced by storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The underlying SQLite call failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Applying schema migrations failed.
    #[error("migration error: {0}")]
    Migration(String),

    /// JSON serialization or deserialization of a column failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A record with the given ID was not found.
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: i64 },

    /// A data integrity violation was detected.
    #[error("integrity error: {reason}")]
    IntegrityError { reason: String },

    /// `begin` was called while a transaction was already open, or
    /// `commit`/`rollback` without one.
    #[error("transaction state error: {reason}")]
    TransactionState { reason: String },

    /// Sequence resets are only allowed between transactions.
    #[error("cannot reset the {kind} sequence inside an open transaction")]
    SequenceResetInTransaction { kind: EntityKind },
}
