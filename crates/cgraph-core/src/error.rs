//! Core error types for cgraph-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering the
//! failure modes of the data model itself: unknown entity kinds and malformed
//! client identifiers.

use thiserror::Error;

/// Core errors produced by the cgraph-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A `table` name that does not correspond to any entity kind.
    #[error("unknown table: '{table}'")]
    UnknownTable { table: String },

    /// A client identifier token that is neither an integer nor empty.
    #[error("invalid client identifier: '{token}'")]
    InvalidClientId { token: String },
}
