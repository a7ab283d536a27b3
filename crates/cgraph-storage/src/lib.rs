//! Record store for the concept graph.
//!
//! Provides the [`RecordStore`] trait defining the transactional, table-
//! oriented storage contract the sync engine is written against, plus
//! [`SqliteStore`], the SQLite backend.
//!
//! # Modules
//!
//! - [`error`]: StorageError enum with all failure modes
//! - [`traits`]: RecordStore trait definition
//! - [`schema`]: SQL migrations and connection setup
//! - [`sqlite`]: SqliteStore implementation

pub mod error;
pub mod schema;
pub mod sqlite;
pub mod traits;

// Re-export key types for ergonomic use.
pub use error::StorageError;
pub use sqlite::SqliteStore;
pub use traits::RecordStore;
