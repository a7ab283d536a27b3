//! GraphService: the single coordinator between HTTP handlers and the
//! storage/sync crates.
//!
//! All business logic flows through [`GraphService`]. Handlers are thin
//! wrappers that delegate to these methods.

use cgraph_core::EntityKind;
use cgraph_storage::SqliteStore;
use cgraph_sync::{
    load, EntrySaved, EntrySubmission, LoadedGraph, RelationSaved, RelationSnapshot,
    RootSelector, SyncOptions, Synchronizer,
};

use crate::error::ApiError;

/// Owns the record store and the synchronizer configured for this server.
pub struct GraphService {
    store: SqliteStore,
    sync: Synchronizer,
}

impl GraphService {
    /// Opens (or creates) the SQLite database at `db_path`.
    pub fn new(db_path: &str, options: SyncOptions) -> Result<Self, ApiError> {
        let store = SqliteStore::new(db_path)
            .map_err(|e| ApiError::InternalError(format!("failed to open store: {}", e)))?;
        Ok(GraphService {
            store,
            sync: Synchronizer::new(options),
        })
    }

    /// Creates a service over an in-memory database (for testing).
    pub fn in_memory(options: SyncOptions) -> Result<Self, ApiError> {
        let store = SqliteStore::in_memory()
            .map_err(|e| ApiError::InternalError(format!("failed to open store: {}", e)))?;
        Ok(GraphService {
            store,
            sync: Synchronizer::new(options),
        })
    }

    /// Loads the subgraph selected by `root`.
    pub fn load(&self, root: &RootSelector) -> Result<LoadedGraph, ApiError> {
        Ok(load(&self.store, root)?)
    }

    /// Saves a single framework, concept or law.
    pub fn save_entry(&mut self, submission: &EntrySubmission) -> Result<EntrySaved, ApiError> {
        Ok(self.sync.save_entry(&mut self.store, submission)?)
    }

    /// Saves a law's node tree.
    pub fn save_relation(
        &mut self,
        snapshot: &RelationSnapshot,
    ) -> Result<RelationSaved, ApiError> {
        Ok(self.sync.save_relation(&mut self.store, snapshot)?)
    }

    /// Resets the identifier sequence of the table named `table`.
    pub fn reset_sequence(&mut self, table: &str) -> Result<(EntityKind, i64), ApiError> {
        let kind: EntityKind = table
            .parse()
            .map_err(|e: cgraph_core::CoreError| ApiError::BadRequest(e.to_string()))?;
        let next = self.sync.reset_sequence(&mut self.store, kind)?;
        Ok((kind, next))
    }
}
