//! Application state with shared `GraphService` for concurrent access.
//!
//! [`AppState`] wraps the service in `Arc<tokio::sync::Mutex<>>` for use with
//! axum handlers. `GraphService` owns a `rusqlite::Connection`, which is
//! `!Sync`, so it sits behind a `Mutex` rather than an `RwLock`. Holding the
//! lock for a whole request also serializes saves against one another.

use std::sync::Arc;

use cgraph_sync::SyncOptions;

use crate::error::ApiError;
use crate::service::GraphService;

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    /// The shared graph service (async Mutex -- non-blocking await).
    pub service: Arc<tokio::sync::Mutex<GraphService>>,
}

impl AppState {
    /// Creates a new `AppState` with a `GraphService` backed by the given
    /// SQLite database path.
    pub fn new(db_path: &str, options: SyncOptions) -> Result<Self, ApiError> {
        Ok(Self::from_service(GraphService::new(db_path, options)?))
    }

    /// Creates a new `AppState` with an in-memory database (for testing).
    pub fn in_memory() -> Result<Self, ApiError> {
        Ok(Self::from_service(GraphService::in_memory(
            SyncOptions::default(),
        )?))
    }

    pub fn from_service(service: GraphService) -> Self {
        AppState {
            service: Arc::new(tokio::sync::Mutex::new(service)),
        }
    }
}
