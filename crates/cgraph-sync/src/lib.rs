//! Graph synchronization engine for the concept graph.
//!
//! Reconciles client-edited snapshots of a subgraph with the record store:
//! client placeholder identifiers are remapped to durable ones, records the
//! client dropped are garbage-collected, and the response tells the client
//! how to patch its local state.
//!
//! # Modules
//!
//! - [`error`]: SyncError enum
//! - [`snapshot`]: wire input types (relation snapshots, entry submissions)
//! - [`remap`]: identifier remapper shared by every save
//! - [`synchronizer`]: the save operations
//! - [`loader`]: the read side, collecting a reachable subgraph
//! - [`view`]: client-facing records with derived fields

pub mod error;
pub mod loader;
pub mod remap;
pub mod snapshot;
pub mod synchronizer;
pub mod view;

pub use error::SyncError;
pub use loader::{load, LoadedGraph, RootSelector};
pub use remap::{DanglingPolicy, DanglingReference, IdMapping, Remapper};
pub use snapshot::{EntrySubmission, NodeSnapshot, PredicateSnapshot, RelationSnapshot};
pub use synchronizer::{EntrySaved, RelationSaved, SyncOptions, Synchronizer};
pub use view::EntrySet;
