//! API schema types for request/response definitions.
//!
//! Request bodies are the sync engine's own wire types
//! ([`cgraph_sync::EntrySubmission`], [`cgraph_sync::RelationSnapshot`],
//! [`cgraph_sync::RootSelector`]); the types here wrap results in the
//! response envelope.

pub mod admin;
pub mod common;
pub mod entries;
pub mod graph;
pub mod relations;
