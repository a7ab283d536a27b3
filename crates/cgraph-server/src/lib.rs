//! HTTP/JSON API server for the concept graph.
//!
//! Hosts the sync engine behind a small REST surface: load a subgraph, save a
//! single entry, save a law's node tree, and reset an identifier sequence.
//! This crate contains the server framework, API schema types, error
//! handling, configuration, and route definitions.

pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod schema;
pub mod service;
pub mod state;
