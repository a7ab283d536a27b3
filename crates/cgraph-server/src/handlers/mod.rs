//! HTTP handler modules for the concept graph API.
//!
//! Each sub-module implements thin handlers that parse requests, acquire the
//! service lock, delegate to [`crate::service::GraphService`], and return
//! JSON responses. No business logic lives in handlers.
//!
//! Extractors are taken as `Result<_, Rejection>` so that malformed input
//! still produces the standard `success: false` body.

pub mod admin;
pub mod entries;
pub mod graph;
pub mod relations;
