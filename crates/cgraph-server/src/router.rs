//! Router assembly for the concept graph HTTP API.
//!
//! [`build_router`] wires all handler functions to their routes with
//! CORS and tracing middleware layers.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Builds the complete axum router with all API routes.
///
/// Routes use axum 0.8 `/{param}` path syntax.
/// CORS is permissive (the editor may be served from another origin).
/// TraceLayer provides request-level logging via tracing.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::admin::health))
        // Read side
        .route("/graph", get(handlers::graph::load_graph))
        // Saves
        .route("/entries", post(handlers::entries::save_entry))
        .route("/relations", post(handlers::relations::save_relation))
        // Administration
        .route(
            "/admin/sequences/{table}/reset",
            post(handlers::admin::reset_sequence),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
