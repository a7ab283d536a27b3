//! Subgraph loading handler.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;

use cgraph_sync::RootSelector;

use crate::error::ApiError;
use crate::schema::common::ApiResponse;
use crate::schema::graph::LoadGraphResponse;
use crate::state::AppState;

/// Loads a framework's or a law's subgraph.
///
/// `GET /graph?framework={id}&law={id}`
pub async fn load_graph(
    State(state): State<AppState>,
    query: Result<Query<RootSelector>, QueryRejection>,
) -> Result<Json<LoadGraphResponse>, ApiError> {
    let Query(root) = query?;
    let service = state.service.lock().await;
    let graph = service.load(&root)?;
    Ok(Json(ApiResponse::ok(graph)))
}
