//! Relation save handler.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

use cgraph_sync::RelationSnapshot;

use crate::error::ApiError;
use crate::schema::common::ApiResponse;
use crate::schema::relations::SaveRelationResponse;
use crate::state::AppState;

/// Saves a law's complete node tree and grouping markers.
///
/// `POST /relations`
pub async fn save_relation(
    State(state): State<AppState>,
    body: Result<Json<RelationSnapshot>, JsonRejection>,
) -> Result<Json<SaveRelationResponse>, ApiError> {
    let Json(snapshot) = body?;
    let mut service = state.service.lock().await;
    let saved = service.save_relation(&snapshot)?;
    Ok(Json(ApiResponse::ok(saved)))
}
