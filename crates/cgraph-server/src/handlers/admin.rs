//! Health and administration handlers.

use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::Json;

use crate::error::ApiError;
use crate::schema::admin::{Health, HealthResponse, ResetSequenceResponse, SequenceReset};
use crate::schema::common::ApiResponse;
use crate::state::AppState;

/// `GET /health`
pub async fn health() -> Json<HealthResponse> {
    Json(ApiResponse::ok(Health { status: "ok" }))
}

/// Rewinds a table's identifier sequence to its largest stored id.
///
/// `POST /admin/sequences/{table}/reset`
pub async fn reset_sequence(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<ResetSequenceResponse>, ApiError> {
    let Path(table) = path?;
    let mut service = state.service.lock().await;
    let (table, next_id) = service.reset_sequence(&table)?;
    Ok(Json(ApiResponse::ok(SequenceReset { table, next_id })))
}
