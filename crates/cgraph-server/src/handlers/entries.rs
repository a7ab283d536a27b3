//! Single-entry save handler.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

use cgraph_sync::EntrySubmission;

use crate::error::ApiError;
use crate::schema::common::ApiResponse;
use crate::schema::entries::SaveEntryResponse;
use crate::state::AppState;

/// Inserts, updates or deletes one framework, concept or law.
///
/// `POST /entries`
pub async fn save_entry(
    State(state): State<AppState>,
    body: Result<Json<EntrySubmission>, JsonRejection>,
) -> Result<Json<SaveEntryResponse>, ApiError> {
    let Json(submission) = body?;
    let mut service = state.service.lock().await;
    let saved = service.save_entry(&submission)?;
    Ok(Json(ApiResponse::ok(saved)))
}
