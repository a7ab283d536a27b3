//! Administrative and health responses.

use serde::Serialize;

use cgraph_core::EntityKind;

use super::common::ApiResponse;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceReset {
    pub table: EntityKind,
    /// Identifier the next insert into `table` will receive.
    pub next_id: i64,
}

pub type ResetSequenceResponse = ApiResponse<SequenceReset>;

#[derive(Debug, Clone, Serialize)]
pub struct Health {
    pub status: &'static str,
}

pub type HealthResponse = ApiResponse<Health>;
