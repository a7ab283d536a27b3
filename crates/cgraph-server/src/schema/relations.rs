//! Relation save responses.

use cgraph_sync::RelationSaved;

use super::common::ApiResponse;

/// `{success, law, revision, entries, idMap, deleted, removedConcepts,
/// dangling}`.
pub type SaveRelationResponse = ApiResponse<RelationSaved>;
