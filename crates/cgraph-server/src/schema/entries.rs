//! Entry save responses.

use cgraph_sync::EntrySaved;

use super::common::ApiResponse;

/// `{success, table, id, deleted, entries, idMap, removedConcepts, dangling}`.
pub type SaveEntryResponse = ApiResponse<EntrySaved>;
