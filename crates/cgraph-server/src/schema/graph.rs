//! Graph loading responses.

use cgraph_sync::LoadedGraph;

use super::common::ApiResponse;

/// `{success, frameworks, concepts, laws, nodes, predicates, nextNodeId}`.
pub type LoadGraphResponse = ApiResponse<LoadedGraph>;
