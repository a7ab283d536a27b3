//! Client-facing records.
//!
//! Each view is a stored record plus the derived fields the client expects:
//! link sets, context bindings, reverse relations and, after a save, the
//! `oldId` the client used for the record. Views are built from the store so
//! the loader and the synchronizer answer with the same shape.

use std::collections::BTreeMap;

use serde::Serialize;

use cgraph_core::schema::{CONCEPT_DEPENDENCY, CONCEPT_INSTANCE, FRAMEWORK_DEPENDENCY};
use cgraph_core::{
    ClientId, Concept, ConceptId, ContextTarget, Framework, FrameworkId, Law, LawId, Node, NodeId,
};
use cgraph_storage::RecordStore;

use crate::error::SyncError;

fn is_false(b: &bool) -> bool {
    !*b
}

fn id_set<T: Ord>(ids: impl IntoIterator<Item = T>) -> BTreeMap<T, bool> {
    ids.into_iter().map(|id| (id, true)).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameworkView {
    pub id: FrameworkId,
    pub name: String,
    pub description: Option<String>,
    /// Explicit dependencies plus the implicit `General` frameworks.
    pub dependencies: BTreeMap<FrameworkId, bool>,
    /// Set when the framework's subgraph is part of the response.
    #[serde(skip_serializing_if = "is_false")]
    pub loaded: bool,
    #[serde(rename = "oldId", skip_serializing_if = "Option::is_none")]
    pub old_id: Option<ClientId>,
}

impl FrameworkView {
    pub fn build<S: RecordStore>(
        store: &S,
        framework: Framework,
        general: &[FrameworkId],
    ) -> Result<Self, SyncError> {
        let explicit = store
            .find_links(&FRAMEWORK_DEPENDENCY, framework.id.0)?
            .into_iter()
            .map(FrameworkId);
        let implicit = general.iter().copied().filter(|g| *g != framework.id);
        Ok(FrameworkView {
            id: framework.id,
            name: framework.name,
            description: framework.description,
            dependencies: id_set(explicit.chain(implicit)),
            loaded: false,
            old_id: None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptView {
    pub id: ConceptId,
    pub name: String,
    pub description: Option<String>,
    pub framework: Option<FrameworkId>,
    pub head: Option<ConceptId>,
    pub reference: Option<ConceptId>,
    pub symmetric: bool,
    #[serde(rename = "node_specific")]
    pub node_specific: bool,
    #[serde(rename = "law_specific")]
    pub law_specific: bool,
    pub inherits: bool,
    pub symbol: Option<String>,
    pub commands: Option<String>,
    pub value: Option<String>,
    pub dependencies: BTreeMap<ConceptId, bool>,
    pub instance_of: BTreeMap<ConceptId, bool>,
    /// Node this concept is bound to, for node-specific concepts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeId>,
    /// Law this concept is bound to, for law-specific concepts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub law: Option<LawId>,
    pub head_of: Vec<ConceptId>,
    pub reference_of: Vec<ConceptId>,
    pub instances: Vec<ConceptId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_id: Option<ClientId>,
}

impl ConceptView {
    pub fn build<S: RecordStore>(store: &S, concept: Concept) -> Result<Self, SyncError> {
        let id = concept.id;
        let dependencies = store.find_links(&CONCEPT_DEPENDENCY, id.0)?;
        let instance_of = store.find_links(&CONCEPT_INSTANCE, id.0)?;
        let instances = store.find_linkers(&CONCEPT_INSTANCE, id.0)?;
        let (node, law) = match store.get_context(id)? {
            Some(ContextTarget::Node(node)) => (Some(node), None),
            Some(ContextTarget::Law(law)) => (None, Some(law)),
            None => (None, None),
        };

        let mut head_of = Vec::new();
        let mut reference_of = Vec::new();
        for other in store.find_concepts_pointing_at(id)? {
            if other.head == Some(id) {
                head_of.push(other.id);
            }
            if other.reference == Some(id) {
                reference_of.push(other.id);
            }
        }

        Ok(ConceptView {
            id,
            name: concept.name,
            description: concept.description,
            framework: concept.framework,
            head: concept.head,
            reference: concept.reference,
            symmetric: concept.symmetric,
            node_specific: concept.node_specific,
            law_specific: concept.law_specific,
            inherits: concept.inherits,
            symbol: concept.symbol,
            commands: concept.commands,
            value: concept.value,
            dependencies: id_set(dependencies.into_iter().map(ConceptId)),
            instance_of: id_set(instance_of.into_iter().map(ConceptId)),
            node,
            law,
            head_of,
            reference_of,
            instances: instances.into_iter().map(ConceptId).collect(),
            old_id: None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LawView {
    pub id: LawId,
    pub name: String,
    pub description: Option<String>,
    pub framework: Option<FrameworkId>,
    pub hashtags: Option<String>,
    pub revision: i64,
    pub nodes: Vec<NodeId>,
    /// `{group: {nodeId: true}}`.
    pub predicates: BTreeMap<i64, BTreeMap<NodeId, bool>>,
    #[serde(rename = "oldId", skip_serializing_if = "Option::is_none")]
    pub old_id: Option<ClientId>,
}

impl LawView {
    pub fn build<S: RecordStore>(store: &S, law: Law) -> Result<Self, SyncError> {
        let nodes: Vec<NodeId> = store
            .find_nodes_by_law(law.id)?
            .into_iter()
            .map(|n| n.id)
            .collect();
        let mut predicates: BTreeMap<i64, BTreeMap<NodeId, bool>> = BTreeMap::new();
        for node in &nodes {
            for marker in store.find_predicates_by_node(*node)? {
                predicates
                    .entry(marker.predicate_group)
                    .or_default()
                    .insert(marker.node, true);
            }
        }
        Ok(LawView {
            id: law.id,
            name: law.name,
            description: law.description,
            framework: law.framework,
            hashtags: law.hashtags,
            revision: law.revision,
            nodes,
            predicates,
            old_id: None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeView {
    pub id: NodeId,
    pub law: LawId,
    pub concept: ConceptId,
    pub head: Option<NodeId>,
    pub reference: Option<NodeId>,
    pub name: Option<String>,
    pub value: Option<serde_json::Value>,
    #[serde(rename = "oldId", skip_serializing_if = "Option::is_none")]
    pub old_id: Option<ClientId>,
}

impl From<Node> for NodeView {
    fn from(node: Node) -> Self {
        NodeView {
            id: node.id,
            law: node.law,
            concept: node.concept,
            head: node.head,
            reference: node.reference,
            name: node.name,
            value: node.value,
            old_id: None,
        }
    }
}

/// Records keyed by table name, then durable id.
///
/// Serializes as `{"framework": {...}, "concept": {...}, ...}`, omitting
/// empty tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntrySet {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub framework: BTreeMap<FrameworkId, FrameworkView>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub concept: BTreeMap<ConceptId, ConceptView>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub law: BTreeMap<LawId, LawView>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub node: BTreeMap<NodeId, NodeView>,
}

impl EntrySet {
    /// Merges `other` in. Records already present keep their `oldId` and
    /// `loaded` flag.
    pub fn merge(&mut self, other: EntrySet) {
        for (id, mut view) in other.framework {
            if let Some(existing) = self.framework.get(&id) {
                view.loaded |= existing.loaded;
                view.old_id = view.old_id.or(existing.old_id);
            }
            self.framework.insert(id, view);
        }
        for (id, view) in other.concept {
            self.concept.entry(id).or_insert(view);
        }
        for (id, view) in other.law {
            self.law.entry(id).or_insert(view);
        }
        for (id, view) in other.node {
            self.node.entry(id).or_insert(view);
        }
    }
}
