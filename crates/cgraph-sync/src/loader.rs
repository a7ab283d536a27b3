//! Subgraph loading.
//!
//! [`load`] collects everything reachable from a root framework or law into
//! flat per-kind maps. The traversal is breadth-first over a frontier of
//! `(EntityKind, id)` pairs; a pair enters the frontier at most once, which
//! is what stops it on cyclic dependencies and mutually referencing nodes.

use std::collections::{BTreeMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use cgraph_core::id::deserialize_optional;
use cgraph_core::schema::GENERAL_FRAMEWORK;
use cgraph_core::{ClientId, ConceptId, EntityKind, FrameworkId, LawId, NodeId};
use cgraph_storage::RecordStore;

use crate::error::SyncError;
use crate::view::{ConceptView, EntrySet, FrameworkView, LawView, NodeView};

/// Which subgraph to load. A positive `law` wins over `framework`; with
/// neither, the `General` frameworks are loaded.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct RootSelector {
    #[serde(default, deserialize_with = "deserialize_optional")]
    pub framework: Option<ClientId>,
    #[serde(default, deserialize_with = "deserialize_optional")]
    pub law: Option<ClientId>,
}

impl RootSelector {
    pub fn framework(id: FrameworkId) -> Self {
        RootSelector {
            framework: Some(ClientId(id.0)),
            law: None,
        }
    }

    pub fn law(id: LawId) -> Self {
        RootSelector {
            framework: None,
            law: Some(ClientId(id.0)),
        }
    }
}

/// A loaded subgraph.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedGraph {
    pub frameworks: BTreeMap<FrameworkId, FrameworkView>,
    pub concepts: BTreeMap<ConceptId, ConceptView>,
    pub laws: BTreeMap<LawId, LawView>,
    pub nodes: BTreeMap<NodeId, NodeView>,
    /// `{conceptId: {nodeId: true}}` for every loaded node carrying a
    /// grouping marker.
    pub predicates: BTreeMap<ConceptId, BTreeMap<NodeId, bool>>,
    /// Identifier the next created node will receive.
    pub next_node_id: i64,
}

impl LoadedGraph {
    /// The collected records as a per-table [`EntrySet`].
    pub fn into_entries(self) -> EntrySet {
        EntrySet {
            framework: self.frameworks,
            concept: self.concepts,
            law: self.laws,
            node: self.nodes,
        }
    }
}

/// Identifiers of the frameworks named `General`.
pub fn general_frameworks<S: RecordStore>(store: &S) -> Result<Vec<FrameworkId>, SyncError> {
    Ok(store
        .find_frameworks_by_name(GENERAL_FRAMEWORK)?
        .into_iter()
        .map(|f| f.id)
        .collect())
}

/// Loads the subgraph selected by `root`.
///
/// Every framework's metadata and every global concept is always included.
/// A root that does not exist is [`SyncError::NotFound`].
pub fn load<S: RecordStore>(store: &S, root: &RootSelector) -> Result<LoadedGraph, SyncError> {
    let mut traversal = Traversal::new(store)?;

    for framework in store.list_frameworks()? {
        let view = FrameworkView::build(store, framework, &traversal.general)?;
        traversal.graph.frameworks.insert(view.id, view);
    }
    for concept in store.find_concepts_by_framework(None)? {
        traversal.enqueue(EntityKind::Concept, concept.id.0);
    }

    let law = root.law.and_then(ClientId::durable);
    let framework = root.framework.and_then(ClientId::durable);
    match (law, framework) {
        (Some(law), _) => {
            traversal.require(EntityKind::Law, law)?;
            traversal.enqueue(EntityKind::Law, law);
        }
        (None, Some(framework)) => {
            traversal.require(EntityKind::Framework, framework)?;
            traversal.enqueue(EntityKind::Framework, framework);
        }
        (None, None) => {
            for general in traversal.general.clone() {
                traversal.enqueue(EntityKind::Framework, general.0);
            }
        }
    }

    traversal.run()?;
    let mut graph = traversal.graph;
    graph.next_node_id = store.next_id(EntityKind::Node)?;

    tracing::debug!(
        frameworks = graph.frameworks.values().filter(|f| f.loaded).count(),
        concepts = graph.concepts.len(),
        laws = graph.laws.len(),
        nodes = graph.nodes.len(),
        "subgraph loaded"
    );
    Ok(graph)
}

struct Traversal<'a, S> {
    store: &'a S,
    general: Vec<FrameworkId>,
    visited: HashSet<(EntityKind, i64)>,
    frontier: VecDeque<(EntityKind, i64)>,
    graph: LoadedGraph,
}

impl<'a, S: RecordStore> Traversal<'a, S> {
    fn new(store: &'a S) -> Result<Self, SyncError> {
        Ok(Traversal {
            store,
            general: general_frameworks(store)?,
            visited: HashSet::new(),
            frontier: VecDeque::new(),
            graph: LoadedGraph::default(),
        })
    }

    fn require(&self, kind: EntityKind, id: i64) -> Result<(), SyncError> {
        if self.store.exists(kind, id)? {
            Ok(())
        } else {
            Err(SyncError::NotFound { kind, id })
        }
    }

    fn enqueue(&mut self, kind: EntityKind, id: i64) {
        if self.visited.insert((kind, id)) {
            self.frontier.push_back((kind, id));
        }
    }

    fn run(&mut self) -> Result<(), SyncError> {
        while let Some((kind, id)) = self.frontier.pop_front() {
            match kind {
                EntityKind::Framework => self.visit_framework(FrameworkId(id))?,
                EntityKind::Concept => self.visit_concept(ConceptId(id))?,
                EntityKind::Law => self.visit_law(LawId(id))?,
                EntityKind::Node => self.visit_node(NodeId(id))?,
            }
        }
        Ok(())
    }

    fn visit_framework(&mut self, id: FrameworkId) -> Result<(), SyncError> {
        let framework = self.store.get_framework(id)?;
        let mut view = FrameworkView::build(self.store, framework, &self.general)?;
        view.loaded = true;

        for dependency in view.dependencies.keys() {
            self.enqueue(EntityKind::Framework, dependency.0);
        }
        for concept in self.store.find_concepts_by_framework(Some(id))? {
            self.enqueue(EntityKind::Concept, concept.id.0);
        }
        for law in self.store.find_laws_by_framework(id)? {
            self.enqueue(EntityKind::Law, law.id.0);
        }
        self.graph.frameworks.insert(id, view);
        Ok(())
    }

    fn visit_concept(&mut self, id: ConceptId) -> Result<(), SyncError> {
        let concept = self.store.get_concept(id)?;
        let view = ConceptView::build(self.store, concept)?;

        let pointers = view.head.into_iter().chain(view.reference);
        let links = view.dependencies.keys().chain(view.instance_of.keys()).copied();
        for target in pointers.chain(links) {
            self.enqueue(EntityKind::Concept, target.0);
        }
        self.graph.concepts.insert(id, view);
        Ok(())
    }

    fn visit_law(&mut self, id: LawId) -> Result<(), SyncError> {
        let law = self.store.get_law(id)?;
        let view = LawView::build(self.store, law)?;
        for node in &view.nodes {
            self.enqueue(EntityKind::Node, node.0);
        }
        self.graph.laws.insert(id, view);
        Ok(())
    }

    fn visit_node(&mut self, id: NodeId) -> Result<(), SyncError> {
        let node = self.store.get_node(id)?;
        self.enqueue(EntityKind::Concept, node.concept.0);
        for sibling in node.head.into_iter().chain(node.reference) {
            self.enqueue(EntityKind::Node, sibling.0);
        }
        if !self.store.find_predicates_by_node(id)?.is_empty() {
            self.graph
                .predicates
                .entry(node.concept)
                .or_default()
                .insert(id, true);
        }
        self.graph.nodes.insert(id, NodeView::from(node));
        Ok(())
    }
}
