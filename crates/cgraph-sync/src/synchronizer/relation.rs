//! Saving a law's node tree.
//!
//! The order of the passes is load-bearing:
//!
//! 1. make sure the law exists (a stub is created for a new one),
//! 2. upsert every submitted node body with `head`/`reference` unset,
//! 3. delete stored nodes of the law the snapshot no longer lists,
//! 4. relink `head`/`reference` now that every identifier is known,
//! 5. rewrite the grouping markers of the retained nodes,
//! 6. drop context concepts whose node went away or stopped using them.
//!
//! Relinking before the deletions would leave pointers at deleted rows;
//! deleting before every body is written would lose nodes still in use.

use std::collections::BTreeSet;

use cgraph_core::schema::{NEW_LAW_NAME, PREDICATE_TABLE};
use cgraph_core::{
    ClientId, ConceptId, ContextTarget, EntityKind, FrameworkId, Law, LawId, Node, NodeId,
    Predicate,
};
use cgraph_storage::{RecordStore, StorageError};

use crate::error::SyncError;
use crate::remap::{DanglingPolicy, DanglingReference, PointerSite, Remapper};
use crate::snapshot::RelationSnapshot;
use crate::view::{EntrySet, LawView, NodeView};

use super::{exists_in, remove_unbound_concepts, Links, RelationSaved};

/// What a relation save may change, compared before and after to decide
/// whether the revision moves.
#[derive(Debug, PartialEq)]
struct LawState {
    nodes: Vec<Node>,
    markers: BTreeSet<Predicate>,
}

impl LawState {
    fn read<S: RecordStore>(store: &S, law: LawId) -> Result<Self, SyncError> {
        let nodes = store.find_nodes_by_law(law)?;
        let mut markers = BTreeSet::new();
        for node in &nodes {
            markers.extend(store.find_predicates_by_node(node.id)?);
        }
        Ok(LawState { nodes, markers })
    }
}

pub(super) fn save<S: RecordStore>(
    store: &mut S,
    snapshot: &RelationSnapshot,
    policy: DanglingPolicy,
) -> Result<RelationSaved, SyncError> {
    let mut remap = Remapper::new(policy);
    let mut law = ensure_law(store, &mut remap, snapshot)?;
    let law_id = law.id;
    let before = LawState::read(&*store, law_id)?;

    let (keep, mut orphans) = upsert_bodies(store, &mut remap, snapshot, law_id, &before)?;
    tracing::debug!(law = %law_id, retained = keep.len(), "node bodies written");

    let mut deleted = Vec::new();
    for node in before.nodes.iter().filter(|n| !keep.contains(&n.id)) {
        orphans.extend(store.find_concepts_bound_to(ContextTarget::Node(node.id))?);
        store.delete_predicates_by_node(node.id)?;
        store.delete(EntityKind::Node, node.id.0)?;
        deleted.push(node.id);
    }
    tracing::debug!(law = %law_id, deleted = deleted.len(), "stale nodes collected");

    relink(store, &mut remap, snapshot, law_id)?;
    rewrite_markers(store, &mut remap, snapshot, law_id, &keep)?;
    let removed_concepts = remove_unbound_concepts(store, orphans)?;

    if LawState::read(&*store, law_id)? != before {
        law.revision += 1;
        store.update_law(&law)?;
    }

    let mut entries = EntrySet::default();
    let stored = store.get_law(law_id)?;
    let mut law_view = LawView::build(&*store, stored)?;
    law_view.old_id = snapshot.id.filter(|client| client.0 != law_id.0);
    entries.law.insert(law_id, law_view);
    for submitted in &snapshot.nodes {
        let Some(id) = remap.lookup(EntityKind::Node, submitted.id) else {
            continue;
        };
        let mut view = NodeView::from(store.get_node(NodeId(id))?);
        if submitted.id.0 != id {
            view.old_id = Some(submitted.id);
        }
        entries.node.entry(view.id).or_insert(view);
    }

    let (id_map, dangling) = remap.into_parts();
    Ok(RelationSaved {
        law: law_id,
        revision: law.revision,
        entries,
        id_map,
        deleted,
        removed_concepts,
        dangling,
    })
}

/// Loads the law named by the snapshot, checking its revision, or creates a
/// stub law for a new one.
fn ensure_law<S: RecordStore>(
    store: &mut S,
    remap: &mut Remapper,
    snapshot: &RelationSnapshot,
) -> Result<Law, SyncError> {
    if let Some(id) = snapshot.id.and_then(ClientId::durable) {
        let law = store.get_law(LawId(id))?;
        if let Some(submitted) = snapshot.revision {
            if submitted != law.revision {
                return Err(SyncError::Conflict {
                    law: law.id,
                    submitted,
                    stored: law.revision,
                });
            }
        }
        remap.assign(EntityKind::Law, snapshot.id, |_| Ok(id))?;
        return Ok(law);
    }

    let site = PointerSite::new(
        EntityKind::Law.table(),
        snapshot.id.map_or(0, |c| c.0),
        "framework",
    );
    let framework = remap.resolve(
        site,
        EntityKind::Framework,
        snapshot.framework,
        exists_in(&*store, EntityKind::Framework),
    )?;
    let stub = Law::new(NEW_LAW_NAME, framework.map(FrameworkId));
    let id = remap.assign(EntityKind::Law, snapshot.id, |_| {
        Ok(store.insert_law(&stub)?.0)
    })?;
    tracing::debug!(law = id, "created stub law");
    Ok(store.get_law(LawId(id))?)
}

/// First pass: writes every node body and binds context-specific concepts.
///
/// Returns the durable ids of the written nodes, and the concepts that were
/// bound to a written node but are no longer its concept (their binding is
/// removed).
fn upsert_bodies<S: RecordStore>(
    store: &mut S,
    remap: &mut Remapper,
    snapshot: &RelationSnapshot,
    law: LawId,
    before: &LawState,
) -> Result<(BTreeSet<NodeId>, Vec<ConceptId>), SyncError> {
    let stored: BTreeSet<NodeId> = before.nodes.iter().map(|n| n.id).collect();
    let mut keep = BTreeSet::new();
    let mut released = Vec::new();

    for submitted in &snapshot.nodes {
        let concept = store.get_concept(submitted.concept)?;
        let id = remap.assign(EntityKind::Node, Some(submitted.id), |candidate| {
            let mut body = Node {
                id: NodeId(0),
                law,
                concept: concept.id,
                head: None,
                reference: None,
                name: submitted.name.clone(),
                value: submitted.value.clone(),
            };
            match candidate.map(NodeId).filter(|id| stored.contains(id)) {
                Some(id) => {
                    body.id = id;
                    store.update_node(&body)?;
                    Ok(id.0)
                }
                None => Ok(store.insert_node(&body)?.0),
            }
        })?;
        let id = NodeId(id);

        for bound in store.find_concepts_bound_to(ContextTarget::Node(id))? {
            if bound != concept.id {
                store.clear_context(bound)?;
                released.push(bound);
            }
        }
        if concept.node_specific {
            store.set_context(concept.id, ContextTarget::Node(id))?;
        } else if concept.law_specific {
            store.set_context(concept.id, ContextTarget::Law(law))?;
        }
        keep.insert(id);
    }
    Ok((keep, released))
}

/// Second pass: points `head`/`reference` at the durable ids.
///
/// A pointer only resolves to a stored node of the same law.
fn relink<S: RecordStore>(
    store: &mut S,
    remap: &mut Remapper,
    snapshot: &RelationSnapshot,
    law: LawId,
) -> Result<(), SyncError> {
    let table = EntityKind::Node.table();
    for submitted in &snapshot.nodes {
        let Some(owner) = remap.lookup(EntityKind::Node, submitted.id) else {
            continue;
        };
        let links = Links::relink(EntityKind::Node, Links::default(), |field, _| {
            let site = PointerSite::new(table, owner, field.name);
            let target = submitted.pointer(field.name);
            Ok(resolve_sibling(&*store, &mut *remap, site, target, law)?.map(|node| node.0))
        })?;
        store.set_node_links(
            NodeId(owner),
            links.head.map(NodeId),
            links.reference.map(NodeId),
        )?;
    }
    Ok(())
}

fn resolve_sibling<S: RecordStore>(
    store: &S,
    remap: &mut Remapper,
    site: PointerSite,
    target: Option<ClientId>,
    law: LawId,
) -> Result<Option<NodeId>, SyncError> {
    let same_law = |id: i64| match store.get_node(NodeId(id)) {
        Ok(node) => Ok(node.law == law),
        Err(StorageError::NotFound { .. }) => Ok(false),
        Err(err) => Err(SyncError::from(err)),
    };
    Ok(remap
        .resolve(site, EntityKind::Node, target, same_law)?
        .map(NodeId))
}

/// Replaces the markers of every retained node with the submitted ones.
fn rewrite_markers<S: RecordStore>(
    store: &mut S,
    remap: &mut Remapper,
    snapshot: &RelationSnapshot,
    law: LawId,
    keep: &BTreeSet<NodeId>,
) -> Result<(), SyncError> {
    for node in keep {
        store.delete_predicates_by_node(*node)?;
    }

    let mut markers = BTreeSet::new();
    for marker in &snapshot.predicates {
        match remap.lookup(EntityKind::Node, marker.node) {
            Some(node) => {
                markers.insert(Predicate {
                    node: NodeId(node),
                    predicate_group: marker.predicate_group,
                });
            }
            None => remap.report(DanglingReference {
                table: PREDICATE_TABLE,
                owner: law.0,
                field: "node",
                kind: EntityKind::Node,
                target: marker.node,
            })?,
        }
    }
    for marker in &markers {
        store.insert_predicate(marker)?;
    }
    tracing::debug!(law = %law, markers = markers.len(), "grouping markers rewritten");
    Ok(())
}
