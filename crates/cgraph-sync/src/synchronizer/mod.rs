//! The save operations.
//!
//! [`Synchronizer`] runs each save as one store transaction: either every
//! step commits or the store is left as it was. The per-save logic lives in
//! [`relation`] (a law's node tree) and [`entry`] (a single framework,
//! concept or law record).

mod entry;
mod relation;

use serde::{Deserialize, Serialize};

use cgraph_core::schema::{
    link_table_for, pointer_fields_of, FieldSpec, LinkRelation, LinkTable,
};
use cgraph_core::{ConceptId, ContextTarget, EntityKind, LawId, NodeId};
use cgraph_storage::{RecordStore, StorageError};

use crate::error::SyncError;
use crate::remap::{DanglingPolicy, DanglingReference, IdMapping};
use crate::snapshot::{EntrySubmission, RelationSnapshot};
use crate::view::EntrySet;

/// Tunables of the save operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct SyncOptions {
    #[serde(default)]
    pub dangling: DanglingPolicy,
}

/// Outcome of a relation save.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationSaved {
    pub law: LawId,
    /// Revision of the law after the save.
    pub revision: i64,
    /// The law and every submitted node, with `oldId` where renumbered.
    pub entries: EntrySet,
    pub id_map: IdMapping,
    /// Nodes garbage-collected because the snapshot no longer listed them.
    pub deleted: Vec<NodeId>,
    /// Context-specific concepts removed along with their node or law.
    pub removed_concepts: Vec<ConceptId>,
    pub dangling: Vec<DanglingReference>,
}

/// Outcome of an entry save.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntrySaved {
    pub table: EntityKind,
    pub id: i64,
    pub deleted: bool,
    /// The saved record plus any eagerly loaded dependency subgraphs.
    pub entries: EntrySet,
    pub id_map: IdMapping,
    pub removed_concepts: Vec<ConceptId>,
    pub dangling: Vec<DanglingReference>,
}

/// Entry point of every write against the concept graph.
#[derive(Debug, Clone, Copy, Default)]
pub struct Synchronizer {
    options: SyncOptions,
}

impl Synchronizer {
    pub fn new(options: SyncOptions) -> Self {
        Synchronizer { options }
    }

    /// Saves a law's complete node tree.
    pub fn save_relation<S: RecordStore>(
        &self,
        store: &mut S,
        snapshot: &RelationSnapshot,
    ) -> Result<RelationSaved, SyncError> {
        let policy = self.options.dangling;
        let saved = store.transaction(|store| relation::save(store, snapshot, policy))?;
        tracing::info!(
            law = %saved.law,
            revision = saved.revision,
            nodes = saved.entries.node.len(),
            deleted = saved.deleted.len(),
            dangling = saved.dangling.len(),
            "relation saved"
        );
        Ok(saved)
    }

    /// Inserts, updates or deletes a single framework, concept or law.
    ///
    /// The request is validated before the transaction opens, so a
    /// malformed submission never touches the store.
    pub fn save_entry<S: RecordStore>(
        &self,
        store: &mut S,
        submission: &EntrySubmission,
    ) -> Result<EntrySaved, SyncError> {
        let kind = submission.kind()?;

        if submission.deleted {
            let id = submission.target().ok_or_else(|| {
                SyncError::Validation(format!("deleting a {} requires its id", kind))
            })?;
            let saved = store.transaction(|store| entry::delete(store, kind, id))?;
            tracing::info!(table = %kind, id, removed = saved.removed_concepts.len(), "entry deleted");
            return Ok(saved);
        }

        let patch = submission.patch(kind)?;
        if submission.target().is_none() {
            submission.check_required(kind)?;
        }
        if submission.dependencies.is_some() {
            link_table(kind, LinkRelation::DependsOn)?;
        }
        if submission.instance_of.is_some() {
            link_table(kind, LinkRelation::InstanceOf)?;
        }

        let policy = self.options.dangling;
        let saved =
            store.transaction(|store| entry::upsert(store, submission, kind, patch, policy))?;
        tracing::info!(
            table = %kind,
            id = saved.id,
            entries = saved.entries.concept.len() + saved.entries.law.len() + saved.entries.node.len(),
            dangling = saved.dangling.len(),
            "entry saved"
        );
        Ok(saved)
    }

    /// Rewinds the identifier sequence of `kind` to the largest stored id and
    /// returns the identifier the next insert will receive.
    ///
    /// Refused while a transaction is open.
    pub fn reset_sequence<S: RecordStore>(
        &self,
        store: &mut S,
        kind: EntityKind,
    ) -> Result<i64, SyncError> {
        store.reset_sequence(kind)?;
        let next = store.next_id(kind)?;
        tracing::info!(table = %kind, next, "identifier sequence reset");
        Ok(next)
    }
}

/// The link table implementing `relation` between records of `kind`.
fn link_table(kind: EntityKind, relation: LinkRelation) -> Result<&'static LinkTable, SyncError> {
    link_table_for(kind, kind, relation).ok_or_else(|| {
        SyncError::Validation(format!("a {} has no {:?} links", kind, relation))
    })
}

/// The `head`/`reference` pair written by the relink pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Links {
    head: Option<i64>,
    reference: Option<i64>,
}

impl Links {
    /// Runs `resolve` over every relinked pointer field `kind` declares, in
    /// schema order. `resolve` receives the field and its current value.
    fn relink<F>(kind: EntityKind, mut links: Links, mut resolve: F) -> Result<Links, SyncError>
    where
        F: FnMut(&'static FieldSpec, Option<i64>) -> Result<Option<i64>, SyncError>,
    {
        for field in pointer_fields_of(kind).filter(|f| f.is_relinked()) {
            let slot = match field.name {
                "head" => &mut links.head,
                "reference" => &mut links.reference,
                other => {
                    return Err(SyncError::Store(StorageError::IntegrityError {
                        reason: format!("{}.{} has no link column", kind, other),
                    }))
                }
            };
            *slot = resolve(field, *slot)?;
        }
        Ok(links)
    }
}

/// Existence check against the store, shaped for [`crate::Remapper::resolve`].
fn exists_in<S: RecordStore>(
    store: &S,
    kind: EntityKind,
) -> impl FnOnce(i64) -> Result<bool, SyncError> + '_ {
    move |id| store.exists(kind, id).map_err(SyncError::from)
}

/// Deletes the node- or law-specific candidates that are no longer bound to
/// any context and are used by no node.
fn remove_unbound_concepts<S: RecordStore>(
    store: &mut S,
    candidates: impl IntoIterator<Item = ConceptId>,
) -> Result<Vec<ConceptId>, SyncError> {
    let mut removed = Vec::new();
    for concept in candidates {
        if removed.contains(&concept) || !store.exists(EntityKind::Concept, concept.0)? {
            continue;
        }
        if !store.get_concept(concept)?.is_context_specific() {
            continue;
        }
        if store.get_context(concept)?.is_some() || !store.find_nodes_by_concept(concept)?.is_empty()
        {
            continue;
        }
        store.delete(EntityKind::Concept, concept.0)?;
        removed.push(concept);
    }
    if !removed.is_empty() {
        tracing::debug!(count = removed.len(), "removed unbound context concepts");
    }
    Ok(removed)
}

/// Concepts bound to `law` or to any of its nodes.
fn concepts_bound_under<S: RecordStore>(store: &S, law: LawId) -> Result<Vec<ConceptId>, SyncError> {
    let mut bound = store.find_concepts_bound_to(ContextTarget::Law(law))?;
    for node in store.find_nodes_by_law(law)? {
        bound.extend(store.find_concepts_bound_to(ContextTarget::Node(node.id))?);
    }
    Ok(bound)
}
