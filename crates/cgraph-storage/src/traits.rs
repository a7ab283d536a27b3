//! The [`RecordStore`] trait defining the storage contract for the concept
//! graph.
//!
//! Two-layer API design:
//! - **Low-level CRUD** methods form the trait foundation. Each call reads or
//!   writes the rows of one table.
//! - **Provided** methods (`transaction`, `replace_links`) build the
//!   multi-statement operations the sync engine needs on top of them.
//!
//! Writes issued outside [`RecordStore::begin`]/[`RecordStore::commit`] are
//! individually atomic; the sync engine always wraps a save in
//! [`RecordStore::transaction`].

use cgraph_core::schema::LinkTable;
use cgraph_core::{
    Concept, ConceptId, ContextTarget, EntityKind, Framework, FrameworkId, Law, LawId, Node,
    NodeId, Predicate,
};

use crate::error::StorageError;

/// The storage contract for concept graph records.
///
/// The trait is synchronous: a save is a short sequence of store calls inside
/// one request, with no other suspension points.
pub trait RecordStore {
    // -------------------------------------------------------------------
    // Transactions
    // -------------------------------------------------------------------

    /// Opens a write transaction.
    fn begin(&mut self) -> Result<(), StorageError>;

    /// Commits the open transaction.
    fn commit(&mut self) -> Result<(), StorageError>;

    /// Discards every write made since [`RecordStore::begin`].
    fn rollback(&mut self) -> Result<(), StorageError>;

    /// Returns `true` while a transaction is open.
    fn in_transaction(&self) -> bool;

    /// Runs `f` inside a transaction, committing on `Ok` and rolling back on
    /// `Err`. A failed rollback is logged and the original error returned.
    fn transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        Self: Sized,
        E: From<StorageError>,
        F: FnOnce(&mut Self) -> Result<T, E>,
    {
        self.begin()?;
        match f(self) {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.rollback() {
                    tracing::error!(error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }

    // -------------------------------------------------------------------
    // Kind-generic operations
    // -------------------------------------------------------------------

    /// Returns `true` if a record of `kind` with `id` exists.
    fn exists(&self, kind: EntityKind, id: i64) -> Result<bool, StorageError>;

    /// Deletes a record, cascading to everything the schema says it owns.
    fn delete(&mut self, kind: EntityKind, id: i64) -> Result<(), StorageError>;

    /// The identifier the next insert of `kind` will receive.
    fn next_id(&self, kind: EntityKind) -> Result<i64, StorageError>;

    /// Rewinds the identifier sequence of `kind` to the largest stored id.
    ///
    /// Refused while a transaction is open, so an id freed by an uncommitted
    /// delete is never handed out again in the same transaction.
    fn reset_sequence(&mut self, kind: EntityKind) -> Result<(), StorageError>;

    // -------------------------------------------------------------------
    // Frameworks
    // -------------------------------------------------------------------

    fn insert_framework(&mut self, framework: &Framework) -> Result<FrameworkId, StorageError>;

    fn get_framework(&self, id: FrameworkId) -> Result<Framework, StorageError>;

    fn update_framework(&mut self, framework: &Framework) -> Result<(), StorageError>;

    /// Lists all frameworks, ordered by id.
    fn list_frameworks(&self) -> Result<Vec<Framework>, StorageError>;

    /// Finds frameworks by exact name.
    fn find_frameworks_by_name(&self, name: &str) -> Result<Vec<Framework>, StorageError>;

    // -------------------------------------------------------------------
    // Concepts
    // -------------------------------------------------------------------

    fn insert_concept(&mut self, concept: &Concept) -> Result<ConceptId, StorageError>;

    fn get_concept(&self, id: ConceptId) -> Result<Concept, StorageError>;

    fn update_concept(&mut self, concept: &Concept) -> Result<(), StorageError>;

    /// Rewrites only the `head`/`reference` pointers of a concept.
    fn set_concept_links(
        &mut self,
        id: ConceptId,
        head: Option<ConceptId>,
        reference: Option<ConceptId>,
    ) -> Result<(), StorageError>;

    /// Finds concepts owned by `framework`, or global concepts for `None`.
    fn find_concepts_by_framework(
        &self,
        framework: Option<FrameworkId>,
    ) -> Result<Vec<Concept>, StorageError>;

    /// Finds concepts whose `head` or `reference` is `target`.
    fn find_concepts_pointing_at(&self, target: ConceptId) -> Result<Vec<Concept>, StorageError>;

    // -------------------------------------------------------------------
    // Laws
    // -------------------------------------------------------------------

    fn insert_law(&mut self, law: &Law) -> Result<LawId, StorageError>;

    fn get_law(&self, id: LawId) -> Result<Law, StorageError>;

    fn update_law(&mut self, law: &Law) -> Result<(), StorageError>;

    fn find_laws_by_framework(&self, framework: FrameworkId) -> Result<Vec<Law>, StorageError>;

    // -------------------------------------------------------------------
    // Nodes
    // -------------------------------------------------------------------

    fn insert_node(&mut self, node: &Node) -> Result<NodeId, StorageError>;

    fn get_node(&self, id: NodeId) -> Result<Node, StorageError>;

    fn update_node(&mut self, node: &Node) -> Result<(), StorageError>;

    /// Rewrites only the `head`/`reference` pointers of a node.
    fn set_node_links(
        &mut self,
        id: NodeId,
        head: Option<NodeId>,
        reference: Option<NodeId>,
    ) -> Result<(), StorageError>;

    fn find_nodes_by_law(&self, law: LawId) -> Result<Vec<Node>, StorageError>;

    fn find_nodes_by_concept(&self, concept: ConceptId) -> Result<Vec<Node>, StorageError>;

    // -------------------------------------------------------------------
    // Predicates
    // -------------------------------------------------------------------

    /// Inserts a grouping marker; an identical marker is not duplicated.
    fn insert_predicate(&mut self, predicate: &Predicate) -> Result<(), StorageError>;

    fn find_predicates_by_node(&self, node: NodeId) -> Result<Vec<Predicate>, StorageError>;

    /// Deletes every marker of `node`, returning how many were removed.
    fn delete_predicates_by_node(&mut self, node: NodeId) -> Result<usize, StorageError>;

    // -------------------------------------------------------------------
    // Link tables
    // -------------------------------------------------------------------

    fn insert_link(&mut self, table: &LinkTable, owner: i64, target: i64)
        -> Result<(), StorageError>;

    /// Targets linked from `owner`, ordered.
    fn find_links(&self, table: &LinkTable, owner: i64) -> Result<Vec<i64>, StorageError>;

    /// Owners linking to `target`, ordered.
    fn find_linkers(&self, table: &LinkTable, target: i64) -> Result<Vec<i64>, StorageError>;

    /// Deletes every link of `owner`, returning how many were removed.
    fn delete_links(&mut self, table: &LinkTable, owner: i64) -> Result<usize, StorageError>;

    /// Replaces every link of `owner` with `targets`.
    ///
    /// Links are always rewritten wholesale, never diffed.
    fn replace_links(
        &mut self,
        table: &LinkTable,
        owner: i64,
        targets: &[i64],
    ) -> Result<(), StorageError> {
        self.delete_links(table, owner)?;
        for target in targets {
            self.insert_link(table, owner, *target)?;
        }
        Ok(())
    }

    // -------------------------------------------------------------------
    // Concept contexts
    // -------------------------------------------------------------------

    fn get_context(&self, concept: ConceptId) -> Result<Option<ContextTarget>, StorageError>;

    /// Binds `concept` to `target`, replacing any previous binding.
    fn set_context(&mut self, concept: ConceptId, target: ContextTarget)
        -> Result<(), StorageError>;

    /// Removes the binding of `concept`, returning `true` if one existed.
    fn clear_context(&mut self, concept: ConceptId) -> Result<bool, StorageError>;

    /// Concepts currently bound to `target`.
    fn find_concepts_bound_to(&self, target: ContextTarget)
        -> Result<Vec<ConceptId>, StorageError>;
}
