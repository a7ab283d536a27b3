//! Stored entity records.
//!
//! One struct per table. The `id` field of a record passed to an `insert_*`
//! store method is ignored; the store assigns the durable identifier.

use serde::{Deserialize, Serialize};

use crate::id::{ConceptId, FrameworkId, LawId, NodeId};

/// A named grouping of concepts and laws.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Framework {
    pub id: FrameworkId,
    pub name: String,
    pub description: Option<String>,
}

/// A node kind or relation definition, optionally scoped to a framework.
///
/// `head` and `reference` define the directed binary relation this concept
/// stands for (e.g. "is-a" pointing head to subject, reference to object).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    pub id: ConceptId,
    pub name: String,
    pub description: Option<String>,
    /// Owning framework; `None` for global concepts.
    pub framework: Option<FrameworkId>,
    pub head: Option<ConceptId>,
    pub reference: Option<ConceptId>,
    pub symmetric: bool,
    /// Applicable to exactly one node (bound through a [`ConceptContext`]).
    pub node_specific: bool,
    /// Applicable to exactly one law (bound through a [`ConceptContext`]).
    pub law_specific: bool,
    pub inherits: bool,
    pub symbol: Option<String>,
    pub commands: Option<String>,
    pub value: Option<String>,
}

impl Concept {
    /// Creates a plain concept with every flag off and no pointers.
    pub fn new(name: impl Into<String>, framework: Option<FrameworkId>) -> Self {
        Concept {
            id: ConceptId(0),
            name: name.into(),
            description: None,
            framework,
            head: None,
            reference: None,
            symmetric: false,
            node_specific: false,
            law_specific: false,
            inherits: false,
            symbol: None,
            commands: None,
            value: None,
        }
    }

    /// Returns `true` if the concept must be bound to a single node or law.
    pub fn is_context_specific(&self) -> bool {
        self.node_specific || self.law_specific
    }
}

/// A relation instance: an owned tree of nodes within a framework.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Law {
    pub id: LawId,
    pub name: String,
    pub description: Option<String>,
    pub framework: Option<FrameworkId>,
    pub hashtags: Option<String>,
    /// Bumped on every relation save; used for optimistic concurrency.
    pub revision: i64,
}

impl Law {
    pub fn new(name: impl Into<String>, framework: Option<FrameworkId>) -> Self {
        Law {
            id: LawId(0),
            name: name.into(),
            description: None,
            framework,
            hashtags: None,
            revision: 0,
        }
    }
}

/// An instance of a concept inside a law's tree.
///
/// `head` and `reference` point at sibling nodes of the same law.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub law: LawId,
    pub concept: ConceptId,
    pub head: Option<NodeId>,
    pub reference: Option<NodeId>,
    pub name: Option<String>,
    pub value: Option<serde_json::Value>,
}

/// Grouping marker tagging a node with a group number within its law.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Predicate {
    pub node: NodeId,
    pub predicate_group: i64,
}

/// The single node or law a context-specific concept is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextTarget {
    Node(NodeId),
    Law(LawId),
}

/// One-to-one binding of a node- or law-specific concept to its context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptContext {
    pub concept: ConceptId,
    pub target: ContextTarget,
}
