//! Core data model for the concept graph.
//!
//! Defines the durable and client identifier types, the entity records stored
//! for frameworks, concepts, laws and nodes, and the [`schema`] registry that
//! the storage and sync layers consult instead of hard-coding table names.

pub mod entity;
pub mod error;
pub mod id;
pub mod schema;

// Re-export commonly used types
pub use entity::{Concept, ConceptContext, ContextTarget, Framework, Law, Node, Predicate};
pub use error::CoreError;
pub use id::{ClientId, ConceptId, FrameworkId, LawId, NodeId};
pub use schema::{EntityKind, FieldKind, FieldSpec, LinkRelation, LinkTable};
