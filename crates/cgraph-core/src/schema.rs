//! Static schema registry for the concept graph.
//!
//! Declares, per entity kind, its fields, which of them point at other
//! records (and of which kind), and which auxiliary link tables implement its
//! many-to-many relations. The storage and sync layers look tables and
//! columns up here; the wire `table` string is resolved to an [`EntityKind`]
//! once, at the request boundary.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Name of the framework(s) every other framework implicitly depends on.
pub const GENERAL_FRAMEWORK: &str = "General";

/// Name given to a law stub created for a relation saved before its metadata.
pub const NEW_LAW_NAME: &str = "New Law";

/// Table holding node grouping markers.
pub const PREDICATE_TABLE: &str = "predicate";

/// Table holding the one-to-one context binding of specific concepts.
pub const CONTEXT_TABLE: &str = "concept_context";

/// The primary entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Framework,
    Concept,
    Law,
    Node,
}

impl EntityKind {
    /// All kinds, in dependency order (a kind only points at earlier kinds
    /// or at itself).
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Framework,
        EntityKind::Concept,
        EntityKind::Law,
        EntityKind::Node,
    ];

    /// The store table backing this kind.
    pub fn table(self) -> &'static str {
        match self {
            EntityKind::Framework => "framework",
            EntityKind::Concept => "concept",
            EntityKind::Law => "law",
            EntityKind::Node => "node",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

impl FromStr for EntityKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.table() == s)
            .ok_or_else(|| CoreError::UnknownTable {
                table: s.to_string(),
            })
    }
}

/// Value category of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Boolean,
    /// Arbitrary JSON, stored as TEXT.
    Json,
    /// Identifier of another record.
    ///
    /// `relink` pointers may reference records created in the same batch and
    /// are written in the second pass, after every identifier is known.
    /// Other pointers (parent keys) are written with the record body.
    Pointer { target: EntityKind, relink: bool },
}

/// One field of an entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldSpec {
    const fn new(name: &'static str, kind: FieldKind, required: bool) -> Self {
        FieldSpec {
            name,
            kind,
            required,
        }
    }

    /// Returns the pointer target, if this field is a pointer.
    pub fn target(&self) -> Option<EntityKind> {
        match self.kind {
            FieldKind::Pointer { target, .. } => Some(target),
            _ => None,
        }
    }

    /// Returns `true` if this pointer is written in the relink pass.
    pub fn is_relinked(&self) -> bool {
        matches!(self.kind, FieldKind::Pointer { relink: true, .. })
    }
}

const fn pointer(target: EntityKind, relink: bool) -> FieldKind {
    FieldKind::Pointer { target, relink }
}

const FRAMEWORK_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("name", FieldKind::Text, true),
    FieldSpec::new("description", FieldKind::Text, false),
];

const CONCEPT_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("name", FieldKind::Text, true),
    FieldSpec::new("description", FieldKind::Text, false),
    FieldSpec::new("framework", pointer(EntityKind::Framework, false), false),
    FieldSpec::new("head", pointer(EntityKind::Concept, true), false),
    FieldSpec::new("reference", pointer(EntityKind::Concept, true), false),
    FieldSpec::new("symmetric", FieldKind::Boolean, false),
    FieldSpec::new("node_specific", FieldKind::Boolean, false),
    FieldSpec::new("law_specific", FieldKind::Boolean, false),
    FieldSpec::new("inherits", FieldKind::Boolean, false),
    FieldSpec::new("symbol", FieldKind::Text, false),
    FieldSpec::new("commands", FieldKind::Text, false),
    FieldSpec::new("value", FieldKind::Text, false),
];

const LAW_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("name", FieldKind::Text, true),
    FieldSpec::new("description", FieldKind::Text, false),
    FieldSpec::new("framework", pointer(EntityKind::Framework, false), false),
    FieldSpec::new("hashtags", FieldKind::Text, false),
    FieldSpec::new("revision", FieldKind::Integer, false),
];

const NODE_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("law", pointer(EntityKind::Law, false), true),
    FieldSpec::new("concept", pointer(EntityKind::Concept, false), true),
    FieldSpec::new("head", pointer(EntityKind::Node, true), false),
    FieldSpec::new("reference", pointer(EntityKind::Node, true), false),
    FieldSpec::new("name", FieldKind::Text, false),
    FieldSpec::new("value", FieldKind::Json, false),
];

/// Returns every field of `kind` (the `id` column is implicit).
pub fn fields_of(kind: EntityKind) -> &'static [FieldSpec] {
    match kind {
        EntityKind::Framework => FRAMEWORK_FIELDS,
        EntityKind::Concept => CONCEPT_FIELDS,
        EntityKind::Law => LAW_FIELDS,
        EntityKind::Node => NODE_FIELDS,
    }
}

/// Returns the pointer fields of `kind`.
pub fn pointer_fields_of(kind: EntityKind) -> impl Iterator<Item = &'static FieldSpec> {
    fields_of(kind).iter().filter(|f| f.target().is_some())
}

/// Looks up a field by name.
pub fn field(kind: EntityKind, name: &str) -> Option<&'static FieldSpec> {
    fields_of(kind).iter().find(|f| f.name == name)
}

/// The meaning of a many-to-many link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkRelation {
    DependsOn,
    InstanceOf,
}

/// A many-to-many link table from `owner` records to `target` records.
///
/// Link rows have no identity of their own: the owner's save replaces all of
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkTable {
    pub name: &'static str,
    pub relation: LinkRelation,
    pub owner: EntityKind,
    pub owner_column: &'static str,
    pub target: EntityKind,
    pub target_column: &'static str,
}

pub const FRAMEWORK_DEPENDENCY: LinkTable = LinkTable {
    name: "framework_dependency",
    relation: LinkRelation::DependsOn,
    owner: EntityKind::Framework,
    owner_column: "framework",
    target: EntityKind::Framework,
    target_column: "dependency",
};

pub const CONCEPT_DEPENDENCY: LinkTable = LinkTable {
    name: "concept_dependency",
    relation: LinkRelation::DependsOn,
    owner: EntityKind::Concept,
    owner_column: "concept",
    target: EntityKind::Concept,
    target_column: "dependency",
};

pub const CONCEPT_INSTANCE: LinkTable = LinkTable {
    name: "concept_instance",
    relation: LinkRelation::InstanceOf,
    owner: EntityKind::Concept,
    owner_column: "concept",
    target: EntityKind::Concept,
    target_column: "instance_of",
};

/// Every link table in the schema.
pub const LINK_TABLES: [LinkTable; 3] = [FRAMEWORK_DEPENDENCY, CONCEPT_DEPENDENCY, CONCEPT_INSTANCE];

/// Returns the link table implementing `relation` from `owner` to `target`.
pub fn link_table_for(
    owner: EntityKind,
    target: EntityKind,
    relation: LinkRelation,
) -> Option<&'static LinkTable> {
    LINK_TABLES
        .iter()
        .find(|t| t.owner == owner && t.target == target && t.relation == relation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names_round_trip_through_from_str() {
        for kind in EntityKind::ALL {
            assert_eq!(kind.table().parse::<EntityKind>().unwrap(), kind);
        }
        assert!(matches!(
            "painting".parse::<EntityKind>(),
            Err(CoreError::UnknownTable { .. })
        ));
    }

    #[test]
    fn node_pointers_split_into_parent_keys_and_relinked_fields() {
        let pointers: Vec<_> = pointer_fields_of(EntityKind::Node).collect();
        let names: Vec<_> = pointers.iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["law", "concept", "head", "reference"]);

        let relinked: Vec<_> = pointers
            .iter()
            .filter(|f| f.is_relinked())
            .map(|f| (f.name, f.target()))
            .collect();
        assert_eq!(
            relinked,
            vec![
                ("head", Some(EntityKind::Node)),
                ("reference", Some(EntityKind::Node))
            ]
        );
    }

    #[test]
    fn frameworks_have_no_pointers() {
        assert_eq!(pointer_fields_of(EntityKind::Framework).count(), 0);
        assert!(field(EntityKind::Framework, "name").unwrap().required);
    }

    #[test]
    fn link_tables_resolve_by_kind_pair_and_relation() {
        assert_eq!(
            link_table_for(EntityKind::Framework, EntityKind::Framework, LinkRelation::DependsOn),
            Some(&FRAMEWORK_DEPENDENCY)
        );
        assert_eq!(
            link_table_for(EntityKind::Concept, EntityKind::Concept, LinkRelation::InstanceOf)
                .map(|t| t.name),
            Some("concept_instance")
        );
        assert!(link_table_for(EntityKind::Law, EntityKind::Node, LinkRelation::DependsOn).is_none());
    }
}
