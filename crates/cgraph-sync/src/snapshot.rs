//! Wire input of the save operations.
//!
//! A [`RelationSnapshot`] is a law's complete node tree as the client sees
//! it. An [`EntrySubmission`] is one framework, concept or law record; its
//! fields are kept as raw JSON until the target kind is known, then parsed
//! into the matching patch type.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use cgraph_core::id::deserialize_optional;
use cgraph_core::schema::fields_of;
use cgraph_core::{ClientId, ConceptId, EntityKind};

use crate::error::SyncError;

/// A field patch: `None` leaves the stored value alone, `Some(None)` clears
/// it, `Some(Some(v))` sets it.
pub type Patch<T> = Option<Option<T>>;

fn patch<'de, T, D>(deserializer: D) -> Result<Patch<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn patch_pointer<'de, D>(deserializer: D) -> Result<Patch<ClientId>, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_optional(deserializer).map(Some)
}

/// Reads a concept id in any of the client id wire forms.
fn concept_id<'de, D>(deserializer: D) -> Result<ConceptId, D::Error>
where
    D: Deserializer<'de>,
{
    ClientId::deserialize(deserializer).map(|client| ConceptId(client.0))
}

/// A required text field counts as missing when null or blank.
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        _ => false,
    }
}

/// A law and the full list of its nodes and grouping markers.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelationSnapshot {
    /// The law; absent, zero or negative creates a stub law.
    #[serde(default, deserialize_with = "deserialize_optional")]
    pub id: Option<ClientId>,
    /// Framework given to a newly created law.
    #[serde(default, deserialize_with = "deserialize_optional")]
    pub framework: Option<ClientId>,
    /// Revision the client last loaded; a stale value is a conflict.
    #[serde(default)]
    pub revision: Option<i64>,
    #[serde(default)]
    pub nodes: Vec<NodeSnapshot>,
    #[serde(default)]
    pub predicates: Vec<PredicateSnapshot>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeSnapshot {
    pub id: ClientId,
    #[serde(deserialize_with = "concept_id")]
    pub concept: ConceptId,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional")]
    pub head: Option<ClientId>,
    #[serde(default, deserialize_with = "deserialize_optional")]
    pub reference: Option<ClientId>,
}

impl NodeSnapshot {
    /// The submitted value of the pointer field `field`.
    pub fn pointer(&self, field: &str) -> Option<ClientId> {
        match field {
            "head" => self.head,
            "reference" => self.reference,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PredicateSnapshot {
    pub node: ClientId,
    pub predicate_group: i64,
}

/// A single framework, concept or law record to insert, update or delete.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntrySubmission {
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional")]
    pub id: Option<ClientId>,
    #[serde(default)]
    pub deleted: bool,
    /// Dependency id to "also load its subgraph"; replaces every stored
    /// dependency when present.
    #[serde(default)]
    pub dependencies: Option<BTreeMap<String, bool>>,
    /// Concepts this concept is an instance of; replaces the stored set
    /// when present.
    #[serde(default)]
    pub instance_of: Option<BTreeMap<String, bool>>,
    /// Every other submitted field.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl EntrySubmission {
    /// Resolves `table` to the entity kind a single-record save may touch.
    pub fn kind(&self) -> Result<EntityKind, SyncError> {
        let table = self
            .table
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SyncError::Validation("no table specified".to_string()))?;
        match table.parse::<EntityKind>()? {
            EntityKind::Node => Err(SyncError::Validation(
                "nodes are saved through their law's relation".to_string(),
            )),
            kind => Ok(kind),
        }
    }

    /// The durable identifier of the record to update or delete, if any.
    pub fn target(&self) -> Option<i64> {
        self.id.and_then(ClientId::durable)
    }

    /// Checks that every required field of `kind` is present and not blank.
    pub fn check_required(&self, kind: EntityKind) -> Result<(), SyncError> {
        for spec in fields_of(kind).iter().filter(|f| f.required) {
            if self.fields.get(spec.name).map_or(true, is_blank) {
                return Err(SyncError::Validation(format!(
                    "a new {} requires '{}'",
                    kind, spec.name
                )));
            }
        }
        Ok(())
    }

    /// Parses the submitted fields into the patch for `kind`.
    ///
    /// A required field may be left out of an update but not blanked.
    pub fn patch(&self, kind: EntityKind) -> Result<EntryPatch, SyncError> {
        for (name, value) in &self.fields {
            match cgraph_core::schema::field(kind, name) {
                None => tracing::debug!(table = %kind, field = %name, "ignoring unknown field"),
                Some(spec) if spec.required && value.is_string() && is_blank(value) => {
                    return Err(SyncError::Validation(format!(
                        "'{}' of a {} cannot be blank",
                        name, kind
                    )))
                }
                Some(_) => {}
            }
        }
        let fields = Value::Object(self.fields.clone());
        Ok(match kind {
            EntityKind::Framework => EntryPatch::Framework(serde_json::from_value(fields)?),
            EntityKind::Concept => EntryPatch::Concept(serde_json::from_value(fields)?),
            EntityKind::Law => EntryPatch::Law(serde_json::from_value(fields)?),
            EntityKind::Node => {
                return Err(SyncError::Validation(
                    "nodes are saved through their law's relation".to_string(),
                ))
            }
        })
    }

    /// Parses the keys of a dependency-style map, skipping empty keys.
    pub fn parse_keys(map: &BTreeMap<String, bool>) -> Result<Vec<(ClientId, bool)>, SyncError> {
        let mut out = Vec::with_capacity(map.len());
        for (key, load) in map {
            if let Some(id) = ClientId::parse(key)? {
                out.push((id, *load));
            }
        }
        Ok(out)
    }
}

/// Parsed fields of an [`EntrySubmission`].
#[derive(Debug, Clone)]
pub enum EntryPatch {
    Framework(FrameworkPatch),
    Concept(ConceptPatch),
    Law(LawPatch),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FrameworkPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "patch")]
    pub description: Patch<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConceptPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "patch")]
    pub description: Patch<String>,
    #[serde(default, deserialize_with = "patch_pointer")]
    pub framework: Patch<ClientId>,
    #[serde(default, deserialize_with = "patch_pointer")]
    pub head: Patch<ClientId>,
    #[serde(default, deserialize_with = "patch_pointer")]
    pub reference: Patch<ClientId>,
    #[serde(default)]
    pub symmetric: Option<bool>,
    #[serde(default)]
    pub node_specific: Option<bool>,
    #[serde(default)]
    pub law_specific: Option<bool>,
    #[serde(default)]
    pub inherits: Option<bool>,
    #[serde(default, deserialize_with = "patch")]
    pub symbol: Patch<String>,
    #[serde(default, deserialize_with = "patch")]
    pub commands: Patch<String>,
    #[serde(default, deserialize_with = "patch")]
    pub value: Patch<String>,
}

impl ConceptPatch {
    /// The patch of the concept pointer field `field`.
    pub fn pointer(&self, field: &str) -> Patch<ClientId> {
        match field {
            "head" => self.head,
            "reference" => self.reference,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LawPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "patch")]
    pub description: Patch<String>,
    #[serde(default, deserialize_with = "patch_pointer")]
    pub framework: Patch<ClientId>,
    #[serde(default, deserialize_with = "patch")]
    pub hashtags: Patch<String>,
}

/// Overwrites `slot` when the patch carries a value.
pub(crate) fn apply<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}
