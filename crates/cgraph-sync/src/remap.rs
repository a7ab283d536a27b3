//! Client-to-durable identifier remapping.
//!
//! A save runs in two passes. The first pass writes record bodies and
//! [`Remapper::assign`]s each submitted client identifier its durable
//! identifier; a client identifier seen again is answered from the map
//! without a second write. The second pass [`Remapper::resolve`]s pointer
//! fields once every identifier in the batch is known, which is what lets
//! two records point at each other.
//!
//! A pointer that neither names a record of the batch nor an existing
//! durable record is a [`DanglingReference`]. What happens to it is decided
//! by the [`DanglingPolicy`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use cgraph_core::{ClientId, EntityKind};

use crate::error::SyncError;

/// What to do with a pointer that resolves to nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DanglingPolicy {
    /// Null the field, log it and report it in the response.
    #[default]
    Tolerate,
    /// Abort the save.
    Reject,
}

impl FromStr for DanglingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tolerate" => Ok(DanglingPolicy::Tolerate),
            "reject" => Ok(DanglingPolicy::Reject),
            other => Err(format!(
                "unknown dangling policy '{}' (expected 'tolerate' or 'reject')",
                other
            )),
        }
    }
}

/// A pointer field whose target could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DanglingReference {
    /// Table of the record holding the pointer.
    pub table: &'static str,
    /// Durable identifier of that record (client identifier if it has none).
    pub owner: i64,
    pub field: &'static str,
    /// Kind the pointer was expected to reach.
    pub kind: EntityKind,
    pub target: ClientId,
}

impl fmt::Display for DanglingReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} of {} {} points at unknown {} {}",
            self.table, self.field, self.table, self.owner, self.kind, self.target
        )
    }
}

/// Where a pointer being resolved lives.
#[derive(Debug, Clone, Copy)]
pub struct PointerSite {
    pub table: &'static str,
    pub owner: i64,
    pub field: &'static str,
}

impl PointerSite {
    pub fn new(table: &'static str, owner: i64, field: &'static str) -> Self {
        PointerSite {
            table,
            owner,
            field,
        }
    }
}

/// The client-to-durable identifier map produced by a save.
///
/// Serializes as `{kind: {clientId: durableId}}`, each inner map in
/// submission order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IdMapping(BTreeMap<EntityKind, IndexMap<ClientId, i64>>);

impl IdMapping {
    /// Durable identifier of `client`, if it was assigned in this save.
    pub fn get(&self, kind: EntityKind, client: ClientId) -> Option<i64> {
        self.0.get(&kind).and_then(|m| m.get(&client)).copied()
    }

    /// Every `(client, durable)` pair for `kind`, in submission order.
    pub fn entries(&self, kind: EntityKind) -> impl Iterator<Item = (ClientId, i64)> + '_ {
        self.0
            .get(&kind)
            .into_iter()
            .flat_map(|m| m.iter().map(|(c, d)| (*c, *d)))
    }

    /// Returns `true` if no client identifier was renumbered.
    pub fn is_identity(&self) -> bool {
        self.0.values().flatten().all(|(client, durable)| client.0 == *durable)
    }
}

/// Shared state of one save: the identifier map and the dangling pointers
/// met so far.
#[derive(Debug, Default)]
pub struct Remapper {
    policy: DanglingPolicy,
    mapping: IdMapping,
    dangling: Vec<DanglingReference>,
}

impl Remapper {
    pub fn new(policy: DanglingPolicy) -> Self {
        Remapper {
            policy,
            ..Remapper::default()
        }
    }

    /// Durable identifier already assigned to `client` in this save.
    pub fn lookup(&self, kind: EntityKind, client: ClientId) -> Option<i64> {
        self.mapping.get(kind, client)
    }

    /// Assigns a durable identifier to `client` by running `write` once.
    ///
    /// `write` receives the client identifier when it is a durable
    /// candidate (positive) and returns the identifier the record ended up
    /// with. If `client` was already assigned, `write` is not called.
    /// `client = None` always writes and records nothing.
    pub fn assign<F>(
        &mut self,
        kind: EntityKind,
        client: Option<ClientId>,
        write: F,
    ) -> Result<i64, SyncError>
    where
        F: FnOnce(Option<i64>) -> Result<i64, SyncError>,
    {
        if let Some(durable) = client.and_then(|c| self.lookup(kind, c)) {
            return Ok(durable);
        }
        let durable = write(client.and_then(ClientId::durable))?;
        if let Some(client) = client {
            self.mapping.0.entry(kind).or_default().insert(client, durable);
        }
        Ok(durable)
    }

    /// Resolves a pointer field to a durable identifier.
    ///
    /// A target assigned in this save maps to its durable identifier. A
    /// positive target accepted by `exists` maps to itself. Anything else is
    /// dangling: `Ok(None)` under [`DanglingPolicy::Tolerate`], an error
    /// under [`DanglingPolicy::Reject`].
    pub fn resolve<F>(
        &mut self,
        site: PointerSite,
        kind: EntityKind,
        target: Option<ClientId>,
        exists: F,
    ) -> Result<Option<i64>, SyncError>
    where
        F: FnOnce(i64) -> Result<bool, SyncError>,
    {
        let Some(target) = target else {
            return Ok(None);
        };
        if let Some(durable) = self.lookup(kind, target) {
            return Ok(Some(durable));
        }
        if let Some(candidate) = target.durable() {
            if exists(candidate)? {
                return Ok(Some(candidate));
            }
        }
        self.report(DanglingReference {
            table: site.table,
            owner: site.owner,
            field: site.field,
            kind,
            target,
        })?;
        Ok(None)
    }

    /// Applies the dangling policy to an unresolvable pointer.
    pub fn report(&mut self, dangling: DanglingReference) -> Result<(), SyncError> {
        match self.policy {
            DanglingPolicy::Reject => Err(SyncError::DanglingReference(dangling)),
            DanglingPolicy::Tolerate => {
                tracing::warn!(
                    table = dangling.table,
                    owner = dangling.owner,
                    field = dangling.field,
                    target = %dangling.target,
                    "dangling reference nulled"
                );
                self.dangling.push(dangling);
                Ok(())
            }
        }
    }

    pub fn mapping(&self) -> &IdMapping {
        &self.mapping
    }

    pub fn dangling(&self) -> &[DanglingReference] {
        &self.dangling
    }

    pub fn into_parts(self) -> (IdMapping, Vec<DanglingReference>) {
        (self.mapping, self.dangling)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> PointerSite {
        PointerSite::new("node", 10, "head")
    }

    #[test]
    fn assign_writes_each_client_id_once() {
        let mut remap = Remapper::new(DanglingPolicy::Tolerate);
        let mut writes = 0;
        let first = remap
            .assign(EntityKind::Node, Some(ClientId(-1)), |candidate| {
                assert_eq!(candidate, None);
                writes += 1;
                Ok(41)
            })
            .unwrap();
        let second = remap
            .assign(EntityKind::Node, Some(ClientId(-1)), |_| {
                writes += 1;
                Ok(99)
            })
            .unwrap();
        assert_eq!((first, second, writes), (41, 41, 1));
        assert_eq!(remap.lookup(EntityKind::Node, ClientId(-1)), Some(41));
        assert_eq!(remap.lookup(EntityKind::Law, ClientId(-1)), None);
    }

    #[test]
    fn assign_passes_positive_ids_as_candidates() {
        let mut remap = Remapper::default();
        let id = remap
            .assign(EntityKind::Law, Some(ClientId(7)), |candidate| {
                Ok(candidate.unwrap_or(0))
            })
            .unwrap();
        assert_eq!(id, 7);
        assert!(remap.mapping().is_identity());
    }

    #[test]
    fn resolve_prefers_the_batch_then_the_store() {
        let mut remap = Remapper::default();
        remap
            .assign(EntityKind::Node, Some(ClientId(-2)), |_| Ok(12))
            .unwrap();

        let mapped = remap
            .resolve(site(), EntityKind::Node, Some(ClientId(-2)), |_| {
                panic!("mapped ids skip the existence check")
            })
            .unwrap();
        assert_eq!(mapped, Some(12));

        let stored = remap
            .resolve(site(), EntityKind::Node, Some(ClientId(5)), |id| Ok(id == 5))
            .unwrap();
        assert_eq!(stored, Some(5));

        let none = remap
            .resolve(site(), EntityKind::Node, None, |_| Ok(true))
            .unwrap();
        assert_eq!(none, None);
        assert!(remap.dangling().is_empty());
    }

    #[test]
    fn tolerated_dangling_pointers_are_nulled_and_reported() {
        let mut remap = Remapper::new(DanglingPolicy::Tolerate);
        let missing = remap
            .resolve(site(), EntityKind::Node, Some(ClientId(-9)), |_| Ok(true))
            .unwrap();
        let absent = remap
            .resolve(site(), EntityKind::Node, Some(ClientId(8)), |_| Ok(false))
            .unwrap();
        assert_eq!((missing, absent), (None, None));

        let (_, dangling) = remap.into_parts();
        assert_eq!(dangling.len(), 2);
        assert_eq!(dangling[0].target, ClientId(-9));
        assert_eq!(dangling[1].field, "head");
    }

    #[test]
    fn rejected_dangling_pointers_abort() {
        let mut remap = Remapper::new(DanglingPolicy::Reject);
        let err = remap
            .resolve(site(), EntityKind::Node, Some(ClientId(-9)), |_| Ok(false))
            .unwrap_err();
        assert!(matches!(err, SyncError::DanglingReference(d) if d.owner == 10));
    }

    #[test]
    fn mapping_serializes_per_kind_in_submission_order() {
        let mut remap = Remapper::default();
        for (client, durable) in [(-3, 30), (-1, 31), (4, 4)] {
            remap
                .assign(EntityKind::Node, Some(ClientId(client)), |_| Ok(durable))
                .unwrap();
        }
        let json = serde_json::to_string(remap.mapping()).unwrap();
        assert_eq!(json, r#"{"node":{"-3":30,"-1":31,"4":4}}"#);
        assert!(!remap.mapping().is_identity());
        let pairs: Vec<_> = remap.mapping().entries(EntityKind::Node).collect();
        assert_eq!(pairs[2], (ClientId(4), 4));
    }

    #[test]
    fn policy_parses_case_insensitively() {
        assert_eq!("Reject".parse::<DanglingPolicy>(), Ok(DanglingPolicy::Reject));
        assert_eq!(" tolerate ".parse::<DanglingPolicy>(), Ok(DanglingPolicy::Tolerate));
        assert!("ignore".parse::<DanglingPolicy>().is_err());
    }
}
