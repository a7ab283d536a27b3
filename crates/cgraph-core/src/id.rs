//! Identifier types for graph entities.
//!
//! Durable identifiers are distinct newtype wrappers over `i64` (SQLite's
//! `INTEGER PRIMARY KEY`), so a `NodeId` cannot be used where a `ConceptId`
//! is expected. [`ClientId`] is the token a client submits before the store
//! has assigned anything: zero or negative values denote records that do not
//! exist yet.

use std::fmt;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Durable framework identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FrameworkId(pub i64);

/// Durable concept identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConceptId(pub i64);

/// Durable law identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LawId(pub i64);

/// Durable node identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub i64);

// Display implementations -- just print the inner value.

impl fmt::Display for FrameworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ConceptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for LawId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier supplied by the client.
///
/// Positive values name records the client believes are stored; zero and
/// negative values are synthetic placeholders for records created in the
/// same request. On the wire it may arrive as a JSON integer or as a numeric
/// string (form fields are strings).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ClientId(pub i64);

impl ClientId {
    /// Returns `true` if this token denotes a record that is not yet stored.
    pub fn is_new(self) -> bool {
        self.0 <= 0
    }

    /// Returns the value as a durable identifier candidate, or `None` for
    /// placeholders.
    pub fn durable(self) -> Option<i64> {
        if self.is_new() {
            None
        } else {
            Some(self.0)
        }
    }

    /// Parses a textual token. The empty string means "no identifier".
    pub fn parse(text: &str) -> Result<Option<ClientId>, CoreError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        trimmed
            .parse::<i64>()
            .map(|v| Some(ClientId(v)))
            .map_err(|_| CoreError::InvalidClientId {
                token: text.to_string(),
            })
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ClientId {
    fn from(v: i64) -> Self {
        ClientId(v)
    }
}

/// Wire forms accepted for a client identifier.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawClientId {
    Int(i64),
    Text(String),
}

impl RawClientId {
    fn into_client_id(self) -> Result<Option<ClientId>, CoreError> {
        match self {
            RawClientId::Int(v) => Ok(Some(ClientId(v))),
            RawClientId::Text(s) => ClientId::parse(&s),
        }
    }
}

impl<'de> Deserialize<'de> for ClientId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RawClientId::deserialize(deserializer)?
            .into_client_id()
            .map_err(de::Error::custom)?
            .ok_or_else(|| de::Error::custom("empty client identifier"))
    }
}

/// Deserializes an optional client identifier, treating `null` and `""` as
/// absent. Use with `#[serde(default, deserialize_with = ...)]`.
pub fn deserialize_optional<'de, D>(deserializer: D) -> Result<Option<ClientId>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<RawClientId>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) => raw.into_client_id().map_err(de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Holder {
        #[serde(default, deserialize_with = "deserialize_optional")]
        id: Option<ClientId>,
    }

    #[test]
    fn non_positive_ids_are_new() {
        assert!(ClientId(-3).is_new());
        assert!(ClientId(0).is_new());
        assert!(!ClientId(12).is_new());
        assert_eq!(ClientId(12).durable(), Some(12));
        assert_eq!(ClientId(-1).durable(), None);
    }

    #[test]
    fn client_id_accepts_numbers_and_numeric_strings() {
        let a: ClientId = serde_json::from_str("-4").unwrap();
        let b: ClientId = serde_json::from_str("\"17\"").unwrap();
        assert_eq!(a, ClientId(-4));
        assert_eq!(b, ClientId(17));
        assert!(serde_json::from_str::<ClientId>("\"abc\"").is_err());
        assert!(serde_json::from_str::<ClientId>("\"\"").is_err());
    }

    #[test]
    fn optional_client_id_treats_empty_as_absent() {
        let h: Holder = serde_json::from_str(r#"{"id": ""}"#).unwrap();
        assert_eq!(h.id, None);
        let h: Holder = serde_json::from_str(r#"{"id": null}"#).unwrap();
        assert_eq!(h.id, None);
        let h: Holder = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(h.id, None);
        let h: Holder = serde_json::from_str(r#"{"id": "5"}"#).unwrap();
        assert_eq!(h.id, Some(ClientId(5)));
    }

    #[test]
    fn durable_ids_serialize_as_bare_integers() {
        assert_eq!(serde_json::to_string(&NodeId(42)).unwrap(), "42");
        let back: LawId = serde_json::from_str("7").unwrap();
        assert_eq!(back, LawId(7));
        assert_eq!(format!("{}", ConceptId(9)), "9");
    }
}
