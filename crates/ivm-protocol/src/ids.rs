//! Opaque entity ids.
//!
//! Ids are minted by the system of record (24-hex document ids in
//! production) and only ever compared and echoed here, never interpreted.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Id of a user, company or sub-company.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Shapes an id takes on the wire: a plain string or number, extended JSON
/// `{"$oid": ".."}`, or a populated reference `{"_id": "..", ...}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(serde_json::Number),
    Oid {
        #[serde(rename = "$oid")]
        oid: String,
    },
    Reference {
        #[serde(rename = "_id", alias = "id")]
        id: Box<RawId>,
    },
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
            RawId::Oid { oid } => oid,
            RawId::Reference { id } => id.into_string(),
        }
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let id = RawId::deserialize(deserializer)?.into_string();
        if id.trim().is_empty() {
            return Err(serde::de::Error::custom("empty id"));
        }
        Ok(Self(id))
    }
}

/// For optional routing keys: missing, `null` and `""` all mean "none".
pub fn optional_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<EntityId>, D::Error> {
    let raw = Option::<RawId>::deserialize(deserializer)?;
    Ok(raw
        .map(RawId::into_string)
        .filter(|id| !id.trim().is_empty())
        .map(EntityId))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_accepted_shapes() {
        let oid = "64f1c2a9e4b0a1b2c3d4e5f6";
        for raw in [
            json!(oid),
            json!({ "$oid": oid }),
            json!({ "_id": oid, "email": "a@b.c" }),
            json!({ "_id": { "$oid": oid } }),
        ] {
            assert_eq!(serde_json::from_value::<EntityId>(raw).unwrap().as_str(), oid);
        }
        assert_eq!(serde_json::from_value::<EntityId>(json!(42)).unwrap().as_str(), "42");
    }

    #[test]
    fn test_rejects_empty_and_non_ids() {
        assert!(serde_json::from_value::<EntityId>(json!("")).is_err());
        assert!(serde_json::from_value::<EntityId>(json!(true)).is_err());
        assert!(serde_json::from_value::<EntityId>(json!({ "name": "x" })).is_err());
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let id = EntityId::from("64f1c2a9e4b0a1b2c3d4e5f6");
        assert_eq!(serde_json::to_value(&id).unwrap(), json!("64f1c2a9e4b0a1b2c3d4e5f6"));
    }
}
