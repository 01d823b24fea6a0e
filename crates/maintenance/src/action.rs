//! Action descriptions handed to the actuator
//!
//! An action is a pure description: a kind, a string-keyed parameter
//! record and an optional opaque properties payload. The core never
//! executes one.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

pub const NAME: &str = "name";
pub const DATABASE: &str = "database";
pub const COLLECTION: &str = "collection";
pub const SHARD: &str = "shard";
pub const LEADER: &str = "leader";
pub const LOCAL_LEADER: &str = "localLeader";
pub const TYPE: &str = "type";
pub const FIELDS: &str = "fields";
pub const ID: &str = "id";

/// Kind of corrective action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ActionKind {
    CreateDatabase,
    DropDatabase,
    CreateCollection,
    DropCollection,
    UpdateCollection,
    EnsureIndex,
    DropIndex,
    ResignShardLeadership,
    SynchronizeShard,
}

impl ActionKind {
    /// Name the actuator registers the action under
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateDatabase => "CreateDatabase",
            Self::DropDatabase => "DropDatabase",
            Self::CreateCollection => "CreateCollection",
            Self::DropCollection => "DropCollection",
            Self::UpdateCollection => "UpdateCollection",
            Self::EnsureIndex => "EnsureIndex",
            Self::DropIndex => "DropIndex",
            Self::ResignShardLeadership => "ResignShardLeadership",
            Self::SynchronizeShard => "SynchronizeShard",
        }
    }

    /// Whether the action removes data from this node
    pub fn is_destructive(&self) -> bool {
        matches!(
            self,
            Self::DropDatabase | Self::DropCollection | Self::DropIndex
        )
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable description of one corrective action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDescription {
    kind: ActionKind,
    params: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    properties: Option<Value>,
}

impl ActionDescription {
    fn new(kind: ActionKind) -> Self {
        let mut params = BTreeMap::new();
        params.insert(NAME.to_string(), kind.as_str().to_string());
        Self {
            kind,
            params,
            properties: None,
        }
    }

    fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    fn with_properties(mut self, properties: Value) -> Self {
        self.properties = Some(properties);
        self
    }

    /// Create a local database
    pub fn create_database(database: &str) -> Self {
        Self::new(ActionKind::CreateDatabase).with(DATABASE, database)
    }

    /// Drop a local database
    pub fn drop_database(database: &str) -> Self {
        Self::new(ActionKind::DropDatabase).with(DATABASE, database)
    }

    /// Create a local shard of `collection`
    ///
    /// `leader` is empty when this node leads the shard.
    pub fn create_collection(
        database: &str,
        collection: &str,
        shard: &str,
        leader: &str,
        properties: Value,
    ) -> Self {
        Self::new(ActionKind::CreateCollection)
            .with(DATABASE, database)
            .with(COLLECTION, collection)
            .with(SHARD, shard)
            .with(LEADER, leader)
            .with_properties(properties)
    }

    /// Drop a local shard
    pub fn drop_collection(database: &str, shard: &str) -> Self {
        Self::new(ActionKind::DropCollection)
            .with(DATABASE, database)
            .with(COLLECTION, shard)
    }

    /// Change mutable properties and/or leadership of a local shard
    ///
    /// `properties` holds only the changed properties. `local_leader` is the
    /// leader value the shard held before, for use during hand-off.
    pub fn update_collection(
        database: &str,
        shard: &str,
        leader: &str,
        local_leader: &str,
        properties: Map<String, Value>,
    ) -> Self {
        Self::new(ActionKind::UpdateCollection)
            .with(DATABASE, database)
            .with(COLLECTION, shard)
            .with(LEADER, leader)
            .with(LOCAL_LEADER, local_leader)
            .with_properties(Value::Object(properties))
    }

    /// Create a missing index on a local shard
    pub fn ensure_index(database: &str, shard: &str, index: &Value) -> Self {
        let index_type = index.get(TYPE).and_then(Value::as_str).unwrap_or_default();
        let fields = index
            .get(FIELDS)
            .map(Value::to_string)
            .unwrap_or_else(|| "[]".to_string());
        Self::new(ActionKind::EnsureIndex)
            .with(DATABASE, database)
            .with(COLLECTION, shard)
            .with(TYPE, index_type)
            .with(FIELDS, fields)
            .with_properties(index.clone())
    }

    /// Drop an index the plan no longer asks for
    pub fn drop_index(database: &str, shard: &str, id: &str) -> Self {
        Self::new(ActionKind::DropIndex)
            .with(DATABASE, database)
            .with(COLLECTION, shard)
            .with(ID, id)
    }

    /// Hand off leadership of a local shard gracefully
    pub fn resign_shard_leadership(database: &str, shard: &str) -> Self {
        Self::new(ActionKind::ResignShardLeadership)
            .with(DATABASE, database)
            .with(SHARD, shard)
    }

    /// Pull a shard's data from its leader
    pub fn synchronize_shard(database: &str, collection: &str, shard: &str, leader: &str) -> Self {
        Self::new(ActionKind::SynchronizeShard)
            .with(DATABASE, database)
            .with(COLLECTION, collection)
            .with(SHARD, shard)
            .with(LEADER, leader)
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    /// Parameter by key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Opaque payload (creation properties, changed properties, index descriptor)
    pub fn properties(&self) -> Option<&Value> {
        self.properties.as_ref()
    }

    /// Database the action targets
    pub fn database(&self) -> Option<&str> {
        self.get(DATABASE)
    }

    /// Shard the action targets, whichever key carries it
    pub fn shard(&self) -> Option<&str> {
        match self.kind {
            ActionKind::CreateCollection
            | ActionKind::ResignShardLeadership
            | ActionKind::SynchronizeShard => self.get(SHARD),
            ActionKind::DropCollection
            | ActionKind::UpdateCollection
            | ActionKind::EnsureIndex
            | ActionKind::DropIndex => self.get(COLLECTION),
            ActionKind::CreateDatabase | ActionKind::DropDatabase => None,
        }
    }
}

impl fmt::Display for ActionDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.kind)?;
        let mut first = true;
        for (key, value) in self.params.iter().filter(|(k, _)| k.as_str() != NAME) {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{key}={value}")?;
            first = false;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_name_param_matches_kind() {
        let action = ActionDescription::create_database("d1");
        assert_eq!(action.get(NAME), Some("CreateDatabase"));
        assert_eq!(action.kind(), ActionKind::CreateDatabase);
        assert_eq!(action.database(), Some("d1"));
        assert!(action.properties().is_none());
    }

    #[test]
    fn test_display() {
        let action = ActionDescription::synchronize_shard("d1", "c1", "s1", "B");
        assert_eq!(
            action.to_string(),
            "SynchronizeShard(collection=c1, database=d1, leader=B, shard=s1)"
        );
    }

    #[test]
    fn test_shard_accessor() {
        assert_eq!(
            ActionDescription::drop_collection("d1", "s1").shard(),
            Some("s1")
        );
        assert_eq!(
            ActionDescription::create_collection("d1", "c1", "s1", "", json!({})).shard(),
            Some("s1")
        );
        assert_eq!(ActionDescription::drop_database("d1").shard(), None);
    }

    #[test]
    fn test_ensure_index_params() {
        let index = json!({"id": "9", "type": "hash", "fields": ["a", "b"]});
        let action = ActionDescription::ensure_index("d1", "s1", &index);
        assert_eq!(action.get(TYPE), Some("hash"));
        assert_eq!(action.get(FIELDS), Some(r#"["a","b"]"#));
        assert_eq!(action.properties(), Some(&index));
    }

    #[test]
    fn test_destructive_kinds() {
        assert!(ActionKind::DropIndex.is_destructive());
        assert!(!ActionKind::ResignShardLeadership.is_destructive());
    }

    #[test]
    fn test_serializes_without_empty_properties() {
        let action = ActionDescription::drop_database("d1");
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["kind"], "DropDatabase");
        assert!(json.get("properties").is_none());
    }
}
