//! Property and index comparison between topology fragments
//!
//! Pure helpers shared by the differ, the reporter and the synchronizer.
//! The conventions of the configuration store's schema (leader position,
//! resignation marker, implicit index types, volatile keys) live here and
//! nowhere else.

use serde_json::{Map, Value};

/// Mutable collection properties; everything else is fixed at creation
pub const MUTABLE_PROPERTIES: [&str; 4] = ["journalSize", "waitForSync", "doCompact", "indexBuckets"];

/// Identity keys, never diffed and stripped from creation payloads
pub const IDENTITY_KEYS: [&str; 2] = ["id", "name"];

/// Runtime-computed index statistic, never compared or reported
pub const SELECTIVITY_ESTIMATE: &str = "selectivityEstimate";

/// Prefix the configuration store puts on a server id whose leadership is being resigned
pub const RESIGNED_PREFIX: &str = "_";

pub const SERVERS: &str = "servers";
pub const SHARDS: &str = "shards";
pub const INDEXES: &str = "indexes";
pub const LEADER: &str = "leader";
pub const FOLLOWERS: &str = "followers";
pub const PLAN_ID: &str = "planId";

const PRIMARY_INDEX: &str = "primary";
const EDGE_INDEX: &str = "edge";

/// The leader of a server list
///
/// Position 0 holds the leader; every other position is a follower.
pub fn leader_of(servers: &[String]) -> Option<&str> {
    servers.first().map(String::as_str)
}

/// Position of `server_id` in a server list
pub fn position_of(servers: &[String], server_id: &str) -> Option<usize> {
    servers.iter().position(|s| s == server_id)
}

/// Whether `server_id` is listed as a follower (any position past the leader)
pub fn is_follower(servers: &[String], server_id: &str) -> bool {
    position_of(servers, server_id).is_some_and(|pos| pos > 0)
}

/// Resignation-marked form of a server id
pub fn resigned(server_id: &str) -> String {
    format!("{RESIGNED_PREFIX}{server_id}")
}

/// Parse a server list; `None` if the fragment is not an array of strings
pub fn server_list(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|s| s.as_str().map(str::to_string))
        .collect()
}

/// System collections start with an underscore and are left alone
pub fn is_system(name: &str) -> bool {
    name.starts_with('_')
}

/// Leader recorded on a local shard; empty means this node leads
pub fn local_leader(shard: &Value) -> &str {
    shard.get(LEADER).and_then(Value::as_str).unwrap_or_default()
}

/// Copy of a collection record without its identity keys
pub fn sanitized_properties(collection: &Value) -> Value {
    let mut props = collection.as_object().cloned().unwrap_or_default();
    for key in IDENTITY_KEYS {
        props.remove(key);
    }
    Value::Object(props)
}

/// Whitelisted properties whose planned value differs from the local one
///
/// Only properties the plan actually carries are compared. The returned
/// map holds the planned values.
pub fn changed_properties(planned: &Value, local: &Value) -> Map<String, Value> {
    let mut changed = Map::new();
    for key in MUTABLE_PROPERTIES {
        if let Some(wanted) = planned.get(key)
            && !local.get(key).is_some_and(|have| normalized_eq(wanted, have))
        {
            changed.insert(key.to_string(), wanted.clone());
        }
    }
    changed
}

/// Type of an index descriptor
pub fn index_type(index: &Value) -> Option<&str> {
    index.get("type").and_then(Value::as_str)
}

/// Id of an index descriptor
pub fn index_id(index: &Value) -> Option<&str> {
    index.get("id").and_then(Value::as_str)
}

/// Primary and edge indexes always exist and are never managed explicitly
pub fn is_implicit_index(index: &Value) -> bool {
    matches!(index_type(index), Some(PRIMARY_INDEX | EDGE_INDEX))
}

/// Field paths of an index as a sorted multiset
fn field_multiset(index: &Value) -> Vec<String> {
    let mut fields: Vec<String> = index
        .get("fields")
        .and_then(Value::as_array)
        .map(|fields| {
            fields
                .iter()
                .map(|f| f.as_str().map_or_else(|| f.to_string(), str::to_string))
                .collect()
        })
        .unwrap_or_default();
    fields.sort();
    fields
}

/// Structural index equivalence: same type, same fields in any order
///
/// Ids are assigned by each node independently and are not compared.
pub fn same_index(a: &Value, b: &Value) -> bool {
    index_type(a) == index_type(b) && field_multiset(a) == field_multiset(b)
}

/// First candidate structurally equivalent to `index`
pub fn find_equivalent<'a>(
    index: &Value,
    candidates: impl IntoIterator<Item = &'a Value>,
) -> Option<&'a Value> {
    candidates.into_iter().find(|c| same_index(index, c))
}

/// Index descriptor without volatile statistics
pub fn strip_volatile(index: &Value) -> Value {
    match index {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| key.as_str() != SELECTIVITY_ESTIMATE)
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Structural equality with numbers compared by value
///
/// `0` and `0.0` are the same number here, unlike `Value::eq`.
#[allow(clippy::float_cmp)]
pub fn normalized_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                return x == y;
            }
            if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
                return x == y;
            }
            match (x.as_f64(), y.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            }
        }
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(x, y)| normalized_eq(x, y))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(key, value)| y.get(key).is_some_and(|other| normalized_eq(value, other)))
        }
        _ => a == b,
    }
}

/// Whether `current` already holds everything `snapshot` would publish
///
/// Every key of the snapshot must be present in `current` with a
/// structurally equal value. Object key order and number representation
/// never matter; keys only `current` carries are ignored.
pub fn equivalent(snapshot: &Value, current: &Value) -> bool {
    match snapshot.as_object() {
        Some(map) => map
            .iter()
            .all(|(key, value)| current.get(key).is_some_and(|other| normalized_eq(value, other))),
        None => normalized_eq(snapshot, current),
    }
}

/// `db/shard` key for the claimed-shard set
pub fn qualified_shard(database: &str, shard: &str) -> String {
    format!("{database}/{shard}")
}

/// `db/shard/id` key for the claimed-index set
pub fn qualified_index(database: &str, shard: &str, id: &str) -> String {
    format!("{database}/{shard}/{id}")
}
