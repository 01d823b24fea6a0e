//! Report patches published to the configuration store's Current subtree

use crate::topology::{COLLECTIONS, DATABASES};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Root of every path this node reports to
pub const CURRENT: &str = "Current";

/// Operation a patch performs on its path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Set,
    Delete,
}

impl fmt::Display for PatchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Set => f.write_str("set"),
            Self::Delete => f.write_str("delete"),
        }
    }
}

/// One write against Current
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportPatch {
    pub path: String,
    #[serde(rename = "op")]
    pub operation: PatchOp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl ReportPatch {
    pub fn set(path: String, payload: Value) -> Self {
        Self {
            path,
            operation: PatchOp::Set,
            payload: Some(payload),
        }
    }

    pub fn delete(path: String) -> Self {
        Self {
            path,
            operation: PatchOp::Delete,
            payload: None,
        }
    }
}

impl fmt::Display for ReportPatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.operation, self.path)
    }
}

/// `Current/Databases/<db>/<server>`
pub fn database_path(database: &str, server_id: &str) -> String {
    [CURRENT, DATABASES, database, server_id].join("/")
}

/// `Current/Collections/<db>/<collection>/<shard>`
pub fn shard_path(database: &str, collection: &str, shard: &str) -> String {
    [CURRENT, COLLECTIONS, database, collection, shard].join("/")
}

/// `Current/Collections/<db>/<collection>/<shard>/servers`
pub fn servers_path(database: &str, collection: &str, shard: &str) -> String {
    [CURRENT, COLLECTIONS, database, collection, shard, "servers"].join("/")
}
