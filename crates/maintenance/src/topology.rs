//! Read-only topology documents
//!
//! Plan, Current and Local all arrive as JSON trees. A [`Topology`] wraps
//! one of them and answers path lookups where every missing key, at any
//! depth, simply resolves to "nothing there".

use crate::error::Result;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// Top-level key holding the database records in Plan and Current
pub const DATABASES: &str = "Databases";
/// Top-level key holding the collection records in Plan and Current
pub const COLLECTIONS: &str = "Collections";
/// Top-level key holding the document's version counter
pub const VERSION: &str = "Version";

/// An immutable, path-addressed JSON tree
#[derive(Debug, Clone, PartialEq)]
pub struct Topology {
    root: Value,
}

impl Topology {
    /// Wrap an already parsed document
    pub fn new(root: Value) -> Self {
        Self { root }
    }

    /// A document with no keys at all
    pub fn empty() -> Self {
        Self::new(Value::Object(Map::new()))
    }

    /// Parse a document from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(Self::new(serde_json::from_str(text)?))
    }

    /// Read and parse a document from a JSON file
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let topology = Self::from_json(&content)?;
        log::debug!("Loaded topology from {}", path.display());
        Ok(topology)
    }

    /// The whole tree
    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Node at `path`, or `None` if any segment is missing
    ///
    /// An empty path addresses the root.
    pub fn get(&self, path: &[&str]) -> Option<&Value> {
        lookup(&self.root, path)
    }

    /// Whether a node exists at `path`
    pub fn has_key(&self, path: &[&str]) -> bool {
        self.get(path).is_some()
    }

    /// Key/value pairs of the object at `path`; empty when absent or not an object
    pub fn entries<'a>(
        &'a self,
        path: &[&str],
    ) -> impl Iterator<Item = (&'a str, &'a Value)> + use<'a> {
        entries(self.get(path))
    }

    /// Elements of the array at `path`; empty when absent or not an array
    pub fn items<'a>(&'a self, path: &[&str]) -> impl Iterator<Item = &'a Value> + use<'a> {
        items(self.get(path))
    }

    /// The top-level `Version` counter, if the document carries one
    pub fn version(&self) -> Option<u64> {
        self.get(&[VERSION]).and_then(Value::as_u64)
    }
}

impl Default for Topology {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Value> for Topology {
    fn from(root: Value) -> Self {
        Self::new(root)
    }
}

/// Walk `path` below `value`
///
/// Descending through anything that is not an object yields `None`.
pub fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(value, |node, key| node.as_object()?.get(*key))
}

/// Iterate an optional object fragment as `(key, value)` pairs
pub fn entries(value: Option<&Value>) -> impl Iterator<Item = (&str, &Value)> {
    value
        .and_then(Value::as_object)
        .into_iter()
        .flat_map(|map| map.iter().map(|(key, value)| (key.as_str(), value)))
}

/// Iterate an optional array fragment
pub fn items(value: Option<&Value>) -> impl Iterator<Item = &Value> {
    value.and_then(Value::as_array).into_iter().flatten()
}
