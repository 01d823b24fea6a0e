//! Cycle context and collaborator traits
//!
//! The core only describes work. These traits are the seams where the
//! descriptions leave it: the actuator executes actions, the configuration
//! store accepts report patches, and the local inventory answers questions
//! about this node's own databases and shards.

use crate::action::ActionDescription;
use crate::compare::{FOLLOWERS, SERVERS};
use crate::patch::ReportPatch;
use crate::topology::{Topology, items};
use crate::types::ServerRole;
use anyhow::Result;
use serde_json::Value;

/// Everything a cycle needs to know about the node it runs on
///
/// Passed explicitly into every cycle so that a cycle's behavior depends
/// only on its inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaintenanceContext {
    /// This node's server id as it appears in `servers` lists
    pub server_id: String,
    /// Role of this node
    pub role: ServerRole,
    /// Let the actuator coalesce an action identical to one already queued
    pub merge_duplicates: bool,
}

impl MaintenanceContext {
    /// Context for a database server
    pub fn new(server_id: impl Into<String>) -> Self {
        Self {
            server_id: server_id.into(),
            role: ServerRole::Primary,
            merge_duplicates: true,
        }
    }

    pub fn with_role(mut self, role: ServerRole) -> Self {
        self.role = role;
        self
    }

    pub fn with_merge_duplicates(mut self, merge: bool) -> Self {
        self.merge_duplicates = merge;
        self
    }
}

/// Executor of corrective actions
///
/// Implementations own retries, per-shard locking and the actual I/O.
pub trait Actuator {
    /// Queue an action
    ///
    /// With `merge_if_duplicate` the actuator may drop the action if an
    /// identical one is already queued.
    fn submit(&mut self, action: ActionDescription, merge_if_duplicate: bool) -> Result<()>;
}

/// Writer for the Current subtree of the configuration store
pub trait ConfigStore {
    /// Apply a batch of patches
    fn publish(&mut self, patches: &[ReportPatch]) -> Result<()>;
}

/// Lookups against this node's local catalog
///
/// `None` means the entity could not be resolved.
pub trait LocalInventory {
    /// Id of a local database
    fn database_id(&self, database: &str) -> Option<String>;

    /// Followers currently in sync with this node for a shard it leads
    fn followers(&self, database: &str, shard: &str) -> Option<Vec<String>>;
}

/// [`LocalInventory`] backed by the Local topology document
///
/// The database id comes from `<db>/_id` when present, else the database
/// name. Followers come from `<db>/<shard>/followers` (falling back to the
/// non-leader entries of `<db>/<shard>/servers`).
pub struct DocumentInventory<'a> {
    local: &'a Topology,
}

impl<'a> DocumentInventory<'a> {
    pub fn new(local: &'a Topology) -> Self {
        Self { local }
    }
}

impl LocalInventory for DocumentInventory<'_> {
    fn database_id(&self, database: &str) -> Option<String> {
        self.local.get(&[database])?;
        let id = self
            .local
            .get(&[database, "_id"])
            .and_then(|id| match id {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .unwrap_or_else(|| database.to_string());
        Some(id)
    }

    fn followers(&self, database: &str, shard: &str) -> Option<Vec<String>> {
        let shard = self.local.get(&[database, shard])?;
        let followers = if shard.get(FOLLOWERS).is_some() {
            items(shard.get(FOLLOWERS))
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        } else {
            items(shard.get(SERVERS))
                .skip(1)
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        };
        Some(followers)
    }
}

/// Actuator that keeps every submitted action
#[derive(Debug, Default)]
pub struct RecordingActuator {
    pub submitted: Vec<(ActionDescription, bool)>,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Submitted actions without the merge flag
    pub fn actions(&self) -> Vec<&ActionDescription> {
        self.submitted.iter().map(|(action, _)| action).collect()
    }
}

impl Actuator for RecordingActuator {
    fn submit(&mut self, action: ActionDescription, merge_if_duplicate: bool) -> Result<()> {
        self.submitted.push((action, merge_if_duplicate));
        Ok(())
    }
}

/// Configuration store that keeps every published batch
#[derive(Debug, Default)]
pub struct RecordingStore {
    pub batches: Vec<Vec<ReportPatch>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All published patches, flattened
    pub fn patches(&self) -> impl Iterator<Item = &ReportPatch> {
        self.batches.iter().flatten()
    }
}

impl ConfigStore for RecordingStore {
    fn publish(&mut self, patches: &[ReportPatch]) -> Result<()> {
        self.batches.push(patches.to_vec());
        Ok(())
    }
}
