//! # Maintenance
//!
//! Per-node shard maintenance for a sharded database cluster.
//!
//! Each database server compares three views of the cluster topology and
//! derives what has to happen for the views to converge:
//!
//! - **Plan**: the desired layout, written by the cluster supervisor
//! - **Current**: what the servers have reported they actually hold
//! - **Local**: this node's own databases, shards and indexes
//!
//! ## Core Concepts
//!
//! - **ActionDescription**: a corrective step for this node (create a shard,
//!   drop an index, hand off leadership, ...), executed by an [`Actuator`]
//! - **ReportPatch**: a write against Current, published through a
//!   [`ConfigStore`]
//! - **Maintenance**: runs the two-phase cycle and returns a [`CycleReport`]
//!
//! ## Example
//!
//! ```no_run
//! use maintenance::{
//!     Maintenance, MaintenanceContext, RecordingActuator, RecordingStore, Snapshots,
//! };
//! use std::path::Path;
//!
//! let snapshots = Snapshots::load(
//!     Path::new("plan.json"),
//!     Path::new("current.json"),
//!     Path::new("local.json"),
//! )?;
//!
//! let maintenance = Maintenance::new(MaintenanceContext::new("PRMR-1"));
//! let mut actuator = RecordingActuator::new();
//! let mut store = RecordingStore::new();
//! let report = maintenance.handle_change(&snapshots, &mut actuator, &mut store)?;
//!
//! println!("{} actions, {} patches", report.total_actions(), report.total_patches());
//! # Ok::<(), maintenance::MaintenanceError>(())
//! ```
//!
//! ## Provider Traits
//!
//! The core never performs I/O on the cluster itself:
//!
//! - [`Actuator`]: executes actions
//! - [`ConfigStore`]: accepts report patches
//! - [`LocalInventory`]: resolves local database ids and in-sync followers

pub mod action;
pub mod compare;
pub mod context;
pub mod cycle;
pub mod error;
pub mod patch;
pub mod plan_local;
pub mod report;
pub mod sync;
pub mod topology;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export main types at crate root
pub use action::{ActionDescription, ActionKind};
pub use context::{
    Actuator, ConfigStore, DocumentInventory, LocalInventory, MaintenanceContext,
    RecordingActuator, RecordingStore,
};
pub use cycle::{CycleGuard, CycleState, Maintenance, Snapshots};
pub use error::{MaintenanceError, Result};
pub use patch::{PatchOp, ReportPatch};
pub use plan_local::diff_plan_local;
pub use report::report_in_current;
pub use sync::sync_replicated_shards_with_leaders;
pub use topology::Topology;
pub use types::{CycleReport, PhaseReport, ServerRole};
