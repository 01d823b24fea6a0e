//! Two-phase maintenance cycle
//!
//! Phase one brings Local in line with Plan by submitting actions. Phase
//! two publishes Local to Current and asks out-of-sync followers to
//! resynchronize. A failure in one phase is recorded and never stops the
//! other.

use crate::action::ActionDescription;
use crate::context::{Actuator, ConfigStore, DocumentInventory, LocalInventory, MaintenanceContext};
use crate::error::{MaintenanceError, Result};
use crate::plan_local::diff_plan_local;
use crate::report::report_in_current;
use crate::sync::sync_replicated_shards_with_leaders;
use crate::topology::Topology;
use crate::types::{CycleReport, PhaseReport};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

/// The three documents one cycle reads
///
/// They are taken independently and may be skewed against each other.
#[derive(Debug, Clone, Default)]
pub struct Snapshots {
    pub plan: Topology,
    pub current: Topology,
    pub local: Topology,
}

impl Snapshots {
    pub fn new(plan: Topology, current: Topology, local: Topology) -> Self {
        Self {
            plan,
            current,
            local,
        }
    }

    /// Read all three documents from JSON files
    pub fn load(plan: &Path, current: &Path, local: &Path) -> Result<Self> {
        Ok(Self::new(
            Topology::from_path(plan)?,
            Topology::from_path(current)?,
            Topology::from_path(local)?,
        ))
    }
}

/// State of the cycle guard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Running,
}

/// Single-flight guard: at most one cycle runs at a time
#[derive(Debug)]
pub struct CycleGuard {
    state: Mutex<CycleState>,
}

impl Default for CycleGuard {
    fn default() -> Self {
        Self {
            state: Mutex::new(CycleState::Idle),
        }
    }
}

impl CycleGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CycleState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move from `Idle` to `Running`
    ///
    /// The returned ticket moves the guard back to `Idle` when dropped.
    pub fn try_start(&self) -> Result<CycleTicket<'_>> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == CycleState::Running {
            return Err(MaintenanceError::CycleInProgress);
        }
        *state = CycleState::Running;
        Ok(CycleTicket { guard: self })
    }
}

/// Proof that a cycle is running
#[derive(Debug)]
pub struct CycleTicket<'a> {
    guard: &'a CycleGuard,
}

impl Drop for CycleTicket<'_> {
    fn drop(&mut self) {
        *self.guard.state.lock().unwrap_or_else(PoisonError::into_inner) = CycleState::Idle;
    }
}

/// Maintenance driver for one node
#[derive(Debug)]
pub struct Maintenance {
    ctx: MaintenanceContext,
    guard: CycleGuard,
}

impl Maintenance {
    pub fn new(ctx: MaintenanceContext) -> Self {
        Self {
            ctx,
            guard: CycleGuard::new(),
        }
    }

    pub fn state(&self) -> CycleState {
        self.guard.state()
    }

    /// Run one cycle, resolving local lookups from the Local document
    pub fn handle_change<A, S>(
        &self,
        snapshots: &Snapshots,
        actuator: &mut A,
        store: &mut S,
    ) -> Result<CycleReport>
    where
        A: Actuator + ?Sized,
        S: ConfigStore + ?Sized,
    {
        let inventory = DocumentInventory::new(&snapshots.local);
        self.handle_change_with_inventory(snapshots, &inventory, actuator, store)
    }

    /// Run one cycle against an explicit local inventory
    ///
    /// Only fails if this node does not host shards or a cycle is already
    /// running. Collaborator failures end up in the report.
    pub fn handle_change_with_inventory<A, S>(
        &self,
        snapshots: &Snapshots,
        inventory: &dyn LocalInventory,
        actuator: &mut A,
        store: &mut S,
    ) -> Result<CycleReport>
    where
        A: Actuator + ?Sized,
        S: ConfigStore + ?Sized,
    {
        if !self.ctx.role.hosts_shards() {
            return Err(MaintenanceError::NotDatabaseServer {
                role: self.ctx.role,
            });
        }
        let _ticket = self.guard.try_start()?;

        let mut report = CycleReport::new(&self.ctx.server_id);
        report.phase_one = self.phase_one(snapshots, actuator);
        report.phase_two = self.phase_two(snapshots, inventory, actuator, store);

        log::info!(
            "Maintenance cycle for {}: {} actions, {} patches, {} errors (plan {:?}, current {:?})",
            self.ctx.server_id,
            report.total_actions(),
            report.total_patches(),
            report.phase_one.errors.len() + report.phase_two.errors.len(),
            report.plan_version(),
            report.current_version(),
        );
        Ok(report)
    }

    /// Plan vs Local
    pub fn phase_one<A: Actuator + ?Sized>(&self, snapshots: &Snapshots, actuator: &mut A) -> PhaseReport {
        let mut phase = PhaseReport::new(snapshots.plan.version());
        phase.actions = diff_plan_local(&snapshots.plan, &snapshots.local, &self.ctx.server_id);
        self.submit_all(actuator, &mut phase);
        phase
    }

    /// Local vs Current, then follower resynchronization
    pub fn phase_two<A, S>(
        &self,
        snapshots: &Snapshots,
        inventory: &dyn LocalInventory,
        actuator: &mut A,
        store: &mut S,
    ) -> PhaseReport
    where
        A: Actuator + ?Sized,
        S: ConfigStore + ?Sized,
    {
        let Snapshots {
            plan,
            current,
            local,
        } = snapshots;
        let server_id = self.ctx.server_id.as_str();

        let mut phase = PhaseReport::new(current.version());
        phase.patches = report_in_current(plan, current, local, server_id, inventory);

        if !phase.patches.is_empty() {
            match store.publish(&phase.patches) {
                Ok(()) => phase.published = phase.patches.len(),
                Err(err) => {
                    let err = MaintenanceError::Publish {
                        count: phase.patches.len(),
                        message: format!("{err:#}"),
                    };
                    log::error!("{err}");
                    phase.errors.push(err.to_string());
                }
            }
        }

        phase.actions = sync_replicated_shards_with_leaders(plan, current, local, server_id);
        self.submit_all(actuator, &mut phase);
        phase
    }

    fn submit_all<A: Actuator + ?Sized>(&self, actuator: &mut A, phase: &mut PhaseReport) {
        for action in &phase.actions {
            if let Err(err) = submit(actuator, action, self.ctx.merge_duplicates) {
                log::error!("{err}");
                phase.errors.push(err.to_string());
            } else {
                phase.submitted += 1;
            }
        }
    }
}

fn submit<A: Actuator + ?Sized>(actuator: &mut A, action: &ActionDescription, merge: bool) -> Result<()> {
    actuator
        .submit(action.clone(), merge)
        .map_err(|err| MaintenanceError::Submit {
            action: action.to_string(),
            message: format!("{err:#}"),
        })
}
