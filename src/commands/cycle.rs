//! `shardsync cycle` - one full maintenance cycle
//!
//! Actions and patches go to recording collaborators, so the cycle shows
//! exactly what would be handed to the actuator and the configuration
//! store without touching either.

use anyhow::{Context as AnyhowContext, Result, bail};
use maintenance::{Maintenance, RecordingActuator, RecordingStore};

use crate::Context;
use crate::cli::CycleArgs;
use crate::display;

pub fn run(ctx: &Context, args: &CycleArgs) -> Result<()> {
    let (invocation, snapshots) = super::prepare(ctx, &args.snapshots)?;

    let mut maintenance_ctx = invocation.ctx;
    if let Some(role) = args.role {
        maintenance_ctx = maintenance_ctx.with_role(role);
    }
    if args.no_merge {
        maintenance_ctx = maintenance_ctx.with_merge_duplicates(false);
    }

    let maintenance = Maintenance::new(maintenance_ctx);
    let mut actuator = RecordingActuator::new();
    let mut store = RecordingStore::new();
    let report = maintenance
        .handle_change(&snapshots, &mut actuator, &mut store)
        .context("Maintenance cycle failed")?;
    log::debug!(
        "Recorded {} submissions and {} published batches",
        actuator.submitted.len(),
        store.batches.len()
    );

    if ctx.json {
        super::print_json(&report)?;
    } else if ctx.quiet {
        display::display_cycle_summary(&report);
    } else {
        display::display_cycle(&report, ctx.verbose > 0);
    }

    if !report.is_success() {
        bail!("Maintenance cycle finished with errors");
    }
    Ok(())
}
