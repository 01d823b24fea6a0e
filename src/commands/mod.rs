// Snapshot inspection commands
pub mod diff;
pub mod report;
pub mod sync;

// Full maintenance cycle
pub mod cycle;

use anyhow::{Context as AnyhowContext, Result};
use maintenance::Snapshots;
use serde::Serialize;

use crate::Context;
use crate::cli::SnapshotArgs;
use crate::config::{Invocation, ShardsyncConfig};

/// Merge config and flags, then read the three topology documents
pub fn prepare(ctx: &Context, args: &SnapshotArgs) -> Result<(Invocation, Snapshots)> {
    let config = ShardsyncConfig::load(ctx.config.as_deref())?;
    let invocation = config.invocation(args)?;
    let snapshots = Snapshots::load(&invocation.plan, &invocation.current, &invocation.local)
        .context("Failed to load topology snapshots")?;
    log::info!(
        "Loaded snapshots for {} (plan {:?}, current {:?})",
        invocation.ctx.server_id,
        snapshots.plan.version(),
        snapshots.current.version()
    );
    Ok((invocation, snapshots))
}

/// Print a value as pretty JSON on stdout
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}
