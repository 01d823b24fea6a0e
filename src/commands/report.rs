//! `shardsync report` - Local vs Current patches for this node

use anyhow::Result;
use maintenance::{DocumentInventory, report_in_current};

use crate::Context;
use crate::cli::SnapshotArgs;
use crate::display;

pub fn run(ctx: &Context, args: &SnapshotArgs) -> Result<()> {
    let (invocation, snapshots) = super::prepare(ctx, args)?;
    let inventory = DocumentInventory::new(&snapshots.local);
    let patches = report_in_current(
        &snapshots.plan,
        &snapshots.current,
        &snapshots.local,
        &invocation.ctx.server_id,
        &inventory,
    );

    if ctx.json {
        return super::print_json(&patches);
    }
    display::display_patches("Local vs Current", &patches, ctx.verbose > 0);
    Ok(())
}
