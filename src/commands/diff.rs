//! `shardsync diff` - Plan vs Local actions for this node

use anyhow::Result;
use maintenance::diff_plan_local;

use crate::Context;
use crate::cli::SnapshotArgs;
use crate::display;

pub fn run(ctx: &Context, args: &SnapshotArgs) -> Result<()> {
    let (invocation, snapshots) = super::prepare(ctx, args)?;
    let actions = diff_plan_local(&snapshots.plan, &snapshots.local, &invocation.ctx.server_id);

    if ctx.json {
        return super::print_json(&actions);
    }
    display::display_actions("Plan vs Local", &actions);
    Ok(())
}
