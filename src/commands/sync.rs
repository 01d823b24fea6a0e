//! `shardsync sync` - followers that fell out of sync with their leader

use anyhow::Result;
use maintenance::sync_replicated_shards_with_leaders;

use crate::Context;
use crate::cli::SnapshotArgs;
use crate::display;

pub fn run(ctx: &Context, args: &SnapshotArgs) -> Result<()> {
    let (invocation, snapshots) = super::prepare(ctx, args)?;
    let actions = sync_replicated_shards_with_leaders(
        &snapshots.plan,
        &snapshots.current,
        &snapshots.local,
        &invocation.ctx.server_id,
    );

    if ctx.json {
        return super::print_json(&actions);
    }
    display::display_actions("Follower resync", &actions);
    Ok(())
}
