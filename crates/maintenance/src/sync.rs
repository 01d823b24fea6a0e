//! Follower resynchronization
//!
//! A follower that the plan lists but Current no longer counts as in sync
//! has to pull the shard from its leader again.

use crate::action::ActionDescription;
use crate::compare::{SERVERS, SHARDS, is_follower, leader_of, server_list};
use crate::topology::{COLLECTIONS, Topology, entries};

/// Compute a `SynchronizeShard` for every followed shard Current has dropped us from
///
/// Shards Current does not know yet are skipped: their leader creates them.
pub fn sync_replicated_shards_with_leaders(
    plan: &Topology,
    current: &Topology,
    local: &Topology,
    server_id: &str,
) -> Vec<ActionDescription> {
    let mut actions = Vec::new();

    for (database, collections) in plan.entries(&[COLLECTIONS]) {
        if !local.has_key(&[database]) {
            continue;
        }

        for (collection, planned) in entries(Some(collections)) {
            for (shard, servers) in entries(planned.get(SHARDS)) {
                let Some(planned_servers) = server_list(servers) else {
                    log::warn!("Skipping planned shard {database}/{shard}: malformed server list");
                    continue;
                };
                if !is_follower(&planned_servers, server_id) || !local.has_key(&[database, shard]) {
                    continue;
                }

                let Some(reported) = current.get(&[COLLECTIONS, database, collection, shard]) else {
                    continue;
                };
                let Some(current_servers) = reported.get(SERVERS).and_then(server_list) else {
                    log::error!(
                        "Current/{COLLECTIONS}/{database}/{collection}/{shard} has no servers list"
                    );
                    continue;
                };
                if is_follower(&current_servers, server_id) {
                    continue;
                }

                let leader = leader_of(&planned_servers).unwrap_or_default();
                let action = ActionDescription::synchronize_shard(database, collection, shard, leader);
                log::debug!("Out of sync follower: {action}");
                actions.push(action);
            }
        }
    }

    actions
}
