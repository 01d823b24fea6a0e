//! Local vs Current: derive the report patches that publish this node's state
//!
//! Nothing here writes to the configuration store. The patches are
//! returned and the orchestrator hands them over in one batch.

use crate::compare::{
    INDEXES, PLAN_ID, SERVERS, SHARDS, equivalent, is_system, leader_of, local_leader, resigned,
    server_list, strip_volatile,
};
use crate::context::LocalInventory;
use crate::error::{MaintenanceError, Result};
use crate::patch::{self, ReportPatch};
use crate::topology::{COLLECTIONS, DATABASES, Topology, entries, items};
use serde_json::{Value, json};

/// Compute the patches that bring Current in line with this node's Local state
///
/// Patches are only produced where Current differs from what this node
/// would publish, so a converged cluster yields an empty list.
pub fn report_in_current(
    plan: &Topology,
    current: &Topology,
    local: &Topology,
    server_id: &str,
    inventory: &dyn LocalInventory,
) -> Vec<ReportPatch> {
    let mut patches = Vec::new();

    for (database, shards) in local.entries(&[]) {
        if !current.has_key(&[DATABASES, database, server_id])
            && let Some(info) = assemble_database_info(database, inventory)
        {
            patches.push(ReportPatch::set(
                patch::database_path(database, server_id),
                info,
            ));
        }

        for (shard, local_shard) in entries(Some(shards)) {
            if is_system(shard) {
                continue;
            }
            match report_shard(current, database, shard, local_shard, server_id, inventory) {
                Ok(Some(patch)) => patches.push(patch),
                Ok(None) => {}
                Err(err) => log::error!("Not reporting shard {database}/{shard}: {err}"),
            }
        }
    }

    collect_garbage(plan, current, local, server_id, &mut patches);

    for patch in &patches {
        log::debug!("Local/current difference: {patch}");
    }
    patches
}

fn report_shard(
    current: &Topology,
    database: &str,
    shard: &str,
    local_shard: &Value,
    server_id: &str,
    inventory: &dyn LocalInventory,
) -> Result<Option<ReportPatch>> {
    let collection = local_shard
        .get(PLAN_ID)
        .and_then(Value::as_str)
        .ok_or_else(|| MaintenanceError::malformed(&[database, shard, PLAN_ID], "missing"))?;

    if local_leader(local_shard).is_empty() {
        let Some(snapshot) = assemble_shard_info(local_shard, database, shard, server_id, inventory)
        else {
            return Ok(None);
        };
        let reported = current.get(&[COLLECTIONS, database, collection, shard]);
        if reported.is_some_and(|reported| equivalent(&snapshot, reported)) {
            return Ok(None);
        }
        return Ok(Some(ReportPatch::set(
            patch::shard_path(database, collection, shard),
            snapshot,
        )));
    }

    // Following locally while Current still names us leader: the
    // resignation is done, mark it and let supervision pick the new leader.
    let Some(servers) = current
        .get(&[COLLECTIONS, database, collection, shard, SERVERS])
        .and_then(server_list)
    else {
        return Ok(None);
    };
    if leader_of(&servers) != Some(server_id) {
        return Ok(None);
    }

    let mut marked = servers;
    marked[0] = resigned(server_id);
    Ok(Some(ReportPatch::set(
        patch::servers_path(database, collection, shard),
        json!(marked),
    )))
}

/// Database record this node publishes under `Current/Databases/<db>/<server>`
pub fn assemble_database_info(database: &str, inventory: &dyn LocalInventory) -> Option<Value> {
    let Some(id) = inventory.database_id(database) else {
        log::error!("Failed to look up local database {database}");
        return None;
    };
    Some(json!({
        "error": false,
        "errorNum": 0,
        "errorMessage": "",
        "id": id,
        "name": database,
    }))
}

/// Shard record a leader publishes under `Current/Collections/<db>/<col>/<shard>`
pub fn assemble_shard_info(
    local_shard: &Value,
    database: &str,
    shard: &str,
    server_id: &str,
    inventory: &dyn LocalInventory,
) -> Option<Value> {
    let Some(followers) = inventory.followers(database, shard) else {
        log::error!("Failed to look up local collection {database}/{shard}");
        return None;
    };

    let indexes: Vec<Value> = items(local_shard.get(INDEXES)).map(strip_volatile).collect();
    let servers: Vec<String> = std::iter::once(server_id.to_string())
        .chain(followers.into_iter().filter(|f| f != server_id))
        .collect();

    Some(json!({
        "error": false,
        "errorMessage": "",
        "errorNum": 0,
        "indexes": indexes,
        "servers": servers,
    }))
}

/// Delete Current entries this node owns for things neither Plan nor Local has
fn collect_garbage(
    plan: &Topology,
    current: &Topology,
    local: &Topology,
    server_id: &str,
    patches: &mut Vec<ReportPatch>,
) {
    for (database, reporters) in current.entries(&[DATABASES]) {
        let reported_by_us = reporters.get(server_id).is_some();
        if reported_by_us
            && !plan.has_key(&[DATABASES, database])
            && !local.has_key(&[database])
        {
            patches.push(ReportPatch::delete(patch::database_path(database, server_id)));
        }
    }

    let resigned_id = resigned(server_id);
    for (database, collections) in current.entries(&[COLLECTIONS]) {
        for (collection, shards) in entries(Some(collections)) {
            for (shard, reported) in entries(Some(shards)) {
                let owned = reported
                    .get(SERVERS)
                    .and_then(server_list)
                    .is_some_and(|servers| {
                        leader_of(&servers).is_some_and(|l| l == server_id || l == resigned_id)
                    });
                if owned
                    && !plan.has_key(&[COLLECTIONS, database, collection, SHARDS, shard])
                    && !local.has_key(&[database, shard])
                {
                    patches.push(ReportPatch::delete(patch::shard_path(
                        database, collection, shard,
                    )));
                }
            }
        }
    }
}
