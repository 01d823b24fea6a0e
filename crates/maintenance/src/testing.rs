//! Test helpers: a toy actuator that applies actions to a Local document

use crate::action::{ActionDescription, ActionKind, COLLECTION, ID, LEADER};
use crate::compare::{INDEXES, PLAN_ID};
use crate::topology::Topology;
use serde_json::{Map, Value, json};

/// Actions as sorted JSON strings, for order-insensitive comparison
pub fn canonical(actions: &[ActionDescription]) -> Vec<String> {
    let mut encoded: Vec<String> = actions
        .iter()
        .map(|action| serde_json::to_string(action).unwrap())
        .collect();
    encoded.sort();
    encoded
}

/// Local document after an ideal actuator ran every action
pub fn apply_actions(local: &Topology, actions: &[ActionDescription]) -> Topology {
    let mut root = local.root().clone();
    if !root.is_object() {
        root = json!({});
    }
    let databases = root.as_object_mut().unwrap();

    for action in actions {
        let database = action.database().unwrap().to_string();
        match action.kind() {
            ActionKind::CreateDatabase => {
                databases.insert(database, json!({}));
            }
            ActionKind::DropDatabase => {
                databases.remove(&database);
            }
            kind => {
                let shard = action.shard().unwrap().to_string();
                let shards = databases
                    .get_mut(&database)
                    .and_then(Value::as_object_mut)
                    .unwrap();
                apply_shard_action(shards, kind, &shard, action);
            }
        }
    }

    Topology::new(root)
}

fn apply_shard_action(
    shards: &mut Map<String, Value>,
    kind: ActionKind,
    shard: &str,
    action: &ActionDescription,
) {
    match kind {
        ActionKind::CreateCollection => {
            let mut record = action.properties().cloned().unwrap_or_else(|| json!({}));
            record[PLAN_ID] = json!(action.get(COLLECTION).unwrap());
            record[LEADER] = json!(action.get(LEADER).unwrap());
            shards.insert(shard.to_string(), record);
        }
        ActionKind::DropCollection => {
            shards.remove(shard);
        }
        ActionKind::UpdateCollection => {
            let record = shards.get_mut(shard).unwrap();
            if let Some(Value::Object(changed)) = action.properties() {
                for (key, value) in changed {
                    record[key.as_str()] = value.clone();
                }
            }
            record[LEADER] = json!(action.get(LEADER).unwrap());
        }
        ActionKind::EnsureIndex => {
            let record = shards.get_mut(shard).unwrap();
            if record.get(INDEXES).is_none() {
                record[INDEXES] = json!([]);
            }
            let index = action.properties().cloned().unwrap();
            record[INDEXES].as_array_mut().unwrap().push(index);
        }
        ActionKind::DropIndex => {
            let id = action.get(ID).unwrap();
            let record = shards.get_mut(shard).unwrap();
            if let Some(indexes) = record.get_mut(INDEXES).and_then(Value::as_array_mut) {
                indexes.retain(|index| index.get(ID).and_then(Value::as_str) != Some(id));
            }
        }
        ActionKind::ResignShardLeadership => {
            let record = shards.get_mut(shard).unwrap();
            record[LEADER] = json!("NONE");
        }
        ActionKind::SynchronizeShard => {}
        ActionKind::CreateDatabase | ActionKind::DropDatabase => unreachable!(),
    }
}
