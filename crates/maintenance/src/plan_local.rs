//! Plan vs Local: derive lifecycle actions for this node
//!
//! Three passes over the documents:
//!
//! 1. databases planned but missing locally are created, local databases
//!    the plan dropped are dropped;
//! 2. every planned shard listing this node is created or brought in line
//!    (properties, leadership, indexes) and claimed;
//! 3. every local shard nobody claimed is dropped, unless this node is
//!    resigning its leadership, in which case it hands off first.

use crate::action::ActionDescription;
use crate::compare::{
    INDEXES, SHARDS, changed_properties, find_equivalent, index_id, is_implicit_index, is_system,
    leader_of, local_leader, qualified_index, qualified_shard, resigned, sanitized_properties,
    server_list,
};
use crate::error::{MaintenanceError, Result};
use crate::topology::{COLLECTIONS, DATABASES, Topology, entries, items};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Compute the actions that converge Local towards Plan for `server_id`
///
/// Pure: inputs are only read, missing substructure counts as empty, and a
/// malformed database or shard is logged and skipped without affecting its
/// siblings.
pub fn diff_plan_local(plan: &Topology, local: &Topology, server_id: &str) -> Vec<ActionDescription> {
    let mut differ = PlanLocalDiffer::new(plan, local, server_id);
    differ.diff_databases();
    differ.diff_planned_shards();
    differ.diff_local_shards();
    differ.actions
}

struct PlanLocalDiffer<'a> {
    plan: &'a Topology,
    local: &'a Topology,
    server_id: &'a str,
    /// `db/shard` of every planned shard this node is listed on
    claimed_shards: HashSet<String>,
    /// `db/shard/id` of every planned index and every local index matching one
    claimed_indexes: HashSet<String>,
    /// `db/shard` whose planned indexes could not be read
    unresolved_indexes: HashSet<String>,
    created_databases: HashSet<String>,
    /// Databases dropped this cycle; nothing else touches them
    dropped_databases: HashSet<String>,
    actions: Vec<ActionDescription>,
}

impl<'a> PlanLocalDiffer<'a> {
    fn new(plan: &'a Topology, local: &'a Topology, server_id: &'a str) -> Self {
        Self {
            plan,
            local,
            server_id,
            claimed_shards: HashSet::new(),
            claimed_indexes: HashSet::new(),
            unresolved_indexes: HashSet::new(),
            created_databases: HashSet::new(),
            dropped_databases: HashSet::new(),
            actions: Vec::new(),
        }
    }

    fn push(&mut self, action: ActionDescription) {
        log::debug!("Plan/local difference: {action}");
        self.actions.push(action);
    }

    fn create_database(&mut self, database: &str) {
        if self.created_databases.insert(database.to_string()) {
            self.push(ActionDescription::create_database(database));
        }
    }

    fn diff_databases(&mut self) {
        let plan = self.plan;
        let local = self.local;

        for (database, _) in plan.entries(&[DATABASES]) {
            if !local.has_key(&[database]) {
                self.create_database(database);
            }
        }

        for (database, _) in local.entries(&[]) {
            if !plan.has_key(&[DATABASES, database]) {
                self.dropped_databases.insert(database.to_string());
                self.push(ActionDescription::drop_database(database));
            }
        }
    }

    fn diff_planned_shards(&mut self) {
        let plan = self.plan;

        for (database, collections) in plan.entries(&[COLLECTIONS]) {
            if self.dropped_databases.contains(database) {
                continue;
            }
            if !self.local.has_key(&[database]) {
                // Shards follow once the database exists locally
                self.create_database(database);
                continue;
            }

            for (collection, planned) in entries(Some(collections)) {
                for (shard, servers) in entries(planned.get(SHARDS)) {
                    if let Err(err) = self.diff_planned_shard(database, collection, planned, shard, servers) {
                        log::warn!("Skipping planned shard {database}/{shard}: {err}");
                    }
                }
            }
        }
    }

    fn diff_planned_shard(
        &mut self,
        database: &str,
        collection: &str,
        planned: &Value,
        shard: &str,
        servers: &Value,
    ) -> Result<()> {
        let servers = server_list(servers).ok_or_else(|| {
            MaintenanceError::malformed(
                &[COLLECTIONS, database, collection, SHARDS, shard],
                "expected a list of server ids",
            )
        })?;

        if !servers.iter().any(|s| s == self.server_id) {
            return Ok(());
        }

        let planned_leader = leader_of(&servers).unwrap_or_default();
        let should_lead = planned_leader == self.server_id;
        let leader = if should_lead { "" } else { planned_leader };

        self.claimed_shards.insert(qualified_shard(database, shard));

        let local = self.local;
        match local.get(&[database, shard]) {
            None => {
                self.push(ActionDescription::create_collection(
                    database,
                    collection,
                    shard,
                    leader,
                    sanitized_properties(planned),
                ));
            }
            Some(local_shard) => {
                let properties = changed_properties(planned, local_shard);
                let local_leader = local_leader(local_shard);
                if !properties.is_empty() || local_leader != leader {
                    self.push(ActionDescription::update_collection(
                        database,
                        shard,
                        leader,
                        local_leader,
                        properties,
                    ));
                }

                if let Err(err) = self.diff_indexes(database, collection, shard, planned, local_shard) {
                    self.unresolved_indexes.insert(qualified_shard(database, shard));
                    return Err(err);
                }
            }
        }

        Ok(())
    }

    fn diff_indexes(
        &mut self,
        database: &str,
        collection: &str,
        shard: &str,
        planned: &Value,
        local_shard: &Value,
    ) -> Result<()> {
        let planned_indexes: Vec<&Value> = items(planned.get(INDEXES))
            .filter(|index| !is_implicit_index(index))
            .collect();
        if let Some(bad) = planned_indexes.iter().find(|index| index.get("type").is_none()) {
            return Err(MaintenanceError::malformed(
                &[COLLECTIONS, database, collection, INDEXES],
                format!("index without type: {bad}"),
            ));
        }

        let local_indexes: Vec<&Value> = items(local_shard.get(INDEXES))
            .filter(|index| !is_implicit_index(index))
            .collect();

        for index in planned_indexes {
            if let Some(id) = index_id(index) {
                self.claimed_indexes.insert(qualified_index(database, shard, id));
            }

            match find_equivalent(index, local_indexes.iter().copied()) {
                Some(existing) => {
                    if let Some(id) = index_id(existing) {
                        self.claimed_indexes.insert(qualified_index(database, shard, id));
                    }
                }
                None => self.push(ActionDescription::ensure_index(database, shard, index)),
            }
        }

        Ok(())
    }

    /// `db/shard` -> planned server list, across all databases and collections
    fn planned_servers(&self) -> HashMap<String, Vec<String>> {
        let mut servers_by_shard = HashMap::new();
        for (database, collections) in self.plan.entries(&[COLLECTIONS]) {
            for (_, planned) in entries(Some(collections)) {
                for (shard, servers) in entries(planned.get(SHARDS)) {
                    if let Some(servers) = server_list(servers) {
                        servers_by_shard.insert(qualified_shard(database, shard), servers);
                    }
                }
            }
        }
        servers_by_shard
    }

    fn diff_local_shards(&mut self) {
        let local = self.local;
        let planned_servers = self.planned_servers();
        let resigned_id = resigned(self.server_id);

        for (database, shards) in local.entries(&[]) {
            if self.dropped_databases.contains(database) {
                continue;
            }

            for (shard, local_shard) in entries(Some(shards)) {
                if is_system(shard) {
                    continue;
                }
                let key = qualified_shard(database, shard);

                let resigning = planned_servers
                    .get(&key)
                    .and_then(|servers| leader_of(servers))
                    == Some(resigned_id.as_str());
                if resigning && local_leader(local_shard).is_empty() {
                    self.push(ActionDescription::resign_shard_leadership(database, shard));
                } else if !self.claimed_shards.contains(&key) {
                    self.push(ActionDescription::drop_collection(database, shard));
                } else if !self.unresolved_indexes.contains(&key) {
                    self.drop_unclaimed_indexes(database, shard, local_shard);
                }
            }
        }
    }

    fn drop_unclaimed_indexes(&mut self, database: &str, shard: &str, local_shard: &Value) {
        for index in items(local_shard.get(INDEXES)) {
            if is_implicit_index(index) {
                continue;
            }
            let Some(id) = index_id(index) else {
                log::warn!("Local index without id on {database}/{shard}: {index}");
                continue;
            };
            if !self.claimed_indexes.contains(&qualified_index(database, shard, id)) {
                self.push(ActionDescription::drop_index(database, shard, id));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionKind, LEADER, LOCAL_LEADER};
    use crate::testing::{apply_actions, canonical};
    use serde_json::json;

    fn plan_with(servers: Value, indexes: Value) -> Topology {
        Topology::new(json!({
            "Version": 1,
            "Databases": { "d1": { "id": "1", "name": "d1" } },
            "Collections": {
                "d1": {
                    "c1": {
                        "id": "100",
                        "name": "c1",
                        "waitForSync": false,
                        "journalSize": 1_048_576,
                        "indexes": indexes,
                        "shards": { "s1": servers }
                    }
                }
            }
        }))
    }

    fn default_indexes() -> Value {
        json!([
            {"id": "0", "type": "primary", "fields": ["_key"]},
            {"id": "7", "type": "hash", "fields": ["a", "b"], "unique": false}
        ])
    }

    fn converged_local(leader: &str) -> Topology {
        Topology::new(json!({
            "d1": {
                "s1": {
                    "planId": "c1",
                    "leader": leader,
                    "waitForSync": false,
                    "journalSize": 1_048_576,
                    "indexes": [
                        {"id": "0", "type": "primary", "fields": ["_key"]},
                        {"id": "31", "type": "hash", "fields": ["b", "a"], "selectivityEstimate": 1}
                    ]
                }
            }
        }))
    }

    fn kinds(actions: &[ActionDescription]) -> Vec<ActionKind> {
        actions.iter().map(ActionDescription::kind).collect()
    }

    #[test]
    fn test_scenario_a_create_database_then_collection() {
        let plan = plan_with(json!(["A", "B"]), default_indexes());
        let local = Topology::empty();

        let actions = diff_plan_local(&plan, &local, "A");
        assert_eq!(actions, vec![ActionDescription::create_database("d1")]);

        let local = Topology::new(json!({ "d1": {} }));
        let actions = diff_plan_local(&plan, &local, "A");
        assert_eq!(kinds(&actions), vec![ActionKind::CreateCollection]);
        let create = &actions[0];
        assert_eq!(create.get("collection"), Some("c1"));
        assert_eq!(create.get("shard"), Some("s1"));
        assert_eq!(create.get(LEADER), Some(""));
        let props = create.properties().unwrap();
        assert!(props.get("id").is_none());
        assert!(props.get("name").is_none());
        assert_eq!(props["waitForSync"], json!(false));
    }

    #[test]
    fn test_create_collection_as_follower_names_leader() {
        let plan = plan_with(json!(["A", "B"]), default_indexes());
        let local = Topology::new(json!({ "d1": {} }));
        let actions = diff_plan_local(&plan, &local, "B");
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].get(LEADER), Some("A"));
    }

    #[test]
    fn test_scenario_b_converged() {
        let plan = plan_with(json!(["A", "B"]), default_indexes());
        let actions = diff_plan_local(&plan, &converged_local(""), "A");
        assert!(actions.is_empty(), "unexpected actions: {actions:?}");
    }

    #[test]
    fn test_leadership_only_change() {
        let plan = plan_with(json!(["B", "A"]), default_indexes());
        let actions = diff_plan_local(&plan, &converged_local(""), "A");

        assert_eq!(kinds(&actions), vec![ActionKind::UpdateCollection]);
        let update = &actions[0];
        assert_eq!(update.get(LEADER), Some("B"));
        assert_eq!(update.get(LOCAL_LEADER), Some(""));
        assert_eq!(update.properties(), Some(&json!({})));
    }

    #[test]
    fn test_becoming_leader() {
        let plan = plan_with(json!(["A", "B"]), default_indexes());
        let actions = diff_plan_local(&plan, &converged_local("B"), "A");
        assert_eq!(kinds(&actions), vec![ActionKind::UpdateCollection]);
        assert_eq!(actions[0].get(LEADER), Some(""));
        assert_eq!(actions[0].get(LOCAL_LEADER), Some("B"));
    }

    #[test]
    fn test_property_change_carries_only_changed_properties() {
        let mut plan = plan_with(json!(["A", "B"]), default_indexes()).root().clone();
        plan["Collections"]["d1"]["c1"]["waitForSync"] = json!(true);
        plan["Collections"]["d1"]["c1"]["replicationFactor"] = json!(3);
        let actions = diff_plan_local(&Topology::new(plan), &converged_local(""), "A");

        assert_eq!(kinds(&actions), vec![ActionKind::UpdateCollection]);
        assert_eq!(actions[0].properties(), Some(&json!({"waitForSync": true})));
        assert_eq!(actions[0].get(LEADER), Some(""));
    }

    #[test]
    fn test_update_and_index_in_same_cycle() {
        let indexes = json!([
            {"id": "7", "type": "hash", "fields": ["a", "b"]},
            {"id": "8", "type": "skiplist", "fields": ["c"]}
        ]);
        let mut plan = plan_with(json!(["A"]), indexes).root().clone();
        plan["Collections"]["d1"]["c1"]["doCompact"] = json!(false);
        let actions = diff_plan_local(&Topology::new(plan), &converged_local(""), "A");

        let mut found = kinds(&actions);
        found.sort();
        assert_eq!(found, vec![ActionKind::UpdateCollection, ActionKind::EnsureIndex]);
        let ensure = actions
            .iter()
            .find(|a| a.kind() == ActionKind::EnsureIndex)
            .unwrap();
        assert_eq!(ensure.get("type"), Some("skiplist"));
    }

    #[test]
    fn test_drop_index_not_in_plan() {
        let plan = plan_with(json!(["A", "B"]), json!([]));
        let actions = diff_plan_local(&plan, &converged_local(""), "A");
        assert_eq!(actions, vec![ActionDescription::drop_index("d1", "s1", "31")]);
    }

    #[test]
    fn test_implicit_indexes_never_managed() {
        let plan = plan_with(
            json!(["A"]),
            json!([
                {"id": "0", "type": "primary", "fields": ["_key"]},
                {"id": "1", "type": "edge", "fields": ["_from"]}
            ]),
        );
        let local = Topology::new(json!({
            "d1": { "s1": {
                "planId": "c1", "leader": "",
                "indexes": [{"id": "5", "type": "edge", "fields": ["_to"]}]
            }}
        }));
        let actions = diff_plan_local(&plan, &local, "A");
        assert!(actions.iter().all(|a| {
            !matches!(a.kind(), ActionKind::EnsureIndex | ActionKind::DropIndex)
        }));
    }

    #[test]
    fn test_drop_unclaimed_shard_and_database() {
        let plan = plan_with(json!(["B", "C"]), default_indexes());
        let mut local = converged_local("").root().clone();
        local["d9"] = json!({});
        local["d1"]["_system_col"] = json!({"leader": ""});
        let actions = diff_plan_local(&plan, &Topology::new(local), "A");

        assert!(actions.contains(&ActionDescription::drop_collection("d1", "s1")));
        assert!(actions.contains(&ActionDescription::drop_database("d9")));
        assert_eq!(actions.len(), 2);
    }

    #[test]
    fn test_resignation_precedes_drop() {
        let plan = plan_with(json!(["_A", "B"]), default_indexes());
        let actions = diff_plan_local(&plan, &converged_local(""), "A");
        assert_eq!(
            actions,
            vec![ActionDescription::resign_shard_leadership("d1", "s1")]
        );

        // Once resigned locally the shard is no longer claimed
        let actions = diff_plan_local(&plan, &converged_local("B"), "A");
        assert_eq!(actions, vec![ActionDescription::drop_collection("d1", "s1")]);
    }

    #[test]
    fn test_ownership_filter() {
        let plan = plan_with(json!(["B", "C"]), default_indexes());
        let mut local = converged_local("").root().clone();
        local["d1"]["s1"]["waitForSync"] = json!(true);
        local["d1"]["s1"]["indexes"]
            .as_array_mut()
            .unwrap()
            .push(json!({"id": "32", "type": "skiplist", "fields": ["z"]}));
        let actions = diff_plan_local(&plan, &Topology::new(local), "A");
        assert_eq!(actions, vec![ActionDescription::drop_collection("d1", "s1")]);
    }

    #[test]
    fn test_dropped_database_is_left_alone() {
        // Collections still lists d1 after Databases lost it
        let plan = Topology::new(json!({
            "Databases": {},
            "Collections": { "d1": { "c1": { "shards": { "s1": ["A"] } } } }
        }));
        let local = Topology::new(json!({ "d1": { "s2": { "leader": "" } } }));
        let actions = diff_plan_local(&plan, &local, "A");
        assert_eq!(actions, vec![ActionDescription::drop_database("d1")]);
    }

    #[test]
    fn test_malformed_shard_is_isolated() {
        let plan = Topology::new(json!({
            "Databases": { "d1": {} },
            "Collections": { "d1": {
                "c1": { "shards": { "s1": "A" } },
                "c2": { "shards": { "s2": ["A"] } }
            }}
        }));
        let local = Topology::new(json!({ "d1": {} }));
        let actions = diff_plan_local(&plan, &local, "A");
        assert_eq!(kinds(&actions), vec![ActionKind::CreateCollection]);
        assert_eq!(actions[0].shard(), Some("s2"));
    }

    #[test]
    fn test_malformed_planned_index_keeps_local_indexes() {
        let plan = plan_with(json!(["A"]), json!([{"id": "7", "fields": ["a"]}]));
        let actions = diff_plan_local(&plan, &converged_local(""), "A");
        assert!(actions.is_empty(), "unexpected actions: {actions:?}");
    }

    #[test]
    fn test_missing_substructure_is_empty() {
        assert!(diff_plan_local(&Topology::empty(), &Topology::empty(), "A").is_empty());
        let plan = Topology::new(json!({"Collections": {"d1": {"c1": {}}}, "Databases": {"d1": {}}}));
        let local = Topology::new(json!({"d1": {}}));
        assert!(diff_plan_local(&plan, &local, "A").is_empty());
    }

    #[test]
    fn test_database_created_once() {
        let plan = plan_with(json!(["A"]), default_indexes());
        let actions = diff_plan_local(&plan, &Topology::empty(), "A");
        assert_eq!(actions.len(), 1);

        let only_collections = Topology::new(json!({
            "Collections": { "d2": { "c1": { "shards": { "s1": ["A"] } } } }
        }));
        let actions = diff_plan_local(&only_collections, &Topology::empty(), "A");
        assert_eq!(actions, vec![ActionDescription::create_database("d2")]);
    }

    #[test]
    fn test_idempotent() {
        let plan = plan_with(json!(["B", "A"]), json!([{"id": "8", "type": "fulltext", "fields": ["t"]}]));
        let mut local = converged_local("").root().clone();
        local["d1"]["s9"] = json!({"leader": ""});
        let local = Topology::new(local);

        let first = canonical(&diff_plan_local(&plan, &local, "A"));
        let second = canonical(&diff_plan_local(&plan, &local, "A"));
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn test_fixed_point() {
        let plan = Topology::new(json!({
            "Databases": { "d1": {}, "d2": {} },
            "Collections": {
                "d1": {
                    "c1": {
                        "id": "100", "name": "c1", "waitForSync": true, "indexBuckets": 8,
                        "indexes": [
                            {"id": "0", "type": "primary", "fields": ["_key"]},
                            {"id": "7", "type": "hash", "fields": ["x"]}
                        ],
                        "shards": { "s1": ["A", "B"], "s2": ["B", "A"], "s3": ["B", "C"] }
                    }
                },
                "d2": {
                    "c2": { "id": "200", "name": "c2", "shards": { "s4": ["A"] } }
                }
            }
        }));
        let mut local = Topology::new(json!({
            "d1": {
                "s1": {
                    "planId": "c1", "leader": "B", "waitForSync": false,
                    "indexes": [{"id": "44", "type": "skiplist", "fields": ["y"]}]
                },
                "s5": { "planId": "c1", "leader": "" }
            },
            "d3": {}
        }));

        // Databases first, then shards once their databases exist
        for _ in 0..3 {
            let actions = diff_plan_local(&plan, &local, "A");
            if actions.is_empty() {
                break;
            }
            local = apply_actions(&local, &actions);
        }

        let remaining = diff_plan_local(&plan, &local, "A");
        assert!(remaining.is_empty(), "not converged: {remaining:?}");
        assert!(local.has_key(&["d2", "s4"]));
        assert!(!local.has_key(&["d1", "s3"]));
        assert!(!local.has_key(&["d3"]));
    }
}
