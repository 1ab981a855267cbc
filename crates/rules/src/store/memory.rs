//! In-memory rule store.
//!
//! Holds rules, groups and head groups in `BTreeMap`s behind a tokio
//! `RwLock`, so iteration (and therefore "first match wins" lookups) follows
//! id order. Used by the CLI, by tests, and as the seed target of a YAML
//! [`Catalog`](crate::catalog::Catalog).

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{check_group_name, RuleAdmin, RuleStore, StoreError, StoreResult};
use crate::schema::{
    GroupId, HeadGroup, HeadGroupKey, NewHeadGroup, NewRule, NewRuleGroup, Rule, RuleGroup,
    RuleGroupRef, RuleId,
};

#[derive(Debug, Default)]
struct Inner {
    rules: BTreeMap<RuleId, Rule>,
    groups: BTreeMap<GroupId, RuleGroup>,
    head_groups: BTreeMap<GroupId, HeadGroup>,
    next_rule_id: RuleId,
    next_group_id: GroupId,
    next_head_group_id: GroupId,
}

impl Inner {
    fn rule_id_by_name(&self, name: &str) -> Option<RuleId> {
        self.rules.values().find(|r| r.name == name).map(|r| r.id)
    }

    fn group_id_by_name(&self, name: &str) -> Option<GroupId> {
        self.groups.values().find(|g| g.name == name).map(|g| g.id)
    }

    fn head_group_id_by_name(&self, name: &str) -> Option<GroupId> {
        self.head_groups
            .values()
            .find(|g| g.name == name)
            .map(|g| g.id)
    }

    /// Resolve every rule name or fail on the first unknown one.
    fn rule_ids_for_names(&self, names: &[String]) -> StoreResult<Vec<RuleId>> {
        names
            .iter()
            .map(|n| {
                self.rule_id_by_name(n)
                    .ok_or_else(|| StoreError::not_found("rule", n))
            })
            .collect()
    }

    fn group_ids_for_names(&self, names: &[String]) -> StoreResult<Vec<GroupId>> {
        names
            .iter()
            .map(|n| {
                self.group_id_by_name(n)
                    .ok_or_else(|| StoreError::not_found("rule group", n))
            })
            .collect()
    }
}

/// Thread-safe in-memory implementation of [`RuleStore`] and [`RuleAdmin`].
#[derive(Debug)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::from_parts(Vec::new(), Vec::new(), Vec::new())
    }

    /// Seed a store with pre-built entities. Ids are taken as given; new
    /// entities continue after the highest seeded id.
    pub fn from_parts(rules: Vec<Rule>, groups: Vec<RuleGroup>, head_groups: Vec<HeadGroup>) -> Self {
        let next_rule_id = rules.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        let next_group_id = groups.iter().map(|g| g.id).max().unwrap_or(0) + 1;
        let next_head_group_id = head_groups.iter().map(|g| g.id).max().unwrap_or(0) + 1;

        let inner = Inner {
            rules: rules.into_iter().map(|r| (r.id, r)).collect(),
            groups: groups.into_iter().map(|g| (g.id, g)).collect(),
            head_groups: head_groups.into_iter().map(|g| (g.id, g)).collect(),
            next_rule_id,
            next_group_id,
            next_head_group_id,
        };
        info!(
            rules = inner.rules.len(),
            groups = inner.groups.len(),
            head_groups = inner.head_groups.len(),
            "memory store initialized"
        );
        Self {
            inner: RwLock::new(inner),
        }
    }
}

#[async_trait]
impl RuleStore for MemoryStore {
    async fn rules_by_ids(&self, ids: &[RuleId]) -> StoreResult<Vec<Rule>> {
        let inner = self.inner.read().await;
        Ok(inner
            .rules
            .values()
            .filter(|r| ids.contains(&r.id))
            .cloned()
            .collect())
    }

    async fn head_group_id(&self, key: &HeadGroupKey) -> StoreResult<Option<GroupId>> {
        let inner = self.inner.read().await;
        Ok(inner
            .head_groups
            .values()
            .find(|g| g.meter_type == key.meter_type && g.load_type == key.load_type)
            .map(|g| g.id))
    }

    async fn rule_groups_for_head_group(
        &self,
        head_group_id: GroupId,
    ) -> StoreResult<Vec<GroupId>> {
        let inner = self.inner.read().await;
        Ok(inner
            .head_groups
            .get(&head_group_id)
            .map(|g| g.rule_group_ids.clone())
            .unwrap_or_default())
    }

    async fn rules_for_rule_group(&self, rule_group_id: GroupId) -> StoreResult<Vec<RuleId>> {
        let inner = self.inner.read().await;
        Ok(inner
            .groups
            .get(&rule_group_id)
            .map(|g| g.rule_ids.clone())
            .unwrap_or_default())
    }

    async fn direct_rules_for_head_group(
        &self,
        head_group_id: GroupId,
    ) -> StoreResult<Vec<RuleId>> {
        let inner = self.inner.read().await;
        Ok(inner
            .head_groups
            .get(&head_group_id)
            .map(|g| g.rule_ids.clone())
            .unwrap_or_default())
    }

    async fn groups_for_rule(&self, rule_id: RuleId) -> StoreResult<Vec<RuleGroupRef>> {
        let inner = self.inner.read().await;
        Ok(inner
            .groups
            .values()
            .filter(|g| g.rule_ids.contains(&rule_id))
            .map(|g| RuleGroupRef {
                id: g.id,
                name: g.name.clone(),
            })
            .collect())
    }
}

#[async_trait]
impl RuleAdmin for MemoryStore {
    async fn create_rule(&self, new: NewRule) -> StoreResult<Rule> {
        let mut inner = self.inner.write().await;
        let exists = inner
            .rules
            .values()
            .any(|r| r.name == new.name && r.condition.same_parameters(&new.condition));
        if exists {
            return Err(StoreError::duplicate("rule", new.name));
        }

        let id = inner.next_rule_id;
        inner.next_rule_id += 1;

        let now = Utc::now();
        let mut condition = new.condition;
        condition.created_at = Some(now);
        condition.updated_at = Some(now);

        let rule = Rule {
            id,
            name: new.name,
            description: new.description,
            is_active: true,
            condition,
        };
        inner.rules.insert(id, rule.clone());
        info!(rule_id = id, name = %rule.name, "rule created");
        Ok(rule)
    }

    async fn list_rules(&self) -> StoreResult<Vec<Rule>> {
        let inner = self.inner.read().await;
        Ok(inner.rules.values().cloned().collect())
    }

    async fn rules_by_names(&self, names: &[String]) -> StoreResult<Vec<Rule>> {
        let inner = self.inner.read().await;
        let found: Vec<Rule> = inner
            .rules
            .values()
            .filter(|r| names.contains(&r.name))
            .cloned()
            .collect();
        if found.is_empty() {
            return Err(StoreError::not_found("rule", names.join(", ")));
        }
        Ok(found)
    }

    async fn delete_rule(&self, name: &str) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let before = inner.rules.len();
        inner.rules.retain(|_, r| r.name != name);
        if inner.rules.len() == before {
            return Err(StoreError::not_found("rule", name));
        }
        info!(name, "rule deleted");
        Ok(())
    }

    async fn set_rules_active(&self, names: &[String], active: bool) -> StoreResult<u64> {
        let mut inner = self.inner.write().await;
        let mut touched = 0u64;
        for rule in inner.rules.values_mut().filter(|r| names.contains(&r.name)) {
            rule.is_active = active;
            rule.condition.updated_at = Some(Utc::now());
            touched += 1;
        }
        debug!(touched, active, "rule activation updated");
        Ok(touched)
    }

    async fn create_group(&self, new: NewRuleGroup) -> StoreResult<RuleGroup> {
        check_group_name(&new.name)?;
        let mut inner = self.inner.write().await;
        if inner.group_id_by_name(&new.name).is_some() {
            return Err(StoreError::duplicate("rule group", new.name));
        }
        let id = inner.next_group_id;
        inner.next_group_id += 1;
        let group = RuleGroup {
            id,
            name: new.name,
            description: new.description,
            rule_ids: Vec::new(),
        };
        inner.groups.insert(id, group.clone());
        info!(group_id = id, name = %group.name, "rule group created");
        Ok(group)
    }

    async fn list_groups(&self) -> StoreResult<Vec<RuleGroup>> {
        let inner = self.inner.read().await;
        Ok(inner.groups.values().cloned().collect())
    }

    async fn delete_group(&self, name: &str) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let id = inner
            .group_id_by_name(name)
            .ok_or_else(|| StoreError::not_found("rule group", name))?;
        inner.groups.remove(&id);
        for hg in inner.head_groups.values_mut() {
            hg.rule_group_ids.retain(|g| *g != id);
        }
        info!(group_id = id, name, "rule group deleted");
        Ok(())
    }

    async fn add_rules_to_group(&self, group: &str, rules: &[String]) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let group_id = inner
            .group_id_by_name(group)
            .ok_or_else(|| StoreError::not_found("rule group", group))?;
        let rule_ids = inner.rule_ids_for_names(rules)?;
        if let Some(g) = inner.groups.get_mut(&group_id) {
            for id in rule_ids {
                if !g.rule_ids.contains(&id) {
                    g.rule_ids.push(id);
                }
            }
        }
        Ok(())
    }

    async fn remove_rules_from_group(&self, group: &str, rules: &[String]) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let group_id = inner
            .group_id_by_name(group)
            .ok_or_else(|| StoreError::not_found("rule group", group))?;
        let rule_ids = inner.rule_ids_for_names(rules)?;
        if let Some(g) = inner.groups.get_mut(&group_id) {
            g.rule_ids.retain(|id| !rule_ids.contains(id));
        }
        Ok(())
    }

    async fn create_head_group(&self, new: NewHeadGroup) -> StoreResult<HeadGroup> {
        let mut inner = self.inner.write().await;
        if inner.head_group_id_by_name(&new.name).is_some() {
            return Err(StoreError::duplicate("head group", new.name));
        }
        let id = inner.next_head_group_id;
        inner.next_head_group_id += 1;
        let head_group = HeadGroup {
            id,
            name: new.name,
            description: new.description,
            meter_type: new.meter_type,
            load_type: new.load_type,
            rule_group_ids: Vec::new(),
            rule_ids: Vec::new(),
        };
        inner.head_groups.insert(id, head_group.clone());
        info!(head_group_id = id, name = %head_group.name, key = %head_group.key(), "head group created");
        Ok(head_group)
    }

    async fn list_head_groups(&self) -> StoreResult<Vec<HeadGroup>> {
        let inner = self.inner.read().await;
        Ok(inner.head_groups.values().cloned().collect())
    }

    async fn delete_head_group(&self, name: &str) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let id = inner
            .head_group_id_by_name(name)
            .ok_or_else(|| StoreError::not_found("head group", name))?;
        inner.head_groups.remove(&id);
        info!(head_group_id = id, name, "head group deleted");
        Ok(())
    }

    async fn add_rules_to_head_group(
        &self,
        head_group: &str,
        rules: &[String],
    ) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let hg_id = inner
            .head_group_id_by_name(head_group)
            .ok_or_else(|| StoreError::not_found("head group", head_group))?;
        let rule_ids = inner.rule_ids_for_names(rules)?;
        if let Some(hg) = inner.head_groups.get_mut(&hg_id) {
            for id in rule_ids {
                if !hg.rule_ids.contains(&id) {
                    hg.rule_ids.push(id);
                }
            }
        }
        Ok(())
    }

    async fn remove_rules_from_head_group(
        &self,
        head_group: &str,
        rules: &[String],
    ) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let hg_id = inner
            .head_group_id_by_name(head_group)
            .ok_or_else(|| StoreError::not_found("head group", head_group))?;
        let rule_ids = inner.rule_ids_for_names(rules)?;
        if let Some(hg) = inner.head_groups.get_mut(&hg_id) {
            hg.rule_ids.retain(|id| !rule_ids.contains(id));
        }
        Ok(())
    }

    async fn add_groups_to_head_group(
        &self,
        head_group: &str,
        groups: &[String],
    ) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let hg_id = inner
            .head_group_id_by_name(head_group)
            .ok_or_else(|| StoreError::not_found("head group", head_group))?;
        let group_ids = inner.group_ids_for_names(groups)?;
        if let Some(hg) = inner.head_groups.get_mut(&hg_id) {
            for id in group_ids {
                if !hg.rule_group_ids.contains(&id) {
                    hg.rule_group_ids.push(id);
                }
            }
        }
        Ok(())
    }

    async fn remove_groups_from_head_group(
        &self,
        head_group: &str,
        groups: &[String],
    ) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let hg_id = inner
            .head_group_id_by_name(head_group)
            .ok_or_else(|| StoreError::not_found("head group", head_group))?;
        let group_ids = inner.group_ids_for_names(groups)?;
        if let Some(hg) = inner.head_groups.get_mut(&hg_id) {
            hg.rule_group_ids.retain(|id| !group_ids.contains(id));
        }
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Condition;

    fn new_rule(name: &str, field: &str, value: &str) -> NewRule {
        NewRule {
            name: name.to_string(),
            description: format!("{name} description"),
            condition: Condition::new(field, "GREATER_THAN_OR_EQUAL_TO", value),
        }
    }

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_create_rule_assigns_ids_and_timestamps() {
        let store = MemoryStore::new();
        let a = store.create_rule(new_rule("a", "import_VAh", "0")).await.unwrap();
        let b = store.create_rule(new_rule("b", "import_Wh", "0")).await.unwrap();
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert!(a.is_active);
        assert!(a.condition.created_at.is_some());
    }

    #[tokio::test]
    async fn test_create_rule_duplicate_requires_same_condition() {
        let store = MemoryStore::new();
        store.create_rule(new_rule("a", "import_VAh", "0")).await.unwrap();

        let err = store
            .create_rule(new_rule("a", "import_VAh", "0"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { .. }));
        assert_eq!(err.status_code(), 409);

        // Same name, different threshold is allowed.
        store.create_rule(new_rule("a", "import_VAh", "5")).await.unwrap();
        assert_eq!(store.list_rules().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_rule_leaves_stale_group_mapping() {
        let store = MemoryStore::new();
        let rule = store.create_rule(new_rule("a", "import_VAh", "0")).await.unwrap();
        store
            .create_group(NewRuleGroup {
                name: "Energy".into(),
                description: String::new(),
            })
            .await
            .unwrap();
        store.add_rules_to_group("Energy", &names(&["a"])).await.unwrap();

        store.delete_rule("a").await.unwrap();
        assert!(store.rules_by_ids(&[rule.id]).await.unwrap().is_empty());

        let group = &store.list_groups().await.unwrap()[0];
        assert_eq!(group.rule_ids, vec![rule.id]);

        let err = store.delete_rule("a").await.unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_add_rules_to_group_is_all_or_nothing() {
        let store = MemoryStore::new();
        store.create_rule(new_rule("a", "import_VAh", "0")).await.unwrap();
        store
            .create_group(NewRuleGroup {
                name: "Energy".into(),
                description: String::new(),
            })
            .await
            .unwrap();

        let err = store
            .add_rules_to_group("Energy", &names(&["a", "missing"]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("missing"));
        assert!(store.list_groups().await.unwrap()[0].rule_ids.is_empty());

        store.add_rules_to_group("Energy", &names(&["a", "a"])).await.unwrap();
        assert_eq!(store.list_groups().await.unwrap()[0].rule_ids, vec![1]);
    }

    #[tokio::test]
    async fn test_group_name_unique() {
        let store = MemoryStore::new();
        let req = NewRuleGroup {
            name: "Energy".into(),
            description: String::new(),
        };
        store.create_group(req.clone()).await.unwrap();
        let err = store.create_group(req).await.unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn test_group_name_total_size_is_reserved() {
        let store = MemoryStore::new();
        let err = store
            .create_group(NewRuleGroup {
                name: "total_size".into(),
                description: String::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidName { .. }));
        assert_eq!(err.status_code(), 400);
        assert!(store.list_groups().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_rules_active_counts_matches() {
        let store = MemoryStore::new();
        store.create_rule(new_rule("a", "import_VAh", "0")).await.unwrap();
        store.create_rule(new_rule("b", "import_Wh", "0")).await.unwrap();

        let n = store
            .set_rules_active(&names(&["a", "nope"]), false)
            .await
            .unwrap();
        assert_eq!(n, 1);
        let rules = store.rules_by_names(&names(&["a"])).await.unwrap();
        assert!(!rules[0].is_active);
    }

    #[tokio::test]
    async fn test_head_group_lookup_and_mappings() {
        let store = MemoryStore::new();
        store.create_rule(new_rule("a", "import_VAh", "0")).await.unwrap();
        store
            .create_group(NewRuleGroup {
                name: "Energy".into(),
                description: String::new(),
            })
            .await
            .unwrap();
        let hg = store
            .create_head_group(NewHeadGroup {
                name: "p1-bl".into(),
                description: String::new(),
                meter_type: "P-1".into(),
                load_type: "BL".into(),
            })
            .await
            .unwrap();

        store
            .add_groups_to_head_group("p1-bl", &names(&["Energy"]))
            .await
            .unwrap();
        store
            .add_rules_to_head_group("p1-bl", &names(&["a"]))
            .await
            .unwrap();

        let key = HeadGroupKey::new("P-1", "BL");
        assert_eq!(store.head_group_id(&key).await.unwrap(), Some(hg.id));
        assert_eq!(store.rule_groups_for_head_group(hg.id).await.unwrap(), vec![1]);
        assert_eq!(store.direct_rules_for_head_group(hg.id).await.unwrap(), vec![1]);

        store.delete_group("Energy").await.unwrap();
        assert!(store.rule_groups_for_head_group(hg.id).await.unwrap().is_empty());

        store
            .remove_rules_from_head_group("p1-bl", &names(&["a"]))
            .await
            .unwrap();
        assert!(store.direct_rules_for_head_group(hg.id).await.unwrap().is_empty());

        store.delete_head_group("p1-bl").await.unwrap();
        assert_eq!(store.head_group_id(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_groups_for_rule_lists_every_owner() {
        let store = MemoryStore::new();
        store.create_rule(new_rule("a", "import_VAh", "0")).await.unwrap();
        for name in ["Energy", "Sanity"] {
            store
                .create_group(NewRuleGroup {
                    name: name.into(),
                    description: String::new(),
                })
                .await
                .unwrap();
            store.add_rules_to_group(name, &names(&["a"])).await.unwrap();
        }
        let owners: Vec<String> = store
            .groups_for_rule(1)
            .await
            .unwrap()
            .into_iter()
            .map(|g| g.name)
            .collect();
        assert_eq!(owners, vec!["Energy", "Sanity"]);
    }
}
