//! Grouped failure report.
//!
//! Re-keys per-record failures by the rule group owning each violated rule.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use vee_core::config::REPORT_TOTAL_KEY;

use crate::evaluator::Evaluation;
use crate::schema::{RuleGroupRef, RuleId};
use crate::store::{RuleStore, StoreResult};

/// Reverse lookup from rule id to every group that owns it.
#[derive(Debug, Clone, Default)]
pub struct RuleGroupIndex {
    owners: HashMap<RuleId, Vec<RuleGroupRef>>,
}

impl RuleGroupIndex {
    /// Fetch group memberships for `rule_ids` from the store.
    pub async fn load(store: &dyn RuleStore, rule_ids: &[RuleId]) -> StoreResult<Self> {
        let mut owners = HashMap::with_capacity(rule_ids.len());
        for &rule_id in rule_ids {
            let groups = store.groups_for_rule(rule_id).await?;
            debug!(rule_id, groups = groups.len(), "rule group memberships");
            owners.insert(rule_id, groups);
        }
        Ok(Self { owners })
    }

    pub fn insert(&mut self, rule_id: RuleId, group: RuleGroupRef) {
        self.owners.entry(rule_id).or_default().push(group);
    }

    pub fn groups_for(&self, rule_id: RuleId) -> &[RuleGroupRef] {
        self.owners.get(&rule_id).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Failing record keys by group name, plus the batch size.
///
/// Serializes flat: `{"Energy": ["m1", "m3"], "total_size": 3}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupReport {
    #[serde(flatten)]
    pub groups: IndexMap<String, Vec<String>>,
    pub total_size: usize,
}

impl GroupReport {
    pub fn failing_records(&self, group: &str) -> &[String] {
        self.groups.get(group).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default)]
pub struct AggregationOptions {
    /// Report rules without an owning group under this name instead of
    /// dropping them.
    pub ungrouped_bucket: Option<String>,
}

pub struct GroupAggregator;

impl GroupAggregator {
    /// Build the grouped report.
    ///
    /// Rules are visited in evaluation order and records in table order. A
    /// record is listed once per (violated rule, owning group) pair, so a
    /// record failing two rules of the same group appears twice.
    pub fn aggregate(
        evaluation: &Evaluation,
        index: &RuleGroupIndex,
        options: &AggregationOptions,
    ) -> GroupReport {
        let mut groups: IndexMap<String, Vec<String>> = IndexMap::new();

        for rule_id in evaluation.failing_rules() {
            let owners: Vec<&str> = match index.groups_for(rule_id) {
                [] => match &options.ungrouped_bucket {
                    Some(bucket) => vec![bucket.as_str()],
                    None => {
                        warn!(rule_id, "violated rule has no rule group, excluded from report");
                        continue;
                    }
                },
                refs => refs.iter().map(|g| g.name.as_str()).collect(),
            };

            let keys: Vec<&str> = evaluation
                .records
                .iter()
                .filter(|r| r.failures.iter().any(|f| f.rule_id == rule_id))
                .map(|r| r.key.as_str())
                .collect();

            for owner in owners {
                // Rejected on every write path; rows inserted behind the store's back land here.
                if owner == REPORT_TOTAL_KEY {
                    warn!(rule_id, group = owner, "group name collides with the report total, skipped");
                    continue;
                }
                groups
                    .entry(owner.to_string())
                    .or_default()
                    .extend(keys.iter().map(|k| k.to_string()));
            }
        }

        GroupReport {
            groups,
            total_size: evaluation.total_size(),
        }
    }
}
