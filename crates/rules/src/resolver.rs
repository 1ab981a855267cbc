//! Head-group hierarchy resolution.
//!
//! Flattens a head group into the set of rule ids that apply to it: members
//! of every referenced rule group followed by the directly mapped rules,
//! deduplicated in first-seen order.

use indexmap::IndexSet;
use serde::Serialize;
use tracing::{debug, info};

use crate::schema::{GroupId, HeadGroupKey, RuleId};
use crate::store::{RuleStore, StoreError};

/// Result of resolving a head group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedRuleSet {
    pub head_group_id: GroupId,
    /// Duplicate-free, in first-seen order.
    pub rule_ids: Vec<RuleId>,
}

impl ResolvedRuleSet {
    pub fn is_empty(&self) -> bool {
        self.rule_ids.is_empty()
    }
}

pub struct HierarchyResolver;

impl HierarchyResolver {
    /// Resolve the rules applying to `key`.
    ///
    /// A missing head group is `NotFound`; an empty result is not an error.
    pub async fn resolve(
        store: &dyn RuleStore,
        key: &HeadGroupKey,
    ) -> Result<ResolvedRuleSet, StoreError> {
        let head_group_id = store
            .head_group_id(key)
            .await?
            .ok_or_else(|| StoreError::not_found("head group", key))?;

        let group_ids = store.rule_groups_for_head_group(head_group_id).await?;
        let mut group_members = Vec::with_capacity(group_ids.len());
        for group_id in &group_ids {
            let members = store.rules_for_rule_group(*group_id).await?;
            debug!(group_id, members = members.len(), "rule group members");
            group_members.push(members);
        }
        let direct = store.direct_rules_for_head_group(head_group_id).await?;

        let rule_ids = flatten(&group_members, &direct);
        info!(
            head_group = %key,
            head_group_id,
            groups = group_ids.len(),
            direct = direct.len(),
            rules = rule_ids.len(),
            "head group resolved"
        );
        Ok(ResolvedRuleSet {
            head_group_id,
            rule_ids,
        })
    }
}

/// Union of group members and direct rules, first occurrence wins.
pub fn flatten(group_members: &[Vec<RuleId>], direct: &[RuleId]) -> Vec<RuleId> {
    let mut seen = IndexSet::new();
    for id in group_members.iter().flatten().chain(direct) {
        seen.insert(*id);
    }
    seen.into_iter().collect()
}
