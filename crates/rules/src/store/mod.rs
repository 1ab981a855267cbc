//! Rule store collaborators.
//!
//! [`RuleStore`] is the read side the resolver, pipeline and aggregator
//! depend on. [`RuleAdmin`] carries the administrative mutations. Both are
//! implemented by [`MemoryStore`] here and by the PostgreSQL store in the
//! server crate.

mod memory;

use async_trait::async_trait;
use vee_core::config::REPORT_TOTAL_KEY;

use crate::schema::{
    GroupId, HeadGroup, HeadGroupKey, NewHeadGroup, NewRule, NewRuleGroup, Rule, RuleGroup,
    RuleGroupRef, RuleId,
};

pub use memory::MemoryStore;

// ── Error type ───────────────────────────────────────────────────────

/// Errors from rule store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("{entity} already exists: {name}")]
    Duplicate { entity: &'static str, name: String },

    #[error("invalid {entity} name '{name}': {reason}")]
    InvalidName {
        entity: &'static str,
        name: String,
        reason: String,
    },

    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, key: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn duplicate(entity: &'static str, name: impl Into<String>) -> Self {
        Self::Duplicate {
            entity,
            name: name.into(),
        }
    }

    /// Map to an HTTP status code for API responses.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Duplicate { .. } => 409,
            Self::InvalidName { .. } => 400,
            Self::Backend(_) => 500,
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Rule group names key the grouped report, so the batch-size key is taken.
pub fn check_group_name(name: &str) -> StoreResult<()> {
    if name == REPORT_TOTAL_KEY {
        return Err(StoreError::InvalidName {
            entity: "rule group",
            name: name.to_string(),
            reason: format!("'{REPORT_TOTAL_KEY}' is reserved by the validation report"),
        });
    }
    Ok(())
}

// ── Read side ────────────────────────────────────────────────────────

/// Key-based lookups the validation pipeline needs.
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Rules with the given ids, in id order. Unknown ids are omitted.
    async fn rules_by_ids(&self, ids: &[RuleId]) -> StoreResult<Vec<Rule>>;

    /// First head group registered for the key, if any.
    async fn head_group_id(&self, key: &HeadGroupKey) -> StoreResult<Option<GroupId>>;

    async fn rule_groups_for_head_group(&self, head_group_id: GroupId)
        -> StoreResult<Vec<GroupId>>;

    async fn rules_for_rule_group(&self, rule_group_id: GroupId) -> StoreResult<Vec<RuleId>>;

    async fn direct_rules_for_head_group(&self, head_group_id: GroupId)
        -> StoreResult<Vec<RuleId>>;

    /// Every group the rule belongs to, in group id order.
    async fn groups_for_rule(&self, rule_id: RuleId) -> StoreResult<Vec<RuleGroupRef>>;
}

// ── Administration ───────────────────────────────────────────────────

/// Administrative CRUD over rules, groups and their mappings.
///
/// Name-based mapping operations validate every name before mutating, so a
/// single unknown name leaves the mappings untouched.
#[async_trait]
pub trait RuleAdmin: Send + Sync {
    /// Rejects a rule with the same name and condition parameters as an existing one.
    async fn create_rule(&self, rule: NewRule) -> StoreResult<Rule>;
    async fn list_rules(&self) -> StoreResult<Vec<Rule>>;
    /// `NotFound` when no name matches.
    async fn rules_by_names(&self, names: &[String]) -> StoreResult<Vec<Rule>>;
    /// Removes the rule and its condition; group mappings are left in place.
    async fn delete_rule(&self, name: &str) -> StoreResult<()>;
    /// Returns the number of rules whose flag was written.
    async fn set_rules_active(&self, names: &[String], active: bool) -> StoreResult<u64>;

    async fn create_group(&self, group: NewRuleGroup) -> StoreResult<RuleGroup>;
    async fn list_groups(&self) -> StoreResult<Vec<RuleGroup>>;
    async fn delete_group(&self, name: &str) -> StoreResult<()>;
    async fn add_rules_to_group(&self, group: &str, rules: &[String]) -> StoreResult<()>;
    async fn remove_rules_from_group(&self, group: &str, rules: &[String]) -> StoreResult<()>;

    async fn create_head_group(&self, group: NewHeadGroup) -> StoreResult<HeadGroup>;
    async fn list_head_groups(&self) -> StoreResult<Vec<HeadGroup>>;
    async fn delete_head_group(&self, name: &str) -> StoreResult<()>;
    async fn add_rules_to_head_group(&self, head_group: &str, rules: &[String])
        -> StoreResult<()>;
    async fn remove_rules_from_head_group(
        &self,
        head_group: &str,
        rules: &[String],
    ) -> StoreResult<()>;
    async fn add_groups_to_head_group(&self, head_group: &str, groups: &[String])
        -> StoreResult<()>;
    async fn remove_groups_from_head_group(
        &self,
        head_group: &str,
        groups: &[String],
    ) -> StoreResult<()>;
}

/// A store usable both for validation and administration.
pub trait Store: RuleStore + RuleAdmin {
    /// The read side, for handing to the pipeline.
    fn as_rule_store(&self) -> &dyn RuleStore;
}

impl<T: RuleStore + RuleAdmin> Store for T {
    fn as_rule_store(&self) -> &dyn RuleStore {
        self
    }
}
