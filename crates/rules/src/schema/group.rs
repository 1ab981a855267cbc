//! Rule groups and head groups.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::rule::RuleId;

pub type GroupId = i64;

/// Named collection of rule references, used for report attribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleGroup {
    pub id: GroupId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "rules")]
    pub rule_ids: Vec<RuleId>,
}

/// Lightweight (id, name) pair returned by reverse lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleGroupRef {
    pub id: GroupId,
    pub name: String,
}

/// Top-level rule-set selector for one meter/load combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadGroup {
    pub id: GroupId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub meter_type: String,
    pub load_type: String,
    #[serde(default, alias = "rule_groups")]
    pub rule_group_ids: Vec<GroupId>,
    #[serde(default, alias = "rules")]
    pub rule_ids: Vec<RuleId>,
}

impl HeadGroup {
    pub fn key(&self) -> HeadGroupKey {
        HeadGroupKey::new(self.meter_type.clone(), self.load_type.clone())
    }
}

/// Lookup key of a head group: the stored meter and load type codes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HeadGroupKey {
    pub meter_type: String,
    pub load_type: String,
}

impl HeadGroupKey {
    pub fn new(meter_type: impl Into<String>, load_type: impl Into<String>) -> Self {
        Self {
            meter_type: meter_type.into(),
            load_type: load_type.into(),
        }
    }
}

impl fmt::Display for HeadGroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.meter_type, self.load_type)
    }
}

/// Request body for creating a rule group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRuleGroup {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Request body for creating a head group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewHeadGroup {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub meter_type: String,
    pub load_type: String,
}
