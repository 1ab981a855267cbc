//! Validation rule: a named, activatable wrapper around one condition.

use serde::{Deserialize, Serialize};

use super::condition::Condition;

pub type RuleId = i64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub condition: Condition,
}

impl Rule {
    /// Human-readable line appended to a record's anomaly text on violation.
    pub fn failure_description(&self) -> String {
        format!("Rule {}: {} - {}", self.id, self.name, self.description)
    }
}

/// Request body for creating a rule. New rules start active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRule {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub condition: Condition,
}

pub(crate) fn default_true() -> bool {
    true
}
