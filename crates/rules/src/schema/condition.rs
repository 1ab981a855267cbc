//! Single field/operator/threshold predicate owned by a rule.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparison operator of a condition.
///
/// The name states the *passing* direction: a `GreaterThanOrEqualTo`
/// condition is violated by values strictly below the threshold.
/// Unknown operator strings are preserved verbatim so they round-trip
/// through the store; the engine treats them as no-ops.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConditionType {
    LessThanOrEqualTo,
    GreaterThanOrEqualTo,
    Unsupported(String),
}

impl ConditionType {
    pub fn as_str(&self) -> &str {
        match self {
            ConditionType::LessThanOrEqualTo => "LESS_THAN_OR_EQUAL_TO",
            ConditionType::GreaterThanOrEqualTo => "GREATER_THAN_OR_EQUAL_TO",
            ConditionType::Unsupported(raw) => raw,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, ConditionType::Unsupported(_))
    }
}

impl From<&str> for ConditionType {
    fn from(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("LESS_THAN_OR_EQUAL_TO") {
            ConditionType::LessThanOrEqualTo
        } else if trimmed.eq_ignore_ascii_case("GREATER_THAN_OR_EQUAL_TO") {
            ConditionType::GreaterThanOrEqualTo
        } else {
            ConditionType::Unsupported(raw.to_string())
        }
    }
}

impl From<String> for ConditionType {
    fn from(raw: String) -> Self {
        ConditionType::from(raw.as_str())
    }
}

impl From<ConditionType> for String {
    fn from(ct: ConditionType) -> Self {
        match ct {
            ConditionType::Unsupported(raw) => raw,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A comparison predicate. `value` stays textual in storage and is parsed
/// once per evaluation batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field_name: String,
    pub condition_type: ConditionType,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Condition {
    pub fn new(
        field_name: impl Into<String>,
        condition_type: impl Into<ConditionType>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            condition_type: condition_type.into(),
            value: value.into(),
            created_at: None,
            updated_at: None,
        }
    }

    /// Same field, operator and threshold text (timestamps ignored).
    pub fn same_parameters(&self, other: &Condition) -> bool {
        self.field_name == other.field_name
            && self.condition_type == other.condition_type
            && self.value == other.value
    }
}
