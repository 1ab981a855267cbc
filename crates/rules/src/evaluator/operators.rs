//! Operator table and per-batch rule compilation.

use tracing::{debug, warn};
use vee_core::ReadingTable;

use super::{EvaluationError, SkipReason, SkippedRule};
use crate::schema::{ConditionType, Rule};

/// Returns `true` when `value` violates the condition at `threshold`.
pub(crate) type ViolationCheck = fn(value: f64, threshold: f64) -> bool;

fn below(value: f64, threshold: f64) -> bool {
    value < threshold
}

fn above(value: f64, threshold: f64) -> bool {
    value > threshold
}

/// Violation check for an operator; `None` for unsupported operators.
pub(crate) fn violation_check(condition_type: &ConditionType) -> Option<ViolationCheck> {
    match condition_type {
        ConditionType::GreaterThanOrEqualTo => Some(below),
        ConditionType::LessThanOrEqualTo => Some(above),
        ConditionType::Unsupported(_) => None,
    }
}

/// Parse a threshold; must be a finite number.
pub fn parse_threshold(rule: &Rule) -> Result<f64, EvaluationError> {
    let raw = rule.condition.value.trim();
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(EvaluationError::InvalidThreshold {
            rule_id: rule.id,
            value: rule.condition.value.clone(),
        }),
    }
}

/// A rule ready to run against every record of one batch.
#[derive(Debug, Clone)]
pub(crate) struct CompiledRule<'a> {
    pub rule: &'a Rule,
    pub threshold: f64,
    pub check: ViolationCheck,
    pub description: String,
}

/// Compile the rule list for a batch, preserving order.
///
/// Every threshold is parsed before any rule is dropped for a missing
/// column, so a misconfigured rule aborts the batch even when its field is
/// absent from this particular upload.
pub(crate) fn compile<'a>(
    rules: &'a [Rule],
    table: &ReadingTable,
) -> Result<(Vec<CompiledRule<'a>>, Vec<SkippedRule>), EvaluationError> {
    let mut candidates = Vec::with_capacity(rules.len());
    let mut skipped = Vec::new();

    for rule in rules {
        if !rule.is_active {
            debug!(rule_id = rule.id, "rule inactive, skipped");
            skipped.push(SkippedRule {
                rule_id: rule.id,
                reason: SkipReason::Inactive,
            });
            continue;
        }
        let Some(check) = violation_check(&rule.condition.condition_type) else {
            debug!(
                rule_id = rule.id,
                condition_type = %rule.condition.condition_type,
                "unsupported condition type, rule is a no-op"
            );
            continue;
        };
        let threshold = parse_threshold(rule)?;
        candidates.push(CompiledRule {
            rule,
            threshold,
            check,
            description: rule.failure_description(),
        });
    }

    let mut compiled = Vec::with_capacity(candidates.len());
    for c in candidates {
        let field = &c.rule.condition.field_name;
        if table.has_column(field) {
            compiled.push(c);
        } else {
            warn!(rule_id = c.rule.id, field = %field, "field not present in readings, rule skipped");
            skipped.push(SkippedRule {
                rule_id: c.rule.id,
                reason: SkipReason::MissingField(field.clone()),
            });
        }
    }

    Ok((compiled, skipped))
}
