//! Batch evaluation engine.
//!
//! Applies a rule list to every record of a [`ReadingTable`]:
//! - rules run in the order supplied; each record collects its violations
//!   in that same order
//! - every record gets an outcome, even with zero violations
//! - thresholds are parsed once per batch, before any record is touched;
//!   a bad threshold aborts the whole batch
//! - a rule whose field is not a column of the table is skipped for the batch
//! - unsupported operators and inactive rules never produce violations
//!
//! Evaluation is a pure function of (table, rules); the optional parallel
//! path produces byte-identical output.

mod operators;

use rayon::prelude::*;
use serde::Serialize;
use tracing::info;
use vee_core::ReadingTable;

use crate::schema::{Rule, RuleId};

pub use operators::parse_threshold;
use operators::{compile, CompiledRule};

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error("rule {rule_id} has a non-numeric threshold: {value:?}")]
    InvalidThreshold { rule_id: RuleId, value: String },
}

// ── Results ─────────────────────────────────────────────────────────

/// One violated rule on one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleFailure {
    pub rule_id: RuleId,
    pub description: String,
}

/// Evaluation result for a single record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordOutcome {
    /// 0-based position in the input table.
    pub row: usize,
    /// Identifier used in grouped reports.
    pub key: String,
    pub failures: Vec<RuleFailure>,
}

impl RecordOutcome {
    pub fn is_anomalous(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Failure descriptions joined by newlines, empty when the record passed.
    pub fn anomaly_text(&self) -> String {
        self.failures
            .iter()
            .map(|f| f.description.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Why a rule did not take part in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    Inactive,
    MissingField(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRule {
    pub rule_id: RuleId,
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// Output of one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Evaluation {
    /// Ids of the rules that were actually applied, in evaluation order.
    pub applied_rules: Vec<RuleId>,
    pub skipped_rules: Vec<SkippedRule>,
    /// One entry per input record, in input order.
    pub records: Vec<RecordOutcome>,
}

impl Evaluation {
    pub fn total_size(&self) -> usize {
        self.records.len()
    }

    pub fn anomalous_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_anomalous()).count()
    }

    /// Applied rules with at least one violation, in evaluation order.
    pub fn failing_rules(&self) -> Vec<RuleId> {
        self.applied_rules
            .iter()
            .copied()
            .filter(|id| {
                self.records
                    .iter()
                    .any(|r| r.failures.iter().any(|f| f.rule_id == *id))
            })
            .collect()
    }
}

// ── Options ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct EvaluationOptions {
    /// Column whose value identifies a record.
    pub record_key_field: String,
    /// Evaluate records on the rayon pool.
    pub parallel: bool,
}

impl Default for EvaluationOptions {
    fn default() -> Self {
        Self {
            record_key_field: "meter_number".to_string(),
            parallel: false,
        }
    }
}

// ── Engine ──────────────────────────────────────────────────────────

pub struct RuleEvaluator;

impl RuleEvaluator {
    /// Evaluate `rules` against every record of `table`.
    pub fn evaluate(
        table: &ReadingTable,
        rules: &[Rule],
        options: &EvaluationOptions,
    ) -> Result<Evaluation, EvaluationError> {
        let (compiled, skipped_rules) = compile(rules, table)?;

        let evaluate_row = |row: usize| RecordOutcome {
            row,
            key: table.record_key(row, &options.record_key_field),
            failures: record_failures(table, row, &compiled),
        };

        let records: Vec<RecordOutcome> = if options.parallel {
            (0..table.len()).into_par_iter().map(evaluate_row).collect()
        } else {
            (0..table.len()).map(evaluate_row).collect()
        };

        let evaluation = Evaluation {
            applied_rules: compiled.iter().map(|c| c.rule.id).collect(),
            skipped_rules,
            records,
        };
        info!(
            records = evaluation.total_size(),
            applied = evaluation.applied_rules.len(),
            skipped = evaluation.skipped_rules.len(),
            anomalous = evaluation.anomalous_count(),
            "batch evaluated"
        );
        Ok(evaluation)
    }
}

fn record_failures(table: &ReadingTable, row: usize, compiled: &[CompiledRule<'_>]) -> Vec<RuleFailure> {
    compiled
        .iter()
        .filter(|c| {
            table
                .numeric(row, &c.rule.condition.field_name)
                .is_some_and(|v| (c.check)(v, c.threshold))
        })
        .map(|c| RuleFailure {
            rule_id: c.rule.id,
            description: c.description.clone(),
        })
        .collect()
}

// ── Tests ───────────────────────────────────────────────────────────
