//! Validation pipeline: head group → rules → evaluation → grouped report.
//!
//! Store lookups all happen before the first record is evaluated, so any
//! store failure abandons the batch without partial results.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{info, warn};
use vee_core::config::EngineConfig;
use vee_core::{CoreError, ReadingTable};

use crate::aggregator::{AggregationOptions, GroupAggregator, GroupReport, RuleGroupIndex};
use crate::evaluator::{
    Evaluation, EvaluationError, EvaluationOptions, RuleEvaluator, SkippedRule,
};
use crate::profile::{ProcessingStrategy, StrategyTable};
use crate::resolver::{HierarchyResolver, ResolvedRuleSet};
use crate::schema::{HeadGroupKey, Rule};
use crate::store::{RuleStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    #[error(transparent)]
    Table(#[from] CoreError),

    #[error("unsupported meter/load combination: {meter_type}/{load_type}")]
    UnsupportedProfile {
        meter_type: String,
        load_type: String,
    },
}

impl PipelineError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Store(e) => e.status_code(),
            Self::Evaluation(_) => 500,
            Self::Table(_) | Self::UnsupportedProfile { .. } => 400,
        }
    }
}

/// Everything one batch produced.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationOutcome {
    pub head_group: HeadGroupKey,
    pub resolved: ResolvedRuleSet,
    pub evaluation: Evaluation,
    pub report: GroupReport,
}

impl ValidationOutcome {
    /// The report together with every anomalous record and the skipped rules.
    pub fn into_detailed(self) -> DetailedReport {
        let records = self
            .evaluation
            .records
            .iter()
            .filter(|r| r.is_anomalous())
            .map(|r| AnomalousRecord {
                row: r.row,
                key: r.key.clone(),
                anomaly: r.anomaly_text(),
            })
            .collect();
        DetailedReport {
            report: self.report,
            records,
            skipped_rules: self.evaluation.skipped_rules,
        }
    }
}

/// A record that violated at least one rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnomalousRecord {
    pub row: usize,
    pub key: String,
    /// Failure descriptions, one per line.
    pub anomaly: String,
}

/// `{report, records, skipped_rules}`, the detailed rendering of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetailedReport {
    pub report: GroupReport,
    pub records: Vec<AnomalousRecord>,
    pub skipped_rules: Vec<SkippedRule>,
}

#[derive(Debug, Clone)]
pub struct ValidationPipeline {
    strategies: StrategyTable,
    evaluation: EvaluationOptions,
    aggregation: AggregationOptions,
}

impl ValidationPipeline {
    pub fn new(
        strategies: StrategyTable,
        evaluation: EvaluationOptions,
        aggregation: AggregationOptions,
    ) -> Self {
        Self {
            strategies,
            evaluation,
            aggregation,
        }
    }

    /// Standard strategy table plus engine settings from configuration.
    pub fn from_config(engine: &EngineConfig) -> Self {
        Self::new(
            StrategyTable::standard(&engine.record_key_field),
            EvaluationOptions {
                record_key_field: engine.record_key_field.clone(),
                parallel: engine.parallel,
            },
            AggregationOptions {
                ungrouped_bucket: engine.ungrouped_bucket.clone(),
            },
        )
    }

    pub fn strategies(&self) -> &StrategyTable {
        &self.strategies
    }

    /// Find the strategy for client-supplied meter and load types.
    pub fn strategy(
        &self,
        meter_type: &str,
        load_type: &str,
    ) -> Result<&ProcessingStrategy, PipelineError> {
        self.strategies
            .lookup(meter_type, load_type)
            .ok_or_else(|| PipelineError::UnsupportedProfile {
                meter_type: meter_type.to_string(),
                load_type: load_type.to_string(),
            })
    }

    /// Validate a batch for a meter/load profile.
    pub async fn run_for_profile(
        &self,
        store: &dyn RuleStore,
        meter_type: &str,
        load_type: &str,
        table: &ReadingTable,
    ) -> Result<ValidationOutcome, PipelineError> {
        let strategy = self.strategy(meter_type, load_type)?;
        let options = EvaluationOptions {
            record_key_field: strategy.record_key_field.clone(),
            parallel: self.evaluation.parallel,
        };
        self.execute(store, &strategy.head_group, &options, table).await
    }

    /// Validate a batch against the rules of a head group.
    pub async fn run(
        &self,
        store: &dyn RuleStore,
        key: &HeadGroupKey,
        table: &ReadingTable,
    ) -> Result<ValidationOutcome, PipelineError> {
        self.execute(store, key, &self.evaluation, table).await
    }

    async fn execute(
        &self,
        store: &dyn RuleStore,
        key: &HeadGroupKey,
        options: &EvaluationOptions,
        table: &ReadingTable,
    ) -> Result<ValidationOutcome, PipelineError> {
        let resolved = HierarchyResolver::resolve(store, key).await?;
        let rules = fetch_rules(store, &resolved).await?;

        let evaluation = RuleEvaluator::evaluate(table, &rules, options)?;

        let index = RuleGroupIndex::load(store, &evaluation.failing_rules()).await?;
        let report = GroupAggregator::aggregate(&evaluation, &index, &self.aggregation);

        info!(
            head_group = %key,
            records = report.total_size,
            groups = report.groups.len(),
            "validation complete"
        );
        Ok(ValidationOutcome {
            head_group: key.clone(),
            resolved,
            evaluation,
            report,
        })
    }
}

/// Rules of a resolved set in resolution order; stale ids are skipped.
async fn fetch_rules(
    store: &dyn RuleStore,
    resolved: &ResolvedRuleSet,
) -> Result<Vec<Rule>, StoreError> {
    let mut by_id: HashMap<_, _> = store
        .rules_by_ids(&resolved.rule_ids)
        .await?
        .into_iter()
        .map(|r| (r.id, r))
        .collect();

    let mut rules = Vec::with_capacity(resolved.rule_ids.len());
    for id in &resolved.rule_ids {
        match by_id.remove(id) {
            Some(rule) => rules.push(rule),
            None => warn!(rule_id = id, "mapped rule no longer exists, skipped"),
        }
    }
    Ok(rules)
}
