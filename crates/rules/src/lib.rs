//! Validation, estimation and editing (VEE) rule engine for meter readings.
//!
//! This crate provides:
//! - Rule, rule group and head group schema types
//! - Store traits with an in-memory implementation and a YAML catalog loader
//! - Head-group hierarchy resolution
//! - Batch evaluation of threshold conditions over reading tables
//! - Grouped failure reports keyed by rule group
//! - A meter/load strategy table and the end-to-end validation pipeline

pub mod aggregator;
pub mod catalog;
pub mod evaluator;
pub mod pipeline;
pub mod profile;
pub mod resolver;
pub mod schema;
pub mod store;

pub use aggregator::{AggregationOptions, GroupAggregator, GroupReport, RuleGroupIndex};
pub use evaluator::{Evaluation, EvaluationError, EvaluationOptions, RuleEvaluator};
pub use pipeline::{
    AnomalousRecord, DetailedReport, PipelineError, ValidationOutcome, ValidationPipeline,
};
pub use profile::{LoadType, MeterType, ProcessingStrategy, StrategyTable};
pub use resolver::{HierarchyResolver, ResolvedRuleSet};
pub use store::{MemoryStore, RuleAdmin, RuleStore, Store, StoreError};
