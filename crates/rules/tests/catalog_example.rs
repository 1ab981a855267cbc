//! Integration tests that run the bundled example catalog in
//! `data/catalog/example.yml` through the validation pipeline.

use serde_json::json;
use vee_core::config::EngineConfig;
use vee_core::ReadingTable;
use vee_rules::catalog::Catalog;
use vee_rules::evaluator::SkipReason;
use vee_rules::{MemoryStore, PipelineError, RuleAdmin, ValidationPipeline};

/// Integration tests run from the crate directory, so we go up two levels.
fn catalog_path() -> std::path::PathBuf {
    let manifest = std::path::Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest.join("../../data/catalog/example.yml")
}

fn load_store() -> MemoryStore {
    Catalog::load(&catalog_path())
        .unwrap_or_else(|e| panic!("Failed to load {}: {}", catalog_path().display(), e))
        .into_store()
}

fn readings() -> ReadingTable {
    ReadingTable::from_json_value(json!([
        {"meter_number": "SP-001", "import_VAh": 120.5, "export_VAh": 0, "voltage": 231, "power_factor": 0.98},
        {"meter_number": "SP-002", "import_VAh": -3, "export_VAh": 0, "voltage": 285, "power_factor": 0.91},
        {"meter_number": "SP-003", "import_VAh": 40, "export_VAh": -1, "voltage": 175, "power_factor": 1.2},
        {"meter_number": "SP-004", "import_VAh": "n/a", "export_VAh": 2, "voltage": 240, "power_factor": 0.99}
    ]))
    .unwrap()
}

#[test]
fn example_catalog_parses() {
    let catalog = Catalog::load(&catalog_path()).unwrap();
    assert_eq!(catalog.rules.len(), 6);
    assert_eq!(catalog.rule_groups.len(), 2);
    assert_eq!(catalog.head_groups.len(), 2);
    assert!(!catalog.rules[5].is_active);
    assert_eq!(catalog.head_groups[0].rule_group_ids, vec![1, 2]);
    assert_eq!(catalog.head_groups[0].rule_ids, vec![5]);
}

#[tokio::test]
async fn single_phase_block_load_report() {
    let store = load_store();
    let outcome = ValidationPipeline::from_config(&EngineConfig::default())
        .run_for_profile(&store, "Phase-1", "Block Load", &readings())
        .await
        .unwrap();

    assert_eq!(outcome.resolved.rule_ids, vec![1, 2, 3, 4, 5]);
    assert_eq!(
        serde_json::to_value(&outcome.report).unwrap(),
        json!({
            "Energy": ["SP-002", "SP-003"],
            "Voltage": ["SP-002", "SP-003"],
            "total_size": 4
        })
    );

    // Rule 5 is mapped directly onto the head group, so it only shows up
    // in the per-record detail.
    let sp003 = &outcome.evaluation.records[2];
    assert_eq!(
        sp003.anomaly_text(),
        "Rule 2: ExportVAhCheck - no negative export\n\
         Rule 4: VoltageLowerBound - voltage below 180 V\n\
         Rule 5: PowerFactorCeiling - power factor above unity"
    );
    assert!(!outcome.evaluation.records[3].is_anomalous());
}

#[tokio::test]
async fn ungrouped_bucket_collects_direct_rules() {
    let store = load_store();
    let engine = EngineConfig {
        ungrouped_bucket: Some("Ungrouped".into()),
        ..EngineConfig::default()
    };
    let outcome = ValidationPipeline::from_config(&engine)
        .run_for_profile(&store, "P-1", "BL", &readings())
        .await
        .unwrap();
    assert_eq!(outcome.report.failing_records("Ungrouped"), ["SP-003"]);
}

#[tokio::test]
async fn inactive_direct_rule_is_skipped() {
    let store = load_store();
    let outcome = ValidationPipeline::from_config(&EngineConfig::default())
        .run_for_profile(&store, "3-Phase", "Instantaneous Profile", &readings())
        .await
        .unwrap();

    assert_eq!(outcome.evaluation.applied_rules, vec![3, 4]);
    assert_eq!(outcome.evaluation.skipped_rules.len(), 1);
    assert_eq!(outcome.evaluation.skipped_rules[0].rule_id, 6);
    assert_eq!(outcome.evaluation.skipped_rules[0].reason, SkipReason::Inactive);
}

#[tokio::test]
async fn reactivated_rule_takes_part() {
    let store = load_store();
    store
        .set_rules_active(&["LegacyCurrentCheck".to_string()], true)
        .await
        .unwrap();

    let table = ReadingTable::from_json_value(json!([
        {"meter_number": "TP-1", "voltage": 230, "current": 75}
    ]))
    .unwrap();
    let outcome = ValidationPipeline::from_config(&EngineConfig::default())
        .run_for_profile(&store, "P-3", "IP", &table)
        .await
        .unwrap();
    assert!(outcome.evaluation.skipped_rules.is_empty());
    assert_eq!(
        outcome.evaluation.records[0].anomaly_text(),
        "Rule 6: LegacyCurrentCheck - retired current limit"
    );
}

#[tokio::test]
async fn profile_without_head_group_is_not_found() {
    let store = load_store();
    let err = ValidationPipeline::from_config(&EngineConfig::default())
        .run_for_profile(&store, "LT_HTCT", "BL", &readings())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Store(_)));
    assert_eq!(err.status_code(), 404);
}
