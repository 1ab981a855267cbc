//! Behavioural properties of resolution, evaluation and aggregation.

use serde_json::{json, Value};
use vee_core::ReadingTable;
use vee_rules::schema::{Condition, HeadGroup, HeadGroupKey, Rule, RuleGroup};
use vee_rules::{
    AggregationOptions, EvaluationOptions, GroupAggregator, HierarchyResolver, MemoryStore,
    RuleEvaluator, RuleGroupIndex,
};

fn rule(id: i64, name: &str, description: &str, field: &str, op: &str, value: &str) -> Rule {
    Rule {
        id,
        name: name.to_string(),
        description: description.to_string(),
        is_active: true,
        condition: Condition::new(field, op, value),
    }
}

fn table(rows: Value) -> ReadingTable {
    ReadingTable::from_json_value(rows).unwrap()
}

fn mixed_rules() -> Vec<Rule> {
    vec![
        rule(1, "ImportVAhCheck", "no negative import", "import_VAh", "GREATER_THAN_OR_EQUAL_TO", "0"),
        rule(2, "VoltageCap", "voltage above 250", "voltage", "LESS_THAN_OR_EQUAL_TO", "250"),
        rule(3, "VoltageFloor", "voltage below 200", "voltage", "GREATER_THAN_OR_EQUAL_TO", "200"),
        rule(4, "Missing", "field not uploaded", "frequency", "LESS_THAN_OR_EQUAL_TO", "51"),
    ]
}

fn mixed_table() -> ReadingTable {
    table(json!([
        {"meter_number": "a", "import_VAh": -1, "voltage": 260},
        {"meter_number": "b", "import_VAh": 3, "voltage": 230},
        {"meter_number": "c", "import_VAh": 0, "voltage": 190},
        {"meter_number": "d", "import_VAh": "-0.5", "voltage": null}
    ]))
}

#[test]
fn end_to_end_energy_scenario() {
    let t = table(json!([
        {"meter_number": "r1", "import_VAh": -5},
        {"meter_number": "r2", "import_VAh": 10},
        {"meter_number": "r3", "import_VAh": -1}
    ]));
    let rules = vec![rule(
        1,
        "ImportVAhCheck",
        "no negative import",
        "import_VAh",
        "GREATER_THAN_OR_EQUAL_TO",
        "0",
    )];
    let eval = RuleEvaluator::evaluate(&t, &rules, &EvaluationOptions::default()).unwrap();

    let texts: Vec<String> = eval.records.iter().map(|r| r.anomaly_text()).collect();
    assert_eq!(
        texts,
        vec![
            "Rule 1: ImportVAhCheck - no negative import".to_string(),
            String::new(),
            "Rule 1: ImportVAhCheck - no negative import".to_string(),
        ]
    );

    let mut index = RuleGroupIndex::default();
    index.insert(
        1,
        vee_rules::schema::RuleGroupRef {
            id: 1,
            name: "Energy".into(),
        },
    );
    let report = GroupAggregator::aggregate(&eval, &index, &AggregationOptions::default());
    assert_eq!(
        serde_json::to_value(&report).unwrap(),
        json!({"Energy": ["r1", "r3"], "total_size": 3})
    );
}

#[test]
fn evaluation_is_idempotent() {
    let t = mixed_table();
    let rules = mixed_rules();
    let first = RuleEvaluator::evaluate(&t, &rules, &EvaluationOptions::default()).unwrap();
    let second = RuleEvaluator::evaluate(&t, &rules, &EvaluationOptions::default()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn parallel_matches_sequential() {
    let rows: Vec<Value> = (0..500)
        .map(|i| json!({"meter_number": format!("m{i}"), "import_VAh": (i % 7) - 3, "voltage": 150 + i % 150}))
        .collect();
    let t = table(Value::Array(rows));
    let rules = mixed_rules();

    let sequential = RuleEvaluator::evaluate(&t, &rules, &EvaluationOptions::default()).unwrap();
    let parallel = RuleEvaluator::evaluate(
        &t,
        &rules,
        &EvaluationOptions {
            parallel: true,
            ..EvaluationOptions::default()
        },
    )
    .unwrap();
    assert_eq!(sequential, parallel);
}

#[test]
fn every_record_receives_an_entry() {
    let t = mixed_table();
    let eval = RuleEvaluator::evaluate(&t, &mixed_rules(), &EvaluationOptions::default()).unwrap();
    assert_eq!(eval.records.len(), t.len());
    let rows: Vec<usize> = eval.records.iter().map(|r| r.row).collect();
    assert_eq!(rows, vec![0, 1, 2, 3]);
}

#[test]
fn permuting_rules_only_reorders_descriptions() {
    let t = mixed_table();
    let forward = mixed_rules();
    let mut reversed = mixed_rules();
    reversed.reverse();

    let a = RuleEvaluator::evaluate(&t, &forward, &EvaluationOptions::default()).unwrap();
    let b = RuleEvaluator::evaluate(&t, &reversed, &EvaluationOptions::default()).unwrap();

    for (ra, rb) in a.records.iter().zip(&b.records) {
        let mut ids_a: Vec<i64> = ra.failures.iter().map(|f| f.rule_id).collect();
        let mut ids_b: Vec<i64> = rb.failures.iter().map(|f| f.rule_id).collect();
        ids_b.reverse();
        assert_eq!(ids_a, ids_b);
        ids_a.sort_unstable();
        ids_b.sort_unstable();
        assert_eq!(ids_a, ids_b);
    }
    assert_eq!(a.records[0].failures.len(), 2);
    assert!(b.records[0].anomaly_text().starts_with("Rule 2: VoltageCap"));
}

#[test]
fn missing_field_does_not_abort_batch() {
    let t = mixed_table();
    let eval = RuleEvaluator::evaluate(&t, &mixed_rules(), &EvaluationOptions::default()).unwrap();
    assert_eq!(eval.applied_rules, vec![1, 2, 3]);
    assert_eq!(eval.skipped_rules.len(), 1);
    assert_eq!(eval.skipped_rules[0].rule_id, 4);
    // "d" has a stringly-typed negative import and a null voltage.
    assert_eq!(
        eval.records[3].anomaly_text(),
        "Rule 1: ImportVAhCheck - no negative import"
    );
}

#[tokio::test]
async fn resolution_is_duplicate_free() {
    let rules: Vec<Rule> = (1..=4)
        .map(|id| rule(id, &format!("r{id}"), "", "import_VAh", "GREATER_THAN_OR_EQUAL_TO", "0"))
        .collect();
    let groups = vec![
        RuleGroup {
            id: 1,
            name: "Energy".into(),
            description: String::new(),
            rule_ids: vec![1, 2],
        },
        RuleGroup {
            id: 2,
            name: "Billing".into(),
            description: String::new(),
            rule_ids: vec![2, 3],
        },
    ];
    let head = HeadGroup {
        id: 7,
        name: "three-phase-block".into(),
        description: String::new(),
        meter_type: "P-3".into(),
        load_type: "BL".into(),
        rule_group_ids: vec![1, 2],
        rule_ids: vec![3, 4, 1],
    };
    let store = MemoryStore::from_parts(rules, groups, vec![head]);

    let resolved = HierarchyResolver::resolve(&store, &HeadGroupKey::new("P-3", "BL"))
        .await
        .unwrap();
    assert_eq!(resolved.head_group_id, 7);
    assert_eq!(resolved.rule_ids, vec![1, 2, 3, 4]);

    // Rule 2 belongs to both groups: one violation is reported under each.
    let t = table(json!([{"meter_number": "x", "import_VAh": -1}]));
    let eval = RuleEvaluator::evaluate(
        &t,
        &store_rules(&store, &resolved.rule_ids).await,
        &EvaluationOptions::default(),
    )
    .unwrap();
    let index = RuleGroupIndex::load(&store, &eval.failing_rules()).await.unwrap();
    let report = GroupAggregator::aggregate(&eval, &index, &AggregationOptions::default());
    assert_eq!(report.failing_records("Energy"), ["x", "x"]);
    assert_eq!(report.failing_records("Billing"), ["x", "x"]);
}

async fn store_rules(store: &MemoryStore, ids: &[i64]) -> Vec<Rule> {
    use vee_rules::RuleStore;
    store.rules_by_ids(ids).await.unwrap()
}
