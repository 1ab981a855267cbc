//! Tests for schema types.

use super::*;

const RULE_YAML: &str = r#"
id: 1
name: ImportVAhCheck
description: no negative import
condition:
  field_name: import_VAh
  condition_type: GREATER_THAN_OR_EQUAL_TO
  value: "0"
"#;

const HEAD_GROUP_YAML: &str = r#"
id: 7
name: single-phase-block-load
meter_type: P-1
load_type: BL
rule_groups: [1, 2]
rules: [9]
"#;

#[test]
fn parse_rule_defaults_to_active() {
    let rule: Rule = serde_yaml::from_str(RULE_YAML).unwrap();
    assert_eq!(rule.id, 1);
    assert!(rule.is_active);
    assert_eq!(rule.condition.field_name, "import_VAh");
    assert_eq!(
        rule.condition.condition_type,
        ConditionType::GreaterThanOrEqualTo
    );
    assert_eq!(rule.condition.value, "0");
    assert!(rule.condition.created_at.is_none());
}

#[test]
fn failure_description_format() {
    let rule: Rule = serde_yaml::from_str(RULE_YAML).unwrap();
    assert_eq!(
        rule.failure_description(),
        "Rule 1: ImportVAhCheck - no negative import"
    );
}

#[test]
fn condition_type_parses_case_insensitively() {
    assert_eq!(
        ConditionType::from("less_than_or_equal_to"),
        ConditionType::LessThanOrEqualTo
    );
    assert_eq!(
        ConditionType::from(" GREATER_THAN_OR_EQUAL_TO "),
        ConditionType::GreaterThanOrEqualTo
    );
}

#[test]
fn unknown_condition_type_round_trips_verbatim() {
    let ct = ConditionType::from("BETWEEN");
    assert!(!ct.is_supported());
    assert_eq!(ct.to_string(), "BETWEEN");

    let json = serde_json::to_string(&ct).unwrap();
    assert_eq!(json, "\"BETWEEN\"");
    let back: ConditionType = serde_json::from_str(&json).unwrap();
    assert_eq!(back, ct);
}

#[test]
fn supported_condition_type_serializes_canonical_name() {
    let json = serde_json::to_string(&ConditionType::LessThanOrEqualTo).unwrap();
    assert_eq!(json, "\"LESS_THAN_OR_EQUAL_TO\"");
}

#[test]
fn head_group_accepts_short_aliases() {
    let hg: HeadGroup = serde_yaml::from_str(HEAD_GROUP_YAML).unwrap();
    assert_eq!(hg.rule_group_ids, vec![1, 2]);
    assert_eq!(hg.rule_ids, vec![9]);
    assert_eq!(hg.key(), HeadGroupKey::new("P-1", "BL"));
    assert_eq!(hg.key().to_string(), "P-1/BL");
}

#[test]
fn same_parameters_ignores_timestamps() {
    let a = Condition::new("import_VAh", "GREATER_THAN_OR_EQUAL_TO", "0");
    let mut b = a.clone();
    b.created_at = Some(chrono::Utc::now());
    assert!(a.same_parameters(&b));

    let c = Condition::new("import_VAh", "GREATER_THAN_OR_EQUAL_TO", "1");
    assert!(!a.same_parameters(&c));
}
