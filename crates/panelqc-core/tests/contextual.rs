mod common;

use common::*;
use panelqc_core::contextual::DEFAULT_CONTEXTUAL_REFERENCE;
use panelqc_core::{check, normalize, normalize_for_panel, RuleConfiguration, Severity, Source};
use serde_json::json;

#[test]
fn findings_are_normalized_and_accounted_for() {
    let raw = vec![
        json!({"category": "Missing Jack-Studs", "targets": ["W1"], "reason": "no jacks", "severity_hint": "critical"}),
        json!("not an object"),
        json!({"category": "header", "reason": "nothing to point at"}),
        json!({"violation_type": "fire blocking", "element": "S3", "description": "gap", "severity": "catastrophic"}),
        json!({"rule": "header", "target_ids": ["W1"], "reason": "thin lintel"}),
        json!({"category": "duct", "targets": ["D1"], "reason": "too close", "severity_hint": "major", "rule_reference": "NEC 300.4"}),
    ];

    let report = normalize(&raw);
    assert_eq!(report.violations.len(), 4);
    assert!(report.violations.iter().all(|v| v.source == Source::Contextual));

    let dropped: Vec<usize> = report.dropped.iter().map(|d| d.index).collect();
    assert_eq!(dropped, vec![1, 2]);
    assert_eq!(report.dropped[1].cause, "missing target ids");

    assert_eq!(report.downgrades.len(), 2);
    assert_eq!(report.downgrades[0].index, 3);
    assert_eq!(report.downgrades[0].hint.as_deref(), Some("catastrophic"));
    assert_eq!(report.downgrades[1].hint, None);

    let first = &report.violations[0];
    assert_eq!(first.rule_code, "missing_jack_studs");
    assert_eq!(first.severity, Severity::Critical);
    assert_eq!(first.rule_reference, DEFAULT_CONTEXTUAL_REFERENCE);

    let duct = report.violations.iter().find(|v| v.rule_code == "duct").unwrap();
    assert_eq!(duct.severity, Severity::High);
    assert_eq!(duct.rule_reference, "NEC 300.4");

    let fire = report.violations.iter().find(|v| v.rule_code == "fire_blocking").unwrap();
    assert_eq!(fire.severity, Severity::Medium);
    assert_eq!(fire.target_ids, vec!["S3"]);
}

#[test]
fn panel_aware_normalization_resolves_targets() {
    let panel = compliant_panel();
    let raw = vec![
        json!({"category": "header", "targets": ["w1", "ghost"], "reason": "r", "severity_hint": "low"}),
        json!({"category": "header", "targets": ["ghost"], "reason": "r", "severity_hint": "low"}),
        json!({"category": "layout", "targets": ["p-01"], "reason": "r", "severity_hint": "low"}),
    ];

    let report = normalize_for_panel(&raw, &panel);
    assert_eq!(report.unresolved_targets, 2);
    assert_eq!(report.dropped.len(), 1);
    assert_eq!(report.dropped[0].index, 1);

    let targets: Vec<&[String]> = report
        .violations
        .iter()
        .map(|v| v.target_ids.as_slice())
        .collect();
    assert!(targets.contains(&&["W1".to_string()][..]));
    assert!(targets.contains(&&["P-01".to_string()][..]));
}

#[test]
fn contextual_and_deterministic_ids_line_up() {
    let mut panel = compliant_panel();
    panel.openings[0].jack_stud_ids.clear();
    let deterministic = check(&panel, &RuleConfiguration::default()).unwrap();

    let raw = vec![json!({
        "category": "missing jack studs",
        "targets": ["W1"],
        "reason": "window lacks jack studs",
        "severity_hint": "high"
    })];
    let contextual = normalize_for_panel(&raw, &panel);

    assert_eq!(
        contextual.violations[0].violation_id,
        deterministic.violations[0].violation_id
    );
}
