mod common;

use common::*;
use panelqc_core::check::codes;
use panelqc_core::{check, PanelError, RuleConfiguration, Severity, Source};

#[test]
fn compliant_panel_has_no_violations() {
    let report = check(&compliant_panel(), &RuleConfiguration::default()).unwrap();
    assert!(report.passed(), "unexpected: {:?}", report.violations);
    assert_eq!(report.panel_id, "P-01");
    assert!(report.warnings.is_empty());
}

#[test]
fn window_without_jack_studs_is_critical() {
    let mut panel = compliant_panel();
    panel.openings[0].jack_stud_ids.clear();

    let report = check(&panel, &RuleConfiguration::default()).unwrap();
    assert_eq!(report.violations.len(), 1);
    let v = &report.violations[0];
    assert_eq!(v.rule_code, codes::MISSING_JACK_STUDS);
    assert_eq!(v.severity, Severity::Critical);
    assert_eq!(v.source, Source::Deterministic);
    assert_eq!(v.target_ids, vec!["W1"]);
    assert!(v.reason.contains("left and right"), "{}", v.reason);
}

#[test]
fn jack_stud_far_from_its_edge_does_not_count() {
    let mut panel = compliant_panel();
    // 120mm right of the window's right edge
    panel.studs.iter_mut().find(|s| s.id == "J2").unwrap().x_mm = 1745.6;

    let report = check(&panel, &RuleConfiguration::default()).unwrap();
    assert_eq!(report.violations.len(), 1);
    assert!(report.violations[0].reason.ends_with("of its right edge"));
}

#[test]
fn missing_header_is_reported_separately() {
    let mut panel = compliant_panel();
    panel.openings[0].has_header = false;
    panel.openings[0].jack_stud_ids.clear();

    let report = check(&panel, &RuleConfiguration::default()).unwrap();
    let found: Vec<&str> = report.violations.iter().map(|v| v.rule_code.as_str()).collect();
    assert_eq!(found, vec![codes::MISSING_HEADER, codes::MISSING_JACK_STUDS]);

    let mut config = RuleConfiguration::default();
    config.openings.require_header = false;
    let report = check(&panel, &config).unwrap();
    assert_eq!(report.violations.len(), 1);
    assert_eq!(report.violations[0].rule_code, codes::MISSING_JACK_STUDS);
}

#[test]
fn duct_close_to_stud_clashes_with_both() {
    let mut panel = compliant_panel();
    panel.ducts.push(duct("D1", SPACING + 80.0));
    let mut config = RuleConfiguration::default();
    config.duct_clearance.minimum_clearance_mm = 100.0;

    let report = check(&panel, &config).unwrap();
    assert_eq!(report.violations.len(), 1);
    let v = &report.violations[0];
    assert_eq!(v.rule_code, codes::DUCT_CLASH);
    assert_eq!(v.severity, Severity::High);
    assert_eq!(v.target_ids, vec!["D1", "S2"]);
    assert!(v.reason.contains("80.0mm"), "{}", v.reason);
}

#[test]
fn duct_clearance_can_be_measured_from_the_wall() {
    let mut panel = compliant_panel();
    panel.ducts.push(duct("D1", SPACING + 80.0));
    let mut config = RuleConfiguration::default();
    config.duct_clearance.minimum_clearance_mm = 50.0;

    assert!(check(&panel, &config).unwrap().passed());

    config.duct_clearance.measure_from_duct_edge = true;
    let report = check(&panel, &config).unwrap();
    assert_eq!(report.violations.len(), 1);
    assert!(report.violations[0].reason.contains("30.0mm"));
}

#[test]
fn spacing_at_tolerance_boundary_passes() {
    let config = RuleConfiguration::default();
    let tol = config.stud_spacing.tolerance_mm;

    for gap in [SPACING + tol, SPACING - tol, SPACING] {
        let report = check(&two_stud_panel(gap), &config).unwrap();
        assert!(report.passed(), "gap {} flagged: {:?}", gap, report.violations);
    }
}

#[test]
fn spacing_just_past_tolerance_fires() {
    let config = RuleConfiguration::default();
    let gap = SPACING + config.stud_spacing.tolerance_mm + 0.01;

    let report = check(&two_stud_panel(gap), &config).unwrap();
    assert_eq!(report.violations.len(), 1);
    let v = &report.violations[0];
    assert_eq!(v.rule_code, codes::STUD_SPACING);
    assert_eq!(v.severity, Severity::Medium);
    assert_eq!(v.target_ids, vec!["S1", "S2"]);
}

#[test]
fn spacing_far_off_is_high() {
    let report = check(&two_stud_panel(SPACING + 40.0), &RuleConfiguration::default()).unwrap();
    assert_eq!(report.violations[0].severity, Severity::High);
}

#[test]
fn jack_studs_do_not_break_spacing() {
    let mut panel = two_stud_panel(SPACING);
    panel.studs.push(jack("J1", 250.0));
    assert!(check(&panel, &RuleConfiguration::default()).unwrap().passed());
}

#[test]
fn oversize_panel_yields_one_dimension_violation() {
    let mut panel = two_stud_panel(SPACING);
    panel.width_mm = 13000.0;
    panel.height_mm = 4000.0;

    let report = check(&panel, &RuleConfiguration::default()).unwrap();
    assert_eq!(report.violations.len(), 1);
    let v = &report.violations[0];
    assert_eq!(v.rule_code, codes::DIMENSION_VIOLATION);
    assert_eq!(v.target_ids, vec!["P-gap"]);
    assert!(v.reason.contains("width") && v.reason.contains("height"));
}

#[test]
fn seismic_zone_gates_corner_openings() {
    let mut panel = compliant_panel();
    panel.openings[0].x_mm = 200.0;
    panel.openings[0].jack_stud_ids.clear();
    let mut config = RuleConfiguration::default();
    config.openings.enabled = false;

    assert!(check(&panel, &config).unwrap().passed());

    panel.seismic_zone = 4;
    let report = check(&panel, &config).unwrap();
    assert_eq!(report.violations.len(), 1);
    assert_eq!(report.violations[0].rule_code, codes::SEISMIC_CORNER_OPENING);
    assert_eq!(report.violations[0].severity, Severity::High);
}

#[test]
fn disabled_categories_are_skipped() {
    let mut panel = two_stud_panel(SPACING + 100.0);
    panel.width_mm = 20000.0;
    let mut config = RuleConfiguration::default();
    config.stud_spacing.enabled = false;
    config.dimension.enabled = false;
    assert!(check(&panel, &config).unwrap().passed());
}

#[test]
fn output_is_sorted_and_repeatable() {
    let mut panel = compliant_panel();
    panel.openings[0].has_header = false;
    panel.studs[3].x_mm += 30.0;
    panel.ducts.push(duct("D1", 10.0));
    let config = RuleConfiguration::default();

    let first = check(&panel, &config).unwrap();
    let second = check(&panel, &config).unwrap();
    assert_eq!(first, second);

    let severities: Vec<Severity> = first.violations.iter().map(|v| v.severity).collect();
    let mut sorted = severities.clone();
    sorted.sort_by(|a, b| b.cmp(a));
    assert_eq!(severities, sorted);
    assert_eq!(first.violations[0].rule_code, codes::MISSING_HEADER);
}

#[test]
fn invalid_panels_are_rejected() {
    let config = RuleConfiguration::default();

    let mut panel = compliant_panel();
    panel.width_mm = 0.0;
    assert!(matches!(
        check(&panel, &config),
        Err(PanelError::InvalidDimension { field: "width_mm", .. })
    ));

    let mut panel = compliant_panel();
    panel.studs.push(stud("S1", 10.0));
    assert_eq!(check(&panel, &config), Err(PanelError::DuplicateId("S1".into())));

    let mut panel = compliant_panel();
    panel.seismic_zone = 7;
    assert_eq!(check(&panel, &config), Err(PanelError::SeismicZone(7)));

    let mut panel = compliant_panel();
    panel.openings[0].jack_stud_ids.push("J9".into());
    assert!(matches!(
        check(&panel, &config),
        Err(PanelError::UnknownJackStud { .. })
    ));

    let mut panel = compliant_panel();
    panel.ducts.push(duct("D1", 5000.0));
    assert!(matches!(
        check(&panel, &config),
        Err(PanelError::OutOfBounds { kind: "duct", .. })
    ));
}
