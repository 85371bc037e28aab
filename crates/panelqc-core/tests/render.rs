mod common;

use common::*;
use panelqc_core::render::{palette, MARGIN, NO_VIOLATIONS};
use panelqc_core::{check, render, RuleConfiguration, Severity, Source, Violation, SCALE};

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

#[test]
fn compliant_panel_shows_the_all_clear() {
    let diagram = render(&compliant_panel(), &[]).unwrap();

    let status: Vec<_> = diagram.elements_of_class("status").collect();
    assert_eq!(status.len(), 1);
    assert_eq!(status[0].text(), Some(NO_VIOLATIONS));
    assert_eq!(status[0].color(), palette::PASS);
    assert_eq!(diagram.elements_of_class("summary-title").count(), 0);
    assert_eq!(diagram.elements_of_class("stud").count(), 7);
    assert_eq!(diagram.elements_of_class("jack-stud").count(), 2);
}

#[test]
fn implicated_entities_are_highlighted() {
    let mut panel = compliant_panel();
    panel.openings[0].has_header = false;
    panel.ducts.push(duct("D1", SPACING + 10.0));
    let report = check(&panel, &RuleConfiguration::default()).unwrap();
    let diagram = render(&panel, &report.violations).unwrap();

    assert_eq!(diagram.entity("W1").unwrap().color(), palette::OPENING_WARNING);
    assert_eq!(diagram.entity("D1").unwrap().color(), palette::WARNING);
    assert_eq!(diagram.entity("S2").unwrap().color(), palette::WARNING);
    assert_eq!(diagram.entity("S1").unwrap().color(), palette::STUD);

    let title = diagram.elements_of_class("summary-title").next().unwrap();
    assert_eq!(title.text(), Some("Violations found: 2"));
    let headings: Vec<&str> = diagram
        .elements_of_class("summary-heading")
        .filter_map(|e| e.text())
        .collect();
    assert_eq!(headings, vec!["CRITICAL (1)", "HIGH (1)"]);
    assert_eq!(diagram.elements_of_class("status").count(), 0);
}

#[test]
fn panel_level_violation_marks_the_outline() {
    let panel = compliant_panel();
    let v = Violation::new(Source::Contextual, "layout", ["P-01"], Severity::Low, "r", "x");
    let diagram = render(&panel, &[v]).unwrap();
    let outline = diagram.elements_of_class("panel").next().unwrap();
    assert!(matches!(
        outline,
        panelqc_core::Element::Rect { stroke, .. } if *stroke == palette::WARNING
    ));
}

#[test]
fn coordinates_are_scaled_and_flipped() {
    let panel = compliant_panel();
    let diagram = render(&panel, &[]).unwrap();
    assert_eq!(diagram.scale, SCALE);

    match diagram.entity("S2").unwrap() {
        panelqc_core::Element::Line { x1, y1, y2, .. } => {
            assert!(approx(*x1, MARGIN + SPACING * SCALE));
            assert!(approx(*y1, MARGIN));
            assert!(approx(*y2, MARGIN + panel.height_mm * SCALE));
        }
        other => panic!("stud drawn as {:?}", other),
    }

    // the window's top edge sits 1900mm above the panel bottom
    match diagram.entity("W1").unwrap() {
        panelqc_core::Element::Rect { x, y, height, .. } => {
            assert!(approx(*x, MARGIN + 812.8 * SCALE));
            assert!(approx(*y, MARGIN + (panel.height_mm - 1900.0) * SCALE));
            assert!(approx(*height, 1000.0 * SCALE));
        }
        other => panic!("window drawn as {:?}", other),
    }

    assert!(diagram.width >= panel.width_mm * SCALE + 2.0 * MARGIN);
}

#[test]
fn svg_output_is_escaped() {
    let mut panel = compliant_panel();
    panel.name = Some("Bay <3> & \"east\"".to_string());
    let v = Violation::new(
        Source::Contextual,
        "note",
        ["S1"],
        Severity::Low,
        "spacing < 400 & > 0",
        "x",
    );
    let svg = render(&panel, &[v]).unwrap().to_svg();

    assert!(svg.starts_with("<?xml"));
    assert!(svg.trim_end().ends_with("</svg>"));
    assert!(svg.contains("Bay &lt;3&gt; &amp; &quot;east&quot;"));
    assert!(svg.contains("spacing &lt; 400 &amp; &gt; 0"));
    assert!(svg.contains("data-entity=\"S1\""));
    assert!(!svg.contains("<3>"));
}

#[test]
fn invalid_panels_are_not_drawn() {
    let mut panel = compliant_panel();
    panel.height_mm = -1.0;
    assert!(render(&panel, &[]).is_err());
}

#[test]
fn seismic_corner_openings_are_braced() {
    let mut panel = compliant_panel();
    panel.seismic_zone = 4;
    panel.openings[0].x_mm = 200.0;
    panel.openings[0].jack_stud_ids.clear();
    let mut config = RuleConfiguration::default();
    config.openings.enabled = false;
    let report = check(&panel, &config).unwrap();
    assert_eq!(report.violations.len(), 1);

    let diagram = render(&panel, &report.violations).unwrap();
    let bracing: Vec<_> = diagram.elements_of_class("bracing").collect();
    assert_eq!(bracing.len(), 2);
    for line in &bracing {
        match line {
            panelqc_core::Element::Line { x1, x2, dash, .. } => {
                assert!(approx(*x1, MARGIN + 200.0 * SCALE));
                assert!(approx(*x2, MARGIN + (200.0 + 812.8) * SCALE));
                assert!(dash.is_some());
            }
            other => panic!("bracing drawn as {:?}", other),
        }
    }
    assert!(diagram.to_svg().contains("class=\"bracing\""));
    assert!(diagram.to_svg().contains("stroke-dasharray"));

    // other violations on the same opening draw no bracing
    let header = Violation::new(
        Source::Deterministic,
        "missing_header",
        ["W1"],
        Severity::Critical,
        "r",
        "x",
    );
    let diagram = render(&panel, &[header]).unwrap();
    assert_eq!(diagram.elements_of_class("bracing").count(), 0);
}
