//! Deterministic rule evaluation over a validated panel.

use serde::{Deserialize, Serialize};

use crate::rules::{ConfigWarning, RuleConfiguration};
use crate::violation::{sort_canonical, Severity, Source, Violation};
use crate::{Opening, Panel, PanelError, GEOMETRY_EPSILON_MM};

/// Rule codes emitted by the checker.
pub mod codes {
    pub const STUD_SPACING: &str = "stud_spacing";
    pub const MISSING_JACK_STUDS: &str = "missing_jack_studs";
    pub const MISSING_HEADER: &str = "missing_header";
    pub const DUCT_CLASH: &str = "duct_clash";
    pub const DIMENSION_VIOLATION: &str = "dimension_violation";
    pub const SEISMIC_CORNER_OPENING: &str = "seismic_corner_opening";
}

mod references {
    pub const STUD_SPACING: &str = "IRC R602.3(5) stud size, height and spacing";
    pub const JACK_STUDS: &str = "IRC R602.7.5 supports for headers";
    pub const HEADER: &str = "IRC R602.7 headers";
    pub const DUCT_CLEARANCE: &str = "IRC R602.6 drilling and notching of studs";
    pub const DIMENSION: &str = "Factory panel envelope";
    pub const SEISMIC: &str = "IRC R602.10 wall bracing";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckReport {
    pub panel_id: String,
    pub violations: Vec<Violation>,
    /// Configuration problems that caused rules to be skipped
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ConfigWarning>,
}

impl CheckReport {
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Evaluate every enabled rule against `panel`. Rejects structurally invalid
/// panels without producing partial results.
pub fn check(panel: &Panel, config: &RuleConfiguration) -> Result<CheckReport, PanelError> {
    panel.validate()?;

    let mut violations = Vec::new();
    if config.stud_spacing.enabled {
        violations.extend(check_stud_spacing(panel, config));
    }
    if config.openings.enabled {
        violations.extend(check_opening_support(panel, config));
    }
    if config.duct_clearance.enabled {
        violations.extend(check_duct_clearance(panel, config));
    }
    if config.dimension.enabled {
        violations.extend(check_dimensions(panel, config));
    }
    if config.seismic.enabled {
        violations.extend(check_seismic_openings(panel, config));
    }
    sort_canonical(&mut violations);

    for warning in &config.warnings {
        tracing::warn!(panel_id = %panel.panel_id, %warning, "rule configuration warning");
    }
    tracing::debug!(
        panel_id = %panel.panel_id,
        violations = violations.len(),
        "deterministic check complete"
    );

    Ok(CheckReport {
        panel_id: panel.panel_id.clone(),
        violations,
        warnings: config.warnings.clone(),
    })
}

fn check_stud_spacing(panel: &Panel, config: &RuleConfiguration) -> Vec<Violation> {
    let rules = &config.stud_spacing;
    let mut studs: Vec<_> = panel.studs.iter().filter(|s| !s.is_jack_stud).collect();
    if studs.len() < 2 {
        return vec![];
    }
    studs.sort_by(|a, b| a.x_mm.total_cmp(&b.x_mm).then_with(|| a.id.cmp(&b.id)));

    studs
        .windows(2)
        .filter_map(|pair| {
            let (a, b) = (pair[0], pair[1]);
            let gap = b.x_mm - a.x_mm;
            let deviation = (gap - rules.standard_spacing_mm).abs();
            if deviation - rules.tolerance_mm <= GEOMETRY_EPSILON_MM {
                return None;
            }
            let severity = if deviation - 2.0 * rules.tolerance_mm > GEOMETRY_EPSILON_MM {
                Severity::High
            } else {
                Severity::Medium
            };
            Some(Violation::new(
                Source::Deterministic,
                codes::STUD_SPACING,
                [a.id.as_str(), b.id.as_str()],
                severity,
                format!(
                    "Stud spacing {:.1}mm between {} and {} deviates {:.1}mm from {}mm \
                     (tolerance ±{}mm)",
                    gap, a.id, b.id, deviation, rules.standard_spacing_mm, rules.tolerance_mm
                ),
                references::STUD_SPACING,
            ))
        })
        .collect()
}

fn check_opening_support(panel: &Panel, config: &RuleConfiguration) -> Vec<Violation> {
    let rules = &config.openings;
    let mut violations = Vec::new();

    for opening in &panel.openings {
        if rules.require_jack_studs {
            if let Some(missing) =
                missing_jack_sides(panel, opening, rules.jack_stud_proximity_mm)
            {
                violations.push(Violation::new(
                    Source::Deterministic,
                    codes::MISSING_JACK_STUDS,
                    [opening.id.as_str()],
                    Severity::Critical,
                    format!(
                        "{} {} has no jack stud within {}mm of its {} edge",
                        opening.kind.label(),
                        opening.id,
                        rules.jack_stud_proximity_mm,
                        missing
                    ),
                    references::JACK_STUDS,
                ));
            }
        }

        if rules.require_header && !opening.has_header {
            violations.push(Violation::new(
                Source::Deterministic,
                codes::MISSING_HEADER,
                [opening.id.as_str()],
                Severity::Critical,
                format!("{} {} has no header", opening.kind.label(), opening.id),
                references::HEADER,
            ));
        }
    }

    violations
}

/// Which vertical edges lack a listed jack stud, or `None` when both are covered.
fn missing_jack_sides(panel: &Panel, opening: &Opening, proximity_mm: f64) -> Option<&'static str> {
    let near = |edge: f64| {
        opening
            .jack_stud_ids
            .iter()
            .filter_map(|id| panel.stud(id))
            .any(|s| (s.x_mm - edge).abs() <= proximity_mm + GEOMETRY_EPSILON_MM)
    };
    match (near(opening.left_edge_mm()), near(opening.right_edge_mm())) {
        (true, true) => None,
        (false, true) => Some("left"),
        (true, false) => Some("right"),
        (false, false) => Some("left and right"),
    }
}

fn check_duct_clearance(panel: &Panel, config: &RuleConfiguration) -> Vec<Violation> {
    let rules = &config.duct_clearance;
    let mut violations = Vec::new();

    for duct in &panel.ducts {
        let nearest = panel
            .studs
            .iter()
            .map(|s| ((duct.x_mm - s.x_mm).abs(), s))
            .min_by(|(da, a), (db, b)| da.total_cmp(db).then_with(|| a.id.cmp(&b.id)));
        let Some((distance, stud)) = nearest else {
            continue;
        };

        let clearance = if rules.measure_from_duct_edge {
            (distance - duct.diameter_mm / 2.0).max(0.0)
        } else {
            distance
        };
        if rules.minimum_clearance_mm - clearance > GEOMETRY_EPSILON_MM {
            violations.push(Violation::new(
                Source::Deterministic,
                codes::DUCT_CLASH,
                [duct.id.as_str(), stud.id.as_str()],
                Severity::High,
                format!(
                    "Duct {} is {:.1}mm from stud {}, below the {}mm minimum clearance",
                    duct.id, clearance, stud.id, rules.minimum_clearance_mm
                ),
                references::DUCT_CLEARANCE,
            ));
        }
    }

    violations
}

fn check_dimensions(panel: &Panel, config: &RuleConfiguration) -> Vec<Violation> {
    let rules = &config.dimension;
    let mut exceeded = Vec::new();
    if panel.width_mm - rules.max_width_mm > GEOMETRY_EPSILON_MM {
        exceeded.push(format!(
            "width {:.1}mm exceeds maximum {}mm",
            panel.width_mm, rules.max_width_mm
        ));
    }
    if panel.height_mm - rules.max_height_mm > GEOMETRY_EPSILON_MM {
        exceeded.push(format!(
            "height {:.1}mm exceeds maximum {}mm",
            panel.height_mm, rules.max_height_mm
        ));
    }
    if exceeded.is_empty() {
        return vec![];
    }

    vec![Violation::new(
        Source::Deterministic,
        codes::DIMENSION_VIOLATION,
        [panel.panel_id.as_str()],
        Severity::Medium,
        format!("Panel {}", exceeded.join("; ")),
        references::DIMENSION,
    )]
}

fn check_seismic_openings(panel: &Panel, config: &RuleConfiguration) -> Vec<Violation> {
    let rules = &config.seismic;
    if panel.seismic_zone < rules.min_zone {
        return vec![];
    }

    panel
        .openings
        .iter()
        .filter_map(|opening| {
            let distance = opening.distance_to_nearest_edge_mm(panel.width_mm);
            if rules.min_edge_distance_mm - distance <= GEOMETRY_EPSILON_MM {
                return None;
            }
            Some(Violation::new(
                Source::Deterministic,
                codes::SEISMIC_CORNER_OPENING,
                [opening.id.as_str()],
                Severity::High,
                format!(
                    "{} {} sits {:.1}mm from the panel edge in seismic zone {}; \
                     openings closer than {}mm need engineered bracing",
                    opening.kind.label(),
                    opening.id,
                    distance,
                    panel.seismic_zone,
                    rules.min_edge_distance_mm
                ),
                references::SEISMIC,
            ))
        })
        .collect()
}
