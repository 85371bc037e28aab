use serde::Serialize;
use serde_json::Value;

use crate::check::check;
use crate::contextual::{normalize_for_panel, DroppedFinding, SeverityDowngrade};
use crate::merge::{merge, summarize, MergeSummary};
use crate::render::{render, Diagram};
use crate::rules::{ConfigWarning, RuleConfiguration};
use crate::violation::Violation;
use crate::{Panel, PanelError};

/// Everything produced while reviewing one panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelReview {
    pub panel_id: String,
    pub violations: Vec<Violation>,
    pub summary: MergeSummary,
    pub deterministic: Vec<Violation>,
    pub contextual: Vec<Violation>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub config_warnings: Vec<ConfigWarning>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dropped_findings: Vec<DroppedFinding>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub severity_downgrades: Vec<SeverityDowngrade>,
    pub unresolved_targets: usize,
    #[serde(skip)]
    pub diagram: Diagram,
}

/// Check, normalize, merge, summarize and render one panel.
///
/// `contextual_raw` holds the findings an external reviewer produced for this
/// panel (possibly none); `review_requested` is that reviewer's explicit
/// request for an engineer to look at the panel.
pub fn review_panel(
    panel: &Panel,
    config: &RuleConfiguration,
    contextual_raw: &[Value],
    review_requested: bool,
) -> Result<PanelReview, PanelError> {
    let report = check(panel, config)?;
    let normalized = normalize_for_panel(contextual_raw, panel);
    let violations = merge(&report.violations, &normalized.violations);
    let summary = summarize(
        &report.violations,
        &normalized.violations,
        &violations,
        review_requested,
    );
    let diagram = render(panel, &violations)?;

    tracing::info!(
        panel_id = %panel.panel_id,
        verdict = summary.verdict.label(),
        violations = violations.len(),
        "panel reviewed"
    );

    Ok(PanelReview {
        panel_id: report.panel_id,
        violations,
        summary,
        deterministic: report.violations,
        contextual: normalized.violations,
        config_warnings: report.warnings,
        dropped_findings: normalized.dropped,
        severity_downgrades: normalized.downgrades,
        unresolved_targets: normalized.unresolved_targets,
        diagram,
    })
}
