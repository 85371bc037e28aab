use panelqc_core::storage::Store;
use panelqc_core::{
    check, merge, normalize_for_panel, render, review_panel, summarize, LoadMode, Panel,
    RuleConfiguration, Violation,
};
use panelqc_findings::{extract_findings, resolve_targets};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

// --- Request types ---

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct CheckPanelRequest {
    /// The panel to check: {panel_id, name?, width_mm, height_mm, seismic_zone, studs: [{id, x_mm, is_jack_stud?, backing_plate?}], openings: [{id, type: "window"|"door", x_mm, y_mm?, width_mm, height_mm, has_header?, jack_stud_ids?}], ducts: [{id, type?, x_mm, y_mm?, diameter_mm}]}. All lengths in millimetres; x from the panel's left edge, y from its bottom edge.
    panel: Panel,
    /// Rule configuration as a JSON string. Omit to use the stored rules (see get_rules).
    rules: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct NormalizeFindingsRequest {
    /// The panel the findings refer to
    panel: Panel,
    /// Raw analysis output: a JSON array of findings or an object with "additional_violations" and "needs_engineer_review". Each finding has category, target_ids (or targets/element), reason, and severity_hint ("critical", "high", "medium", "low"). Code fences and surrounding prose are tolerated.
    findings: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct MergeViolationsRequest {
    /// Violations from check_panel
    deterministic: Vec<Violation>,
    /// Violations from normalize_findings
    contextual: Vec<Violation>,
    /// Whether the contextual analysis asked for an engineer's review
    needs_review: Option<bool>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct RenderPanelRequest {
    /// The panel to draw
    panel: Panel,
    /// Violations to highlight. Omit to draw the panel with the all-clear marker.
    violations: Option<Vec<Violation>>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct ReviewPanelRequest {
    /// The panel to review
    panel: Panel,
    /// Raw contextual analysis output, in the same form normalize_findings accepts
    findings: Option<String>,
    /// Rule configuration as a JSON string. Omit to use the stored rules.
    rules: Option<String>,
    /// Save <panel_id>.json and <panel_id>.svg to the results directory
    save: Option<bool>,
}

// --- Responses ---

#[derive(Serialize)]
struct NormalizeResponse {
    #[serde(flatten)]
    report: panelqc_core::NormalizeReport,
    needs_review: bool,
}

#[derive(Serialize)]
struct MergeResponse {
    violations: Vec<Violation>,
    summary: panelqc_core::MergeSummary,
}

#[derive(Serialize)]
struct ReviewResponse {
    #[serde(flatten)]
    review: panelqc_core::PanelReview,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    saved: Vec<String>,
}

// --- Server ---

#[derive(Clone)]
pub struct PanelQcServer {
    store: Store,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl PanelQcServer {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        description = "Get the active deterministic rules: a plain-text rundown followed by the JSON configuration. Edit the JSON and pass it as `rules` to check_panel or review_panel to try a variation."
    )]
    fn get_rules(&self) -> Result<CallToolResult, McpError> {
        Ok(respond(describe_rules(&self.store)))
    }

    #[tool(
        description = "Run the deterministic rule checks (stud spacing, jack studs, headers, duct clearance, panel dimensions, seismic corner openings) on a panel. Returns {panel_id, violations: [{violation_id, source, rule_code, target_ids, severity, reason, rule_reference}], warnings?}."
    )]
    fn check_panel(
        &self,
        Parameters(req): Parameters<CheckPanelRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(respond(run_check(&self.store, &req)))
    }

    #[tool(
        description = "Turn raw contextual findings into violations for a panel. Target references such as \"stud S3\" are matched to entity ids; findings that name no entity are dropped and counted. Returns {violations, dropped?, downgrades?, unresolved_targets, needs_review}."
    )]
    fn normalize_findings(
        &self,
        Parameters(req): Parameters<NormalizeFindingsRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(respond(run_normalize(&req)))
    }

    #[tool(
        description = "Merge deterministic and contextual violations into one deduplicated list. The same rule on the same entities is reported once, at the highest severity either source gave it. Returns {violations, summary: {verdict, total, by_severity, by_rule, contextual_only, corroborated}}."
    )]
    fn merge_violations(
        &self,
        Parameters(req): Parameters<MergeViolationsRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(respond(run_merge(&req)))
    }

    #[tool(
        description = "Draw a panel as SVG with the entities named in `violations` highlighted and a summary of the violations below it."
    )]
    fn render_panel(
        &self,
        Parameters(req): Parameters<RenderPanelRequest>,
    ) -> Result<CallToolResult, McpError> {
        let violations = req.violations.unwrap_or_default();
        Ok(respond(
            render(&req.panel, &violations)
                .map(|d| d.to_svg())
                .map_err(|e| format!("Cannot render panel '{}': {}", req.panel.panel_id, e)),
        ))
    }

    #[tool(
        description = "Full review of one panel: deterministic checks, contextual findings (optional), merge, verdict and drawing. With save=true the JSON result and the SVG are written to the results directory. Returns the review JSON; the verdict is PASS, FAIL or NEEDS REVIEW."
    )]
    fn review_panel(
        &self,
        Parameters(req): Parameters<ReviewPanelRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(respond(run_review(&self.store, &req)))
    }

    #[tool(description = "List the panel ids that have saved review results")]
    fn list_results(&self) -> Result<CallToolResult, McpError> {
        Ok(respond(
            self.store
                .list_results()
                .map(|ids| {
                    if ids.is_empty() {
                        "No saved results. Use review_panel with save=true.".to_string()
                    } else {
                        ids.join("\n")
                    }
                })
                .map_err(|e| e.to_string()),
        ))
    }
}

#[tool_handler]
impl ServerHandler for PanelQcServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(INSTRUCTIONS.into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

const INSTRUCTIONS: &str = r#"Panel QC checks prefabricated wall panels (studs, openings, ducts) against building-code rules.

Typical flow for one panel:
1. `get_rules` to see what the deterministic checks enforce.
2. Analyse the panel yourself for anything the rules cannot see (fire blocking, load paths, unusual layouts). Express each concern as {category, target_ids, reason, severity_hint}.
3. `review_panel` with the panel and your findings. It runs the checks, merges your findings with them and returns the verdict.

Use `check_panel`, `normalize_findings`, `merge_violations` and `render_panel` to run the stages one at a time. Only name entity ids that exist on the panel; findings about unknown entities are dropped."#;

// --- Tool bodies ---

fn respond(result: Result<String, String>) -> CallToolResult {
    match result {
        Ok(text) => CallToolResult::success(vec![Content::text(text)]),
        Err(e) => {
            tracing::warn!(error = %e, "tool call failed");
            CallToolResult::error(vec![Content::text(e)])
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("Serialization error: {}", e))
}

/// Inline rules win over the stored ones. Problems in either are reported as
/// warnings, never as a failed call, unless the JSON itself is unusable.
fn load_rules(store: &Store, inline: Option<&str>) -> Result<RuleConfiguration, String> {
    match inline {
        Some(raw) => RuleConfiguration::from_json(raw, LoadMode::Lenient)
            .map_err(|e| format!("Invalid rules: {}", e)),
        None => store
            .read_rules(LoadMode::Lenient)
            .map_err(|e| format!("Failed to read stored rules: {}", e)),
    }
}

fn describe_rules(store: &Store) -> Result<String, String> {
    let config = load_rules(store, None)?;
    let json = config.to_json().map_err(|e| e.to_string())?;
    let mut out = config.describe();
    for warning in &config.warnings {
        out.push_str(&format!("warning: {}\n", warning));
    }
    out.push_str(&format!(
        "\nSource: {}\n\n```json\n{}\n```",
        store.rules_path().display(),
        json
    ));
    Ok(out)
}

fn run_check(store: &Store, req: &CheckPanelRequest) -> Result<String, String> {
    let config = load_rules(store, req.rules.as_deref())?;
    let report = check(&req.panel, &config)
        .map_err(|e| format!("Invalid panel '{}': {}", req.panel.panel_id, e))?;
    to_json(&report)
}

fn run_normalize(req: &NormalizeFindingsRequest) -> Result<String, String> {
    req.panel
        .validate()
        .map_err(|e| format!("Invalid panel '{}': {}", req.panel.panel_id, e))?;
    let mut extraction = extract_findings(&req.findings);
    resolve_targets(&mut extraction.findings, &req.panel);
    let report = normalize_for_panel(&extraction.findings, &req.panel);
    to_json(&NormalizeResponse {
        report,
        needs_review: extraction.needs_review,
    })
}

fn run_merge(req: &MergeViolationsRequest) -> Result<String, String> {
    let violations = merge(&req.deterministic, &req.contextual);
    let summary = summarize(
        &req.deterministic,
        &req.contextual,
        &violations,
        req.needs_review.unwrap_or(false),
    );
    to_json(&MergeResponse {
        violations,
        summary,
    })
}

fn run_review(store: &Store, req: &ReviewPanelRequest) -> Result<String, String> {
    let config = load_rules(store, req.rules.as_deref())?;
    let mut extraction = req
        .findings
        .as_deref()
        .map(extract_findings)
        .unwrap_or_default();
    resolve_targets(&mut extraction.findings, &req.panel);

    let review = review_panel(&req.panel, &config, &extraction.findings, extraction.needs_review)
        .map_err(|e| format!("Invalid panel '{}': {}", req.panel.panel_id, e))?;
    let svg = review.diagram.to_svg();
    let mut response = ReviewResponse {
        review,
        saved: vec![],
    };

    if req.save.unwrap_or(false) {
        let json = to_json(&response)?;
        let panel_id = &response.review.panel_id;
        for (ext, data) in [("json", json.as_str()), ("svg", svg.as_str())] {
            let path = store
                .write_result(panel_id, ext, data)
                .map_err(|e| format!("Failed to save result: {}", e))?;
            response.saved.push(path.display().to_string());
        }
        tracing::info!(panel_id = %panel_id, "review saved");
    }

    to_json(&response)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout carries the protocol
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let store = Store::from_env();
    tracing::info!(store = %store.root().display(), "starting panelqc-mcp");

    let service = PanelQcServer::new(store)
        .serve(rmcp::transport::io::stdio())
        .await
        .inspect_err(|e| tracing::error!(error = %e, "MCP server error"))?;
    service.waiting().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn panel() -> Panel {
        serde_json::from_value(json!({
            "panel_id": "P-01",
            "width_mm": 1219.2,
            "height_mm": 2438.4,
            "seismic_zone": 1,
            "studs": [
                {"id": "S1", "x_mm": 0.0},
                {"id": "S2", "x_mm": 406.4},
                {"id": "S3", "x_mm": 812.8},
                {"id": "S4", "x_mm": 1219.2}
            ],
            "openings": [
                {"id": "W1", "type": "window", "x_mm": 450.0, "y_mm": 900.0,
                 "width_mm": 300.0, "height_mm": 600.0, "has_header": false}
            ]
        }))
        .unwrap()
    }

    fn store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());
        (dir, store)
    }

    #[test]
    fn check_uses_inline_rules() {
        let (_dir, store) = store();
        let req = CheckPanelRequest {
            panel: panel(),
            rules: Some(r#"{"openings": {"require_jack_studs": false}}"#.into()),
        };
        let out: Value = serde_json::from_str(&run_check(&store, &req).unwrap()).unwrap();
        let codes: Vec<&str> = out["violations"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v["rule_code"].as_str())
            .collect();
        assert_eq!(codes, vec!["missing_header"]);
    }

    #[test]
    fn bad_panels_and_rules_are_errors() {
        let (_dir, store) = store();
        let mut bad = panel();
        bad.width_mm = -1.0;
        let err = run_check(&store, &CheckPanelRequest { panel: bad, rules: None }).unwrap_err();
        assert!(err.starts_with("Invalid panel 'P-01'"));

        let req = CheckPanelRequest {
            panel: panel(),
            rules: Some("[1, 2]".into()),
        };
        assert!(run_check(&store, &req).unwrap_err().starts_with("Invalid rules"));
    }

    #[test]
    fn normalize_resolves_free_form_targets() {
        let req = NormalizeFindingsRequest {
            panel: panel(),
            findings: "```json\n{\"additional_violations\": [{\"category\": \"Fire Blocking\", \"element\": \"stud S2\", \"reason\": \"none\", \"severity_hint\": \"major\"}], \"needs_engineer_review\": true}\n```".into(),
        };
        let out: Value = serde_json::from_str(&run_normalize(&req).unwrap()).unwrap();
        assert_eq!(out["needs_review"], true);
        assert_eq!(out["violations"][0]["rule_code"], "fire_blocking");
        assert_eq!(out["violations"][0]["target_ids"], json!(["S2"]));
        assert_eq!(out["violations"][0]["severity"], "high");
    }

    #[test]
    fn review_saves_both_artifacts() {
        let (_dir, store) = store();
        let req = ReviewPanelRequest {
            panel: panel(),
            findings: None,
            rules: None,
            save: Some(true),
        };
        let out: Value = serde_json::from_str(&run_review(&store, &req).unwrap()).unwrap();
        assert_eq!(out["summary"]["verdict"], "fail");
        assert_eq!(out["saved"].as_array().unwrap().len(), 2);
        assert!(store.results_dir().join("P-01.svg").exists());
        assert_eq!(store.list_results().unwrap(), vec!["P-01"]);
    }

    #[test]
    fn merge_reports_summary() {
        let (_dir, store) = store();
        let req = CheckPanelRequest {
            panel: panel(),
            rules: None,
        };
        let report: Value = serde_json::from_str(&run_check(&store, &req).unwrap()).unwrap();
        let deterministic: Vec<Violation> =
            serde_json::from_value(report["violations"].clone()).unwrap();

        let out: Value = serde_json::from_str(
            &run_merge(&MergeViolationsRequest {
                deterministic: deterministic.clone(),
                contextual: vec![],
                needs_review: Some(true),
            })
            .unwrap(),
        )
        .unwrap();
        assert_eq!(out["summary"]["verdict"], "needs_review");
        assert_eq!(out["summary"]["total"], deterministic.len());
    }

    #[test]
    fn rules_description_includes_json() {
        let (_dir, store) = store();
        let text = describe_rules(&store).unwrap();
        assert!(text.contains("- stud_spacing: "));
        assert!(text.contains("```json"));
    }
}
