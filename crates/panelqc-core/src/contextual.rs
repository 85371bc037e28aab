//! Normalizes externally produced findings into [`Violation`]s.
//!
//! The adapter only checks shape. Where the findings come from (an LLM, a rule
//! file, a reviewer) does not matter here.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::violation::{sort_canonical, Severity, Source, Violation};
use crate::Panel;

pub const DEFAULT_CONTEXTUAL_REFERENCE: &str = "contextual review";

/// Keys a finding may carry its category under, in lookup order.
pub const CATEGORY_KEYS: &[&str] = &["category", "rule_code", "violation_type", "rule"];
/// Keys a finding may carry its target references under, in lookup order.
pub const TARGET_KEYS: &[&str] = &["target_ids", "targets", "element"];
const REASON_KEYS: &[&str] = &["reason", "description"];
const SEVERITY_KEYS: &[&str] = &["severity_hint", "severity"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedFinding {
    /// Position in the raw input
    pub index: usize,
    pub cause: String,
}

/// A severity hint that was missing or unrecognized and was read as `medium`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityDowngrade {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizeReport {
    pub violations: Vec<Violation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dropped: Vec<DroppedFinding>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub downgrades: Vec<SeverityDowngrade>,
    /// Target references that named no entity on the panel
    #[serde(default)]
    pub unresolved_targets: usize,
}

struct RawFinding {
    rule_code: String,
    targets: Vec<String>,
    reason: String,
    severity_hint: Option<String>,
    rule_reference: Option<String>,
}

/// Structural normalization: targets are taken as given.
pub fn normalize(raw: &[Value]) -> NormalizeReport {
    normalize_with(raw, |target| Some(target.to_string()))
}

/// Like [`normalize`], but each target must resolve to the panel or one of its
/// entities (exact id, then case-insensitive). Unresolved targets are removed;
/// a finding left without targets is dropped.
pub fn normalize_for_panel(raw: &[Value], panel: &Panel) -> NormalizeReport {
    normalize_with(raw, |target| resolve_entity(panel, target))
}

fn normalize_with(raw: &[Value], resolve: impl Fn(&str) -> Option<String>) -> NormalizeReport {
    let mut report = NormalizeReport::default();

    for (index, entry) in raw.iter().enumerate() {
        let finding = match read_finding(entry) {
            Ok(f) => f,
            Err(cause) => {
                tracing::warn!(index, %cause, "dropping malformed contextual finding");
                report.dropped.push(DroppedFinding { index, cause });
                continue;
            }
        };

        let mut targets = Vec::with_capacity(finding.targets.len());
        for target in &finding.targets {
            match resolve(target) {
                Some(id) => targets.push(id),
                None => {
                    tracing::warn!(
                        index,
                        target = %target,
                        "contextual finding names an unknown entity"
                    );
                    report.unresolved_targets += 1;
                }
            }
        }
        if targets.is_empty() {
            let cause = "no target resolves to a panel entity".to_string();
            tracing::warn!(index, %cause, "dropping contextual finding");
            report.dropped.push(DroppedFinding { index, cause });
            continue;
        }

        let severity = match finding.severity_hint.as_deref().and_then(Severity::parse) {
            Some(s) => s,
            None => {
                tracing::warn!(
                    index,
                    hint = finding.severity_hint.as_deref().unwrap_or("<none>"),
                    "unrecognized severity hint read as medium"
                );
                report.downgrades.push(SeverityDowngrade {
                    index,
                    hint: finding.severity_hint.clone(),
                });
                Severity::Medium
            }
        };

        report.violations.push(Violation::new(
            Source::Contextual,
            finding.rule_code,
            targets,
            severity,
            finding.reason,
            finding
                .rule_reference
                .unwrap_or_else(|| DEFAULT_CONTEXTUAL_REFERENCE.to_string()),
        ));
    }

    sort_canonical(&mut report.violations);
    tracing::debug!(
        kept = report.violations.len(),
        dropped = report.dropped.len(),
        downgraded = report.downgrades.len(),
        "contextual findings normalized"
    );
    report
}

fn read_finding(entry: &Value) -> Result<RawFinding, String> {
    let obj = entry
        .as_object()
        .ok_or_else(|| "finding is not a JSON object".to_string())?;

    let category = first_text(obj, CATEGORY_KEYS).ok_or_else(|| "missing category".to_string())?;
    let rule_code = canonical_rule_code(category);
    if rule_code.is_empty() {
        return Err(format!("category '{}' has no usable characters", category));
    }

    let reason = first_text(obj, REASON_KEYS).ok_or_else(|| "missing reason".to_string())?;

    let targets = read_targets(obj);
    if targets.is_empty() {
        return Err("missing target ids".to_string());
    }

    let severity_hint = SEVERITY_KEYS
        .iter()
        .find_map(|k| obj.get(*k))
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });

    Ok(RawFinding {
        rule_code,
        targets,
        reason: reason.to_string(),
        severity_hint,
        rule_reference: first_text(obj, &["rule_reference"]).map(str::to_string),
    })
}

fn first_text<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
}

fn read_targets(obj: &Map<String, Value>) -> Vec<String> {
    let Some(value) = TARGET_KEYS.iter().find_map(|k| obj.get(*k)) else {
        return vec![];
    };
    let items: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        single => vec![single],
    };
    items
        .into_iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Lowercase, with runs of whitespace, `-` and `_` collapsed to a single `_`.
/// "Missing Jack-Studs" becomes "missing_jack_studs".
pub fn canonical_rule_code(category: &str) -> String {
    let mut out = String::with_capacity(category.len());
    let mut pending_sep = false;
    for ch in category.trim().chars() {
        if ch.is_whitespace() || ch == '-' || ch == '_' {
            pending_sep = !out.is_empty();
            continue;
        }
        if pending_sep {
            out.push('_');
            pending_sep = false;
        }
        out.extend(ch.to_lowercase());
    }
    out
}

fn resolve_entity(panel: &Panel, target: &str) -> Option<String> {
    if panel.contains_entity(target) {
        return Some(target.to_string());
    }
    std::iter::once(panel.panel_id.as_str())
        .chain(panel.entity_ids())
        .find(|id| id.eq_ignore_ascii_case(target))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_codes_are_canonicalized() {
        assert_eq!(canonical_rule_code("Missing Jack-Studs"), "missing_jack_studs");
        assert_eq!(canonical_rule_code("  duct__clash "), "duct_clash");
        assert_eq!(canonical_rule_code("--"), "");
    }
}
