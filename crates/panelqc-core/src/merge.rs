use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use crate::violation::{sort_canonical, Severity, Violation};

/// Combine both sources into one deduplicated list.
///
/// Violations sharing a `violation_id` collapse into one record. The kept
/// record prefers the deterministic source's reason and reference; its
/// severity is the highest in the group. The result is in canonical order
/// and does not depend on the order of either input.
pub fn merge(deterministic: &[Violation], contextual: &[Violation]) -> Vec<Violation> {
    let mut groups: BTreeMap<&str, Vec<&Violation>> = BTreeMap::new();
    for v in deterministic.iter().chain(contextual) {
        groups.entry(v.violation_id.as_str()).or_default().push(v);
    }

    let mut merged: Vec<Violation> = groups.into_values().filter_map(reconcile).collect();
    sort_canonical(&mut merged);
    tracing::debug!(
        deterministic = deterministic.len(),
        contextual = contextual.len(),
        merged = merged.len(),
        "violations merged"
    );
    merged
}

fn reconcile(group: Vec<&Violation>) -> Option<Violation> {
    let representative = group.iter().copied().min_by(|a, b| preference(a, b))?;
    let severity = group.iter().map(|v| v.severity).max()?;

    let mut kept = representative.clone();
    if severity > kept.severity {
        tracing::debug!(
            violation_id = %kept.violation_id,
            from = %kept.severity,
            to = %severity,
            "severity escalated during merge"
        );
        kept.severity = severity;
    }
    Some(kept)
}

/// Deterministic source first, then higher severity, then text, so the choice
/// never depends on input order.
fn preference(a: &Violation, b: &Violation) -> Ordering {
    a.source
        .cmp(&b.source)
        .then_with(|| b.severity.cmp(&a.severity))
        .then_with(|| a.reason.cmp(&b.reason))
        .then_with(|| a.rule_reference.cmp(&b.rule_reference))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail,
    NeedsReview,
}

impl Verdict {
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Pass => "PASS",
            Verdict::Fail => "FAIL",
            Verdict::NeedsReview => "NEEDS REVIEW",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeSummary {
    pub verdict: Verdict,
    pub total: usize,
    pub by_severity: BTreeMap<Severity, usize>,
    pub by_rule: BTreeMap<String, usize>,
    /// Merged violations that only the contextual source reported
    pub contextual_only: usize,
    /// Merged violations that both sources reported
    pub corroborated: usize,
}

/// Counts and verdict for a merged result. Anything only the contextual source
/// saw, or an explicit review request from it, needs an engineer's review.
pub fn summarize(
    deterministic: &[Violation],
    contextual: &[Violation],
    merged: &[Violation],
    review_requested: bool,
) -> MergeSummary {
    let det_ids: HashSet<&str> = deterministic.iter().map(|v| v.violation_id.as_str()).collect();
    let ctx_ids: HashSet<&str> = contextual.iter().map(|v| v.violation_id.as_str()).collect();

    let mut by_severity = BTreeMap::new();
    let mut by_rule = BTreeMap::new();
    let mut contextual_only = 0;
    let mut corroborated = 0;
    for v in merged {
        *by_severity.entry(v.severity).or_insert(0) += 1;
        *by_rule.entry(v.rule_code.clone()).or_insert(0) += 1;
        let id = v.violation_id.as_str();
        match (det_ids.contains(id), ctx_ids.contains(id)) {
            (true, true) => corroborated += 1,
            (false, true) => contextual_only += 1,
            _ => {}
        }
    }

    let verdict = if contextual_only > 0 || review_requested {
        Verdict::NeedsReview
    } else if !merged.is_empty() {
        Verdict::Fail
    } else {
        Verdict::Pass
    };

    MergeSummary {
        verdict,
        total: merged.len(),
        by_severity,
        by_rule,
        contextual_only,
        corroborated,
    }
}
