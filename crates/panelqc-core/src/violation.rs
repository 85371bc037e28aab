use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::fmt;

/// Canonical severity scale. Declaration order is the total order, so
/// `Critical > High > Medium > Low`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    schemars::JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    #[serde(alias = "minor")]
    Medium,
    #[serde(alias = "major")]
    High,
    Critical,
}

impl Severity {
    pub const DESCENDING: [Severity; 4] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }

    /// Case-insensitive parse. The legacy three-level labels map onto the top
    /// of the scale: `major` is `High`, `minor` is `Medium`.
    pub fn parse(label: &str) -> Option<Severity> {
        match label.trim().to_ascii_lowercase().as_str() {
            "critical" => Some(Severity::Critical),
            "high" | "major" => Some(Severity::High),
            "medium" | "minor" => Some(Severity::Medium),
            "low" => Some(Severity::Low),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    schemars::JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Deterministic,
    Contextual,
}

/// A single rule failure, whichever source reported it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Violation {
    pub violation_id: String,
    pub source: Source,
    pub rule_code: String,
    /// Sorted and free of duplicates
    pub target_ids: Vec<String>,
    pub severity: Severity,
    pub reason: String,
    pub rule_reference: String,
}

impl Violation {
    pub fn new<I, S>(
        source: Source,
        rule_code: impl Into<String>,
        targets: I,
        severity: Severity,
        reason: impl Into<String>,
        rule_reference: impl Into<String>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rule_code = rule_code.into();
        let mut target_ids: Vec<String> = targets.into_iter().map(Into::into).collect();
        target_ids.sort();
        target_ids.dedup();
        Violation {
            violation_id: violation_id(&rule_code, &target_ids),
            source,
            rule_code,
            target_ids,
            severity,
            reason: reason.into(),
            rule_reference: rule_reference.into(),
        }
    }

    /// Lexicographically smallest target, or "" when there is none.
    pub fn smallest_target(&self) -> &str {
        self.target_ids.iter().min().map(String::as_str).unwrap_or("")
    }

    pub fn implicates(&self, entity_id: &str) -> bool {
        self.target_ids.iter().any(|t| t == entity_id)
    }
}

/// Dedup key shared by every source: a hash of the rule code and the sorted
/// target set. Target order in `targets` does not matter.
pub fn violation_id(rule_code: &str, targets: &[String]) -> String {
    let mut sorted: Vec<&str> = targets.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();

    let mut hasher = Sha256::new();
    hasher.update(rule_code.as_bytes());
    for target in sorted {
        hasher.update([0x1f]);
        hasher.update(target.as_bytes());
    }
    let digest = hasher.finalize();
    let mut out = String::with_capacity(18);
    out.push_str("v-");
    for b in &digest[..8] {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

/// Severity descending, then rule code, then smallest target, then id.
pub fn canonical_cmp(a: &Violation, b: &Violation) -> Ordering {
    b.severity
        .cmp(&a.severity)
        .then_with(|| a.rule_code.cmp(&b.rule_code))
        .then_with(|| a.smallest_target().cmp(b.smallest_target()))
        .then_with(|| a.violation_id.cmp(&b.violation_id))
}

pub fn sort_canonical(violations: &mut [Violation]) {
    violations.sort_by(canonical_cmp);
}
