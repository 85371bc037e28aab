//! Pulls contextual findings out of free-form analysis output and points
//! their target references at real panel entities.
//!
//! The output of this crate is still raw JSON. It goes through
//! [`panelqc_core::normalize_for_panel`] before it becomes violations.

mod parse;
mod resolve;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use parse::extract_findings;
pub use resolve::{resolve_target, resolve_targets};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    pub findings: Vec<Value>,
    /// The analysis asked for an engineer to look at the panel
    #[serde(default)]
    pub needs_review: bool,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.findings.is_empty() && !self.needs_review
    }
}
