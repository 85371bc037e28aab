//! Typed building-code rule configuration.
//!
//! The on-disk form is a JSON object keyed by rule category. Every category has
//! explicit defaults, so an empty object is a complete configuration. Unknown
//! nested parameters are ignored; unknown categories are rejected in
//! [`LoadMode::Strict`] and reported as [`ConfigWarning`]s in
//! [`LoadMode::Lenient`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::ConfigError;

pub const CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    StudSpacing,
    Openings,
    DuctClearance,
    Dimension,
    Seismic,
}

impl RuleCategory {
    pub const ALL: [RuleCategory; 5] = [
        RuleCategory::StudSpacing,
        RuleCategory::Openings,
        RuleCategory::DuctClearance,
        RuleCategory::Dimension,
        RuleCategory::Seismic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleCategory::StudSpacing => "stud_spacing",
            RuleCategory::Openings => "openings",
            RuleCategory::DuctClearance => "duct_clearance",
            RuleCategory::Dimension => "dimension",
            RuleCategory::Seismic => "seismic",
        }
    }

    /// Resolve a top-level configuration key, including the legacy names.
    pub fn from_key(key: &str) -> Option<RuleCategory> {
        match key {
            "stud_spacing" => Some(RuleCategory::StudSpacing),
            "openings" => Some(RuleCategory::Openings),
            "duct_clearance" | "mep_clearance" | "ducts_and_services" => {
                Some(RuleCategory::DuctClearance)
            }
            "dimension" | "panel_dimensions" => Some(RuleCategory::Dimension),
            "seismic" => Some(RuleCategory::Seismic),
            _ => None,
        }
    }
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadMode {
    /// Unknown or malformed categories are skipped and reported as warnings.
    #[default]
    Lenient,
    /// Unknown or malformed categories fail the load.
    Strict,
}

/// Non-fatal problem found while loading a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConfigWarning {
    UnknownCategory { category: String },
    MalformedCategory { category: String, detail: String },
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigWarning::UnknownCategory { category } => {
                write!(f, "unknown rule category '{}' skipped", category)
            }
            ConfigWarning::MalformedCategory { category, detail } => {
                write!(f, "rule category '{}' skipped: {}", category, detail)
            }
        }
    }
}

// --- Category parameters ---

trait CategoryRules: DeserializeOwned {
    fn validate(&self) -> Result<(), String>;
    fn disable(&mut self);
}

fn non_negative(name: &str, value: f64) -> Result<(), String> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(format!("{} must be a non-negative number, got {}", name, value))
    }
}

fn positive(name: &str, value: f64) -> Result<(), String> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(format!("{} must be a positive number, got {}", name, value))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudSpacingRules {
    pub enabled: bool,
    pub standard_spacing_mm: f64,
    pub tolerance_mm: f64,
}

impl Default for StudSpacingRules {
    fn default() -> Self {
        Self {
            enabled: true,
            standard_spacing_mm: 406.4,
            tolerance_mm: 6.35,
        }
    }
}

impl CategoryRules for StudSpacingRules {
    fn validate(&self) -> Result<(), String> {
        positive("standard_spacing_mm", self.standard_spacing_mm)?;
        non_negative("tolerance_mm", self.tolerance_mm)
    }

    fn disable(&mut self) {
        self.enabled = false;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpeningRules {
    pub enabled: bool,
    pub require_jack_studs: bool,
    pub require_header: bool,
    /// How far a jack stud centerline may sit from the opening edge it supports
    pub jack_stud_proximity_mm: f64,
}

impl Default for OpeningRules {
    fn default() -> Self {
        Self {
            enabled: true,
            require_jack_studs: true,
            require_header: true,
            jack_stud_proximity_mm: 50.0,
        }
    }
}

impl CategoryRules for OpeningRules {
    fn validate(&self) -> Result<(), String> {
        non_negative("jack_stud_proximity_mm", self.jack_stud_proximity_mm)
    }

    fn disable(&mut self) {
        self.enabled = false;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuctClearanceRules {
    pub enabled: bool,
    #[serde(alias = "min_clearance_from_stud_mm", alias = "duct_to_stud_mm")]
    pub minimum_clearance_mm: f64,
    /// Measure from the duct wall instead of its centerline
    pub measure_from_duct_edge: bool,
}

impl Default for DuctClearanceRules {
    fn default() -> Self {
        Self {
            enabled: true,
            minimum_clearance_mm: 25.4,
            measure_from_duct_edge: false,
        }
    }
}

impl CategoryRules for DuctClearanceRules {
    fn validate(&self) -> Result<(), String> {
        non_negative("minimum_clearance_mm", self.minimum_clearance_mm)
    }

    fn disable(&mut self) {
        self.enabled = false;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DimensionRules {
    pub enabled: bool,
    pub max_width_mm: f64,
    pub max_height_mm: f64,
}

impl Default for DimensionRules {
    fn default() -> Self {
        Self {
            enabled: true,
            max_width_mm: 12192.0,
            max_height_mm: 3658.0,
        }
    }
}

impl CategoryRules for DimensionRules {
    fn validate(&self) -> Result<(), String> {
        positive("max_width_mm", self.max_width_mm)?;
        positive("max_height_mm", self.max_height_mm)
    }

    fn disable(&mut self) {
        self.enabled = false;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeismicRules {
    pub enabled: bool,
    /// Zones at or above this need engineered bracing near panel edges
    pub min_zone: u8,
    pub min_edge_distance_mm: f64,
}

impl Default for SeismicRules {
    fn default() -> Self {
        Self {
            enabled: true,
            min_zone: 3,
            min_edge_distance_mm: 500.0,
        }
    }
}

impl CategoryRules for SeismicRules {
    fn validate(&self) -> Result<(), String> {
        if self.min_zone > crate::MAX_SEISMIC_ZONE {
            return Err(format!("min_zone {} is outside 0-4", self.min_zone));
        }
        non_negative("min_edge_distance_mm", self.min_edge_distance_mm)
    }

    fn disable(&mut self) {
        self.enabled = false;
    }
}

// --- Configuration ---

/// The full rule set for one run. Read-only once loaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleConfiguration {
    pub version: u32,
    pub stud_spacing: StudSpacingRules,
    pub openings: OpeningRules,
    pub duct_clearance: DuctClearanceRules,
    pub dimension: DimensionRules,
    pub seismic: SeismicRules,
    /// Problems found while loading; carried into every check report
    #[serde(skip)]
    pub warnings: Vec<ConfigWarning>,
}

impl Default for RuleConfiguration {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            stud_spacing: StudSpacingRules::default(),
            openings: OpeningRules::default(),
            duct_clearance: DuctClearanceRules::default(),
            dimension: DimensionRules::default(),
            seismic: SeismicRules::default(),
            warnings: Vec::new(),
        }
    }
}

impl RuleConfiguration {
    pub fn from_json(raw: &str, mode: LoadMode) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(raw)?;
        Self::from_value(&value, mode)
    }

    pub fn from_value(value: &Value, mode: LoadMode) -> Result<Self, ConfigError> {
        let map = value.as_object().ok_or(ConfigError::NotAnObject)?;
        let mut config = RuleConfiguration::default();

        for (key, body) in map {
            if key == "version" {
                // 1 and 1.0 are the same version
                if body.as_f64() == Some(f64::from(CONFIG_VERSION)) {
                    continue;
                }
                return Err(ConfigError::UnsupportedVersion(body.to_string()));
            }

            let Some(category) = RuleCategory::from_key(key) else {
                if mode == LoadMode::Strict {
                    return Err(ConfigError::UnknownCategory(key.clone()));
                }
                tracing::warn!(category = %key, "skipping unknown rule category");
                config.warnings.push(ConfigWarning::UnknownCategory {
                    category: key.clone(),
                });
                continue;
            };

            let body = unwrap_legacy_rules(body);
            if let Err(detail) = config.apply(category, &body) {
                if mode == LoadMode::Strict {
                    return Err(ConfigError::MalformedCategory {
                        category: key.clone(),
                        detail,
                    });
                }
                tracing::warn!(category = %key, %detail, "skipping malformed rule category");
                config.disable(category);
                config.warnings.push(ConfigWarning::MalformedCategory {
                    category: key.clone(),
                    detail,
                });
            }
        }

        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn is_enabled(&self, category: RuleCategory) -> bool {
        match category {
            RuleCategory::StudSpacing => self.stud_spacing.enabled,
            RuleCategory::Openings => self.openings.enabled,
            RuleCategory::DuctClearance => self.duct_clearance.enabled,
            RuleCategory::Dimension => self.dimension.enabled,
            RuleCategory::Seismic => self.seismic.enabled,
        }
    }

    fn apply(&mut self, category: RuleCategory, body: &Value) -> Result<(), String> {
        match category {
            RuleCategory::StudSpacing => self.stud_spacing = parse_category(body)?,
            RuleCategory::Openings => self.openings = parse_category(body)?,
            RuleCategory::DuctClearance => self.duct_clearance = parse_category(body)?,
            RuleCategory::Dimension => self.dimension = parse_category(body)?,
            RuleCategory::Seismic => self.seismic = parse_category(body)?,
        }
        Ok(())
    }

    fn disable(&mut self, category: RuleCategory) {
        match category {
            RuleCategory::StudSpacing => self.stud_spacing.disable(),
            RuleCategory::Openings => self.openings.disable(),
            RuleCategory::DuctClearance => self.duct_clearance.disable(),
            RuleCategory::Dimension => self.dimension.disable(),
            RuleCategory::Seismic => self.seismic.disable(),
        }
    }

    /// Plain-text rundown of the active rules, for agents reviewing panels.
    pub fn describe(&self) -> String {
        let mut out = String::with_capacity(1024);
        out.push_str("Deterministic panel rules (all lengths in mm):\n");

        let s = &self.stud_spacing;
        push_rule(
            &mut out,
            s.enabled,
            "stud_spacing",
            &format!(
                "consecutive non-jack studs must be {} apart within ±{}; \
                 medium severity, high beyond twice the tolerance",
                s.standard_spacing_mm, s.tolerance_mm
            ),
        );

        let o = &self.openings;
        push_rule(
            &mut out,
            o.enabled && o.require_jack_studs,
            "missing_jack_studs",
            &format!(
                "every opening needs listed jack studs within {} of both vertical edges; critical",
                o.jack_stud_proximity_mm
            ),
        );
        push_rule(
            &mut out,
            o.enabled && o.require_header,
            "missing_header",
            "every opening needs a header; critical",
        );

        let d = &self.duct_clearance;
        push_rule(
            &mut out,
            d.enabled,
            "duct_clash",
            &format!(
                "each duct must clear the nearest stud centerline by at least {}{}; high",
                d.minimum_clearance_mm,
                if d.measure_from_duct_edge {
                    " measured from the duct wall"
                } else {
                    ""
                }
            ),
        );

        let m = &self.dimension;
        push_rule(
            &mut out,
            m.enabled,
            "dimension_violation",
            &format!(
                "panel must not exceed {} wide or {} high; medium",
                m.max_width_mm, m.max_height_mm
            ),
        );

        let z = &self.seismic;
        push_rule(
            &mut out,
            z.enabled,
            "seismic_corner_opening",
            &format!(
                "in seismic zone {} or above, openings must sit at least {} \
                 from the panel sides; high",
                z.min_zone, z.min_edge_distance_mm
            ),
        );

        out
    }
}

fn push_rule(out: &mut String, enabled: bool, code: &str, text: &str) {
    out.push_str("- ");
    out.push_str(code);
    if !enabled {
        out.push_str(" (disabled)");
    }
    out.push_str(": ");
    out.push_str(text);
    out.push('\n');
}

fn parse_category<T: CategoryRules>(body: &Value) -> Result<T, String> {
    if !body.is_object() {
        return Err("expected an object of parameters".to_string());
    }
    let rules: T = serde_json::from_value(body.clone()).map_err(|e| e.to_string())?;
    rules.validate()?;
    Ok(rules)
}

/// Older configuration files nest the parameters under a `rules` object, or
/// keep a `rules` array of descriptors next to them. Flatten the former and
/// drop the latter.
fn unwrap_legacy_rules(body: &Value) -> Value {
    let Some(outer) = body.as_object() else {
        return body.clone();
    };
    let mut flat: Map<String, Value> = outer.clone();
    if let Some(Value::Object(inner)) = flat.remove("rules") {
        flat.extend(inner);
    }
    Value::Object(flat)
}
