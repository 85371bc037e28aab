pub mod check;
pub mod contextual;
pub mod error;
pub mod merge;
pub mod pipeline;
pub mod render;
pub mod rules;
pub mod storage;
pub mod violation;

pub use check::{check, CheckReport};
pub use contextual::{
    canonical_rule_code, normalize, normalize_for_panel, DroppedFinding, NormalizeReport,
    SeverityDowngrade,
};
pub use error::{ConfigError, PanelError, StorageError};
pub use merge::{merge, summarize, MergeSummary, Verdict};
pub use pipeline::{review_panel, PanelReview};
pub use render::{render, Diagram, Element, SCALE};
pub use rules::{ConfigWarning, LoadMode, RuleCategory, RuleConfiguration};
pub use violation::{violation_id, Severity, Source, Violation};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Slack applied to every geometric comparison, in millimetres.
pub const GEOMETRY_EPSILON_MM: f64 = 1e-6;

/// Highest seismic zone code accepted on a panel.
pub const MAX_SEISMIC_ZONE: u8 = 4;

// --- Panel model ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum OpeningKind {
    Window,
    Door,
}

impl OpeningKind {
    pub fn label(&self) -> &'static str {
        match self {
            OpeningKind::Window => "Window",
            OpeningKind::Door => "Door",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
pub struct Stud {
    pub id: String,
    /// Centerline offset from the panel's left edge
    pub x_mm: f64,
    #[serde(default)]
    pub is_jack_stud: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backing_plate: Option<bool>,
}

impl Stud {
    pub fn has_backing_plate(&self) -> bool {
        self.backing_plate.unwrap_or(false)
    }
}

/// A window or door. `x_mm` is the left edge measured from the panel's left
/// edge, `y_mm` the bottom edge measured from the panel's bottom edge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
pub struct Opening {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: OpeningKind,
    pub x_mm: f64,
    #[serde(default)]
    pub y_mm: f64,
    pub width_mm: f64,
    pub height_mm: f64,
    #[serde(default)]
    pub has_header: bool,
    /// Studs flanking the opening
    #[serde(default)]
    pub jack_stud_ids: Vec<String>,
}

impl Opening {
    pub fn left_edge_mm(&self) -> f64 {
        self.x_mm
    }

    pub fn right_edge_mm(&self) -> f64 {
        self.x_mm + self.width_mm
    }

    /// Horizontal distance to the nearer side edge of a panel `panel_width_mm` wide.
    pub fn distance_to_nearest_edge_mm(&self, panel_width_mm: f64) -> f64 {
        self.left_edge_mm()
            .min(panel_width_mm - self.right_edge_mm())
            .max(0.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
pub struct Duct {
    pub id: String,
    /// Free-form service type, e.g. "supply", "exhaust", "plumbing"
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Centerline point, measured like opening coordinates
    pub x_mm: f64,
    #[serde(default)]
    pub y_mm: f64,
    pub diameter_mm: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
pub struct Panel {
    pub panel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub width_mm: f64,
    pub height_mm: f64,
    #[serde(default)]
    pub seismic_zone: u8,
    #[serde(default)]
    pub studs: Vec<Stud>,
    #[serde(default)]
    pub openings: Vec<Opening>,
    #[serde(default)]
    pub ducts: Vec<Duct>,
}

impl Panel {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.panel_id)
    }

    pub fn stud(&self, id: &str) -> Option<&Stud> {
        self.studs.iter().find(|s| s.id == id)
    }

    /// Ids of every stud, opening and duct, in declaration order.
    pub fn entity_ids(&self) -> impl Iterator<Item = &str> {
        self.studs
            .iter()
            .map(|s| s.id.as_str())
            .chain(self.openings.iter().map(|o| o.id.as_str()))
            .chain(self.ducts.iter().map(|d| d.id.as_str()))
    }

    /// Whether `id` names the panel itself or one of its entities.
    pub fn contains_entity(&self, id: &str) -> bool {
        self.panel_id == id || self.entity_ids().any(|e| e == id)
    }

    /// Structural validation. A panel that fails here is never checked or rendered.
    pub fn validate(&self) -> Result<(), PanelError> {
        positive("width_mm", self.width_mm)?;
        positive("height_mm", self.height_mm)?;
        if self.seismic_zone > MAX_SEISMIC_ZONE {
            return Err(PanelError::SeismicZone(self.seismic_zone));
        }
        if self.panel_id.trim().is_empty() {
            return Err(PanelError::EmptyId { kind: "panel" });
        }

        let mut seen: HashSet<&str> = HashSet::new();
        seen.insert(self.panel_id.as_str());
        let kinds = self
            .studs
            .iter()
            .map(|s| ("stud", s.id.as_str()))
            .chain(self.openings.iter().map(|o| ("opening", o.id.as_str())))
            .chain(self.ducts.iter().map(|d| ("duct", d.id.as_str())));
        for (kind, id) in kinds {
            if id.trim().is_empty() {
                return Err(PanelError::EmptyId { kind });
            }
            if !seen.insert(id) {
                return Err(PanelError::DuplicateId(id.to_string()));
            }
        }

        for stud in &self.studs {
            coordinate("stud", &stud.id, "x_mm", stud.x_mm)?;
            if stud.x_mm > self.width_mm + GEOMETRY_EPSILON_MM {
                return Err(PanelError::OutOfBounds {
                    kind: "stud",
                    id: stud.id.clone(),
                });
            }
        }

        for opening in &self.openings {
            coordinate("opening", &opening.id, "x_mm", opening.x_mm)?;
            coordinate("opening", &opening.id, "y_mm", opening.y_mm)?;
            extent("opening", &opening.id, "width_mm", opening.width_mm)?;
            extent("opening", &opening.id, "height_mm", opening.height_mm)?;
            if opening.right_edge_mm() > self.width_mm + GEOMETRY_EPSILON_MM
                || opening.y_mm + opening.height_mm > self.height_mm + GEOMETRY_EPSILON_MM
            {
                return Err(PanelError::OutOfBounds {
                    kind: "opening",
                    id: opening.id.clone(),
                });
            }
            for stud_id in &opening.jack_stud_ids {
                if self.stud(stud_id).is_none() {
                    return Err(PanelError::UnknownJackStud {
                        opening: opening.id.clone(),
                        stud: stud_id.clone(),
                    });
                }
            }
        }

        for duct in &self.ducts {
            coordinate("duct", &duct.id, "x_mm", duct.x_mm)?;
            coordinate("duct", &duct.id, "y_mm", duct.y_mm)?;
            extent("duct", &duct.id, "diameter_mm", duct.diameter_mm)?;
            if duct.x_mm > self.width_mm + GEOMETRY_EPSILON_MM
                || duct.y_mm > self.height_mm + GEOMETRY_EPSILON_MM
            {
                return Err(PanelError::OutOfBounds {
                    kind: "duct",
                    id: duct.id.clone(),
                });
            }
        }

        Ok(())
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), PanelError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(PanelError::InvalidDimension { field, value })
    }
}

fn coordinate(
    kind: &'static str,
    id: &str,
    field: &'static str,
    value: f64,
) -> Result<(), PanelError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(PanelError::InvalidGeometry {
            kind,
            id: id.to_string(),
            field,
            value,
        })
    }
}

fn extent(kind: &'static str, id: &str, field: &'static str, value: f64) -> Result<(), PanelError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(PanelError::InvalidGeometry {
            kind,
            id: id.to_string(),
            field,
            value,
        })
    }
}
