//! Panel diagrams with violations highlighted.
//!
//! Every render uses the same [`SCALE`], so diagrams of different panels can be
//! compared side by side. Panel coordinates grow upward from the bottom-left
//! corner; drawing coordinates grow downward, so the y axis is flipped here.

use serde::Serialize;

use crate::check::codes;
use crate::violation::{Severity, Violation};
use crate::{Panel, PanelError};

/// Drawing units per millimetre.
pub const SCALE: f64 = 0.2;
pub const MARGIN: f64 = 50.0;
const MIN_WIDTH: f64 = 480.0;
const LINE_HEIGHT: f64 = 14.0;
const REASON_LIMIT: usize = 90;

pub const NO_VIOLATIONS: &str = "No violations found";

pub mod palette {
    pub const PANEL_FILL: &str = "#F5F5F5";
    pub const PANEL_STROKE: &str = "#2C3E50";
    pub const STUD: &str = "#7F8C8D";
    pub const OPENING: &str = "#AED6F1";
    pub const OPENING_STROKE: &str = "#3498DB";
    pub const DUCT: &str = "#95A5A6";
    pub const WARNING: &str = "#E74C3C";
    pub const OPENING_WARNING: &str = "#FFD700";
    pub const PASS: &str = "#27AE60";
    pub const BRACING: &str = "#8E44AD";
    pub const TEXT: &str = "#2C3E50";
}

fn severity_color(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "#C0392B",
        Severity::High => "#D35400",
        Severity::Medium => "#B7950B",
        Severity::Low => "#7F8C8D",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Anchor {
    Start,
    Middle,
    End,
}

impl Anchor {
    fn as_str(&self) -> &'static str {
        match self {
            Anchor::Start => "start",
            Anchor::Middle => "middle",
            Anchor::End => "end",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "shape", rename_all = "lowercase")]
pub enum Element {
    Rect {
        class: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        entity: Option<String>,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        fill: &'static str,
        stroke: &'static str,
    },
    Line {
        class: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        entity: Option<String>,
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        stroke: &'static str,
        stroke_width: f64,
        /// SVG `stroke-dasharray`, solid when absent
        #[serde(skip_serializing_if = "Option::is_none")]
        dash: Option<&'static str>,
    },
    Circle {
        class: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        entity: Option<String>,
        cx: f64,
        cy: f64,
        r: f64,
        fill: &'static str,
    },
    Text {
        class: &'static str,
        x: f64,
        y: f64,
        content: String,
        fill: &'static str,
        size: f64,
        anchor: Anchor,
        bold: bool,
    },
}

impl Element {
    pub fn class(&self) -> &'static str {
        match self {
            Element::Rect { class, .. }
            | Element::Line { class, .. }
            | Element::Circle { class, .. }
            | Element::Text { class, .. } => *class,
        }
    }

    /// Id of the panel entity this element draws, if any.
    pub fn entity(&self) -> Option<&str> {
        match self {
            Element::Rect { entity, .. }
            | Element::Line { entity, .. }
            | Element::Circle { entity, .. } => entity.as_deref(),
            Element::Text { .. } => None,
        }
    }

    /// The color that carries the element's status: stroke for lines, fill otherwise.
    pub fn color(&self) -> &'static str {
        match self {
            Element::Line { stroke, .. } => *stroke,
            Element::Rect { fill, .. }
            | Element::Circle { fill, .. }
            | Element::Text { fill, .. } => *fill,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Element::Text { content, .. } => Some(content.as_str()),
            _ => None,
        }
    }

    fn write_svg(&self, out: &mut String) {
        out.push_str("  ");
        match self {
            Element::Rect {
                class,
                entity,
                x,
                y,
                width,
                height,
                fill,
                stroke,
            } => {
                out.push_str(&format!(
                    "<rect class=\"{}\"{} x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"{}\" stroke=\"{}\"/>",
                    class,
                    entity_attr(entity),
                    num(*x),
                    num(*y),
                    num(*width),
                    num(*height),
                    fill,
                    stroke
                ));
            }
            Element::Line {
                class,
                entity,
                x1,
                y1,
                x2,
                y2,
                stroke,
                stroke_width,
                dash,
            } => {
                out.push_str(&format!(
                    "<line class=\"{}\"{} x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\" \
                     stroke=\"{}\" stroke-width=\"{}\"{}/>",
                    class,
                    entity_attr(entity),
                    num(*x1),
                    num(*y1),
                    num(*x2),
                    num(*y2),
                    stroke,
                    num(*stroke_width),
                    match dash {
                        Some(pattern) => format!(" stroke-dasharray=\"{}\"", pattern),
                        None => String::new(),
                    }
                ));
            }
            Element::Circle {
                class,
                entity,
                cx,
                cy,
                r,
                fill,
            } => {
                out.push_str(&format!(
                    "<circle class=\"{}\"{} cx=\"{}\" cy=\"{}\" r=\"{}\" fill=\"{}\"/>",
                    class,
                    entity_attr(entity),
                    num(*cx),
                    num(*cy),
                    num(*r),
                    fill
                ));
            }
            Element::Text {
                class,
                x,
                y,
                content,
                fill,
                size,
                anchor,
                bold,
            } => {
                out.push_str(&format!(
                    "<text class=\"{}\" x=\"{}\" y=\"{}\" fill=\"{}\" font-size=\"{}\" text-anchor=\"{}\"{}>{}</text>",
                    class,
                    num(*x),
                    num(*y),
                    fill,
                    num(*size),
                    anchor.as_str(),
                    if *bold { " font-weight=\"bold\"" } else { "" },
                    escape(content)
                ));
            }
        }
        out.push('\n');
    }
}

/// A scaled vector drawing of one panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagram {
    pub width: f64,
    pub height: f64,
    pub scale: f64,
    pub elements: Vec<Element>,
}

impl Diagram {
    pub fn elements_of_class<'a>(&'a self, class: &'a str) -> impl Iterator<Item = &'a Element> {
        self.elements.iter().filter(move |e| e.class() == class)
    }

    /// The element that draws entity `id` (stud, opening or duct).
    pub fn entity(&self, id: &str) -> Option<&Element> {
        self.elements.iter().find(|e| e.entity() == Some(id))
    }

    pub fn to_svg(&self) -> String {
        let mut out = String::with_capacity(256 + self.elements.len() * 128);
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        out.push_str(&format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"0 0 {w} {h}\" width=\"{w}\" height=\"{h}\">\n",
            w = num(self.width),
            h = num(self.height)
        ));
        out.push_str("  <style>text { font-family: Arial, sans-serif; }</style>\n");
        for element in &self.elements {
            element.write_svg(&mut out);
        }
        out.push_str("</svg>\n");
        out
    }
}

/// Draw `panel` with every entity named in `violations` highlighted, followed
/// by a summary of the violations grouped by severity.
pub fn render(panel: &Panel, violations: &[Violation]) -> Result<Diagram, PanelError> {
    panel.validate()?;

    let panel_w = panel.width_mm * SCALE;
    let panel_h = panel.height_mm * SCALE;
    let flagged = |id: &str| violations.iter().any(|v| v.implicates(id));
    // openings that need engineered bracing get a dashed cross
    let braced = |id: &str| {
        violations
            .iter()
            .any(|v| v.rule_code == codes::SEISMIC_CORNER_OPENING && v.implicates(id))
    };
    // millimetres from the panel bottom to drawing y
    let to_y = |mm: f64| MARGIN + (panel.height_mm - mm) * SCALE;

    let mut elements = Vec::with_capacity(
        4 + panel.studs.len() + panel.openings.len() * 2 + violations.len() * 2,
    );

    elements.push(Element::Text {
        class: "title",
        x: MARGIN,
        y: MARGIN - 20.0,
        content: panel.display_name().to_string(),
        fill: palette::TEXT,
        size: 14.0,
        anchor: Anchor::Start,
        bold: true,
    });
    elements.push(Element::Rect {
        class: "panel",
        entity: None,
        x: MARGIN,
        y: MARGIN,
        width: panel_w,
        height: panel_h,
        fill: palette::PANEL_FILL,
        stroke: if flagged(&panel.panel_id) {
            palette::WARNING
        } else {
            palette::PANEL_STROKE
        },
    });

    for stud in &panel.studs {
        let x = MARGIN + stud.x_mm * SCALE;
        elements.push(Element::Line {
            class: if stud.is_jack_stud { "jack-stud" } else { "stud" },
            entity: Some(stud.id.clone()),
            x1: x,
            y1: MARGIN,
            x2: x,
            y2: MARGIN + panel_h,
            stroke: if flagged(&stud.id) { palette::WARNING } else { palette::STUD },
            stroke_width: if stud.is_jack_stud { 3.0 } else { 1.5 },
            dash: None,
        });
        if stud.has_backing_plate() {
            elements.push(Element::Rect {
                class: "backing-plate",
                entity: None,
                x: x - 4.0,
                y: MARGIN + panel_h / 2.0 - 2.0,
                width: 8.0,
                height: 4.0,
                fill: palette::STUD,
                stroke: palette::STUD,
            });
        }
    }

    for opening in &panel.openings {
        let x = MARGIN + opening.x_mm * SCALE;
        let y = to_y(opening.y_mm + opening.height_mm);
        let w = opening.width_mm * SCALE;
        let h = opening.height_mm * SCALE;
        elements.push(Element::Rect {
            class: "opening",
            entity: Some(opening.id.clone()),
            x,
            y,
            width: w,
            height: h,
            fill: if flagged(&opening.id) {
                palette::OPENING_WARNING
            } else {
                palette::OPENING
            },
            stroke: palette::OPENING_STROKE,
        });
        elements.push(Element::Text {
            class: "label",
            x: x + w / 2.0,
            y: y + h / 2.0 + 4.0,
            content: format!("{} {:.0}mm", opening.kind.label(), opening.width_mm),
            fill: palette::TEXT,
            size: 10.0,
            anchor: Anchor::Middle,
            bold: false,
        });
        if braced(&opening.id) {
            for (y1, y2) in [(y, y + h), (y + h, y)] {
                elements.push(Element::Line {
                    class: "bracing",
                    entity: None,
                    x1: x,
                    y1,
                    x2: x + w,
                    y2,
                    stroke: palette::BRACING,
                    stroke_width: 2.0,
                    dash: Some("6,4"),
                });
            }
        }
    }

    for duct in &panel.ducts {
        elements.push(Element::Circle {
            class: "duct",
            entity: Some(duct.id.clone()),
            cx: MARGIN + duct.x_mm * SCALE,
            cy: to_y(duct.y_mm),
            r: (duct.diameter_mm * SCALE / 2.0).max(1.0),
            fill: if flagged(&duct.id) { palette::WARNING } else { palette::DUCT },
        });
    }

    elements.push(Element::Text {
        class: "dimension",
        x: MARGIN + panel_w / 2.0,
        y: MARGIN + panel_h + 20.0,
        content: format!("{:.0}mm", panel.width_mm),
        fill: palette::TEXT,
        size: 11.0,
        anchor: Anchor::Middle,
        bold: false,
    });
    elements.push(Element::Text {
        class: "dimension",
        x: MARGIN - 8.0,
        y: MARGIN + panel_h / 2.0,
        content: format!("{:.0}mm", panel.height_mm),
        fill: palette::TEXT,
        size: 11.0,
        anchor: Anchor::End,
        bold: false,
    });

    let summary_top = MARGIN + panel_h + 45.0;
    let lines = push_summary(&mut elements, violations, summary_top, MARGIN + panel_w / 2.0);

    Ok(Diagram {
        width: (panel_w + 2.0 * MARGIN).max(MIN_WIDTH),
        height: summary_top + lines as f64 * LINE_HEIGHT + MARGIN,
        scale: SCALE,
        elements,
    })
}

/// Append the summary block (or the all-clear marker) and return how many
/// text lines it used.
fn push_summary(
    elements: &mut Vec<Element>,
    violations: &[Violation],
    top: f64,
    center_x: f64,
) -> usize {
    if violations.is_empty() {
        elements.push(Element::Text {
            class: "status",
            x: center_x,
            y: top,
            content: NO_VIOLATIONS.to_string(),
            fill: palette::PASS,
            size: 13.0,
            anchor: Anchor::Middle,
            bold: true,
        });
        return 1;
    }

    let mut line = 0usize;
    let mut text = |elements: &mut Vec<Element>,
                    class: &'static str,
                    indent: f64,
                    content: String,
                    fill: &'static str,
                    bold: bool| {
        elements.push(Element::Text {
            class,
            x: MARGIN + indent,
            y: top + line as f64 * LINE_HEIGHT,
            content,
            fill,
            size: if bold { 11.0 } else { 9.0 },
            anchor: Anchor::Start,
            bold,
        });
        line += 1;
    };

    text(
        elements,
        "summary-title",
        0.0,
        format!("Violations found: {}", violations.len()),
        palette::WARNING,
        true,
    );
    for severity in Severity::DESCENDING {
        let group: Vec<&Violation> = violations.iter().filter(|v| v.severity == severity).collect();
        if group.is_empty() {
            continue;
        }
        text(
            elements,
            "summary-heading",
            0.0,
            format!("{} ({})", severity.as_str().to_uppercase(), group.len()),
            severity_color(severity),
            true,
        );
        for v in group {
            text(
                elements,
                "summary-line",
                12.0,
                format!("{} [{}]: {}", v.rule_code, v.severity, truncate(&v.reason, REASON_LIMIT)),
                palette::TEXT,
                false,
            );
        }
    }
    line
}

/// Collapse whitespace and cut to `limit` characters, ending in "..." when cut.
fn truncate(text: &str, limit: usize) -> String {
    let clean = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if clean.chars().count() <= limit {
        return clean;
    }
    let mut cut: String = clean.chars().take(limit.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}

fn entity_attr(entity: &Option<String>) -> String {
    match entity {
        Some(id) => format!(" data-entity=\"{}\"", escape(id)),
        None => String::new(),
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// At most two decimals, trailing zeros dropped.
fn num(value: f64) -> String {
    let s = format!("{:.2}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}
