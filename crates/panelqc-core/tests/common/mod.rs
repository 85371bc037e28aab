#![allow(dead_code)]

use panelqc_core::{Duct, Opening, OpeningKind, Panel, Stud};

pub const SPACING: f64 = 406.4;

pub fn stud(id: &str, x_mm: f64) -> Stud {
    Stud {
        id: id.to_string(),
        x_mm,
        is_jack_stud: false,
        backing_plate: None,
    }
}

pub fn jack(id: &str, x_mm: f64) -> Stud {
    Stud {
        is_jack_stud: true,
        ..stud(id, x_mm)
    }
}

pub fn window(id: &str, x_mm: f64, width_mm: f64, jacks: &[&str]) -> Opening {
    Opening {
        id: id.to_string(),
        kind: OpeningKind::Window,
        x_mm,
        y_mm: 900.0,
        width_mm,
        height_mm: 1000.0,
        has_header: true,
        jack_stud_ids: jacks.iter().map(|s| s.to_string()).collect(),
    }
}

pub fn duct(id: &str, x_mm: f64) -> Duct {
    Duct {
        id: id.to_string(),
        kind: "supply".to_string(),
        x_mm,
        y_mm: 1200.0,
        diameter_mm: 100.0,
    }
}

/// Seven studs on 406.4mm centers, one centered window flanked by jack studs
/// with a header, seismic zone 1, no ducts.
pub fn compliant_panel() -> Panel {
    let mut studs: Vec<Stud> = (0..7)
        .map(|i| stud(&format!("S{}", i + 1), SPACING * i as f64))
        .collect();
    studs.push(jack("J1", 830.0));
    studs.push(jack("J2", 1608.0));

    Panel {
        panel_id: "P-01".to_string(),
        name: Some("North wall".to_string()),
        width_mm: SPACING * 6.0,
        height_mm: 2438.4,
        seismic_zone: 1,
        studs,
        openings: vec![window("W1", 812.8, 812.8, &["J1", "J2"])],
        ducts: vec![],
    }
}

/// Two plain studs `gap_mm` apart on an otherwise empty panel.
pub fn two_stud_panel(gap_mm: f64) -> Panel {
    Panel {
        panel_id: "P-gap".to_string(),
        name: None,
        width_mm: 1000.0,
        height_mm: 2400.0,
        seismic_zone: 0,
        studs: vec![stud("S1", 100.0), stud("S2", 100.0 + gap_mm)],
        openings: vec![],
        ducts: vec![],
    }
}
