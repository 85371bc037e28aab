use panelqc_core::contextual::TARGET_KEYS;
use panelqc_core::Panel;
use serde_json::Value;

/// Match a free-form entity reference to an id on `panel`.
///
/// Tries an exact id, then a case-insensitive id, then the panel's display
/// name, then a single id appearing as a word in the reference
/// ("stud S3" or "the window W1"). Ambiguous references resolve to nothing.
pub fn resolve_target(name: &str, panel: &Panel) -> Option<String> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    if panel.contains_entity(name) {
        return Some(name.to_string());
    }

    let ids = || std::iter::once(panel.panel_id.as_str()).chain(panel.entity_ids());

    if let Some(id) = ids().find(|id| id.eq_ignore_ascii_case(name)) {
        return Some(id.to_string());
    }

    if panel
        .name
        .as_deref()
        .is_some_and(|n| n.trim().eq_ignore_ascii_case(name))
    {
        return Some(panel.panel_id.clone());
    }

    let words: Vec<&str> = name
        .split(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_'))
        .filter(|w| !w.is_empty())
        .collect();
    let mut matches = ids().filter(|id| words.iter().any(|w| w.eq_ignore_ascii_case(id)));
    let first = matches.next()?;
    if matches.next().is_some() {
        tracing::debug!(reference = %name, "target reference is ambiguous");
        return None;
    }
    Some(first.to_string())
}

/// Rewrite the target references of every finding in place to panel ids.
/// References that do not resolve are left untouched. Returns how many were
/// rewritten.
pub fn resolve_targets(findings: &mut [Value], panel: &Panel) -> usize {
    let mut rewritten = 0;
    for finding in findings.iter_mut() {
        let Some(obj) = finding.as_object_mut() else {
            continue;
        };
        for key in TARGET_KEYS {
            match obj.get_mut(*key) {
                Some(Value::Array(items)) => {
                    for item in items.iter_mut() {
                        rewritten += rewrite(item, panel);
                    }
                }
                Some(item) if item.is_string() => rewritten += rewrite(item, panel),
                _ => {}
            }
        }
    }
    rewritten
}

fn rewrite(item: &mut Value, panel: &Panel) -> usize {
    let Some(reference) = item.as_str() else {
        return 0;
    };
    match resolve_target(reference, panel) {
        Some(id) if id != reference => {
            *item = Value::String(id);
            1
        }
        _ => 0,
    }
}
