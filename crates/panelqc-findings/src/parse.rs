use panelqc_core::contextual::CATEGORY_KEYS;
use serde_json::{Map, Value};

use crate::Extraction;

/// Object keys that may hold the list of findings, in lookup order.
const LIST_KEYS: &[&str] = &[
    "additional_violations",
    "all_violations",
    "violations",
    "findings",
];
const REVIEW_KEY: &str = "needs_engineer_review";

/// Extract findings from raw analysis output.
///
/// Accepts a bare JSON array, an object holding the list under one of
/// [`LIST_KEYS`], or a single finding object, optionally wrapped in a fenced
/// code block and surrounded by prose. Falls back to collecting every
/// well-formed object when the whole does not parse. Never fails; unusable input yields an empty extraction.
pub fn extract_findings(raw: &str) -> Extraction {
    let text = strip_fence(raw).trim();
    if text.is_empty() {
        return Extraction::default();
    }

    // prose around the payload: try whichever bracket opens first
    let object_first = match (text.find('{'), text.find('[')) {
        (Some(o), Some(a)) => o < a,
        (Some(_), None) => true,
        _ => false,
    };
    let strict = serde_json::from_str::<Value>(text).ok().or_else(|| {
        if object_first {
            enclosed(text, '{', '}').or_else(|| enclosed(text, '[', ']'))
        } else {
            enclosed(text, '[', ']').or_else(|| enclosed(text, '{', '}'))
        }
    });
    if let Some(value) = strict {
        if let Some(extraction) = from_value(value) {
            tracing::debug!(findings = extraction.findings.len(), "findings parsed");
            return extraction;
        }
    }

    let findings = scan_objects(list_body(text));
    let needs_review = review_flag(text);
    if findings.is_empty() {
        tracing::warn!("no findings could be recovered from analysis output");
    } else {
        tracing::warn!(
            findings = findings.len(),
            "analysis output is not valid JSON, recovered objects one by one"
        );
    }
    Extraction {
        findings,
        needs_review,
    }
}

fn from_value(value: Value) -> Option<Extraction> {
    match value {
        Value::Array(findings) => Some(Extraction {
            findings,
            needs_review: false,
        }),
        Value::Object(mut obj) => {
            let flag = obj.get(REVIEW_KEY).and_then(Value::as_bool);
            let findings = match take_list(&mut obj) {
                Some(list) => list,
                None if CATEGORY_KEYS.iter().any(|k| obj.contains_key(*k)) => {
                    vec![Value::Object(obj)]
                }
                // an object that is neither a list holder nor a finding
                None if flag.is_some() => vec![],
                None => return None,
            };
            Some(Extraction {
                findings,
                needs_review: flag.unwrap_or(false),
            })
        }
        _ => None,
    }
}

fn take_list(obj: &mut Map<String, Value>) -> Option<Vec<Value>> {
    LIST_KEYS.iter().find_map(|key| match obj.remove(*key) {
        Some(Value::Array(items)) => Some(items),
        _ => None,
    })
}

/// Contents of the first fenced code block, or the whole input.
fn strip_fence(raw: &str) -> &str {
    let Some(open) = raw.find("```") else {
        return raw;
    };
    let after = &raw[open + 3..];
    // skip the info string ("json", "JSON", ...)
    let body = match after.find('\n') {
        Some(nl) => &after[nl + 1..],
        None => after,
    };
    match body.find("```") {
        Some(close) => &body[..close],
        None => body,
    }
}

/// Parse the span from the first `open` to the last `close`.
fn enclosed(text: &str, open: char, close: char) -> Option<Value> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

/// The part of `text` after the opening bracket of the findings list, when
/// there is one.
fn list_body(text: &str) -> &str {
    let keyed = LIST_KEYS
        .iter()
        .filter_map(|key| text.find(&format!("\"{}\"", key)))
        .min();
    // without a list key, a leading '[' is only a bare array if it opens one
    let from = match keyed {
        Some(from) => from,
        None if text.starts_with('[') => 0,
        None => return text,
    };
    match text[from..].find('[') {
        Some(i) => &text[from + i + 1..],
        None => text,
    }
}

/// Every top-level `{...}` in `text` that parses as a JSON object. Braces
/// inside string literals are ignored.
fn scan_objects(text: &str) -> Vec<Value> {
    let mut found = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start.take() {
                        let parsed = serde_json::from_str::<Value>(&text[s..=i]);
                        if let Ok(obj @ Value::Object(_)) = parsed {
                            found.push(obj);
                        }
                    }
                }
            }
            ']' if depth == 0 => break,
            _ => {}
        }
    }

    found
}

/// `"needs_engineer_review": true` anywhere in the text.
fn review_flag(text: &str) -> bool {
    let key = format!("\"{}\"", REVIEW_KEY);
    text.match_indices(&key).any(|(i, _)| {
        text[i + key.len()..]
            .trim_start()
            .strip_prefix(':')
            .is_some_and(|rest| rest.trim_start().starts_with("true"))
    })
}
