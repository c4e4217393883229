//! Best-effort parsing of an incomplete JSON document.
//!
//! While the model is still streaming, its output is a prefix of a JSON object.
//! `parse_partial` closes whatever is open (string, arrays, objects) and, if that
//! is not enough, backs off to the last structurally safe position.

use serde_json::Value;

/// Maximum number of cut points tried before giving up on a prefix.
const MAX_BACKOFF_ATTEMPTS: usize = 16;

/// Parses `text` (possibly truncated, possibly fenced) into the largest JSON
/// value recoverable from it. Returns `None` if nothing can be recovered yet.
pub fn parse_partial(text: &str) -> Option<Value> {
    let text = strip_leading_fence(text).trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str(text) {
        return Some(value);
    }

    let mut stack: Vec<char> = Vec::new();
    let mut cut_points: Vec<(usize, Vec<char>)> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => {
                stack.push(c);
                cut_points.push((i + 1, stack.clone()));
            }
            '}' | ']' => {
                stack.pop();
                cut_points.push((i + 1, stack.clone()));
            }
            ',' => cut_points.push((i, stack.clone())),
            _ => {}
        }
    }

    // First try: keep everything, terminating an open string.
    let mut candidate = text.to_string();
    if in_string {
        if escaped {
            candidate.pop();
        }
        candidate.push('"');
    }
    if let Some(value) = close_and_parse(&candidate, &stack) {
        return Some(value);
    }

    cut_points
        .iter()
        .rev()
        .take(MAX_BACKOFF_ATTEMPTS)
        .find_map(|(end, open)| close_and_parse(&text[..*end], open))
}

fn close_and_parse(prefix: &str, open: &[char]) -> Option<Value> {
    let mut candidate = prefix.trim_end().to_string();
    if candidate.ends_with(',') {
        candidate.pop();
    }
    if candidate.ends_with(':') {
        candidate.push_str("null");
    }
    for c in open.iter().rev() {
        candidate.push(if *c == '{' { '}' } else { ']' });
    }
    serde_json::from_str(&candidate).ok()
}

fn strip_leading_fence(text: &str) -> &str {
    let trimmed = text.trim_start();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body)
}
