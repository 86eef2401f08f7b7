//! Deterministic local repairs for almost-JSON model output.
//!
//! ## Why repair locally at all?
//!
//! Even well-prompted models occasionally wrap the object in code fences,
//! preface it with "Here is the JSON:", leave a trailing comma, or stop one
//! brace short of balanced. These are mechanical formatting defects, not
//! semantic ones — paying a model round-trip to fix them would waste the
//! repair budget. The rules here are cheap, deterministic, and never
//! consume that budget; the model round-trip is reserved for genuine
//! schema violations.
//!
//! ## Rule Order
//!
//! Rules run in a fixed order: fences are stripped before prose trimming so
//! the fence line itself is not mistaken for prose, prose is trimmed before
//! comma/bracket fixes so those operate on the candidate JSON only, and
//! bracket balancing runs last because it appends to whatever remains.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all local repair rules in order.
///
/// Rules (applied in order):
/// 1. Strip Markdown code fences (```json … ```)
/// 2. Trim to the outermost JSON object/array (drops surrounding prose)
/// 3. Remove trailing commas before `}` / `]`
/// 4. Balance unclosed brackets and braces
pub fn apply_local_repairs(input: &str) -> String {
    let s = strip_code_fences(input);
    let s = trim_to_json(&s);
    let s = remove_trailing_commas(&s);
    balance_brackets(&s)
}

// ── Rule 1: Strip Markdown code fences ───────────────────────────────────────

static RE_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json)?\s*\n?(.*?)\n?```\s*$").unwrap());

fn strip_code_fences(input: &str) -> String {
    if let Some(caps) = RE_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 2: Trim to the outermost JSON value ─────────────────────────────────

/// Keep from the first `{` or `[` to the last `}` or `]`. Models sometimes
/// preface the object with prose or append a closing remark; both are
/// outside the outermost brackets. If no opener exists the input is
/// returned unchanged — nothing here can save it.
fn trim_to_json(input: &str) -> String {
    let open = input.find(['{', '[']);
    let close = input.rfind(['}', ']']);
    match (open, close) {
        (Some(start), Some(end)) if end >= start => input[start..=end].to_string(),
        (Some(start), _) => input[start..].to_string(),
        _ => input.to_string(),
    }
}

// ── Rule 3: Remove trailing commas ───────────────────────────────────────────

static RE_TRAILING_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*([}\]])").unwrap());

/// `{"a": 1,}` → `{"a": 1}`. Operates outside string context only in
/// practice: a literal `",}"` inside a string value is rare enough in model
/// output that the simpler rule wins.
fn remove_trailing_commas(input: &str) -> String {
    RE_TRAILING_COMMA.replace_all(input, "$1").to_string()
}

// ── Rule 4: Balance brackets ─────────────────────────────────────────────────

/// Append the closers for any brackets left open at end of input (models
/// truncated by a token limit stop mid-object). String context is tracked
/// so braces inside values do not count.
fn balance_brackets(input: &str) -> String {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in input.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => stack.push('}'),
            '[' if !in_string => stack.push(']'),
            '}' | ']' if !in_string => {
                if stack.last() == Some(&c) {
                    stack.pop();
                }
            }
            _ => {}
        }
    }

    if stack.is_empty() && !in_string {
        return input.to_string();
    }

    let mut out = input.to_string();
    if in_string {
        out.push('"');
    }
    while let Some(closer) = stack.pop() {
        out.push(closer);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_fences_with_language() {
        let input = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(input), "{\"a\": 1}");
    }

    #[test]
    fn strip_fences_without_language() {
        let input = "```\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(input), "{\"a\": 1}");
    }

    #[test]
    fn no_fences_passthrough() {
        assert_eq!(strip_code_fences("{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn trim_drops_leading_and_trailing_prose() {
        let input = "Here is the JSON you asked for:\n{\"a\": 1}\nLet me know!";
        assert_eq!(trim_to_json(input), "{\"a\": 1}");
    }

    #[test]
    fn trim_keeps_arrays() {
        assert_eq!(trim_to_json("sure: [1, 2, 3] done"), "[1, 2, 3]");
    }

    #[test]
    fn trim_without_json_is_unchanged() {
        assert_eq!(trim_to_json("no json here"), "no json here");
    }

    #[test]
    fn trailing_commas_removed_in_objects_and_arrays() {
        assert_eq!(remove_trailing_commas("{\"a\": 1,}"), "{\"a\": 1}");
        assert_eq!(remove_trailing_commas("[1, 2,\n]"), "[1, 2]");
        assert_eq!(
            remove_trailing_commas("{\"a\": [1,], \"b\": 2,}"),
            "{\"a\": [1], \"b\": 2}"
        );
    }

    #[test]
    fn balance_appends_missing_closers() {
        assert_eq!(balance_brackets("{\"a\": [1, 2"), "{\"a\": [1, 2]}");
        assert_eq!(balance_brackets("{\"a\": {\"b\": 1}"), "{\"a\": {\"b\": 1}}");
    }

    #[test]
    fn balance_closes_dangling_string_first() {
        assert_eq!(balance_brackets("{\"a\": \"trunc"), "{\"a\": \"trunc\"}");
    }

    #[test]
    fn balance_ignores_brackets_inside_strings() {
        let input = "{\"a\": \"{[\"}";
        assert_eq!(balance_brackets(input), input);
    }

    #[test]
    fn balanced_input_is_unchanged() {
        let input = "{\"a\": [1, 2], \"b\": {\"c\": 3}}";
        assert_eq!(balance_brackets(input), input);
    }

    #[test]
    fn full_pipeline_fixes_fenced_prose_wrapped_trailing_comma() {
        let input = "Here you go:\n```json\n{\"items\": [{\"a\": 1},],\n```";
        let repaired = apply_local_repairs(input);
        let value: serde_json::Value = serde_json::from_str(&repaired).unwrap();
        assert_eq!(value["items"][0]["a"], 1);
    }

    #[test]
    fn full_pipeline_leaves_valid_json_alone() {
        let input = "{\"a\": 1}";
        assert_eq!(apply_local_repairs(input), input);
    }
}
