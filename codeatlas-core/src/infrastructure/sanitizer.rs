// codeatlas-core/src/infrastructure/sanitizer.rs
//
// The LLM JSON sanitizer pipeline (spec.md §4.3), applied in order before
// a JSON parse is attempted. Structured as a pipeline of pure string
// transforms, each one independently testable.

use once_cell::sync::Lazy;
use regex::Regex;

static FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("static regex is valid"));

static TRAILING_COMMA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",(\s*[}\]])").expect("static regex is valid"));

/// Runs the full sanitizer pipeline: trim, extract a fenced code block if
/// present, strip trailing commas, then balance braces/brackets.
pub fn sanitize(raw: &str) -> String {
    let text = trim(raw);
    let text = extract_fenced_block(&text);
    let text = strip_trailing_commas(&text);
    balance_brackets(&text)
}

fn trim(raw: &str) -> String {
    raw.trim().to_string()
}

/// If the text is wrapped in a fenced code block (```` ```json ... ``` ````
/// or plain ```` ``` ... ``` ````), extracts the inner content; otherwise
/// returns the text unchanged.
fn extract_fenced_block(text: &str) -> String {
    match FENCE_RE.captures(text) {
        Some(caps) => caps
            .get(1)
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| text.to_string()),
        None => text.to_string(),
    }
}

/// Strips trailing commas before a closing `}` or `]`.
fn strip_trailing_commas(text: &str) -> String {
    TRAILING_COMMA_RE.replace_all(text, "$1").to_string()
}

/// Appends missing closing braces/brackets, counting only outside string
/// literals so a `}` inside a quoted snippet doesn't throw off the count.
fn balance_brackets(text: &str) -> String {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for ch in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.last() == Some(&ch) {
                    stack.pop();
                }
            }
            _ => {}
        }
    }

    let mut result = text.to_string();
    while let Some(closer) = stack.pop() {
        result.push(closer);
    }
    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_trims_whitespace() {
        assert_eq!(sanitize("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn test_extracts_fenced_json_block() {
        let raw = "Here you go:\n```json\n{\"a\":1}\n```\nHope that helps.";
        assert_eq!(sanitize(raw), "{\"a\":1}");
    }

    #[test]
    fn test_strips_trailing_commas() {
        assert_eq!(sanitize(r#"{"a":1,"b":2,}"#), r#"{"a":1,"b":2}"#);
        assert_eq!(sanitize(r#"{"a":[1,2,],}"#), r#"{"a":[1,2]}"#);
    }

    #[test]
    fn test_balances_missing_closers() {
        assert_eq!(sanitize(r#"{"a":[1,2"#), r#"{"a":[1,2]}"#);
    }

    #[test]
    fn test_ignores_braces_inside_strings() {
        let raw = r#"{"snippet":"if (x) { return 1; }"}"#;
        assert_eq!(sanitize(raw), raw);
    }

    #[test]
    fn test_escaped_quote_does_not_end_string_early() {
        let raw = r#"{"snippet":"say \"hi\""}"#;
        assert_eq!(sanitize(raw), raw);
    }
}
