//! Lenient JSON parsing of model responses.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static OPEN_JSON_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^```json\s*").expect("valid regex"));
static OPEN_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^```\s*").expect("valid regex"));
static CLOSE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*```$").expect("valid regex"));

/// Parse `text` as JSON, retrying once with Markdown code fences removed.
///
/// Only a leading ```` ```json ```` / ```` ``` ```` and a trailing ```` ``` ````
/// are stripped. The second failure is returned as is.
pub fn parse_json_safe(text: &str) -> Result<Value, serde_json::Error> {
    if let Ok(value) = serde_json::from_str(text) {
        return Ok(value);
    }
    let cleaned = OPEN_JSON_FENCE.replace(text, "");
    let cleaned = OPEN_FENCE.replace(&cleaned, "");
    let cleaned = CLOSE_FENCE.replace(&cleaned, "");
    serde_json::from_str(cleaned.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_json_parses_directly() {
        assert_eq!(parse_json_safe(r#"{"a":1}"#).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn fenced_json_is_unwrapped() {
        assert_eq!(
            parse_json_safe("```json\n{\"a\":1}\n```").unwrap(),
            json!({"a": 1})
        );
        assert_eq!(
            parse_json_safe("```JSON\n{\"a\":1}```").unwrap(),
            json!({"a": 1})
        );
        assert_eq!(parse_json_safe("```\n[1,2]\n```").unwrap(), json!([1, 2]));
    }

    #[test]
    fn garbage_still_fails_after_stripping() {
        assert!(parse_json_safe("```json\nnot json\n```").is_err());
        assert!(parse_json_safe("Here is the data: {\"a\":1}").is_err());
    }
}
