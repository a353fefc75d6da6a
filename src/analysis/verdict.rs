use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The model's judgment for one capture batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub productive: bool,
    pub reason: String,
    pub raw: String,
}

/// Extracts the verdict from free-form model output.
///
/// Looks at the span between the first `{` and the last `}`. When that does
/// not parse, falls back to a plain substring check with an empty reason.
pub fn parse_verdict(text: &str) -> Verdict {
    if let Some((productive, reason)) = parse_json_object(text) {
        return Verdict {
            productive,
            reason,
            raw: text.to_string(),
        };
    }

    Verdict {
        productive: text.to_lowercase().contains(r#"productive": "yes"#),
        reason: String::new(),
        raw: text.to_string(),
    }
}

fn parse_json_object(text: &str) -> Option<(bool, String)> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }

    let value: Value = serde_json::from_str(&text[start..=end]).ok()?;
    let productive = match value.get("productive") {
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("yes"),
        Some(Value::Bool(b)) => *b,
        _ => false,
    };
    let reason = value
        .get("reason")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();

    Some((productive, reason))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json() {
        let v = parse_verdict(r#"{"productive": "yes", "reason": "Nice work on the parser!"}"#);
        assert!(v.productive);
        assert_eq!(v.reason, "Nice work on the parser!");
    }

    #[test]
    fn parses_json_wrapped_in_prose_and_fences() {
        let text = "Sure.\n```json\n{\"productive\": \"No\", \"reason\": \"Hey, I noticed the video is paused.\"}\n```";
        let v = parse_verdict(text);
        assert!(!v.productive);
        assert_eq!(v.reason, "Hey, I noticed the video is paused.");
        assert_eq!(v.raw, text);
    }

    #[test]
    fn accepts_boolean_field() {
        let v = parse_verdict(r#"{"productive": true, "reason": "ok"}"#);
        assert!(v.productive);
    }

    #[test]
    fn falls_back_to_substring_when_json_is_broken() {
        let v = parse_verdict(r#"{"productive": "yes", "reason": "unterminated"#);
        assert!(v.productive);
        assert!(v.reason.is_empty());

        let v = parse_verdict("I cannot tell.");
        assert!(!v.productive);
    }

    #[test]
    fn missing_field_counts_as_not_productive() {
        let v = parse_verdict(r#"{"reason": "no verdict"}"#);
        assert!(!v.productive);
        assert_eq!(v.reason, "no verdict");
    }
}
