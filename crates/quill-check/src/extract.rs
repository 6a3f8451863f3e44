use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;

static JSON_BLOCK: OnceLock<Regex> = OnceLock::new();

/// Parse a model reply as JSON, falling back to the first `{...}` block when
/// the reply wraps the object in prose or a code fence.
pub fn parse_loose<T: DeserializeOwned>(text: &str) -> Option<T> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    let re = JSON_BLOCK.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("static regex"));
    let block = re.find(trimmed)?;
    serde_json::from_str(block.as_str()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::feedback::SentenceFeedback;

    #[test]
    fn parses_clean_json() {
        let fb: SentenceFeedback =
            parse_loose(r#"{"is_complete": true, "overall_score": 0.9}"#).unwrap();
        assert!(fb.is_complete);
    }

    #[test]
    fn extracts_json_from_code_fence() {
        let reply = "```json\n{\"is_complete\": false, \"overall_score\": 0.5}\n```";
        let fb: SentenceFeedback = parse_loose(reply).unwrap();
        assert!(!fb.is_complete);
        assert_eq!(fb.overall_score, 0.5);
    }

    #[test]
    fn extracts_json_surrounded_by_prose() {
        let reply = "Here is my analysis: {\"is_complete\": true, \"overall_score\": 1.0} Hope it helps!";
        let fb: SentenceFeedback = parse_loose(reply).unwrap();
        assert!(fb.is_complete);
    }

    #[test]
    fn rejects_reply_without_json() {
        assert!(parse_loose::<SentenceFeedback>("I cannot help with that.").is_none());
    }
}
