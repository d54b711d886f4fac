//! Parsing of LLM analysis responses.
//!
//! Models are asked for a JSON object but do not always comply: the object
//! may be wrapped in a markdown fence, surrounded by prose, or missing
//! entirely. Parsing never fails; text that cannot be read as the expected
//! object becomes the analysis itself, with no diff and default confidence.

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use bugscope_core::defaults::{CONFIDENCE_DEFAULT, NO_DIFF};
use bugscope_core::Analysis;

/// Analysis text used when a provider returns nothing usable.
pub const EMPTY_ANALYSIS_PLACEHOLDER: &str =
    "The provider returned no analysis for this report.";

#[derive(Debug, Deserialize)]
struct RawAnalysis {
    #[serde(default)]
    analysis: Option<String>,
    #[serde(default, alias = "patch")]
    diff: Option<String>,
    #[serde(default)]
    confidence: Option<JsonValue>,
}

fn fence_regex() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(\{.*\})\s*```").ok())
        .as_ref()
}

/// Locate the JSON object in a model reply.
fn extract_json(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Some(trimmed);
    }
    if let Some(caps) = fence_regex().and_then(|re| re.captures(trimmed)) {
        return caps.get(1).map(|m| m.as_str());
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (start < end).then(|| &trimmed[start..=end])
}

/// Read a confidence given as a number, a numeric string, or a percentage.
///
/// A `%` suffix always scales by 100, so `"1.5%"` is 0.015.
fn parse_confidence(value: Option<&JsonValue>) -> f64 {
    match value {
        Some(JsonValue::Number(n)) => n.as_f64().unwrap_or(CONFIDENCE_DEFAULT),
        Some(JsonValue::String(s)) => {
            let s = s.trim();
            match s.strip_suffix('%') {
                Some(percent) => percent
                    .trim()
                    .parse::<f64>()
                    .map(|v| v / 100.0)
                    .unwrap_or(CONFIDENCE_DEFAULT),
                None => s.parse::<f64>().unwrap_or(CONFIDENCE_DEFAULT),
            }
        }
        _ => CONFIDENCE_DEFAULT,
    }
}

fn non_blank(text: Option<String>) -> Option<String> {
    text.filter(|t| !t.trim().is_empty())
}

/// Turn a model reply into an [`Analysis`] attributed to `provider`.
pub fn parse_analysis(text: &str, provider: &str) -> Analysis {
    let parsed = extract_json(text).and_then(|json| serde_json::from_str::<RawAnalysis>(json).ok());

    match parsed {
        Some(raw) if raw.analysis.as_deref().is_some_and(|a| !a.trim().is_empty()) => Analysis {
            confidence: parse_confidence(raw.confidence.as_ref()),
            analysis: raw.analysis.unwrap_or_default().trim().to_string(),
            diff: non_blank(raw.diff).unwrap_or_else(|| NO_DIFF.to_string()),
            provider: provider.to_string(),
        },
        _ => degraded(text, provider),
    }
}

/// Fallback result for a reply that is not the expected object.
pub fn degraded(text: &str, provider: &str) -> Analysis {
    let analysis = non_blank(Some(text.trim().to_string()))
        .unwrap_or_else(|| EMPTY_ANALYSIS_PLACEHOLDER.to_string());
    Analysis {
        analysis,
        diff: NO_DIFF.to_string(),
        confidence: CONFIDENCE_DEFAULT,
        provider: provider.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_json() {
        let text = r#"{"analysis": "Handler not bound", "diff": "--- a/x\n+++ b/x", "confidence": 0.82}"#;
        let result = parse_analysis(text, "gemini");
        assert_eq!(result.analysis, "Handler not bound");
        assert_eq!(result.diff, "--- a/x\n+++ b/x");
        assert_eq!(result.confidence, 0.82);
        assert_eq!(result.provider, "gemini");
    }

    #[test]
    fn test_fenced_json() {
        let text = "Here you go:\n```json\n{\"analysis\": \"Race on load\", \"diff\": \"NONE\", \"confidence\": 0.4}\n```\n";
        let result = parse_analysis(text, "gemini");
        assert_eq!(result.analysis, "Race on load");
        assert_eq!(result.diff, "NONE");
        assert_eq!(result.confidence, 0.4);
    }

    #[test]
    fn test_json_surrounded_by_prose() {
        let text = "Analysis follows {\"analysis\": \"Null cart\", \"confidence\": \"85%\"} end";
        let result = parse_analysis(text, "gemini");
        assert_eq!(result.analysis, "Null cart");
        assert!((result.confidence - 0.85).abs() < 1e-9);
        assert_eq!(result.diff, NO_DIFF);
    }

    #[test]
    fn test_patch_alias() {
        let text = r#"{"analysis": "x", "patch": "--- a/y"}"#;
        assert_eq!(parse_analysis(text, "gemini").diff, "--- a/y");
    }

    #[test]
    fn test_non_json_degrades_to_raw_text() {
        let result = parse_analysis("The checkout handler throws before submit.", "gemini");
        assert_eq!(result.analysis, "The checkout handler throws before submit.");
        assert_eq!(result.diff, NO_DIFF);
        assert_eq!(result.confidence, CONFIDENCE_DEFAULT);
    }

    #[test]
    fn test_json_without_analysis_degrades() {
        let result = parse_analysis(r#"{"diff": "NONE"}"#, "gemini");
        assert_eq!(result.analysis, r#"{"diff": "NONE"}"#);
        assert_eq!(result.confidence, CONFIDENCE_DEFAULT);
    }

    #[test]
    fn test_empty_reply_uses_placeholder() {
        let result = parse_analysis("   ", "gemini");
        assert_eq!(result.analysis, EMPTY_ANALYSIS_PLACEHOLDER);
    }

    #[test]
    fn test_small_percentage_string_is_scaled() {
        let text = r#"{"analysis": "x", "confidence": "1.5 %"}"#;
        let confidence = parse_analysis(text, "gemini").confidence;
        assert!((confidence - 0.015).abs() < 1e-9);
    }

    #[test]
    fn test_unparseable_confidence_defaults() {
        let text = r#"{"analysis": "x", "confidence": "high"}"#;
        assert_eq!(parse_analysis(text, "gemini").confidence, CONFIDENCE_DEFAULT);
    }
}
