//! Best-effort recovery of structured data from free-form model output.
//!
//! The model is not schema-constrained, so every helper here returns an
//! explicit result instead of failing the request.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Outcome of looking for a JSON object inside model text.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Structured(serde_json::Map<String, serde_json::Value>),
    Unstructured { reason: String },
}

/// Parse the span from the first `{` to the last `}` as a JSON object.
/// Greedy and non-validating: anything in between must parse as a whole.
pub fn extract_json_object(text: &str) -> Extraction {
    let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
        return Extraction::Unstructured {
            reason: "no JSON object delimiters in model output".to_string(),
        };
    };
    if end < start {
        return Extraction::Unstructured {
            reason: "closing brace precedes opening brace".to_string(),
        };
    }

    match serde_json::from_str::<serde_json::Value>(&text[start..=end]) {
        Ok(serde_json::Value::Object(map)) => Extraction::Structured(map),
        Ok(_) => Extraction::Unstructured {
            reason: "embedded JSON is not an object".to_string(),
        },
        Err(e) => Extraction::Unstructured {
            reason: format!("embedded JSON failed to parse: {e}"),
        },
    }
}

/// Score and report derived from the final analysis pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AnalysisOutcome {
    pub score: f64,
    pub max_score: Option<f64>,
    pub report: String,
    #[schema(value_type = Vec<Object>)]
    pub factor_scores: Vec<serde_json::Value>,
    /// False when the report is the raw model text
    pub structured: bool,
}

impl AnalysisOutcome {
    /// Missing or unusable fields fall back to score 0, the raw text as
    /// report, and no factor scores.
    pub fn from_model_text(raw: &str) -> Self {
        let map = match extract_json_object(raw) {
            Extraction::Structured(map) => map,
            Extraction::Unstructured { .. } => {
                return Self {
                    score: 0.0,
                    max_score: None,
                    report: raw.to_string(),
                    factor_scores: Vec::new(),
                    structured: false,
                };
            }
        };

        let report = map
            .get("report")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| raw.to_string());

        let factor_scores = match map.get("factor_scores") {
            Some(serde_json::Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        };

        Self {
            score: map.get("score").and_then(as_number).unwrap_or(0.0),
            max_score: map.get("max_score").and_then(as_number),
            report,
            factor_scores,
            structured: true,
        }
    }
}

fn as_number(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

/// Drop every ```json / ``` fence marker and surrounding whitespace.
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

/// The two follow-up questions asked before final scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SupplementaryQuestions {
    pub q1: String,
    pub q2: String,
}

/// Strict parse of the supplementary-question reply, fences removed first.
pub fn parse_supplementary_questions(
    text: &str,
) -> Result<SupplementaryQuestions, serde_json::Error> {
    serde_json::from_str(&strip_code_fences(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_object_is_extracted() {
        let raw = r#"blah {"score":7,"report":"ok","factor_scores":[1,2]} trailing"#;
        let outcome = AnalysisOutcome::from_model_text(raw);
        assert_eq!(outcome.score, 7.0);
        assert_eq!(outcome.report, "ok");
        assert_eq!(outcome.factor_scores, vec![serde_json::json!(1), serde_json::json!(2)]);
        assert!(outcome.structured);
    }

    #[test]
    fn text_without_braces_becomes_report() {
        let raw = "The candidate communicates clearly.";
        let outcome = AnalysisOutcome::from_model_text(raw);
        assert_eq!(outcome.score, 0.0);
        assert_eq!(outcome.report, raw);
        assert!(outcome.factor_scores.is_empty());
        assert!(!outcome.structured);
    }

    #[test]
    fn invalid_json_between_braces_falls_back() {
        let raw = "result: {score: 7, report: ok}";
        assert!(matches!(extract_json_object(raw), Extraction::Unstructured { .. }));
        let outcome = AnalysisOutcome::from_model_text(raw);
        assert_eq!(outcome.score, 0.0);
        assert_eq!(outcome.report, raw);
    }

    #[test]
    fn greedy_span_covers_nested_objects() {
        let raw = "```json\n{\"score\": 4, \"report\": \"fine\", \"factor_scores\": [{\"name\": \"x\"}]}\n```";
        let outcome = AnalysisOutcome::from_model_text(raw);
        assert_eq!(outcome.score, 4.0);
        assert_eq!(outcome.factor_scores[0]["name"], "x");
    }

    #[test]
    fn missing_fields_take_defaults() {
        let raw = r#"{"summary": "n/a"}"#;
        let outcome = AnalysisOutcome::from_model_text(raw);
        assert_eq!(outcome.score, 0.0);
        assert_eq!(outcome.report, raw);
        assert!(outcome.factor_scores.is_empty());
        assert_eq!(outcome.max_score, None);
    }

    #[test]
    fn numeric_string_score_and_max_score_are_read() {
        let outcome =
            AnalysisOutcome::from_model_text(r#"{"score": "8.5", "max_score": 10, "report": "r"}"#);
        assert_eq!(outcome.score, 8.5);
        assert_eq!(outcome.max_score, Some(10.0));
    }

    #[test]
    fn fenced_questions_parse_like_bare_json() {
        let bare = r#"{"q1": "What motivates you?", "q2": "Describe a setback."}"#;
        let fenced = format!("```json\n{bare}\n```");
        assert_eq!(
            parse_supplementary_questions(&fenced).unwrap(),
            parse_supplementary_questions(bare).unwrap()
        );
    }

    #[test]
    fn questions_missing_a_key_fail() {
        assert!(parse_supplementary_questions(r#"{"q1": "only one"}"#).is_err());
    }
}
