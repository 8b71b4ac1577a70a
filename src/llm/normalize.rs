//! Turns free-form model output into a [`SymptomAnalysis`].
//!
//! Strategies are tried in order and the first that yields a complete
//! analysis wins: a ```` ```json ```` fenced block, the outermost
//! brace-delimited object, the whole text as JSON, and finally a keyword
//! heuristic that cannot fail.

use super::types::{AnalysisSource, RiskLevel, SymptomAnalysis};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

pub const PLACEHOLDER_CONDITION: &str = "Please consult the full analysis";
pub const DEFAULT_URGENCY: &str = "Consult a healthcare professional for accurate diagnosis";

static FENCED_JSON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```json[ \t]*\r?\n(.*?)\r?\n[ \t]*```").expect("Invalid fenced JSON regex")
});

static OBJECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("Invalid object regex"));

pub fn normalize_symptom_analysis(raw: &str) -> (SymptomAnalysis, AnalysisSource) {
    let candidates = [
        (
            AnalysisSource::FencedJson,
            FENCED_JSON_RE
                .captures(raw)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str()),
        ),
        (
            AnalysisSource::EmbeddedObject,
            OBJECT_RE.find(raw).map(|m| m.as_str()),
        ),
        (AnalysisSource::WholeText, Some(raw)),
    ];

    for (source, candidate) in candidates {
        let Some(candidate) = candidate else {
            continue;
        };
        match serde_json::from_str::<SymptomAnalysis>(candidate.trim()) {
            Ok(analysis) => return (analysis, source),
            Err(e) => debug!("{:?} parse rejected: {}", source, e),
        }
    }

    (heuristic_analysis(raw), AnalysisSource::Heuristic)
}

/// Best-effort analysis for output with no usable JSON.
pub fn heuristic_analysis(raw: &str) -> SymptomAnalysis {
    let risk_level = if raw.contains("High") {
        RiskLevel::High
    } else if raw.contains("Medium") {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    SymptomAnalysis {
        risk_level,
        conditions: vec![PLACEHOLDER_CONDITION.to_string()],
        advice: raw.to_string(),
        urgency: DEFAULT_URGENCY.to_string(),
    }
}
