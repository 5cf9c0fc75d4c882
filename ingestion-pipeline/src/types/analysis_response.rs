use common::error::AppError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One flagged sentence reported by the analysis service.
///
/// The service is backed by a language model, so every field is optional and
/// `line` may arrive either as a number or as a numeric string.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Finding {
    #[serde(default, deserialize_with = "deserialize_line")]
    pub line: Option<u64>,
    #[serde(default)]
    pub risk_level: Option<String>,
    #[serde(default)]
    pub sentence: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
}

/// Wire shape of a successful analysis response body.
#[derive(Debug, Deserialize)]
struct AnalysisResponseBody {
    time: Value,
    percentage: f64,
    overall: String,
    #[serde(default)]
    analysis: Option<Vec<Value>>,
}

/// Validated result of one analysis call.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub overall_risk: String,
    pub security_percentage: f64,
    pub duration_seconds: f64,
    /// The body exactly as received; persisted alongside the document.
    pub raw_payload: String,
    pub findings: Option<Vec<Finding>>,
}

/// Parses the analyzer body. Any structural problem is an
/// [`AppError::AnalysisParsing`] and no partial result is returned.
pub fn parse_analysis_response(body: &str) -> Result<AnalysisResult, AppError> {
    let parsed: AnalysisResponseBody = serde_json::from_str(body)
        .map_err(|e| AppError::AnalysisParsing(format!("Malformed analysis response: {e}")))?;

    let duration_seconds = match &parsed.time {
        Value::String(text) => parse_duration_seconds(text)?,
        Value::Number(number) => number.as_f64().ok_or_else(|| {
            AppError::AnalysisParsing(format!("Unrepresentable duration {number}"))
        })?,
        other => {
            return Err(AppError::AnalysisParsing(format!(
                "Expected `time` to be a string or number, got {other}"
            )))
        }
    };
    if !duration_seconds.is_finite() || duration_seconds < 0.0 {
        return Err(AppError::AnalysisParsing(format!(
            "Duration must be a non-negative number of seconds, got {duration_seconds}"
        )));
    }

    if !(0.0..=100.0).contains(&parsed.percentage) {
        return Err(AppError::AnalysisParsing(format!(
            "Security percentage {} is outside 0..=100",
            parsed.percentage
        )));
    }

    // Entries that are not objects are skipped rather than failing the run.
    let findings = parsed.analysis.map(|entries| {
        entries
            .into_iter()
            .filter_map(|entry| serde_json::from_value::<Finding>(entry).ok())
            .collect::<Vec<_>>()
    });

    Ok(AnalysisResult {
        overall_risk: parsed.overall,
        security_percentage: parsed.percentage,
        duration_seconds,
        raw_payload: body.to_string(),
        findings,
    })
}

/// Reads a free-text duration such as `"1.5 seconds"`, `"2 s"` or `"0.75"`.
pub fn parse_duration_seconds(text: &str) -> Result<f64, AppError> {
    let trimmed = text.trim();
    let numeric = ["seconds", "second", "secs", "sec", "s"]
        .iter()
        .find_map(|suffix| trimmed.strip_suffix(suffix))
        .unwrap_or(trimmed)
        .trim();

    numeric
        .parse::<f64>()
        .map_err(|_| AppError::AnalysisParsing(format!("Unreadable duration '{text}'")))
}

fn deserialize_line<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(number)) => number.as_u64(),
        Some(Value::String(text)) => text.trim().parse().ok(),
        _ => None,
    })
}
