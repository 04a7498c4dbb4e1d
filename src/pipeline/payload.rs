use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::models::{FinancialMetrics, MarketAnalysis, Recommendation};

/// The webhook signals a remote-side failure by including this keyword in
/// its `resultado` message, even on an HTTP 200.
pub const FAILURE_KEYWORD: &str = "fallado";

/// What the primary agent actually sent, resolved before any field access.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimaryPayload {
    /// A structured payload; fields the endpoint omitted or mistyped are None.
    Structured(PartialReport),
    /// Character data that is not parseable as a report. Kept verbatim; the
    /// orchestrator treats it as narrative without metrics.
    Text(String),
    /// The agent's own failure message, surfaced to the user before fallback.
    Failure(String),
}

/// Unvalidated report fields from the primary agent. Validation is the
/// orchestrator's job.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialReport {
    pub metrics: Option<FinancialMetrics>,
    pub market_data: Option<MarketAnalysis>,
    pub viability_score: Option<f64>,
    pub recommendation: Option<Recommendation>,
    pub html_content: Option<String>,
}

impl PartialReport {
    fn from_map(map: &Map<String, Value>) -> Self {
        Self {
            metrics: field(map, "metrics"),
            market_data: field(map, "marketData"),
            viability_score: field(map, "viabilityScore"),
            recommendation: field(map, "recommendation"),
            html_content: field(map, "htmlContent"),
        }
    }
}

/// Classifies a raw webhook response body. The endpoint may wrap the payload
/// in a single-element array and/or a nested `json` key, and may deliver the
/// report as fenced JSON text instead of an object.
pub fn classify(body: Value) -> PrimaryPayload {
    match unwrap_envelope(body) {
        Value::String(text) => classify_text(&text),
        Value::Object(map) => classify_object(&map),
        _ => PrimaryPayload::Structured(PartialReport::default()),
    }
}

fn unwrap_envelope(body: Value) -> Value {
    let mut current = match body {
        Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
        other => other,
    };

    if let Value::Object(map) = &mut current
        && let Some(nested) = map.remove("json")
    {
        if matches!(nested, Value::Object(_) | Value::String(_)) {
            return nested;
        }
        map.insert("json".to_string(), nested);
    }

    current
}

fn classify_text(text: &str) -> PrimaryPayload {
    let cleaned = text
        .replace("```json", "")
        .replace("```", "")
        .trim()
        .to_string();

    if cleaned.starts_with('{')
        && let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&cleaned)
    {
        return classify_object(&map);
    }

    PrimaryPayload::Text(text.to_string())
}

fn classify_object(map: &Map<String, Value>) -> PrimaryPayload {
    if let Some(Value::String(message)) = map.get("resultado")
        && message.contains(FAILURE_KEYWORD)
    {
        return PrimaryPayload::Failure(message.clone());
    }

    PrimaryPayload::Structured(PartialReport::from_map(map))
}

fn field<T: DeserializeOwned>(map: &Map<String, Value>, key: &str) -> Option<T> {
    map.get(key)
        .cloned()
        .and_then(|value| serde_json::from_value(value).ok())
}
