use serde_json::{Map, Value};

use crate::model::ControlEvidence;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedControl {
    pub name: String,
    pub covered: bool,
    pub evidence: Vec<ControlEvidence>,
}

/// The parts of a model response that survive into a verdict. Status and confidence are
/// deliberately not captured: they are always recomputed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedClaim {
    pub controls: Option<Vec<ClaimedControl>>,
    pub rationale: String,
    pub gaps: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimParse {
    Parsed(ParsedClaim),
    MalformedResponse { reason: String },
}

pub fn parse_claim_response(raw: &str) -> ClaimParse {
    let trimmed = raw.trim();
    let value = match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => value,
        Err(direct_error) => match extract_braced(trimmed) {
            Some(candidate) => match serde_json::from_str::<Value>(candidate) {
                Ok(value) => value,
                Err(error) => {
                    return ClaimParse::MalformedResponse {
                        reason: format!(
                            "response is not JSON ({direct_error}) and the braced span failed to parse ({error})"
                        ),
                    };
                }
            },
            None => {
                return ClaimParse::MalformedResponse {
                    reason: format!("response is not JSON and contains no braced span ({direct_error})"),
                };
            }
        },
    };

    match value {
        Value::Object(object) => ClaimParse::Parsed(claim_from_object(&object)),
        other => ClaimParse::MalformedResponse {
            reason: format!("response JSON is {} rather than an object", json_kind(&other)),
        },
    }
}

fn extract_braced(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&raw[start..=end])
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn claim_from_object(object: &Map<String, Value>) -> ParsedClaim {
    let controls = match object.get("controls") {
        Some(Value::Array(items)) => Some(items.iter().filter_map(parse_control).collect()),
        _ => None,
    };

    ParsedClaim {
        controls,
        rationale: object
            .get("rationale")
            .and_then(Value::as_str)
            .map(|value| value.trim().to_string())
            .unwrap_or_default(),
        gaps: string_list(object.get("gaps")),
        recommendations: string_list(object.get("recommendations")),
    }
}

fn parse_control(item: &Value) -> Option<ClaimedControl> {
    let object = item.as_object()?;
    let evidence = match object.get("evidence") {
        Some(Value::Array(entries)) => entries.iter().filter_map(parse_evidence).collect(),
        _ => Vec::new(),
    };

    Some(ClaimedControl {
        name: object
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string(),
        covered: matches!(object.get("covered"), Some(Value::Bool(true))),
        evidence,
    })
}

fn parse_evidence(entry: &Value) -> Option<ControlEvidence> {
    let evidence = match entry {
        Value::Object(object) => ControlEvidence {
            chunk_id: object.get("chunk_id").and_then(parse_chunk_id).unwrap_or(-1),
            label: object
                .get("label")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .trim()
                .to_string(),
            quote: object
                .get("quote")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .trim()
                .to_string(),
        },
        Value::String(quote) => ControlEvidence {
            chunk_id: -1,
            label: String::new(),
            quote: quote.trim().to_string(),
        },
        _ => return None,
    };

    if evidence.quote.is_empty() {
        None
    } else {
        Some(evidence)
    }
}

fn parse_chunk_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(text) => Some(text.trim().to_string()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .filter(|text| !text.is_empty())
            .collect(),
        Some(Value::String(text)) if !text.trim().is_empty() => vec![text.trim().to_string()],
        _ => Vec::new(),
    }
}
