//! Extraction outcomes.
//!
//! The extraction backend replies with a JSON object in one of three
//! generic shapes. They are parsed here into a discriminated type so the
//! interpreter and orchestrator branch on an explicit tag instead of
//! probing for field presence.

use serde_json::Value;

/// Parsed result of one extraction call.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionOutcome {
    /// The user asked for a different conversational goal.
    IntentSwitch { flow: String },

    /// The user corrected an already-collected parameter.
    Correction { parameter: String, value: ExtractedValue },

    /// A fresh value for the parameter currently being asked.
    Extraction { parameter: String, value: ExtractedValue },
}

/// The value carried by an extraction or correction.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractedValue {
    /// A plain scalar answer.
    Scalar(Value),

    /// A successful catalog match: identifier plus display label.
    Match { id: Value, label: String },

    /// The utterance named something, but no catalog entry matched it.
    NoMatch,
}

impl ExtractedValue {
    /// Display text for logging and label comparisons.
    pub fn label(&self) -> Option<String> {
        match self {
            ExtractedValue::Scalar(Value::String(s)) => Some(s.clone()),
            ExtractedValue::Scalar(v) => Some(v.to_string()),
            ExtractedValue::Match { label, .. } => Some(label.clone()),
            ExtractedValue::NoMatch => None,
        }
    }

    fn from_value(value: &Value) -> Self {
        if let Some(obj) = value.as_object() {
            if let (Some(id), Some(label)) = (obj.get("id"), obj.get("label").and_then(Value::as_str))
            {
                return ExtractedValue::Match {
                    id: id.clone(),
                    label: label.to_string(),
                };
            }
            if obj.get("no_match").and_then(Value::as_bool).unwrap_or(false) {
                return ExtractedValue::NoMatch;
            }
        }
        ExtractedValue::Scalar(value.clone())
    }
}

impl ExtractionOutcome {
    /// Parses a backend payload against the three declared shapes.
    ///
    /// Returns `None` for a payload matching none of them; callers treat
    /// that like an unusable model response.
    pub fn from_payload(payload: &Value, current_parameter: &str) -> Option<Self> {
        let obj = payload.as_object()?;

        if let Some(flow) = obj.get("intent_switch").and_then(Value::as_str) {
            return Some(ExtractionOutcome::IntentSwitch {
                flow: flow.to_string(),
            });
        }

        if let Some(correction) = obj.get("correction").and_then(Value::as_object) {
            let parameter = correction.get("parameter").and_then(Value::as_str)?;
            let value = correction.get("value")?;
            return Some(ExtractionOutcome::Correction {
                parameter: parameter.to_string(),
                value: ExtractedValue::from_value(value),
            });
        }

        if obj.get("no_match").and_then(Value::as_bool).unwrap_or(false) {
            return Some(ExtractionOutcome::Extraction {
                parameter: current_parameter.to_string(),
                value: ExtractedValue::NoMatch,
            });
        }

        if let Some(m) = obj.get("match") {
            let value = ExtractedValue::from_value(m);
            if matches!(value, ExtractedValue::Match { .. }) {
                return Some(ExtractionOutcome::Extraction {
                    parameter: current_parameter.to_string(),
                    value,
                });
            }
            return None;
        }

        if let Some(v) = obj.get("value") {
            return Some(ExtractionOutcome::Extraction {
                parameter: current_parameter.to_string(),
                value: ExtractedValue::Scalar(v.clone()),
            });
        }

        None
    }
}
