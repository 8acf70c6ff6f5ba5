use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, trace};

/// Agent name used when a record does not say who produced it.
pub const DEFAULT_AGENT: &str = "Agent";

/// One decoded event from the `/chat_stream` feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamRecord {
    /// Incremental agent output (`thought`, `step`, `agent` and unknown types).
    Thought { agent: String, content: String },
    /// Terminal content (`answer`, `final`, `synthesized`).
    Answer {
        agent: Option<String>,
        payload: AnswerPayload,
    },
    /// Progress text (`meta`).
    Status { status: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerPayload {
    Text(String),
    Structured {
        recommendations: Option<Vec<String>>,
        guidance: Option<String>,
    },
}

impl StreamRecord {
    /// Decodes the concatenated data payload of one frame.
    ///
    /// Payloads that are not JSON are kept as free text from the default
    /// agent. JSON without a usable `type` is dropped.
    pub fn from_payload(payload: &str) -> Option<Self> {
        let value: Value = match serde_json::from_str(payload) {
            Ok(value) => value,
            Err(e) => {
                debug!("Treating undecodable frame as free text: {}", e);
                return Some(StreamRecord::Thought {
                    agent: DEFAULT_AGENT.to_string(),
                    content: payload.to_string(),
                });
            }
        };
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        let kind = value.get("type").and_then(Value::as_str)?;
        match kind {
            "" => None,
            "thought" | "step" | "agent" => Some(StreamRecord::Thought {
                agent: non_empty_str(value, "agent")
                    .or_else(|| non_empty_str(value, "from"))
                    .unwrap_or(DEFAULT_AGENT)
                    .to_string(),
                content: coerce_content(value.get("content")),
            }),
            "answer" | "final" | "synthesized" => Some(StreamRecord::Answer {
                agent: non_empty_str(value, "agent").map(str::to_string),
                payload: AnswerPayload::from_content(value.get("content")),
            }),
            "meta" => Some(StreamRecord::Status {
                status: non_empty_str(value, "status").map(str::to_string),
            }),
            other => {
                trace!("Unrecognized record type {:?}, keeping as thought", other);
                Some(StreamRecord::Thought {
                    agent: non_empty_str(value, "agent")
                        .unwrap_or(DEFAULT_AGENT)
                        .to_string(),
                    content: coerce_content(value.get("content")),
                })
            }
        }
    }
}

impl AnswerPayload {
    fn from_content(content: Option<&Value>) -> Self {
        match content {
            Some(Value::String(text)) => AnswerPayload::Text(text.clone()),
            Some(Value::Object(fields)) => {
                let recommendations = fields
                    .get("recommendations")
                    .and_then(Value::as_array)
                    .map(|items| items.iter().map(value_to_text).collect());
                AnswerPayload::Structured {
                    recommendations,
                    guidance: object_guidance(fields),
                }
            }
            _ => AnswerPayload::Structured {
                recommendations: None,
                guidance: None,
            },
        }
    }
}

/// Turns a record's `content` into display text.
///
/// Strings pass through, objects with a string `text` field yield that field,
/// null or missing content is empty, anything else is rendered as JSON.
pub fn coerce_content(content: Option<&Value>) -> String {
    match content {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(Value::Object(fields)) => match fields.get("text") {
            Some(Value::String(text)) if !text.is_empty() => text.clone(),
            _ => Value::Object(fields.clone()).to_string(),
        },
        Some(other) => other.to_string(),
    }
}

/// `synthesized_guidance`, else `text`, ignoring empty values.
pub(crate) fn object_guidance(fields: &Map<String, Value>) -> Option<String> {
    fields
        .get("synthesized_guidance")
        .and_then(truthy_text)
        .or_else(|| fields.get("text").and_then(truthy_text))
}

pub(crate) fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

pub(crate) fn truthy_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Null | Value::String(_) | Value::Bool(false) => None,
        other => Some(other.to_string()),
    }
}

fn non_empty_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
}
