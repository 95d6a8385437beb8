// SPDX-FileCopyrightText: 2026 Autosizer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request, preset, plan, and stream-event types shared across the workspace.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};

/// Backend option key for the maximum number of generated tokens.
pub const OUTPUT_LIMIT_KEY: &str = "num_predict";
/// Backend option key for the context window size.
pub const CONTEXT_LIMIT_KEY: &str = "num_ctx";
/// Backend option key for the sampling temperature.
pub const TEMPERATURE_KEY: &str = "temperature";
/// Backend option key for the repetition penalty.
pub const REPEAT_PENALTY_KEY: &str = "repeat_penalty";
/// Backend option key for stop sequences.
pub const STOP_KEY: &str = "stop";
/// Option/body key for the streaming flag.
pub const STREAM_KEY: &str = "stream";

/// Request body keys whose presence signals retrieval-augmented context.
pub const RETRIEVAL_MARKER_KEYS: &[&str] = &["files", "collection", "collections"];

/// Generation budget tier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BudgetMode {
    /// Small output budget for one-line questions.
    Short,
    /// Moderate output budget for ordinary prompts.
    Normal,
    /// Largest budget, used for long prompts and retrieval-augmented requests.
    Deep,
}

impl BudgetMode {
    /// The next tier up. `Deep` is already the top.
    pub fn promoted(self) -> Self {
        match self {
            BudgetMode::Short => BudgetMode::Normal,
            BudgetMode::Normal | BudgetMode::Deep => BudgetMode::Deep,
        }
    }
}

/// Immutable bundle of generation limits and sampling parameters for one mode.
///
/// `None` limits mean the preset does not constrain that option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetPreset {
    pub mode: BudgetMode,
    pub max_output_tokens: Option<u64>,
    pub max_context_tokens: Option<u64>,
    pub temperature: Option<f64>,
    pub repeat_penalty: Option<f64>,
    pub stop: Option<Vec<String>>,
}

/// Chat message content in any of the shapes clients send.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageContent {
    /// Plain string content.
    Text(String),
    /// An object part; only its `text` field contributes.
    Part(Box<MessageContent>),
    /// A list of parts.
    Parts(Vec<MessageContent>),
    /// Any other scalar, kept in its JSON string form.
    Other(String),
}

impl MessageContent {
    /// Decodes arbitrary JSON into content without ever failing.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(s) => MessageContent::Text(s.clone()),
            Value::Object(map) => {
                let inner = match map.get("text") {
                    Some(text) if is_truthy(text) => MessageContent::from_value(text),
                    _ => MessageContent::Text(String::new()),
                };
                MessageContent::Part(Box::new(inner))
            }
            Value::Array(items) => {
                MessageContent::Parts(items.iter().map(MessageContent::from_value).collect())
            }
            Value::Null | Value::Bool(false) => MessageContent::Text(String::new()),
            other => MessageContent::Other(other.to_string()),
        }
    }

    /// Flattens the content into plain text; list parts are joined by a space.
    pub fn flatten(&self) -> String {
        match self {
            MessageContent::Text(s) | MessageContent::Other(s) => s.clone(),
            MessageContent::Part(inner) => inner.flatten(),
            MessageContent::Parts(parts) => parts
                .iter()
                .map(MessageContent::flatten)
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

/// One entry of a chat `messages` list.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: Option<String>,
    pub content: MessageContent,
}

impl ChatMessage {
    /// Whether the message was authored by the user.
    pub fn is_user(&self) -> bool {
        self.role.as_deref() == Some("user")
    }
}

/// A mutable inbound generate/chat body.
///
/// Wraps the raw JSON object so that fields the proxy does not understand
/// are forwarded to the backend untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationRequest {
    body: Map<String, Value>,
}

impl GenerationRequest {
    /// Parses a request body. Anything that is not a JSON object becomes an empty request.
    pub fn from_slice(bytes: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(bytes) {
            Ok(value) => Self::from_value(value),
            Err(_) => Self::default(),
        }
    }

    /// Wraps a JSON value. Non-object values become an empty request.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(body) => Self { body },
            _ => Self::default(),
        }
    }

    /// Borrows the underlying JSON object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.body
    }

    /// Consumes the request and returns the JSON body.
    pub fn into_value(self) -> Value {
        Value::Object(self.body)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.body.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.body.remove(key)
    }

    /// The requested model id, if it is a string.
    pub fn model(&self) -> Option<&str> {
        self.body.get("model").and_then(Value::as_str)
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.body.insert("model".to_string(), Value::String(model.into()));
    }

    /// The literal `prompt` string, if present.
    pub fn prompt(&self) -> Option<&str> {
        self.body.get("prompt").and_then(Value::as_str)
    }

    /// Whether the body carries a non-empty `messages` list.
    pub fn has_messages(&self) -> bool {
        matches!(self.body.get("messages"), Some(Value::Array(items)) if !items.is_empty())
    }

    /// Decodes the `messages` list. Non-object entries are skipped.
    pub fn messages(&self) -> Vec<ChatMessage> {
        let Some(Value::Array(items)) = self.body.get("messages") else {
            return Vec::new();
        };
        items
            .iter()
            .filter_map(Value::as_object)
            .map(|msg| ChatMessage {
                role: msg.get("role").and_then(Value::as_str).map(str::to_string),
                content: msg
                    .get("content")
                    .map(MessageContent::from_value)
                    .unwrap_or_else(|| MessageContent::Text(String::new())),
            })
            .collect()
    }

    /// Whether file or collection references were attached for retrieval.
    pub fn has_retrieval_markers(&self) -> bool {
        RETRIEVAL_MARKER_KEYS
            .iter()
            .any(|key| self.body.get(*key).is_some_and(is_truthy))
    }

    /// A copy of the nested `options` map (empty when missing or not an object).
    pub fn options(&self) -> Map<String, Value> {
        match self.body.get("options") {
            Some(Value::Object(opts)) => opts.clone(),
            _ => Map::new(),
        }
    }
}

/// Generation options after merging client intent with a preset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffectiveOptions {
    map: Map<String, Value>,
}

impl EffectiveOptions {
    pub fn new(map: Map<String, Value>) -> Self {
        Self { map }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.map.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.map.insert(key.into(), value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Effective output limit; `None` means unbounded.
    pub fn output_limit(&self) -> Option<u64> {
        self.map.get(OUTPUT_LIMIT_KEY).and_then(as_limit)
    }

    /// Effective context limit; `None` means unbounded.
    pub fn context_limit(&self) -> Option<u64> {
        self.map.get(CONTEXT_LIMIT_KEY).and_then(as_limit)
    }

    /// Streaming flag; the backend streams unless told otherwise.
    pub fn stream(&self) -> bool {
        self.map.get(STREAM_KEY).is_none_or(is_truthy)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.map
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.map
    }
}

/// Short-reply trimming instructions for one non-streaming request.
#[derive(Debug, Clone, PartialEq)]
pub struct TrimPlan {
    /// Maximum sentences kept (always at least 1).
    pub sentence_limit: usize,
    /// Output tokens the preset allows, when bounded.
    pub base_token_budget: Option<u64>,
    /// Extra tokens granted so the model can finish its sentence.
    pub tail_token_allowance: u64,
    /// Character estimate per token for the hard character ceiling.
    pub chars_per_token: f64,
}

/// Which JSON field carries a stream event's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentField {
    /// Top-level `response` string (generate endpoint).
    Response,
    /// `message.content` string (chat endpoint).
    MessageContent,
}

/// One decoded NDJSON event from the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    pub fragment: Option<String>,
    pub fragment_field: Option<FragmentField>,
    pub done: bool,
    pub done_reason: Option<String>,
}

impl StreamEvent {
    /// Decodes an event from parsed JSON; `None` for non-object values.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let response = obj.get("response").and_then(Value::as_str);
        let (fragment, fragment_field) = if let Some(text) = response {
            (Some(text.to_string()), Some(FragmentField::Response))
        } else if let Some(text) = obj
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str)
        {
            (Some(text.to_string()), Some(FragmentField::MessageContent))
        } else {
            (None, None)
        };
        Some(Self {
            fragment,
            fragment_field,
            done: obj.get("done").is_some_and(is_truthy),
            done_reason: obj.get("done_reason").and_then(Value::as_str).map(str::to_string),
        })
    }

    /// A terminal event emitted because the output limit was hit.
    pub fn is_length_cutoff(&self) -> bool {
        self.done && self.done_reason.as_deref() == Some("length")
    }
}

/// Loose JSON truthiness: null, false, zero, and empty strings/collections are false.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Reads a token limit leniently.
///
/// Non-negative integers, integral strings, and finite floats (truncated) are
/// accepted; anything else is treated as "no limit".
pub fn as_limit(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f.trunc() as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}
