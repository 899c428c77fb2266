//! Call arguments and the reserved-key namespace
//!
//! A call's arguments are a single owned JSON object that the pipeline
//! enriches in place. Keys beginning with `_` are reserved for the pipeline:
//! they are stripped from the view used for schema validation and are never
//! persisted into a thread's initial context.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Prefix marking pipeline-owned keys
pub const RESERVED_PREFIX: &str = "_";

/// Well-known argument keys
pub mod keys {
    pub const PROMPT: &str = "prompt";
    pub const STEP: &str = "step";
    pub const FILES: &str = "files";
    pub const IMAGES: &str = "images";
    pub const MODEL: &str = "model";
    pub const MODELS: &str = "models";
    pub const CONTINUATION_ID: &str = "continuation_id";
    pub const TEMPERATURE: &str = "temperature";
    pub const THINKING_MODE: &str = "thinking_mode";
    pub const STEP_NUMBER: &str = "step_number";
    pub const TOTAL_STEPS: &str = "total_steps";
    pub const NEXT_STEP_REQUIRED: &str = "next_step_required";

    pub const MODEL_CONTEXT: &str = "_model_context";
    pub const TOKEN_ALLOCATION: &str = "_token_allocation";
    pub const RESOLVED_MODEL_NAME: &str = "_resolved_model_name";
    pub const MODEL_LOCKED: &str = "_model_locked";
    pub const ORIGINAL_PROMPT: &str = "_original_prompt";
    pub const REMAINING_TOKENS: &str = "_remaining_tokens";
    pub const CONVERSATION_MESSAGES: &str = "_conversation_messages";
    pub const SESSION_SUMMARY: &str = "_session_summary";
    pub const SESSION_FILES: &str = "_session_files";
    pub const CORRELATION_ID: &str = "_correlation_id";
    pub const MODEL_SWITCHED_FROM: &str = "_model_switched_from";
}

/// Whether a key belongs to the pipeline
pub fn is_reserved(key: &str) -> bool {
    key.starts_with(RESERVED_PREFIX)
}

/// Tool call arguments
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Arguments(Map<String, Value>);

impl Arguments {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Build from an arbitrary JSON value; anything but an object is rejected
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            Value::Null => Some(Self::new()),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_str())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(|v| v.as_bool())
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.0.get(key).and_then(|v| v.as_u64())
    }

    /// Read a list of strings, ignoring non-string entries
    pub fn get_string_list(&self, key: &str) -> Vec<String> {
        match self.0.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(Value::String(single)) => vec![single.clone()],
            _ => vec![],
        }
    }

    /// Whether a key is missing or explicitly null
    pub fn is_unset(&self, key: &str) -> bool {
        matches!(self.0.get(key), None | Some(Value::Null))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Store a serializable value under a reserved key
    pub fn set_reserved<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), serde_json::Error> {
        debug_assert!(is_reserved(key));
        let value = serde_json::to_value(value)?;
        self.0.insert(key.to_string(), value);
        Ok(())
    }

    /// Read back a value stored with `set_reserved`
    pub fn get_reserved<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.0
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// The view a tool's schema validation sees: reserved keys removed
    pub fn visible(&self) -> Map<String, Value> {
        self.0
            .iter()
            .filter(|(k, _)| !is_reserved(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// The caller's text for this call (`prompt`, or `step` for workflow tools)
    pub fn user_text(&self) -> Option<&str> {
        self.get_str(keys::PROMPT).or_else(|| self.get_str(keys::STEP))
    }

    /// The original caller text, before any history was embedded
    pub fn original_user_text(&self) -> Option<&str> {
        self.get_str(keys::ORIGINAL_PROMPT).or_else(|| self.user_text())
    }

    pub fn model(&self) -> Option<&str> {
        self.get_str(keys::MODEL)
    }

    pub fn continuation_id(&self) -> Option<&str> {
        self.get_str(keys::CONTINUATION_ID).filter(|s| !s.trim().is_empty())
    }

    pub fn files(&self) -> Vec<String> {
        self.get_string_list(keys::FILES)
    }

    pub fn images(&self) -> Vec<String> {
        self.get_string_list(keys::IMAGES)
    }

    pub fn model_locked(&self) -> bool {
        self.get_bool(keys::MODEL_LOCKED).unwrap_or(false)
    }
}

impl From<Map<String, Value>> for Arguments {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
