//! Tool definition and tool output types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Status strings shared by tools and the pipeline
pub mod status {
    pub const SUCCESS: &str = "success";
    pub const CONTINUATION_AVAILABLE: &str = "continuation_available";
    pub const FILES_REQUIRED: &str = "files_required_to_continue";
    pub const PAUSE_PREFIX: &str = "pause_for_";
    pub const WARNING: &str = "warning";
    pub const ERROR: &str = "error";
}

/// Tool definition as advertised to MCP clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name (function name)
    pub name: String,
    /// Description of what the tool does
    pub description: String,
    /// JSON Schema for the input parameters
    #[serde(rename = "inputSchema", skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: None,
        }
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.input_schema = Some(schema);
        self
    }
}

/// Offer to continue a conversation in a later call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuationOffer {
    pub continuation_id: String,
    pub note: String,
    pub remaining_turns: u32,
}

/// Arguments a tool asks to be called with next
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NextCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

/// Structured result of one tool invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation_offer: Option<ContinuationOffer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_call: Option<NextCall>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files_needed: Vec<String>,
}

fn default_content_type() -> String {
    "text".to_string()
}

impl ToolOutput {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            content: None,
            content_type: default_content_type(),
            metadata: Map::new(),
            continuation_offer: None,
            next_call: None,
            files_needed: vec![],
        }
    }

    pub fn success(content: impl Into<String>) -> Self {
        Self::new(status::SUCCESS).with_content(content)
    }

    /// The tool needs these files (paths or glob patterns) before it can answer
    pub fn files_required(files_needed: Vec<String>) -> Self {
        let mut output = Self::new(status::FILES_REQUIRED);
        output.files_needed = files_needed;
        output
    }

    /// A workflow step finished and `phase` comes next
    pub fn pause(phase: &str, next_call: NextCall) -> Self {
        let mut output = Self::new(format!("{}{}", status::PAUSE_PREFIX, phase));
        output.next_call = Some(next_call);
        output
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(status::ERROR).with_content(message)
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_next_call(mut self, next_call: NextCall) -> Self {
        self.next_call = Some(next_call);
        self
    }

    pub fn is_files_required(&self) -> bool {
        self.status == status::FILES_REQUIRED
    }

    pub fn is_pause(&self) -> bool {
        self.status.starts_with(status::PAUSE_PREFIX)
    }

    pub fn is_error(&self) -> bool {
        self.status == status::ERROR
    }

    /// A final answer that can be recorded as an assistant turn
    pub fn is_final(&self) -> bool {
        !self.is_error() && !self.is_files_required() && !self.is_pause()
    }

    /// Serialize for a content block; falls back to the bare status on failure
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| format!("{{\"status\":\"{}\"}}", self.status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_predicates() {
        assert!(ToolOutput::success("done").is_final());
        assert!(ToolOutput::files_required(vec!["a.rs".into()]).is_files_required());
        let paused = ToolOutput::pause("investigation", NextCall::default());
        assert_eq!(paused.status, "pause_for_investigation");
        assert!(paused.is_pause());
        assert!(!paused.is_final());
        assert!(!ToolOutput::error("boom").is_final());
    }

    #[test]
    fn json_shape_omits_empty_fields() {
        let json = ToolOutput::success("hi").to_json_string();
        assert!(json.contains("\"status\":\"success\""));
        assert!(!json.contains("files_needed"));
        assert!(!json.contains("continuation_offer"));
    }

    #[test]
    fn parses_tool_json() {
        let value = json!({
            "status": "pause_for_analysis",
            "next_call": {"arguments": {"step_number": 2}}
        });
        let output: ToolOutput = serde_json::from_value(value).unwrap();
        assert!(output.is_pause());
        assert_eq!(output.content_type, "text");
        assert_eq!(output.next_call.unwrap().arguments["step_number"], 2);
    }
}
