//! Content blocks returned to the client

use rmcp::model::Content;
use serde_json::{json, Value};

use super::error::CallError;
use crate::postprocess::CallSummary;
use crate::types::{status, ToolOutput};

/// Structured error block
pub fn error_block(tool_name: &str, error: &CallError) -> Content {
    Content::text(error_payload(tool_name, error).to_string())
}

/// JSON payload behind `error_block`
pub fn error_payload(tool_name: &str, error: &CallError) -> Value {
    let mut payload = json!({
        "status": error.status(),
        "tool": tool_name,
        "content": error.to_string(),
        "content_type": "text",
    });
    match error {
        CallError::UnknownTool {
            suggestion: Some(s), ..
        } => {
            payload["suggestion"] = json!({"name": s.name, "description": s.description});
        }
        CallError::ConversationNotFound { continuation_id, .. } | CallError::SessionMismatch { continuation_id, .. } => {
            payload["continuation_id"] = json!(continuation_id);
        }
        CallError::ModelUnavailable { available, .. } => {
            payload["available_models"] = json!(available);
        }
        CallError::FilesNotAvailable { requested } => {
            payload["requested_files"] = json!(requested);
        }
        CallError::InfiniteLoopPrevented { requested, supplied } => {
            payload["requested_files"] = json!(requested);
            payload["supplied_files"] = json!(supplied);
        }
        _ => {}
    }
    payload
}

/// Non-fatal notice that short-circuits a call
pub fn warning_block(tool_name: &str, message: &str) -> Content {
    let payload = json!({
        "status": status::WARNING,
        "tool": tool_name,
        "content": message,
        "content_type": "text",
    });
    Content::text(payload.to_string())
}

/// Tool output, optionally followed by the call summary
pub fn output_blocks(output: &ToolOutput, summary: Option<&CallSummary>) -> Vec<Content> {
    let mut blocks = vec![Content::text(output.to_json_string())];
    if let Some(summary) = summary {
        blocks.push(Content::text(summary.to_string()));
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmcp::model::RawContent;

    fn text(content: &Content) -> String {
        match &content.raw {
            RawContent::Text(t) => t.text.clone(),
            _ => String::new(),
        }
    }

    #[test]
    fn error_payload_fields() {
        let err = CallError::InfiniteLoopPrevented {
            requested: vec!["a.rs".into()],
            supplied: vec!["a.rs".into()],
        };
        let value: Value = serde_json::from_str(&text(&error_block("debug", &err))).unwrap();
        assert_eq!(value["status"], "infinite_loop_prevented");
        assert_eq!(value["tool"], "debug");
        assert_eq!(value["supplied_files"][0], "a.rs");
    }

    #[test]
    fn warning_block_shape() {
        let value: Value = serde_json::from_str(&text(&warning_block("consensus", "no models"))).unwrap();
        assert_eq!(value["status"], "warning");
        assert_eq!(value["content"], "no models");
    }

    #[test]
    fn output_then_summary() {
        let blocks = output_blocks(&ToolOutput::success("hi"), None);
        assert_eq!(blocks.len(), 1);
        assert!(text(&blocks[0]).contains("\"status\":\"success\""));
    }
}
