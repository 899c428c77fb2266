//! Tool trait definition

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::types::{Arguments, CancellationToken, ModelCategory, ToolDefinition, ToolOutput};

/// Errors a tool may raise while validating or executing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("{0}")]
    InvalidArguments(String),

    #[error("{0}")]
    Execution(String),

    #[error("Tool execution cancelled")]
    Cancelled,
}

pub type ToolResult<T> = Result<T, ToolError>;

/// An analysis tool callable through the server
///
/// Tools receive the full enriched `Arguments`, including reserved keys such
/// as `_model_context`, but validation only ever sees the visible view.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Canonical tool name
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema for the caller-visible parameters
    fn input_schema(&self) -> Option<Value> {
        None
    }

    fn definition(&self) -> ToolDefinition {
        let definition = ToolDefinition::new(self.name(), self.description());
        match self.input_schema() {
            Some(schema) => definition.with_schema(schema),
            None => definition,
        }
    }

    /// Whether the pipeline must resolve a model before calling this tool
    fn requires_model(&self) -> bool {
        true
    }

    /// What kind of model suits this tool when the caller asked for `auto`
    fn model_category(&self) -> ModelCategory {
        ModelCategory::Balanced
    }

    /// Keys that must be present and non-null
    fn required_fields(&self) -> &[&str] {
        &[]
    }

    /// Validate the caller-visible arguments
    fn validate_arguments(&self, visible: &Map<String, Value>) -> ToolResult<()> {
        let missing: Vec<&str> = self
            .required_fields()
            .iter()
            .copied()
            .filter(|key| matches!(visible.get(*key), None | Some(Value::Null)))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ToolError::InvalidArguments(format!(
                "Missing required field(s) for {}: {}",
                self.name(),
                missing.join(", ")
            )))
        }
    }

    /// Run the tool
    ///
    /// Implementations should check `cancel` at their own suspension points;
    /// the monitor also drops the future on timeout or cancellation.
    async fn execute(&self, arguments: &Arguments, cancel: CancellationToken) -> ToolResult<ToolOutput>;
}
