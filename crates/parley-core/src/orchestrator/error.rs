//! Call-level error taxonomy

use std::time::Duration;

use thiserror::Error;

use crate::conversation::ConversationError;
use crate::postprocess::PostProcessError;
use crate::routing::RoutingError;
use crate::tools::{ToolError, ToolSuggestion};

/// Everything a call can fail with, short of cancellation
///
/// Each variant becomes a single structured content block; none of them
/// reach the transport as an exception.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CallError {
    #[error("Unknown tool: '{name}'{}", suggestion_hint(.suggestion))]
    UnknownTool {
        name: String,
        suggestion: Option<ToolSuggestion>,
    },

    #[error("{message}")]
    ConversationNotFound { continuation_id: String, message: String },

    #[error("{message}")]
    SessionMismatch { continuation_id: String, message: String },

    #[error("Model '{model}' is not available. Available models: {}", available_list(.available))]
    ModelUnavailable { model: String, available: Vec<String> },

    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    ExecutionError(String),

    #[error("Tool execution timed out after {seconds:.1}s")]
    Timeout { seconds: f64 },

    #[error("None of the requested files could be supplied: {}", .requested.join(", "))]
    FilesNotAvailable { requested: Vec<String> },

    #[error(
        "The tool asked for files again without progress. Requested: [{}]; already supplied: [{}]",
        .requested.join(", "),
        .supplied.join(", ")
    )]
    InfiniteLoopPrevented {
        requested: Vec<String>,
        supplied: Vec<String>,
    },
}

impl CallError {
    /// Stable wire status
    pub fn status(&self) -> &'static str {
        match self {
            CallError::UnknownTool { .. } => "unknown_tool",
            CallError::ConversationNotFound { .. } => "conversation_not_found",
            CallError::SessionMismatch { .. } => "session_mismatch",
            CallError::ModelUnavailable { .. } => "model_unavailable",
            CallError::InvalidRequest(_) => "invalid_request",
            CallError::ExecutionError(_) => "execution_error",
            CallError::Timeout { .. } => "timeout",
            CallError::FilesNotAvailable { .. } => "files_not_available",
            CallError::InfiniteLoopPrevented { .. } => "infinite_loop_prevented",
        }
    }

    pub fn timeout(elapsed: Duration) -> Self {
        CallError::Timeout {
            seconds: elapsed.as_secs_f64(),
        }
    }
}

/// The call was cancelled by the client; never turned into a content block
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Call to '{tool_name}' was cancelled")]
pub struct CallCancelled {
    pub tool_name: String,
    pub correlation_id: String,
}

impl From<ConversationError> for CallError {
    fn from(err: ConversationError) -> Self {
        let message = err.to_string();
        match err {
            ConversationError::NotFound { continuation_id } => CallError::ConversationNotFound {
                continuation_id,
                message,
            },
            ConversationError::SessionMismatch { continuation_id } => CallError::SessionMismatch {
                continuation_id,
                message,
            },
            ConversationError::Store(_) | ConversationError::Serialization(_) => CallError::ExecutionError(message),
        }
    }
}

impl From<RoutingError> for CallError {
    fn from(err: RoutingError) -> Self {
        match err {
            RoutingError::ModelUnavailable { model, available } => CallError::ModelUnavailable { model, available },
        }
    }
}

impl From<ToolError> for CallError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::InvalidArguments(message) => CallError::InvalidRequest(message),
            other => CallError::ExecutionError(other.to_string()),
        }
    }
}

/// Post-processing failures; cancellation is handled by the caller first
impl From<PostProcessError> for CallError {
    fn from(err: PostProcessError) -> Self {
        match err {
            PostProcessError::FilesNotAvailable { requested } => CallError::FilesNotAvailable { requested },
            PostProcessError::InfiniteLoopPrevented { requested, supplied } => {
                CallError::InfiniteLoopPrevented { requested, supplied }
            }
            PostProcessError::TimedOut { elapsed } => CallError::timeout(elapsed),
            PostProcessError::Tool(error) => error.into(),
            PostProcessError::Cancelled(error) => CallError::ExecutionError(error.to_string()),
        }
    }
}

fn suggestion_hint(suggestion: &Option<ToolSuggestion>) -> String {
    match suggestion {
        Some(s) => format!(". Did you mean '{}'? ({})", s.name, s.description),
        None => String::new(),
    }
}

fn available_list(available: &[String]) -> String {
    if available.is_empty() {
        "none".to_string()
    } else {
        available.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_tool_mentions_suggestion() {
        let err = CallError::UnknownTool {
            name: "chta".into(),
            suggestion: Some(ToolSuggestion {
                name: "chat".into(),
                description: "General conversation".into(),
                similarity: 0.5,
            }),
        };
        assert_eq!(err.status(), "unknown_tool");
        assert_eq!(
            err.to_string(),
            "Unknown tool: 'chta'. Did you mean 'chat'? (General conversation)"
        );
    }

    #[test]
    fn conversion_keeps_taxonomy() {
        let not_found: CallError = ConversationError::NotFound {
            continuation_id: "abc".into(),
        }
        .into();
        assert_eq!(not_found.status(), "conversation_not_found");
        assert!(not_found.to_string().contains("without continuation_id"));

        let invalid: CallError = ToolError::InvalidArguments("prompt is required".into()).into();
        assert_eq!(invalid, CallError::InvalidRequest("prompt is required".into()));

        let timeout: CallError = PostProcessError::TimedOut {
            elapsed: Duration::from_secs(3),
        }
        .into();
        assert_eq!(timeout.status(), "timeout");
    }
}
