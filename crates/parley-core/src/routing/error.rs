//! Routing error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoutingError {
    #[error("Model '{model}' is not available. Available models: {}", format_available(.available))]
    ModelUnavailable { model: String, available: Vec<String> },
}

pub type RoutingResult<T> = Result<T, RoutingError>;

fn format_available(available: &[String]) -> String {
    if available.is_empty() {
        "none".to_string()
    } else {
        available.join(", ")
    }
}
