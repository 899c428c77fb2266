//! Conversation error types

use thiserror::Error;

use crate::storage::StoreError;

#[derive(Error, Debug)]
pub enum ConversationError {
    #[error(
        "Conversation thread '{continuation_id}' was not found or has expired. \
         Server-side conversation state is authoritative and may have been rotated; \
         resubmit the request without continuation_id to start a new conversation."
    )]
    NotFound { continuation_id: String },

    #[error(
        "Conversation thread '{continuation_id}' belongs to a different session. \
         Resubmit the request without continuation_id to start a new conversation."
    )]
    SessionMismatch { continuation_id: String },

    #[error("Thread store error: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to attach reconstructed context: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type ConversationResult<T> = Result<T, ConversationError>;
