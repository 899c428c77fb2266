//! Core types shared across the pipeline

mod arguments;
mod cancellation;
mod conversation;
mod model;
mod tool;

pub use arguments::{is_reserved, keys, Arguments, RESERVED_PREFIX};
pub use cancellation::CancellationToken;
pub use conversation::{ConversationTurn, ThreadContext, TurnRole};
pub use model::{
    is_auto, ModelCapabilities, ModelCategory, ModelContext, ModelSpec, ModelTier, ProviderConfig,
    AUTO_MODEL,
};
pub use tool::{status, ContinuationOffer, NextCall, ToolDefinition, ToolOutput};
