//! End-to-end call handling
//!
//! - `Orchestrator`: the `handle_call_tool` pipeline
//! - `CallError`: failure taxonomy rendered as content blocks
//! - `Advisory`: best-effort side operations that never abort a call

mod advisory;
mod error;
mod response;
mod server;

pub use advisory::Advisory;
pub use error::{CallCancelled, CallError};
pub use response::{error_block, error_payload, output_blocks, warning_block};
pub use server::{CallOptions, Orchestrator, CONSENSUS_TOOL};
