//! Conversation threading
//!
//! - `ContextReconstructor`: turns a continuation id back into enriched
//!   arguments (history, locked model, budget, initial context)
//! - `ConversationRecorder`: creates threads and appends assistant turns
//! - `history`: rendering of prior turns as text or messages

mod error;
pub mod history;
mod reconstructor;
mod recorder;

pub use error::{ConversationError, ConversationResult};
pub use reconstructor::{ContextReconstructor, ReconstructRequest};
pub use recorder::{ConversationRecorder, RecordOutcome};
