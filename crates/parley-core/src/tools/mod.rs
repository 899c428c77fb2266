//! Tool management module
//!
//! Tools are registered once at startup. Every incoming name goes through
//! the alias table before lookup; unknown names can get a fuzzy suggestion.

mod aliases;
mod fuzzy;
mod registry;
mod traits;

pub use aliases::AliasTable;
pub use fuzzy::{closest_match, similarity, SUGGESTION_THRESHOLD};
pub use registry::{ToolRegistry, ToolSuggestion};
pub use traits::{Tool, ToolError, ToolResult};
