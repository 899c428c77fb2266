//! Token budget allocation
//!
//! Pure functions only: the same `ModelContext` always yields the same split.

mod allocation;
mod estimate;

pub use allocation::{TokenAllocation, LARGE_WINDOW_THRESHOLD};
pub use estimate::{estimate_file_tokens, estimate_tokens, CHARS_PER_TOKEN};
