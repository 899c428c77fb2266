//! Rough token estimates

use std::path::Path;

/// Approximate characters per token
pub const CHARS_PER_TOKEN: u64 = 4;

/// Estimate tokens for a piece of text
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(CHARS_PER_TOKEN)
}

/// Estimate tokens for a set of files from their on-disk size
///
/// Unreadable paths count as zero; they are reported by the tool, not here.
pub fn estimate_file_tokens<P: AsRef<Path>>(paths: &[P]) -> u64 {
    paths
        .iter()
        .filter_map(|p| std::fs::metadata(p.as_ref()).ok())
        .filter(|m| m.is_file())
        .map(|m| m.len().div_ceil(CHARS_PER_TOKEN))
        .sum()
}
