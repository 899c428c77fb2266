//! Post-execution loop control
//!
//! - files-required: supply requested files and re-invoke, with a hard stop
//!   when nothing new can be supplied
//! - auto-continue: follow workflow pause results up to a step cap
//! - summary: the human-readable block appended to every settled call

mod controller;
mod files;
mod summary;

pub use controller::{LoopContext, PostProcessError, PostProcessor, Settled};
pub use files::{normalize_files, FileGatherer, FileSource, GatheredFiles};
pub use summary::{CallSummary, ExpertValidation};
