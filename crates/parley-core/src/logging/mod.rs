//! Logging
//!
//! The pipeline never writes to stdout or stderr directly; it logs through
//! `Arc<dyn Logger>` so each host picks the destination.

mod console;
mod memory;
mod noop;
mod scoped;
mod traits;

pub use console::ConsoleLogger;
pub use memory::{LogEntry, MemoryLogger};
pub use noop::NoOpLogger;
pub use scoped::ScopedLogger;
pub use traits::{LogLevel, Logger};
