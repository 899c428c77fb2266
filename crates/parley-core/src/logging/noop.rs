//! Silent logger

use super::traits::Logger;

/// Discards every line; for hosts that bring no logging and for tests
/// that do not inspect output
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpLogger;

impl NoOpLogger {
    pub fn new() -> Self {
        NoOpLogger
    }
}

impl Logger for NoOpLogger {
    fn debug(&self, _: &str) {}

    fn info(&self, _: &str) {}

    fn warn(&self, _: &str) {}

    fn error(&self, _: &str) {}
}
