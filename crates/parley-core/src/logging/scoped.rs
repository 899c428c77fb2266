//! Correlation-scoped logger

use std::sync::Arc;

use super::traits::Logger;

/// Wraps a logger so that every line carries the call correlation id
#[derive(Clone)]
pub struct ScopedLogger {
    inner: Arc<dyn Logger>,
    prefix: String,
}

impl ScopedLogger {
    pub fn new(inner: Arc<dyn Logger>, correlation_id: &str) -> Self {
        Self {
            inner,
            prefix: format!("[call {}]", correlation_id),
        }
    }

    /// The wrapped logger, without the prefix
    pub fn inner(&self) -> &Arc<dyn Logger> {
        &self.inner
    }
}

impl Logger for ScopedLogger {
    fn debug(&self, message: &str) {
        self.inner.debug(&format!("{} {}", self.prefix, message));
    }

    fn info(&self, message: &str) {
        self.inner.info(&format!("{} {}", self.prefix, message));
    }

    fn warn(&self, message: &str) {
        self.inner.warn(&format!("{} {}", self.prefix, message));
    }

    fn error(&self, message: &str) {
        self.inner.error(&format!("{} {}", self.prefix, message));
    }
}

impl std::fmt::Debug for ScopedLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedLogger")
            .field("prefix", &self.prefix)
            .finish()
    }
}
