//! Best-effort operations
//!
//! Cache reads and writes, telemetry, and conversation bookkeeping must
//! never abort a call. Running them through `Advisory` logs the failure and
//! hands back `None` instead.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use crate::logging::Logger;

pub struct Advisory<'a> {
    logger: &'a Arc<dyn Logger>,
}

impl<'a> Advisory<'a> {
    pub fn new(logger: &'a Arc<dyn Logger>) -> Self {
        Self { logger }
    }

    /// Await `operation`, logging and swallowing its error
    pub async fn run<T, E, Fut>(&self, name: &str, operation: Fut) -> Option<T>
    where
        E: Display,
        Fut: Future<Output = Result<T, E>>,
    {
        self.check(name, operation.await)
    }

    /// Same as `run` for an already computed result
    pub fn check<T, E: Display>(&self, name: &str, result: Result<T, E>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.logger.warn(&format!("[Advisory] {} failed: {}", name, e));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogLevel, MemoryLogger};

    #[tokio::test]
    async fn failures_become_none() {
        let memory = Arc::new(MemoryLogger::new());
        let logger: Arc<dyn Logger> = memory.clone();
        let advisory = Advisory::new(&logger);

        let ok = advisory.run("cache read", async { Ok::<_, String>(5) }).await;
        assert_eq!(ok, Some(5));

        let failed = advisory
            .run("cache write", async { Err::<(), _>("backend down".to_string()) })
            .await;
        assert_eq!(failed, None);
        assert!(memory.contains(LogLevel::Warn, "cache write failed: backend down"));
    }
}
