//! Supervised execution of one tool invocation

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{self, Instant};

use super::heartbeat::run_heartbeat;
use crate::config::MonitorConfig;
use crate::logging::Logger;
use crate::tools::{Tool, ToolError};
use crate::types::{Arguments, CancellationToken, ToolOutput};

/// Result of a supervised invocation that was not cancelled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorOutcome<T> {
    Completed { value: T, elapsed: Duration },
    TimedOut { elapsed: Duration },
}

/// What one supervised tool invocation produced
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    Output { output: ToolOutput, elapsed: Duration },
    Failed { error: ToolError, elapsed: Duration },
    TimedOut { elapsed: Duration },
}

impl Invocation {
    pub fn elapsed(&self) -> Duration {
        match self {
            Invocation::Output { elapsed, .. }
            | Invocation::Failed { elapsed, .. }
            | Invocation::TimedOut { elapsed } => *elapsed,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MonitorError {
    #[error("Call cancelled after {:.1}s", .elapsed.as_secs_f64())]
    Cancelled { elapsed: Duration },
}

/// Runs one invocation with a heartbeat, a wall-clock timeout, and
/// cooperative cancellation
///
/// The tool future, its heartbeat, the timeout, and the cancellation wait
/// share a single `select!`, so whichever branch finishes first drops the
/// others. No heartbeat outlives the call on any exit path.
#[derive(Clone)]
pub struct ExecutionMonitor {
    config: MonitorConfig,
    logger: Arc<dyn Logger>,
}

impl ExecutionMonitor {
    pub fn new(config: MonitorConfig, logger: Arc<dyn Logger>) -> Self {
        Self { config, logger }
    }

    /// Same settings, different log destination
    pub fn with_logger(&self, logger: Arc<dyn Logger>) -> Self {
        Self {
            config: self.config.clone(),
            logger,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Supervise `task`
    ///
    /// `task` receives a token that is cancelled on timeout or when `cancel`
    /// fires, for tools that check it at their own suspension points.
    pub async fn run<F, Fut, T>(
        &self,
        label: &str,
        cancel: &CancellationToken,
        task: F,
    ) -> Result<MonitorOutcome<T>, MonitorError>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = T>,
    {
        self.run_with_timeout(label, cancel, self.config.timeout(), task).await
    }

    /// Like `run`, with the remaining share of a longer budget
    pub async fn run_with_timeout<F, Fut, T>(
        &self,
        label: &str,
        cancel: &CancellationToken,
        timeout: Duration,
        task: F,
    ) -> Result<MonitorOutcome<T>, MonitorError>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = T>,
    {
        let started = Instant::now();
        let scope = cancel.child_token();
        let work = task(scope.clone());
        let heartbeat = run_heartbeat(self.logger.clone(), label.to_string(), self.config.clone(), started);

        tokio::pin!(work);
        tokio::pin!(heartbeat);

        self.logger.debug(&format!("[Monitor] {} started (timeout {:.0}s)", label, timeout.as_secs_f64()));

        let outcome = tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                scope.cancel();
                let elapsed = started.elapsed();
                self.logger.warn(&format!(
                    "[Monitor] {} cancelled after {:.1}s",
                    label,
                    elapsed.as_secs_f64()
                ));
                return Err(MonitorError::Cancelled { elapsed });
            }
            value = &mut work => MonitorOutcome::Completed { value, elapsed: started.elapsed() },
            _ = time::sleep(timeout) => {
                scope.cancel();
                let elapsed = started.elapsed();
                self.logger.error(&format!(
                    "[Monitor] {} timed out after {:.1}s",
                    label,
                    elapsed.as_secs_f64()
                ));
                MonitorOutcome::TimedOut { elapsed }
            }
            _ = &mut heartbeat => unreachable!("heartbeat never completes"),
        };

        if let MonitorOutcome::Completed { elapsed, .. } = &outcome {
            self.logger.debug(&format!("[Monitor] {} completed in {:.1}s", label, elapsed.as_secs_f64()));
        }
        Ok(outcome)
    }

    /// Execute a tool under supervision within `timeout`
    pub async fn invoke_tool(
        &self,
        tool: &dyn Tool,
        arguments: &Arguments,
        cancel: &CancellationToken,
        timeout: Duration,
    ) -> Result<Invocation, MonitorError> {
        let outcome = self
            .run_with_timeout(tool.name(), cancel, timeout, |scope| async move {
                tool.execute(arguments, scope).await
            })
            .await?;

        Ok(match outcome {
            MonitorOutcome::Completed { value: Ok(output), elapsed } => Invocation::Output { output, elapsed },
            MonitorOutcome::Completed { value: Err(error), elapsed } => Invocation::Failed { error, elapsed },
            MonitorOutcome::TimedOut { elapsed } => Invocation::TimedOut { elapsed },
        })
    }
}
