//! Loop protocols that run after the first invocation

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

use super::files::{normalize_files, FileGatherer};
use crate::config::ServerConfig;
use crate::logging::Logger;
use crate::monitor::{ExecutionMonitor, Invocation, MonitorError};
use crate::tools::{Tool, ToolError};
use crate::types::{is_reserved, keys, Arguments, CancellationToken, ToolOutput};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PostProcessError {
    #[error("None of the requested files could be supplied: {}", .requested.join(", "))]
    FilesNotAvailable { requested: Vec<String> },

    #[error(
        "The tool asked for files again without progress. Requested: [{}]; already supplied: [{}]",
        .requested.join(", "),
        .supplied.join(", ")
    )]
    InfiniteLoopPrevented {
        requested: Vec<String>,
        supplied: Vec<String>,
    },

    #[error("Tool exceeded its time budget after {:.1}s", .elapsed.as_secs_f64())]
    TimedOut { elapsed: Duration },

    #[error("{0}")]
    Tool(ToolError),

    #[error(transparent)]
    Cancelled(#[from] MonitorError),
}

/// Per-call inputs for the loops
pub struct LoopContext<'a> {
    pub tool: &'a dyn Tool,
    pub cancel: &'a CancellationToken,
    /// Whole-call wall clock deadline
    pub deadline: Instant,
    pub session_files: &'a [String],
    pub caller_class: Option<&'a str>,
    pub logger: &'a Arc<dyn Logger>,
}

/// Where the loops left the call
#[derive(Debug, Clone, PartialEq)]
pub struct Settled {
    pub output: ToolOutput,
    /// Arguments of the last invocation
    pub arguments: Arguments,
    /// Successful workflow steps, the first invocation included
    pub steps: u32,
    pub invocations: u32,
    pub progress: Vec<String>,
}

/// Runs the files-required loop, then the auto-continue loop
///
/// The two never run concurrently and every re-invocation goes back
/// through the execution monitor with whatever is left of the call's
/// time budget.
pub struct PostProcessor {
    monitor: ExecutionMonitor,
    gatherer: FileGatherer,
    config: Arc<ServerConfig>,
}

impl PostProcessor {
    pub fn new(config: Arc<ServerConfig>, monitor: ExecutionMonitor) -> Self {
        Self {
            monitor,
            gatherer: FileGatherer::new(config.files.clone()),
            config,
        }
    }

    pub async fn settle(
        &self,
        ctx: &LoopContext<'_>,
        arguments: Arguments,
        first: ToolOutput,
    ) -> Result<Settled, PostProcessError> {
        let mut settled = Settled {
            steps: u32::from(!first.is_error()),
            progress: vec![format!("step 1: {}", first.status)],
            output: first,
            arguments,
            invocations: 1,
        };

        self.files_loop(ctx, &mut settled).await?;
        if self.config.features.auto_continue {
            self.auto_continue(ctx, &mut settled).await?;
        }
        Ok(settled)
    }

    async fn files_loop(&self, ctx: &LoopContext<'_>, settled: &mut Settled) -> Result<(), PostProcessError> {
        let mut rounds = 0;
        while settled.output.is_files_required() {
            let requested = settled.output.files_needed.clone();
            let supplied = normalize_files(settled.arguments.files());

            if rounds >= self.config.files.max_file_rounds {
                ctx.logger.warn(&format!(
                    "[PostProcess] {} still wants files after {} round(s); stopping",
                    ctx.tool.name(),
                    rounds
                ));
                return Err(PostProcessError::InfiniteLoopPrevented { requested, supplied });
            }

            let gathered = self.gatherer.gather(&settled.output, ctx.session_files);
            if gathered.is_empty() {
                return Err(PostProcessError::FilesNotAvailable { requested });
            }
            if gathered.files == supplied {
                ctx.logger.warn(&format!(
                    "[PostProcess] {} re-requested the files it already has; breaking loop",
                    ctx.tool.name()
                ));
                return Err(PostProcessError::InfiniteLoopPrevented { requested, supplied });
            }

            ctx.logger.info(&format!(
                "[PostProcess] Supplying {} file(s) to {} ({:?})",
                gathered.files.len(),
                ctx.tool.name(),
                gathered.source
            ));
            settled.arguments.set(keys::FILES, gathered.files);
            rounds += 1;
            settled.output = self.reinvoke(ctx, &settled.arguments).await?;
            settled.invocations += 1;
        }
        Ok(())
    }

    async fn auto_continue(&self, ctx: &LoopContext<'_>, settled: &mut Settled) -> Result<(), PostProcessError> {
        let cap = self.config.auto_continue_cap(ctx.caller_class);
        let mut continued = 0;

        while settled.output.is_pause() && continued < cap {
            let Some(next) = settled.output.next_call.clone() else {
                break;
            };
            if let Some(other) = next.tool.as_deref() {
                if !other.eq_ignore_ascii_case(ctx.tool.name()) {
                    ctx.logger.info(&format!(
                        "[PostProcess] {} hands off to {}; leaving that to the caller",
                        ctx.tool.name(),
                        other
                    ));
                    break;
                }
            }

            let arguments = carry_forward(&settled.arguments, next.arguments.into());
            settled.output = self.reinvoke(ctx, &arguments).await?;
            settled.arguments = arguments;
            settled.invocations += 1;
            continued += 1;
            if !settled.output.is_error() {
                settled.steps += 1;
            }
            settled
                .progress
                .push(format!("step {}: {}", settled.steps, settled.output.status));
        }

        if settled.output.is_pause() && continued >= cap {
            ctx.logger.info(&format!(
                "[PostProcess] Auto-continue cap of {} reached for {}",
                cap,
                ctx.tool.name()
            ));
        }
        Ok(())
    }

    async fn reinvoke(&self, ctx: &LoopContext<'_>, arguments: &Arguments) -> Result<ToolOutput, PostProcessError> {
        let remaining = ctx.deadline.saturating_duration_since(Instant::now());
        match self.monitor.invoke_tool(ctx.tool, arguments, ctx.cancel, remaining).await? {
            Invocation::Output { output, .. } => Ok(output),
            Invocation::Failed { error, .. } => Err(PostProcessError::Tool(error)),
            Invocation::TimedOut { elapsed } => Err(PostProcessError::TimedOut { elapsed }),
        }
    }
}

/// Next-step arguments with the conversation and model carried over
fn carry_forward(previous: &Arguments, mut next: Arguments) -> Arguments {
    for key in [keys::CONTINUATION_ID, keys::MODEL] {
        if next.is_unset(key) {
            if let Some(value) = previous.get(key) {
                next.set(key, value.clone());
            }
        }
    }
    for (key, value) in previous.as_map() {
        if is_reserved(key) && next.is_unset(key) {
            next.set(key.clone(), value.clone());
        }
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitorConfig;
    use crate::logging::{LogLevel, MemoryLogger};
    use crate::tools::ToolResult;
    use crate::types::NextCall;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;

    /// Replays scripted outputs and remembers what it was called with
    struct Scripted {
        outputs: Mutex<Vec<ToolOutput>>,
        calls: Mutex<Vec<Arguments>>,
    }

    impl Scripted {
        fn new(mut outputs: Vec<ToolOutput>) -> Self {
            outputs.reverse();
            Self {
                outputs: Mutex::new(outputs),
                calls: Mutex::new(vec![]),
            }
        }
    }

    #[async_trait]
    impl Tool for Scripted {
        fn name(&self) -> &str {
            "debug"
        }

        fn description(&self) -> &str {
            "scripted"
        }

        async fn execute(&self, arguments: &Arguments, _cancel: CancellationToken) -> ToolResult<ToolOutput> {
            self.calls.lock().push(arguments.clone());
            Ok(self
                .outputs
                .lock()
                .pop()
                .unwrap_or_else(|| ToolOutput::success("done")))
        }
    }

    fn processor(config: &ServerConfig, logger: Arc<dyn Logger>) -> PostProcessor {
        PostProcessor::new(
            Arc::new(config.clone()),
            ExecutionMonitor::new(MonitorConfig::default(), logger),
        )
    }

    fn files_request(file: &str) -> ToolOutput {
        let mut output = ToolOutput::files_required(vec![file.into()]);
        output.next_call = Some(NextCall {
            tool: None,
            arguments: json!({"files": [file]}).as_object().unwrap().clone(),
        });
        output
    }

    fn pause(step: u64) -> ToolOutput {
        ToolOutput::pause(
            "investigation",
            NextCall {
                tool: Some("debug".into()),
                arguments: json!({"step": "continue", "step_number": step}).as_object().unwrap().clone(),
            },
        )
    }

    #[tokio::test]
    async fn repeated_file_request_stops_after_second_invocation() {
        let logger: Arc<dyn Logger> = Arc::new(MemoryLogger::new());
        let config = ServerConfig::default();
        let tool = Scripted::new(vec![files_request("/src/a.rs"); 5]);
        let cancel = CancellationToken::new();
        let ctx = LoopContext {
            tool: &tool,
            cancel: &cancel,
            deadline: Instant::now() + Duration::from_secs(60),
            session_files: &[],
            caller_class: None,
            logger: &logger,
        };

        let err = processor(&config, logger.clone())
            .settle(&ctx, Arguments::new(), files_request("/src/a.rs"))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            PostProcessError::InfiniteLoopPrevented {
                requested: vec!["/src/a.rs".into()],
                supplied: vec!["/src/a.rs".into()],
            }
        );
        assert_eq!(tool.calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn nothing_to_supply() {
        let logger: Arc<dyn Logger> = Arc::new(MemoryLogger::new());
        let config = ServerConfig::default();
        let tool = Scripted::new(vec![]);
        let cancel = CancellationToken::new();
        let ctx = LoopContext {
            tool: &tool,
            cancel: &cancel,
            deadline: Instant::now() + Duration::from_secs(60),
            session_files: &[],
            caller_class: None,
            logger: &logger,
        };

        let err = processor(&config, logger.clone())
            .settle(&ctx, Arguments::new(), ToolOutput::files_required(vec!["missing.rs".into()]))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            PostProcessError::FilesNotAvailable {
                requested: vec!["missing.rs".into()]
            }
        );
        assert!(tool.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn supplied_files_satisfy_tool() {
        let logger: Arc<dyn Logger> = Arc::new(MemoryLogger::new());
        let config = ServerConfig::default();
        let tool = Scripted::new(vec![ToolOutput::success("analysed")]);
        let cancel = CancellationToken::new();
        let ctx = LoopContext {
            tool: &tool,
            cancel: &cancel,
            deadline: Instant::now() + Duration::from_secs(60),
            session_files: &["/cached/b.rs".to_string()],
            caller_class: None,
            logger: &logger,
        };

        let settled = processor(&config, logger.clone())
            .settle(&ctx, Arguments::new(), ToolOutput::files_required(vec!["b.rs".into()]))
            .await
            .unwrap();
        assert_eq!(settled.output.content.as_deref(), Some("analysed"));
        assert_eq!(settled.arguments.files(), vec!["/cached/b.rs".to_string()]);
        assert_eq!(settled.invocations, 2);
    }

    #[tokio::test]
    async fn auto_continue_respects_caller_cap() {
        let memory = Arc::new(MemoryLogger::new());
        let logger: Arc<dyn Logger> = memory.clone();
        let mut config = ServerConfig::default();
        config.features.auto_continue = true;
        config.features.auto_continue_max_steps = 5;
        config.features.caller_class_step_caps.insert("ide".into(), 2);

        let tool = Scripted::new(vec![pause(2), pause(3), pause(4)]);
        let cancel = CancellationToken::new();
        let ctx = LoopContext {
            tool: &tool,
            cancel: &cancel,
            deadline: Instant::now() + Duration::from_secs(60),
            session_files: &[],
            caller_class: Some("ide"),
            logger: &logger,
        };
        let first_args = Arguments::from_value(json!({
            "step": "start",
            "continuation_id": "thread-1",
            "model": "flash",
            "_resolved_model_name": "flash"
        }))
        .unwrap();

        let settled = processor(&config, logger.clone())
            .settle(&ctx, first_args, pause(1))
            .await
            .unwrap();

        assert!(settled.output.is_pause());
        assert_eq!(settled.steps, 3);
        assert_eq!(tool.calls.lock().len(), 2);
        let last = tool.calls.lock().last().cloned().unwrap();
        assert_eq!(last.continuation_id(), Some("thread-1"));
        assert_eq!(last.model(), Some("flash"));
        assert_eq!(last.get_str(keys::RESOLVED_MODEL_NAME), Some("flash"));
        assert_eq!(last.get_u64(keys::STEP_NUMBER), Some(2));
        assert!(memory.contains(LogLevel::Info, "cap of 2 reached"));
    }

    #[tokio::test]
    async fn auto_continue_off_by_default() {
        let logger: Arc<dyn Logger> = Arc::new(MemoryLogger::new());
        let config = ServerConfig::default();
        let tool = Scripted::new(vec![]);
        let cancel = CancellationToken::new();
        let ctx = LoopContext {
            tool: &tool,
            cancel: &cancel,
            deadline: Instant::now() + Duration::from_secs(60),
            session_files: &[],
            caller_class: None,
            logger: &logger,
        };

        let settled = processor(&config, logger.clone())
            .settle(&ctx, Arguments::new(), pause(1))
            .await
            .unwrap();
        assert!(settled.output.is_pause());
        assert_eq!(settled.steps, 1);
        assert!(tool.calls.lock().is_empty());
    }
}
