//! Request orchestrator
//!
//! `handle_call_tool` is the single entry point. Steps run strictly in
//! order:
//!
//! 1. correlation id for logs and telemetry
//! 2. alias resolution
//! 3. registry lookup (fuzzy suggestion on miss)
//! 4. conversation reconstruction when a continuation id is present
//! 5. session cache hints
//! 6. consensus model auto-selection
//! 7. model-free tools run directly
//! 8. model routing with one fallback
//! 9. model context and token allocation under reserved keys
//! 10. file size check against the allocation
//! 11. supervised execution, loop control, recording, summary, cache write

use std::sync::Arc;

use rmcp::model::Content;
use serde_json::{json, Value};
use tokio::time::Instant;
use uuid::Uuid;

use super::advisory::Advisory;
use super::error::{CallCancelled, CallError};
use super::response::{error_block, output_blocks, warning_block};
use crate::{log_info, log_warn};
use crate::budget::{estimate_file_tokens, estimate_tokens, TokenAllocation};
use crate::config::{ConfigResult, ServerConfig};
use crate::conversation::{ContextReconstructor, ConversationRecorder, ReconstructRequest};
use crate::logging::{Logger, ScopedLogger};
use crate::monitor::{
    CallOutcome, ExecutionMonitor, Invocation, LogTelemetrySink, MonitorError, TelemetryRecord, TelemetrySink,
};
use crate::postprocess::{
    normalize_files, CallSummary, ExpertValidation, LoopContext, PostProcessError, PostProcessor, Settled,
};
use crate::providers::{ModelProviderRegistry, StaticProviderRegistry};
use crate::routing::{select_consensus_models, ModelRouter, ResolvedModel, RouteRequest};
use crate::storage::{MemorySessionCache, MemoryThreadStore, SessionCache, SessionCacheEntry, ThreadStore};
use crate::tools::{Tool, ToolError, ToolRegistry};
use crate::types::{
    is_reserved, keys, status, Arguments, CancellationToken, ConversationTurn, ModelContext, ToolDefinition,
    ToolOutput,
};

/// Tool whose model list is filled in automatically when omitted
pub const CONSENSUS_TOOL: &str = "consensus";

/// Per-call options supplied by the transport
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub session_fingerprint: Option<String>,
    pub caller_class: Option<String>,
    pub cancel: CancellationToken,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.session_fingerprint = Some(fingerprint.into());
        self
    }

    pub fn with_caller_class(mut self, caller_class: impl Into<String>) -> Self {
        self.caller_class = Some(caller_class.into());
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Why the pipeline stopped early
enum Stop {
    Error(CallError),
    Cancelled,
}

impl From<CallError> for Stop {
    fn from(err: CallError) -> Self {
        Stop::Error(err)
    }
}

/// Bookkeeping for telemetry
struct CallRecord {
    correlation_id: String,
    tool_name: String,
    model: Option<String>,
    started: Instant,
}

/// Everything the closing stage of a model-backed call needs
struct Completion<'a> {
    tool_name: &'a str,
    caller_arguments: &'a Arguments,
    continuation_id: Option<&'a str>,
    resolved: &'a ResolvedModel,
    session_files: &'a [String],
    options: &'a CallOptions,
}

/// Composes reconstruction, routing, supervision, and loop control into
/// the end-to-end call pipeline
pub struct Orchestrator {
    config: Arc<ServerConfig>,
    tools: Arc<ToolRegistry>,
    providers: Arc<dyn ModelProviderRegistry>,
    session_cache: Arc<dyn SessionCache>,
    router: Arc<ModelRouter>,
    reconstructor: ContextReconstructor,
    recorder: ConversationRecorder,
    monitor: ExecutionMonitor,
    telemetry: Arc<dyn TelemetrySink>,
    logger: Arc<dyn Logger>,
}

impl Orchestrator {
    /// Fails when `config` does not validate
    pub fn new(
        config: Arc<ServerConfig>,
        tools: Arc<ToolRegistry>,
        providers: Arc<dyn ModelProviderRegistry>,
        threads: Arc<dyn ThreadStore>,
        session_cache: Arc<dyn SessionCache>,
        logger: Arc<dyn Logger>,
    ) -> ConfigResult<Self> {
        config.validate()?;
        let router = Arc::new(ModelRouter::new(config.routing.clone()));
        Ok(Self {
            reconstructor: ContextReconstructor::new(
                threads.clone(),
                providers.clone(),
                router.clone(),
                config.conversation.clone(),
            ),
            recorder: ConversationRecorder::new(threads, config.conversation.max_turns),
            monitor: ExecutionMonitor::new(config.monitor.clone(), logger.clone()),
            telemetry: Arc::new(LogTelemetrySink::new(logger.clone())),
            router,
            config,
            tools,
            providers,
            session_cache,
            logger,
        })
    }

    /// In-memory stores and the configured providers
    pub fn from_config(
        config: Arc<ServerConfig>,
        tools: Arc<ToolRegistry>,
        logger: Arc<dyn Logger>,
    ) -> ConfigResult<Self> {
        let providers = Arc::new(StaticProviderRegistry::from_config(&config));
        let threads = Arc::new(MemoryThreadStore::from_config(&config));
        let session_cache = Arc::new(MemorySessionCache::from_config(&config));
        Self::new(config, tools, providers, threads, session_cache, logger)
    }

    /// Send telemetry records somewhere other than the log
    pub fn with_telemetry(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = sink;
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// Tool definitions to advertise to clients
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        self.tools.definitions()
    }

    /// Handle one tool call with default options
    pub async fn handle_call_tool(&self, name: &str, arguments: Value) -> Result<Vec<Content>, CallCancelled> {
        self.handle_call_tool_with(name, arguments, CallOptions::default())
            .await
    }

    /// Handle one tool call
    ///
    /// Every failure comes back as a structured content block. The only
    /// `Err` is cancellation, which is recorded and then propagated.
    pub async fn handle_call_tool_with(
        &self,
        name: &str,
        arguments: Value,
        options: CallOptions,
    ) -> Result<Vec<Content>, CallCancelled> {
        let correlation_id = Uuid::new_v4().to_string();
        let logger: Arc<dyn Logger> = Arc::new(ScopedLogger::new(self.logger.clone(), &correlation_id));
        let mut call = CallRecord {
            correlation_id,
            tool_name: name.trim().to_string(),
            model: None,
            started: Instant::now(),
        };

        log_info!(logger, "[Orchestrator] Call to {}", call.tool_name);
        let result = self.run_pipeline(&mut call, arguments, &options, &logger).await;

        match result {
            Ok(blocks) => {
                self.record_telemetry(&call, CallOutcome::Success);
                log_info!(
                    logger,
                    "[Orchestrator] {} finished in {:.1}s",
                    call.tool_name,
                    call.started.elapsed().as_secs_f64()
                );
                Ok(blocks)
            }
            Err(Stop::Error(error)) => {
                let outcome = match &error {
                    CallError::Timeout { .. } => CallOutcome::Timeout,
                    _ => CallOutcome::Failure,
                };
                self.record_telemetry(&call, outcome);
                log_warn!(
                    logger,
                    "[Orchestrator] {} failed ({}): {}",
                    call.tool_name,
                    error.status(),
                    error
                );
                Ok(vec![error_block(&call.tool_name, &error)])
            }
            Err(Stop::Cancelled) => {
                self.record_telemetry(&call, CallOutcome::Cancelled);
                logger.warn(&format!("[Orchestrator] {} cancelled by client", call.tool_name));
                Err(CallCancelled {
                    tool_name: call.tool_name,
                    correlation_id: call.correlation_id,
                })
            }
        }
    }

    async fn run_pipeline(
        &self,
        call: &mut CallRecord,
        raw_arguments: Value,
        options: &CallOptions,
        logger: &Arc<dyn Logger>,
    ) -> Result<Vec<Content>, Stop> {
        let deadline = call.started + self.config.monitor.timeout();
        let requested_name = call.tool_name.clone();

        let canonical = self.tools.resolve_name(&requested_name);
        if canonical != requested_name {
            logger.debug(&format!("[Orchestrator] Alias {} -> {}", requested_name, canonical));
        }
        call.tool_name = canonical.clone();

        let Some(tool) = self.tools.get(&canonical) else {
            let suggestion = if self.config.features.fuzzy_tool_matching {
                self.tools.suggest(&canonical)
            } else {
                None
            };
            return Err(CallError::UnknownTool {
                name: requested_name,
                suggestion,
            }
            .into());
        };

        let mut arguments = strip_reserved(raw_arguments, logger)?;
        let caller_arguments = arguments.clone();
        arguments.set(keys::CORRELATION_ID, call.correlation_id.clone());

        let continuation_id = arguments.continuation_id().map(str::to_string);
        if let Some(id) = continuation_id.as_deref() {
            let request = ReconstructRequest {
                tool_name: &canonical,
                continuation_id: id,
                category: tool.model_category(),
                session_fingerprint: options.session_fingerprint.as_deref(),
            };
            arguments = self
                .reconstructor
                .reconstruct(request, arguments, logger)
                .await
                .map_err(CallError::from)?;
        }

        let advisory = Advisory::new(logger);
        let mut session_files = Vec::new();
        if let Some(id) = continuation_id.as_deref() {
            if let Some(Some(entry)) = advisory.run("session cache read", self.session_cache.get(id)).await {
                arguments.set(keys::SESSION_SUMMARY, entry.summary);
                arguments.set(keys::SESSION_FILES, entry.files.clone());
                session_files = entry.files;
            }
        }

        let mut consensus_caveat = None;
        if canonical == CONSENSUS_TOOL && !has_model_list(&arguments) {
            let selection = select_consensus_models(self.providers.as_ref(), &self.config.routing.consensus);
            if selection.is_empty() {
                logger.warn("[Orchestrator] No models available for consensus");
                return Ok(vec![warning_block(
                    &canonical,
                    "No models are available for consensus. Configure at least one provider \
                     or pass an explicit models list.",
                )]);
            }
            logger.info(&format!(
                "[Orchestrator] Consensus models selected: {}",
                selection.models.join(", ")
            ));
            let models: Vec<Value> = selection.models.iter().map(|m| json!({ "model": m })).collect();
            arguments.set(keys::MODELS, models);
            consensus_caveat = selection.caveat;
        }

        tool.validate_arguments(&arguments.visible())
            .map_err(CallError::from)?;

        if !tool.requires_model() {
            let output = self
                .invoke(tool.as_ref(), &arguments, &options.cancel, deadline, logger)
                .await?;
            return Ok(output_blocks(&output, None));
        }

        let category = tool.model_category();
        let decision = self.router.route(&RouteRequest {
            tool_name: &canonical,
            requested_model: arguments.model(),
            arguments: &arguments,
            category,
        });
        logger.debug(&format!(
            "[Router] {} -> {} (rule {})",
            canonical,
            decision.model,
            decision.rule.name()
        ));
        let resolved = self
            .router
            .ensure_available(&decision.model, category, self.providers.as_ref(), logger)
            .map_err(CallError::from)?;
        if resolved.substituted_for.is_some() && arguments.model_locked() {
            logger.warn(&format!(
                "[Orchestrator] Conversation was locked to {} but it is unavailable; using {}",
                decision.model, resolved.name
            ));
        }
        call.model = Some(resolved.name.clone());

        let context = ModelContext::new(resolved.name.clone(), resolved.provider.clone(), &resolved.capabilities);
        let allocation = TokenAllocation::for_context(&context);
        attach_model(&mut arguments, &context, &allocation)?;

        let files = arguments.files();
        if !files.is_empty() {
            let file_tokens = estimate_file_tokens(&files);
            if file_tokens > allocation.file_tokens {
                let message = format!(
                    "Files need ~{} tokens but {} allows {} tokens for files; send fewer or smaller files",
                    file_tokens, resolved.name, allocation.file_tokens
                );
                if self.config.features.strict_file_size {
                    return Err(CallError::InvalidRequest(message).into());
                }
                logger.warn(&format!("[Orchestrator] {}", message));
            }
        }

        let monitor = self.monitor.with_logger(logger.clone());
        let first = invoke_with(&monitor, tool.as_ref(), &arguments, &options.cancel, deadline).await?;

        let post = PostProcessor::new(self.config.clone(), monitor);
        let loop_context = LoopContext {
            tool: tool.as_ref(),
            cancel: &options.cancel,
            deadline,
            session_files: &session_files,
            caller_class: options.caller_class.as_deref(),
            logger,
        };
        let settled = match post.settle(&loop_context, arguments, first).await {
            Ok(settled) => settled,
            Err(PostProcessError::Cancelled(_)) => return Err(Stop::Cancelled),
            Err(other) => return Err(CallError::from(other).into()),
        };

        let completion = Completion {
            tool_name: &canonical,
            caller_arguments: &caller_arguments,
            continuation_id: continuation_id.as_deref(),
            resolved: &resolved,
            session_files: &session_files,
            options,
        };
        Ok(self
            .complete(call, completion, settled, consensus_caveat, logger)
            .await)
    }

    /// Record the exchange, attach the offer and summary, write the cache
    async fn complete(
        &self,
        call: &CallRecord,
        completion: Completion<'_>,
        settled: Settled,
        consensus_caveat: Option<String>,
        logger: &Arc<dyn Logger>,
    ) -> Vec<Content> {
        let Settled {
            mut output,
            arguments,
            steps,
            progress,
            ..
        } = settled;
        let resolved = completion.resolved;

        output = output
            .with_metadata("model_used", resolved.name.clone())
            .with_metadata("provider_used", resolved.provider.clone());
        if let Some(original) = &resolved.substituted_for {
            output = output.with_metadata("model_substituted_for", original.clone());
        }
        if let Some(previous) = arguments.get_str(keys::MODEL_SWITCHED_FROM) {
            output = output.with_metadata("model_switched_from", previous.to_string());
        }
        if let Some(caveat) = consensus_caveat {
            output = output.with_metadata("consensus_caveat", caveat);
        }

        let thread_id = if output.is_final() {
            self.record_exchange(&completion, &arguments, &mut output, logger)
                .await
        } else {
            completion.continuation_id.map(str::to_string)
        };

        let summary = self.config.features.attach_summary.then(|| CallSummary {
            tool_name: completion.tool_name.to_string(),
            status: output.status.clone(),
            steps,
            duration: call.started.elapsed(),
            model: Some(resolved.name.clone()),
            approx_tokens: estimate_tokens(arguments.original_user_text().unwrap_or_default())
                + estimate_tokens(output.content.as_deref().unwrap_or_default()),
            continuation_id: thread_id.clone(),
            expert_validation: self.expert_validation(&output),
            progress,
        });

        if let Some(id) = thread_id.as_deref() {
            let mut files = completion.caller_arguments.files();
            files.extend(arguments.files());
            files.extend(completion.session_files.iter().cloned());
            let entry = SessionCacheEntry {
                summary: summary
                    .as_ref()
                    .map(CallSummary::short)
                    .unwrap_or_else(|| output.status.clone()),
                files: normalize_files(files),
                last_model: Some(resolved.name.clone()),
            };
            Advisory::new(logger)
                .run("session cache write", self.session_cache.set(id, entry))
                .await;
        }

        output_blocks(&output, summary.as_ref())
    }

    /// Write the turns for a final answer and attach a continuation offer
    async fn record_exchange(
        &self,
        completion: &Completion<'_>,
        arguments: &Arguments,
        output: &mut ToolOutput,
        logger: &Arc<dyn Logger>,
    ) -> Option<String> {
        let advisory = Advisory::new(logger);
        let thread_id = match completion.continuation_id {
            Some(id) => id.to_string(),
            None => advisory
                .run(
                    "thread creation",
                    self.recorder.start_thread(
                        completion.tool_name,
                        completion.caller_arguments,
                        completion.options.session_fingerprint.as_deref(),
                    ),
                )
                .await?
                .to_string(),
        };

        let turn = ConversationTurn::assistant(output.content.clone().unwrap_or_default())
            .with_files(arguments.files())
            .with_tool(completion.tool_name)
            .with_model(completion.resolved.provider.clone(), completion.resolved.name.clone());
        let outcome = advisory
            .run("assistant turn", self.recorder.record_assistant(&thread_id, turn))
            .await;

        if let Some(outcome) = outcome {
            if !outcome.recorded {
                logger.warn(&format!(
                    "[Orchestrator] Thread {} is closed to new turns; no continuation offered",
                    thread_id
                ));
            }
            output.continuation_offer = self.recorder.continuation_offer(&thread_id, outcome);
            if output.continuation_offer.is_some() && output.status == status::SUCCESS {
                output.status = status::CONTINUATION_AVAILABLE.to_string();
            }
        }
        Some(thread_id)
    }

    fn expert_validation(&self, output: &ToolOutput) -> ExpertValidation {
        if !self.config.features.expert_validation {
            ExpertValidation::Disabled
        } else if output.is_pause() {
            ExpertValidation::Pending
        } else {
            ExpertValidation::Complete
        }
    }

    async fn invoke(
        &self,
        tool: &dyn Tool,
        arguments: &Arguments,
        cancel: &CancellationToken,
        deadline: Instant,
        logger: &Arc<dyn Logger>,
    ) -> Result<ToolOutput, Stop> {
        let monitor = self.monitor.with_logger(logger.clone());
        invoke_with(&monitor, tool, arguments, cancel, deadline).await
    }

    fn record_telemetry(&self, call: &CallRecord, outcome: CallOutcome) {
        if !self.config.features.telemetry_mirroring {
            return;
        }
        self.telemetry.record(TelemetryRecord {
            correlation_id: call.correlation_id.clone(),
            tool_name: call.tool_name.clone(),
            model: call.model.clone(),
            outcome,
            duration: call.started.elapsed(),
        });
    }
}

/// One supervised invocation within what is left of the call budget
async fn invoke_with(
    monitor: &ExecutionMonitor,
    tool: &dyn Tool,
    arguments: &Arguments,
    cancel: &CancellationToken,
    deadline: Instant,
) -> Result<ToolOutput, Stop> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    match monitor.invoke_tool(tool, arguments, cancel, remaining).await {
        Err(MonitorError::Cancelled { .. }) => Err(Stop::Cancelled),
        Ok(Invocation::Output { output, .. }) => Ok(output),
        Ok(Invocation::Failed {
            error: ToolError::Cancelled,
            ..
        }) if cancel.is_cancelled() => Err(Stop::Cancelled),
        Ok(Invocation::Failed { error, .. }) => Err(CallError::from(error).into()),
        Ok(Invocation::TimedOut { elapsed }) => Err(CallError::timeout(elapsed).into()),
    }
}

/// Caller arguments with any reserved keys removed
fn strip_reserved(raw: Value, logger: &Arc<dyn Logger>) -> Result<Arguments, Stop> {
    let mut arguments = Arguments::from_value(raw)
        .ok_or_else(|| CallError::InvalidRequest("Tool arguments must be a JSON object".to_string()))?;
    let reserved: Vec<String> = arguments.keys().filter(|k| is_reserved(k)).cloned().collect();
    for key in &reserved {
        arguments.remove(key);
    }
    if !reserved.is_empty() {
        logger.debug(&format!(
            "[Orchestrator] Ignored caller-supplied reserved keys: {}",
            reserved.join(", ")
        ));
    }
    Ok(arguments)
}

fn has_model_list(arguments: &Arguments) -> bool {
    arguments
        .get(keys::MODELS)
        .and_then(Value::as_array)
        .map_or(false, |models| !models.is_empty())
}

fn attach_model(arguments: &mut Arguments, context: &ModelContext, allocation: &TokenAllocation) -> Result<(), Stop> {
    let attach = |arguments: &mut Arguments| -> Result<(), serde_json::Error> {
        arguments.set_reserved(keys::MODEL_CONTEXT, context)?;
        arguments.set_reserved(keys::TOKEN_ALLOCATION, allocation)?;
        arguments.set(keys::RESOLVED_MODEL_NAME, context.model_name.clone());
        Ok(())
    };
    attach(arguments).map_err(|e| Stop::Error(CallError::ExecutionError(format!("Failed to attach model context: {}", e))))
}
