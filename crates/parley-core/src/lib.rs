//! Parley Core
//!
//! Request orchestration for an MCP tool server that fronts several model
//! providers. A tool call arrives by name with JSON arguments and comes back
//! as content blocks; in between the crate resolves aliases, rebuilds
//! conversation context from a thread store, picks a model, budgets tokens,
//! supervises execution with heartbeats and a hard timeout, and drives the
//! files-required and auto-continue loops.
//!
//! ## Handling a call
//!
//! ```rust,ignore
//! use parley_core::{Orchestrator, ServerConfig, ToolRegistry};
//!
//! let config = Arc::new(ServerConfig::load(Some(&workspace))?);
//! let tools = Arc::new(ToolRegistry::from_config(&config, logger.clone()));
//! tools.register(Arc::new(MyChatTool::new()));
//!
//! // in-memory stores; use `Orchestrator::new` to plug in others
//! let orchestrator = Orchestrator::from_config(config, tools, logger)?;
//! let blocks = orchestrator.handle_call_tool("chat", json!({"prompt": "hi"})).await?;
//! ```

pub mod types;
pub mod logging;
pub mod config;
pub mod storage;
pub mod budget;
pub mod providers;
pub mod tools;
pub mod routing;
pub mod monitor;
pub mod conversation;
pub mod postprocess;
pub mod orchestrator;

// Re-export commonly used types
pub use types::{
    Arguments, CancellationToken, ContinuationOffer, ConversationTurn, ModelCapabilities,
    ModelCategory, ModelContext, ModelSpec, ModelTier, NextCall, ProviderConfig, ThreadContext,
    ToolDefinition, ToolOutput,
};

pub use logging::{ConsoleLogger, Logger, MemoryLogger, NoOpLogger, ScopedLogger};

pub use config::{ConfigLoader, ServerConfig};

pub use storage::{MemorySessionCache, MemoryThreadStore, SessionCache, ThreadStore};

pub use providers::{ModelProviderRegistry, StaticProviderRegistry};

pub use tools::{AliasTable, Tool, ToolError, ToolRegistry};

pub use monitor::{ExecutionMonitor, TelemetrySink};

pub use orchestrator::{CallCancelled, CallError, CallOptions, Orchestrator};
