//! Tool registry
//!
//! The ToolRegistry is the central component for:
//! - Holding every tool the server can call
//! - Resolving aliases to canonical names
//! - Suggesting the closest tool for a mistyped name

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::aliases::AliasTable;
use super::fuzzy::{closest_match, SUGGESTION_THRESHOLD};
use super::traits::Tool;
use crate::config::ServerConfig;
use crate::logging::Logger;
use crate::types::ToolDefinition;

/// Closest known tool for an unknown name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSuggestion {
    pub name: String,
    pub description: String,
    pub similarity: f64,
}

/// Registry of callable tools keyed by canonical name
pub struct ToolRegistry {
    tools: RwLock<BTreeMap<String, Arc<dyn Tool>>>,
    aliases: AliasTable,
    logger: Arc<dyn Logger>,
}

impl ToolRegistry {
    /// Create a registry using the built-in aliases
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self::with_aliases(AliasTable::builtin(), logger)
    }

    /// Built-in aliases plus the configured ones
    pub fn from_config(config: &ServerConfig, logger: Arc<dyn Logger>) -> Self {
        Self::with_aliases(AliasTable::new(&config.aliases), logger)
    }

    pub fn with_aliases(aliases: AliasTable, logger: Arc<dyn Logger>) -> Self {
        Self {
            tools: RwLock::new(BTreeMap::new()),
            aliases,
            logger,
        }
    }

    /// Register a tool, replacing any tool with the same name
    pub fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.name().trim().to_lowercase();
        if self.tools.write().insert(name.clone(), tool).is_some() {
            self.logger.warn(&format!("[ToolRegistry] Replaced tool: {}", name));
        } else {
            self.logger.debug(&format!("[ToolRegistry] Registered tool: {}", name));
        }
    }

    /// Every registered tool by canonical name
    pub fn list_tools(&self) -> BTreeMap<String, Arc<dyn Tool>> {
        self.tools.read().clone()
    }

    /// Definitions to advertise to clients
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.read().values().map(|t| t.definition()).collect()
    }

    /// Canonical name for `name`; unknown names are returned normalized
    pub fn resolve_name(&self, name: &str) -> String {
        self.aliases.resolve(name)
    }

    /// Look up a tool by canonical name
    pub fn get(&self, canonical: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().get(canonical).cloned()
    }

    /// Resolve aliases, then look up
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.get(&self.resolve_name(name))
    }

    /// Closest registered tool to an unknown name
    pub fn suggest(&self, name: &str) -> Option<ToolSuggestion> {
        let tools = self.tools.read();
        let (best, similarity) = closest_match(name, tools.keys().map(String::as_str), SUGGESTION_THRESHOLD)?;
        let tool = tools.get(best)?;
        Some(ToolSuggestion {
            name: best.to_string(),
            description: tool.description().to_string(),
            similarity,
        })
    }

    pub fn tool_count(&self) -> usize {
        self.tools.read().len()
    }
}
