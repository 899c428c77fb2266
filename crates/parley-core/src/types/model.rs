//! Model and provider descriptor types

use serde::{Deserialize, Serialize};

/// Sentinel asking the router to pick a concrete model
pub const AUTO_MODEL: &str = "auto";

/// Whether a model name is the auto sentinel (or absent)
pub fn is_auto(model: Option<&str>) -> bool {
    match model {
        None => true,
        Some(name) => {
            let trimmed = name.trim();
            trimmed.is_empty() || trimmed.eq_ignore_ascii_case(AUTO_MODEL)
        }
    }
}

/// What kind of model a tool wants when none was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelCategory {
    FastResponse,
    Balanced,
    ExtendedReasoning,
}

impl Default for ModelCategory {
    fn default() -> Self {
        ModelCategory::Balanced
    }
}

impl std::fmt::Display for ModelCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelCategory::FastResponse => write!(f, "fast_response"),
            ModelCategory::Balanced => write!(f, "balanced"),
            ModelCategory::ExtendedReasoning => write!(f, "extended_reasoning"),
        }
    }
}

/// Cost/quality tier of a concrete model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    Speed,
    Balanced,
    Quality,
    Thinking,
}

impl Default for ModelTier {
    fn default() -> Self {
        ModelTier::Balanced
    }
}

impl ModelTier {
    /// Tiers acceptable as a fallback for a category, best first
    pub fn preferred_for(category: ModelCategory) -> &'static [ModelTier] {
        match category {
            ModelCategory::FastResponse => &[ModelTier::Speed, ModelTier::Balanced, ModelTier::Quality],
            ModelCategory::Balanced => &[ModelTier::Balanced, ModelTier::Speed, ModelTier::Quality],
            ModelCategory::ExtendedReasoning => &[ModelTier::Thinking, ModelTier::Quality, ModelTier::Balanced],
        }
    }
}

/// Static capabilities of a model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCapabilities {
    /// Maximum context length in tokens
    pub context_window: u64,
    /// Maximum tokens the model may generate
    pub max_output_tokens: u64,
    #[serde(default)]
    pub tier: ModelTier,
    #[serde(default)]
    pub supports_thinking: bool,
}

impl Default for ModelCapabilities {
    fn default() -> Self {
        Self {
            context_window: 128_000,
            max_output_tokens: 16_384,
            tier: ModelTier::Balanced,
            supports_thinking: false,
        }
    }
}

/// A model exposed by a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Model identifier as used by the provider's API
    pub name: String,
    #[serde(flatten)]
    pub capabilities: ModelCapabilities,
}

impl ModelSpec {
    pub fn new(name: impl Into<String>, capabilities: ModelCapabilities) -> Self {
        Self {
            name: name.into(),
            capabilities,
        }
    }
}

/// Provider configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider name (e.g., 'openai', 'gemini', 'openrouter')
    pub name: String,
    /// Whether this provider is enabled (default: true)
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Models this provider serves
    #[serde(default)]
    pub models: Vec<ModelSpec>,
    /// If set, only these models are offered when restrictions are respected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_models: Option<Vec<String>>,
}

fn default_enabled() -> bool {
    true
}

impl ProviderConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            models: vec![],
            allowed_models: None,
        }
    }

    pub fn with_model(mut self, model: ModelSpec) -> Self {
        self.models.push(model);
        self
    }

    pub fn with_allowed_models(mut self, allowed: Vec<String>) -> Self {
        self.allowed_models = Some(allowed);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Whether `model` passes this provider's restriction list
    pub fn allows(&self, model: &str) -> bool {
        match &self.allowed_models {
            Some(allowed) => allowed.iter().any(|m| m.eq_ignore_ascii_case(model)),
            None => true,
        }
    }
}

/// Per-call model context, rebuilt on every call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelContext {
    pub model_name: String,
    pub provider: String,
    pub context_window: u64,
    pub max_output_tokens: u64,
}

impl ModelContext {
    pub fn new(
        model_name: impl Into<String>,
        provider: impl Into<String>,
        capabilities: &ModelCapabilities,
    ) -> Self {
        Self {
            model_name: model_name.into(),
            provider: provider.into(),
            context_window: capabilities.context_window,
            max_output_tokens: capabilities.max_output_tokens,
        }
    }
}
