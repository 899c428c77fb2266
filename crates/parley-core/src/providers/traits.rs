//! Model provider registry trait

use crate::types::{ModelCapabilities, ModelCategory};

/// A model that can currently be served, with the provider backing it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailableModel {
    pub name: String,
    pub provider: String,
    pub capabilities: ModelCapabilities,
}

/// Lookup of which provider serves which model
///
/// The pipeline never talks to a provider directly; it only asks this
/// registry whether a model is backed, what it can do, and what to use
/// instead when it is not.
pub trait ModelProviderRegistry: Send + Sync {
    /// Every servable model, ordered by provider priority
    fn get_available_models(&self, respect_restrictions: bool) -> Vec<AvailableModel>;

    /// Name of the provider serving `model`, if any
    fn get_provider_for_model(&self, model: &str) -> Option<String>;

    /// Capabilities of `model`, if it is known
    fn get_model_capabilities(&self, model: &str) -> Option<ModelCapabilities>;

    /// Best available substitute for a tool of the given category
    fn get_preferred_fallback_model(&self, category: ModelCategory) -> Option<String>;
}
