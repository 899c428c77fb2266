//! Config-driven provider registry

use std::collections::HashMap;

use crate::config::ServerConfig;
use crate::types::{ModelCapabilities, ModelCategory, ModelTier, ProviderConfig};

use super::traits::{AvailableModel, ModelProviderRegistry};

/// Registry built from the configured providers
///
/// Providers named in the priority list come first, in that order; the rest
/// keep their configured order. Disabled providers serve nothing.
#[derive(Debug, Clone, Default)]
pub struct StaticProviderRegistry {
    providers: Vec<ProviderConfig>,
}

impl StaticProviderRegistry {
    pub fn new(providers: Vec<ProviderConfig>, priority: &[String]) -> Self {
        let rank: HashMap<String, usize> = priority
            .iter()
            .enumerate()
            .map(|(i, name)| (name.to_lowercase(), i))
            .collect();

        let mut ordered: Vec<(usize, ProviderConfig)> = providers.into_iter().enumerate().collect();
        ordered.sort_by_key(|(index, p)| {
            rank.get(&p.name.to_lowercase())
                .map(|r| (0, *r))
                .unwrap_or((1, *index))
        });

        Self {
            providers: ordered.into_iter().map(|(_, p)| p).collect(),
        }
    }

    /// Configured providers ordered by `routing.provider_priority`
    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.providers.clone(), &config.routing.provider_priority)
    }

    /// Provider names in priority order
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name.as_str()).collect()
    }

    fn find(&self, model: &str) -> Option<(&ProviderConfig, &ModelCapabilities, &str)> {
        let wanted = model.trim();
        self.providers
            .iter()
            .filter(|p| p.enabled)
            .find_map(|p| {
                p.models
                    .iter()
                    .find(|m| m.name.eq_ignore_ascii_case(wanted))
                    .map(|m| (p, &m.capabilities, m.name.as_str()))
            })
    }
}

impl ModelProviderRegistry for StaticProviderRegistry {
    fn get_available_models(&self, respect_restrictions: bool) -> Vec<AvailableModel> {
        self.providers
            .iter()
            .filter(|p| p.enabled)
            .flat_map(|p| {
                p.models
                    .iter()
                    .filter(move |m| !respect_restrictions || p.allows(&m.name))
                    .map(move |m| AvailableModel {
                        name: m.name.clone(),
                        provider: p.name.clone(),
                        capabilities: m.capabilities.clone(),
                    })
            })
            .collect()
    }

    fn get_provider_for_model(&self, model: &str) -> Option<String> {
        self.find(model)
            .filter(|(p, _, name)| p.allows(name))
            .map(|(p, _, _)| p.name.clone())
    }

    fn get_model_capabilities(&self, model: &str) -> Option<ModelCapabilities> {
        self.find(model).map(|(_, caps, _)| caps.clone())
    }

    fn get_preferred_fallback_model(&self, category: ModelCategory) -> Option<String> {
        let available = self.get_available_models(true);
        ModelTier::preferred_for(category)
            .iter()
            .find_map(|tier| available.iter().find(|m| m.capabilities.tier == *tier))
            .or_else(|| available.first())
            .map(|m| m.name.clone())
    }
}
