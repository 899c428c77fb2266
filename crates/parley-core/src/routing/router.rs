//! Model router

use std::sync::Arc;

use super::error::{RoutingError, RoutingResult};
use super::rules::{RouteRequest, RoutingRule};
use crate::config::RoutingConfig;
use crate::logging::Logger;
use crate::providers::ModelProviderRegistry;
use crate::types::{is_auto, ModelCapabilities, ModelCategory};

/// Which rule produced a routing decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDecision {
    pub model: String,
    pub rule: RoutingRule,
}

/// A concrete model with a provider behind it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModel {
    pub name: String,
    pub provider: String,
    pub capabilities: ModelCapabilities,
    /// Set when the requested model was unavailable and this one replaced it
    pub substituted_for: Option<String>,
}

/// Maps a call to a concrete model name
///
/// Rules are evaluated in order, first match wins. Routing is pure; the
/// provider registry is only consulted by `ensure_available`.
#[derive(Debug, Clone)]
pub struct ModelRouter {
    rules: Vec<RoutingRule>,
    config: RoutingConfig,
}

impl ModelRouter {
    pub fn new(config: RoutingConfig) -> Self {
        Self {
            rules: RoutingRule::standard(),
            config,
        }
    }

    /// Replace the rule list
    pub fn with_rules(mut self, rules: Vec<RoutingRule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn rules(&self) -> &[RoutingRule] {
        &self.rules
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    /// Pick a model; never returns the auto sentinel
    pub fn route(&self, request: &RouteRequest<'_>) -> RouteDecision {
        let decision = self
            .rules
            .iter()
            .find_map(|rule| {
                rule.evaluate(request, &self.config).map(|model| RouteDecision {
                    model,
                    rule: *rule,
                })
            })
            .unwrap_or_else(|| RouteDecision {
                model: self.config.default_model.clone(),
                rule: RoutingRule::Default,
            });

        RouteDecision {
            model: self.ensure_concrete(&decision.model),
            rule: decision.rule,
        }
    }

    /// Replace a literal `auto` (or empty) name with the process default
    pub fn ensure_concrete(&self, model: &str) -> String {
        if is_auto(Some(model)) {
            self.config.default_model.clone()
        } else {
            model.to_string()
        }
    }

    /// Confirm a provider backs `model`, substituting one fallback if not
    pub fn ensure_available(
        &self,
        model: &str,
        category: ModelCategory,
        registry: &dyn ModelProviderRegistry,
        logger: &Arc<dyn Logger>,
    ) -> RoutingResult<ResolvedModel> {
        if let Some(resolved) = backed(model, registry) {
            return Ok(resolved);
        }

        let fallback = registry
            .get_preferred_fallback_model(category)
            .and_then(|name| backed(&name, registry));

        match fallback {
            Some(mut resolved) => {
                logger.warn(&format!(
                    "[Router] Model '{}' unavailable, falling back to '{}' ({})",
                    model, resolved.name, category
                ));
                resolved.substituted_for = Some(model.to_string());
                Ok(resolved)
            }
            None => {
                let available = registry
                    .get_available_models(true)
                    .into_iter()
                    .map(|m| m.name)
                    .collect();
                Err(RoutingError::ModelUnavailable {
                    model: model.to_string(),
                    available,
                })
            }
        }
    }
}

fn backed(model: &str, registry: &dyn ModelProviderRegistry) -> Option<ResolvedModel> {
    let provider = registry.get_provider_for_model(model)?;
    let capabilities = registry.get_model_capabilities(model).unwrap_or_default();
    Some(ResolvedModel {
        name: model.to_string(),
        provider,
        capabilities,
        substituted_for: None,
    })
}
