//! Consensus model auto-selection

use crate::config::ConsensusConfig;
use crate::providers::{AvailableModel, ModelProviderRegistry};
use crate::types::ModelTier;

/// Models picked for a consensus call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsensusSelection {
    pub models: Vec<String>,
    /// Set when fewer than the minimum could be found
    pub caveat: Option<String>,
}

impl ConsensusSelection {
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// Pick models for consensus when the caller named none
///
/// Quality-tier models come first (capped), then speed-tier ones, both up
/// to the maximum. Any other available model only tops the list up to the
/// minimum. Order within each pass follows provider priority.
pub fn select_consensus_models(
    registry: &dyn ModelProviderRegistry,
    config: &ConsensusConfig,
) -> ConsensusSelection {
    let available = registry.get_available_models(true);
    let mut picked: Vec<String> = Vec::new();

    let quality_cap = config.max_quality_models.min(config.max_models);
    pick(&mut picked, &available, quality_cap, is_quality);
    pick(&mut picked, &available, config.max_models, |m| m.capabilities.tier == ModelTier::Speed);
    pick(&mut picked, &available, config.min_models.min(config.max_models), |_| true);

    let caveat = match picked.len() {
        0 => None,
        n if n < config.min_models => Some(format!(
            "Only {} model available; cross-model comparison is not possible and the result reflects a single perspective",
            n
        )),
        _ => None,
    };

    ConsensusSelection {
        models: picked,
        caveat,
    }
}

fn is_quality(model: &AvailableModel) -> bool {
    matches!(model.capabilities.tier, ModelTier::Quality | ModelTier::Thinking)
}

fn pick<F>(picked: &mut Vec<String>, available: &[AvailableModel], limit: usize, accept: F)
where
    F: Fn(&AvailableModel) -> bool,
{
    for model in available {
        if picked.len() >= limit {
            return;
        }
        if accept(model) && !picked.contains(&model.name) {
            picked.push(model.name.clone());
        }
    }
}
