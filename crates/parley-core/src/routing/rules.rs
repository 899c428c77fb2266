//! Ordered routing rules
//!
//! Each rule either names a model or passes. The router walks the list
//! top-down and stops at the first rule that names one.

use crate::config::RoutingConfig;
use crate::types::{is_auto, keys, Arguments, ModelCategory};

/// Thinking-mode values that ask for the deepest available model
const DEEP_THINKING_MODES: &[&str] = &["max", "high", "deep"];

/// Everything a rule may look at
#[derive(Debug, Clone, Copy)]
pub struct RouteRequest<'a> {
    pub tool_name: &'a str,
    pub requested_model: Option<&'a str>,
    pub arguments: &'a Arguments,
    pub category: ModelCategory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingRule {
    /// A concrete model the caller named (or a locked one)
    ExplicitModel,
    /// `routing.tool_overrides`, exact tool name
    ToolOverride,
    /// First of several workflow steps
    FirstStep,
    /// Caller asked for deep thinking on this step
    DeepThinking,
    /// Last workflow step
    FinalStep,
    /// Tool category when nothing else applied
    Category,
    /// Configured low-cost default
    Default,
}

impl RoutingRule {
    /// The standard rule order
    pub fn standard() -> Vec<RoutingRule> {
        vec![
            RoutingRule::ExplicitModel,
            RoutingRule::ToolOverride,
            RoutingRule::FirstStep,
            RoutingRule::DeepThinking,
            RoutingRule::FinalStep,
            RoutingRule::Category,
            RoutingRule::Default,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            RoutingRule::ExplicitModel => "explicit_model",
            RoutingRule::ToolOverride => "tool_override",
            RoutingRule::FirstStep => "first_step",
            RoutingRule::DeepThinking => "deep_thinking",
            RoutingRule::FinalStep => "final_step",
            RoutingRule::Category => "category",
            RoutingRule::Default => "default",
        }
    }

    /// Model this rule picks for `request`, if it applies
    pub fn evaluate(&self, request: &RouteRequest<'_>, config: &RoutingConfig) -> Option<String> {
        match self {
            RoutingRule::ExplicitModel => request
                .requested_model
                .filter(|m| !is_auto(Some(m)))
                .map(|m| m.trim().to_string()),
            RoutingRule::ToolOverride => config.tool_overrides.get(request.tool_name).cloned(),
            // reasoning tools never drop to the fast tier
            RoutingRule::FirstStep if request.category == ModelCategory::ExtendedReasoning => None,
            RoutingRule::FirstStep => {
                let step = StepInfo::from_arguments(request.arguments)?;
                (step.number == 1 && step.total.map_or(false, |t| t > 1))
                    .then(|| config.fast_model().to_string())
            }
            RoutingRule::DeepThinking => request
                .arguments
                .get_str(keys::THINKING_MODE)
                .filter(|mode| DEEP_THINKING_MODES.contains(&mode.trim().to_lowercase().as_str()))
                .map(|_| config.thinking_model().to_string()),
            RoutingRule::FinalStep => {
                let step = StepInfo::from_arguments(request.arguments)?;
                let model = match request.category {
                    ModelCategory::ExtendedReasoning => config.thinking_model(),
                    _ => config.quality_model(),
                };
                step.is_final().then(|| model.to_string())
            }
            RoutingRule::Category => match request.category {
                ModelCategory::ExtendedReasoning => Some(config.thinking_model().to_string()),
                ModelCategory::FastResponse => Some(config.fast_model().to_string()),
                ModelCategory::Balanced => None,
            },
            RoutingRule::Default => Some(config.default_model.clone()),
        }
    }
}

/// Workflow step fields, when the tool is multi-step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StepInfo {
    number: u64,
    total: Option<u64>,
    next_required: Option<bool>,
}

impl StepInfo {
    fn from_arguments(arguments: &Arguments) -> Option<Self> {
        Some(Self {
            number: arguments.get_u64(keys::STEP_NUMBER)?,
            total: arguments.get_u64(keys::TOTAL_STEPS),
            next_required: arguments.get_bool(keys::NEXT_STEP_REQUIRED),
        })
    }

    fn is_final(&self) -> bool {
        if self.next_required == Some(false) {
            return true;
        }
        matches!(self.total, Some(total) if total > 1 && self.number >= total)
    }
}
