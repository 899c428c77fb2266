//! Server settings
//!
//! Built once at startup and shared as `Arc<ServerConfig>`. Nothing in the
//! request pipeline reads the environment or a file after that point.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::{ConfigError, ConfigResult};
use crate::types::ProviderConfig;

/// Execution supervision settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Whole-call wall clock budget
    pub timeout_secs: f64,
    /// How often the heartbeat wakes up
    pub heartbeat_interval_secs: f64,
    /// Heartbeat escalates to warnings after this long
    pub warn_after_secs: f64,
    /// Heartbeat escalates to errors after this long
    pub error_after_secs: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 600.0,
            heartbeat_interval_secs: 10.0,
            warn_after_secs: 60.0,
            error_after_secs: 240.0,
        }
    }
}

impl MonitorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs_f64(self.heartbeat_interval_secs)
    }

    pub fn warn_after(&self) -> Duration {
        Duration::from_secs_f64(self.warn_after_secs)
    }

    pub fn error_after(&self) -> Duration {
        Duration::from_secs_f64(self.error_after_secs)
    }
}

/// How prior turns reach the tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryMode {
    /// History is rendered into the prompt text and charged to the budget
    Embedded,
    /// History is passed as a message array alongside the prompt
    Messages,
}

impl Default for HistoryMode {
    fn default() -> Self {
        HistoryMode::Embedded
    }
}

/// Conversation threading settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    pub max_turns: u32,
    pub thread_ttl_secs: u64,
    pub history_mode: HistoryMode,
    pub enforce_session_scoping: bool,
    pub allow_cross_session: bool,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_turns: 20,
            thread_ttl_secs: 3 * 60 * 60,
            history_mode: HistoryMode::Embedded,
            enforce_session_scoping: false,
            allow_cross_session: false,
        }
    }
}

/// Consensus auto-selection limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    pub min_models: usize,
    pub max_models: usize,
    /// Cap on how many quality-tier models are picked before speed-tier ones
    pub max_quality_models: usize,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            min_models: 2,
            max_models: 3,
            max_quality_models: 2,
        }
    }
}

/// Model routing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Low-cost model used when nothing more specific applies
    pub default_model: String,
    pub fast_model: Option<String>,
    pub quality_model: Option<String>,
    pub thinking_model: Option<String>,
    /// Exact tool name to model
    pub tool_overrides: BTreeMap<String, String>,
    pub consensus: ConsensusConfig,
    /// Provider names, most preferred first
    pub provider_priority: Vec<String>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            default_model: "gemini-2.5-flash".to_string(),
            fast_model: None,
            quality_model: None,
            thinking_model: None,
            tool_overrides: BTreeMap::new(),
            consensus: ConsensusConfig::default(),
            provider_priority: vec![],
        }
    }
}

impl RoutingConfig {
    pub fn fast_model(&self) -> &str {
        self.fast_model.as_deref().unwrap_or(&self.default_model)
    }

    pub fn quality_model(&self) -> &str {
        self.quality_model.as_deref().unwrap_or(&self.default_model)
    }

    pub fn thinking_model(&self) -> &str {
        self.thinking_model
            .as_deref()
            .unwrap_or_else(|| self.quality_model())
    }
}

/// Feature toggles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    pub fuzzy_tool_matching: bool,
    pub auto_continue: bool,
    pub auto_continue_max_steps: u32,
    /// Lower step caps for particular caller classes
    pub caller_class_step_caps: BTreeMap<String, u32>,
    pub strict_file_size: bool,
    pub telemetry_mirroring: bool,
    pub attach_summary: bool,
    pub expert_validation: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            fuzzy_tool_matching: true,
            auto_continue: false,
            auto_continue_max_steps: 5,
            caller_class_step_caps: BTreeMap::new(),
            strict_file_size: false,
            telemetry_mirroring: false,
            attach_summary: true,
            expert_validation: true,
        }
    }
}

/// Which files the files-required loop may hand to a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileAccessConfig {
    pub allowed_roots: Vec<PathBuf>,
    pub max_glob_matches: usize,
    pub max_file_rounds: u32,
}

impl Default for FileAccessConfig {
    fn default() -> Self {
        Self {
            allowed_roots: vec![],
            max_glob_matches: 50,
            max_file_rounds: 3,
        }
    }
}

/// Complete server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub monitor: MonitorConfig,
    pub conversation: ConversationConfig,
    pub routing: RoutingConfig,
    pub features: FeatureFlags,
    pub files: FileAccessConfig,
    /// Extra alias -> canonical tool name pairs
    pub aliases: BTreeMap<String, String>,
    pub providers: Vec<ProviderConfig>,
    pub session_cache_ttl_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            monitor: MonitorConfig::default(),
            conversation: ConversationConfig::default(),
            routing: RoutingConfig::default(),
            features: FeatureFlags::default(),
            files: FileAccessConfig::default(),
            aliases: BTreeMap::new(),
            providers: vec![],
            session_cache_ttl_secs: 60 * 60,
        }
    }
}

impl ServerConfig {
    /// Reject settings the pipeline cannot honour
    pub fn validate(&self) -> ConfigResult<()> {
        let m = &self.monitor;
        let durations = [
            ("monitor.timeout_secs", m.timeout_secs, false),
            ("monitor.heartbeat_interval_secs", m.heartbeat_interval_secs, false),
            ("monitor.warn_after_secs", m.warn_after_secs, true),
            ("monitor.error_after_secs", m.error_after_secs, true),
        ];
        for (name, secs, zero_ok) in durations {
            let in_range = if zero_ok { secs >= 0.0 } else { secs > 0.0 };
            if !secs.is_finite() || !in_range {
                return Err(ConfigError::Invalid(format!(
                    "{} must be a finite {} number of seconds, got {}",
                    name,
                    if zero_ok { "non-negative" } else { "positive" },
                    secs
                )));
            }
        }
        if m.warn_after_secs > m.error_after_secs {
            return Err(ConfigError::Invalid(format!(
                "monitor.warn_after_secs ({}) exceeds monitor.error_after_secs ({})",
                m.warn_after_secs, m.error_after_secs
            )));
        }
        let c = &self.routing.consensus;
        if c.min_models > c.max_models {
            return Err(ConfigError::Invalid(format!(
                "consensus.min_models ({}) exceeds consensus.max_models ({})",
                c.min_models, c.max_models
            )));
        }
        if self.conversation.max_turns == 0 {
            return Err(ConfigError::Invalid("conversation.max_turns must be at least 1".into()));
        }
        if self.routing.default_model.trim().is_empty()
            || crate::types::is_auto(Some(&self.routing.default_model))
        {
            return Err(ConfigError::Invalid(
                "routing.default_model must name a concrete model".into(),
            ));
        }
        Ok(())
    }

    /// Step cap for auto-continue, lowered for a known caller class
    pub fn auto_continue_cap(&self, caller_class: Option<&str>) -> u32 {
        let base = self.features.auto_continue_max_steps;
        caller_class
            .and_then(|c| self.features.caller_class_step_caps.get(c))
            .map(|cap| (*cap).min(base))
            .unwrap_or(base)
    }

    /// Apply `PARLEY_*` overrides using `lookup` for variable values
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup("PARLEY_DEFAULT_MODEL") {
            self.routing.default_model = model;
        }
        if let Some(secs) = lookup("PARLEY_TIMEOUT_SECS") {
            self.monitor.timeout_secs = parse_env("PARLEY_TIMEOUT_SECS", &secs)?;
        }
        if let Some(turns) = lookup("PARLEY_MAX_TURNS") {
            self.conversation.max_turns = parse_env("PARLEY_MAX_TURNS", &turns)?;
        }
        if let Some(flag) = lookup("PARLEY_AUTO_CONTINUE") {
            self.features.auto_continue = parse_flag("PARLEY_AUTO_CONTINUE", &flag)?;
        }
        if let Some(flag) = lookup("PARLEY_STRICT_FILE_SIZE") {
            self.features.strict_file_size = parse_flag("PARLEY_STRICT_FILE_SIZE", &flag)?;
        }
        if let Some(flag) = lookup("PARLEY_TELEMETRY") {
            self.features.telemetry_mirroring = parse_flag("PARLEY_TELEMETRY", &flag)?;
        }
        if let Some(flag) = lookup("PARLEY_ENFORCE_SESSION_SCOPING") {
            self.conversation.enforce_session_scoping =
                parse_flag("PARLEY_ENFORCE_SESSION_SCOPING", &flag)?;
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, raw: &str) -> ConfigResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{} has an invalid value: {}", name, raw)))
}

fn parse_flag(name: &str, raw: &str) -> ConfigResult<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid(format!("{} must be a boolean, got {}", name, raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_are_valid() {
        let config = ServerConfig::default();
        config.validate().unwrap();
        assert_eq!(config.conversation.max_turns, 20);
        assert_eq!(config.conversation.thread_ttl_secs, 10_800);
        assert!(!config.features.auto_continue);
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let mut config = ServerConfig::default();
        config.monitor.warn_after_secs = 300.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_durations_that_cannot_become_a_duration() {
        for (field, value) in [
            ("warn", -1.0),
            ("error", f64::NAN),
            ("timeout", f64::INFINITY),
            ("heartbeat", 0.0),
        ] {
            let mut config = ServerConfig::default();
            match field {
                "warn" => config.monitor.warn_after_secs = value,
                "error" => config.monitor.error_after_secs = value,
                "timeout" => config.monitor.timeout_secs = value,
                _ => config.monitor.heartbeat_interval_secs = value,
            }
            assert!(
                matches!(config.validate(), Err(ConfigError::Invalid(_))),
                "{} = {} should be rejected",
                field,
                value
            );
        }

        let mut config = ServerConfig::default();
        config.monitor.warn_after_secs = 0.0;
        config.validate().unwrap();
    }

    #[test]
    fn rejects_auto_default_model() {
        let mut config = ServerConfig::default();
        config.routing.default_model = "auto".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_overrides_apply_once() {
        let env: HashMap<&str, &str> = [
            ("PARLEY_DEFAULT_MODEL", "o4-mini"),
            ("PARLEY_TIMEOUT_SECS", "42.5"),
            ("PARLEY_AUTO_CONTINUE", "true"),
        ]
        .into_iter()
        .collect();

        let mut config = ServerConfig::default();
        config
            .apply_env_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.routing.default_model, "o4-mini");
        assert_eq!(config.monitor.timeout_secs, 42.5);
        assert!(config.features.auto_continue);
    }

    #[test]
    fn bad_env_value_is_an_error() {
        let mut config = ServerConfig::default();
        let result = config.apply_env_overrides(|k| {
            (k == "PARLEY_MAX_TURNS").then(|| "many".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn caller_class_lowers_cap() {
        let mut config = ServerConfig::default();
        config.features.caller_class_step_caps.insert("ide".into(), 2);
        config.features.caller_class_step_caps.insert("batch".into(), 99);
        assert_eq!(config.auto_continue_cap(Some("ide")), 2);
        assert_eq!(config.auto_continue_cap(Some("batch")), 5);
        assert_eq!(config.auto_continue_cap(None), 5);
    }

    #[test]
    fn tier_models_fall_back() {
        let mut routing = RoutingConfig::default();
        assert_eq!(routing.thinking_model(), "gemini-2.5-flash");
        routing.quality_model = Some("gemini-2.5-pro".into());
        assert_eq!(routing.thinking_model(), "gemini-2.5-pro");
        routing.thinking_model = Some("o3".into());
        assert_eq!(routing.thinking_model(), "o3");
    }
}
