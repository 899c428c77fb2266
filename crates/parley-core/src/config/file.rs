//! YAML configuration files
//!
//! Supports user-level (~/.config/parley/config.yaml) and workspace-level
//! (.config/parley/config.yaml) files. Workspace values override user values
//! key by key; anything neither file sets keeps its default.

use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::Value;

use super::error::{ConfigError, ConfigResult};
use super::settings::ServerConfig;

/// Config level (user or workspace)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLevel {
    User,
    Workspace,
}

impl ConfigLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigLevel::User => "user",
            ConfigLevel::Workspace => "workspace",
        }
    }
}

/// Loads `ServerConfig` from the layered YAML files
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    layers: Vec<(ConfigLevel, PathBuf)>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard layers: user config, then the workspace config if given
    pub fn standard(workspace_root: Option<&Path>) -> Self {
        let mut loader = Self::new().with_layer(ConfigLevel::User, user_config_path());
        if let Some(root) = workspace_root {
            loader = loader.with_layer(ConfigLevel::Workspace, workspace_config_path(root));
        }
        loader
    }

    /// Add a layer; later layers override earlier ones
    pub fn with_layer(mut self, level: ConfigLevel, path: impl Into<PathBuf>) -> Self {
        self.layers.push((level, path.into()));
        self
    }

    /// Merge every existing layer and deserialize the result
    pub fn load(&self) -> ConfigResult<ServerConfig> {
        let mut merged = Value::Mapping(Default::default());
        for (_, path) in &self.layers {
            if let Some(layer) = read_layer(path)? {
                merge_yaml(&mut merged, layer);
            }
        }

        let config: ServerConfig = serde_yaml::from_value(merged).map_err(|e| ConfigError::Parse {
            path: self.describe(),
            message: e.to_string(),
        })?;
        Ok(config)
    }

    /// Load, apply process environment overrides once, and validate
    pub fn load_with_env(&self) -> ConfigResult<ServerConfig> {
        let mut config = self.load()?;
        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn describe(&self) -> String {
        self.layers
            .iter()
            .map(|(level, path)| format!("{}:{}", level.as_str(), path.display()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl ServerConfig {
    /// Standard startup load: user file, workspace file, environment, validate
    pub fn load(workspace_root: Option<&Path>) -> ConfigResult<Self> {
        ConfigLoader::standard(workspace_root).load_with_env()
    }
}

/// ~/.config/parley/config.yaml (platform config dir)
pub fn user_config_path() -> PathBuf {
    let config_dir = dirs::config_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".config"));
    config_dir.join("parley").join("config.yaml")
}

/// <workspace>/.config/parley/config.yaml
pub fn workspace_config_path(workspace_root: impl AsRef<Path>) -> PathBuf {
    workspace_root
        .as_ref()
        .join(".config")
        .join("parley")
        .join("config.yaml")
}

fn read_layer(path: &Path) -> ConfigResult<Option<Value>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(None);
    }
    let value: Value = serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    Ok(Some(value))
}

/// Recursively overlay `overlay` onto `base`; mappings merge, everything else replaces
fn merge_yaml(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_yaml(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_files_yield_defaults() {
        let dir = tempdir().unwrap();
        let loader = ConfigLoader::new().with_layer(ConfigLevel::User, dir.path().join("nope.yaml"));
        assert_eq!(loader.load().unwrap(), ServerConfig::default());
    }

    #[test]
    fn workspace_overrides_user_per_key() {
        let dir = tempdir().unwrap();
        let user = dir.path().join("user.yaml");
        let workspace = workspace_config_path(dir.path());
        fs::create_dir_all(workspace.parent().unwrap()).unwrap();

        fs::write(
            &user,
            "routing:\n  default_model: gemini-2.5-flash\n  thinking_model: o3\nconversation:\n  max_turns: 10\n",
        )
        .unwrap();
        fs::write(&workspace, "routing:\n  default_model: o4-mini\n").unwrap();

        let config = ConfigLoader::new()
            .with_layer(ConfigLevel::User, &user)
            .with_layer(ConfigLevel::Workspace, &workspace)
            .load()
            .unwrap();

        assert_eq!(config.routing.default_model, "o4-mini");
        assert_eq!(config.routing.thinking_model.as_deref(), Some("o3"));
        assert_eq!(config.conversation.max_turns, 10);
        assert_eq!(config.monitor.timeout_secs, 600.0);
    }

    #[test]
    fn malformed_yaml_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "routing: [unclosed").unwrap();

        let err = ConfigLoader::new()
            .with_layer(ConfigLevel::User, &path)
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn providers_load_from_yaml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            r#"
providers:
  - name: openai
    models:
      - name: o3
        context_window: 200000
        max_output_tokens: 65536
        tier: quality
"#,
        )
        .unwrap();

        let config = ConfigLoader::new()
            .with_layer(ConfigLevel::User, &path)
            .load()
            .unwrap();
        assert_eq!(config.providers.len(), 1);
        assert_eq!(config.providers[0].models[0].name, "o3");
    }
}
