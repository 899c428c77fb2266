//! Server configuration
//!
//! - `ServerConfig`: the immutable settings object shared by the pipeline
//! - `ConfigLoader`: layered YAML loading (user, then workspace) plus a
//!   one-time environment overlay

mod error;
mod file;
mod settings;

pub use error::{ConfigError, ConfigResult};
pub use file::{user_config_path, workspace_config_path, ConfigLevel, ConfigLoader};
pub use settings::{
    ConsensusConfig, ConversationConfig, FeatureFlags, FileAccessConfig, HistoryMode,
    MonitorConfig, RoutingConfig, ServerConfig,
};
