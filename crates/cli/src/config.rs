//! Configuration loading from coxswain.toml.

use runtime::{ModelRef, RunConfig};
use serde::Deserialize;
use std::path::Path;
use tracing::warn;

/// Top-level configuration.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Logical conversation the host routes turns to.
    #[serde(default = "default_session_key")]
    pub session_key: String,

    /// Host bridge invocation.
    #[serde(default)]
    pub bridge: BridgeConfig,

    /// Model identifiers stamped on assistant messages.
    #[serde(default)]
    pub model: ModelConfig,
}

/// Host bridge configuration.
#[derive(Debug, Deserialize)]
pub struct BridgeConfig {
    /// Command invoked once per turn.
    #[serde(default = "default_bridge_command")]
    pub command: String,

    /// Fixed arguments passed on every invocation.
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            command: default_bridge_command(),
            args: Vec::new(),
        }
    }
}

/// Model descriptor configuration.
#[derive(Debug, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_api")]
    pub api: String,

    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default = "default_model_id")]
    pub id: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api: default_api(),
            provider: default_provider(),
            id: default_model_id(),
        }
    }
}

fn default_session_key() -> String {
    "main".to_string()
}

fn default_bridge_command() -> String {
    "coxswain-host".to_string()
}

fn default_api() -> String {
    "chat".to_string()
}

fn default_provider() -> String {
    "host".to_string()
}

fn default_model_id() -> String {
    "default".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load configuration, falling back to defaults when the file is absent
    /// or malformed.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path.as_ref()) {
            Ok(config) => config,
            Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Self::default_config()
            }
            Err(e) => {
                warn!(path = %path.as_ref().display(), "ignoring config: {e}");
                Self::default_config()
            }
        }
    }

    /// Create a default configuration.
    pub fn default_config() -> Self {
        Self {
            session_key: default_session_key(),
            bridge: BridgeConfig::default(),
            model: ModelConfig::default(),
        }
    }

    /// Build the runtime configuration from this config.
    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            model: ModelRef {
                api: self.model.api.clone(),
                provider: self.model.provider.clone(),
                id: self.model.id.clone(),
            },
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.session_key, "main");
        assert_eq!(config.bridge.command, "coxswain-host");
        assert!(config.bridge.args.is_empty());
        assert_eq!(config.model.id, "default");
    }

    #[test]
    fn full_config_parses() {
        let config = Config::parse(
            r#"
            session_key = "scratch"

            [bridge]
            command = "my-host"
            args = ["--chat"]

            [model]
            api = "chat"
            provider = "local"
            id = "small"
            "#,
        )
        .unwrap();

        assert_eq!(config.session_key, "scratch");
        assert_eq!(config.bridge.command, "my-host");
        assert_eq!(config.bridge.args, ["--chat"]);
        assert_eq!(config.run_config().model.provider, "local");
    }

    #[test]
    fn malformed_config_falls_back_to_defaults() {
        assert!(Config::parse("session_key = [1, 2]").is_err());

        let dir = std::env::temp_dir().join("coxswain-config-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.toml");
        std::fs::write(&path, "not toml at all [").unwrap();

        let config = Config::load_or_default(&path);
        assert_eq!(config.session_key, "main");

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = Config::load_or_default("/nonexistent/coxswain.toml");
        assert_eq!(config.session_key, "main");
        assert_eq!(config.model.api, "chat");
    }
}
