use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

use crate::error::GatewayError;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct GatewayConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub model: ModelConfig,
    pub memory: MemoryConfig,
    pub memory_search: MemorySearchConfig,
    pub integrations: IntegrationsConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ModelConfig {
    /// `"xai"` (remote, needs a credential) or `"scripted"` (offline replay).
    pub provider: String,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MemoryConfig {
    /// Upper bound on executed memory writes within one stream.
    pub max_writes_per_chat: usize,
    pub default_user_id: String,
    pub default_limit: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MemorySearchConfig {
    /// Candidate base URLs, tried in order.
    pub base_urls: Vec<String>,
    pub path: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IntegrationsConfig {
    pub biometrics_url: Option<String>,
    pub status_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8001,
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_gateway_dir()
            .join("memory.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "xai".into(),
            base_url: "https://api.x.ai/v1".into(),
            model: "grok-4-fast".into(),
            api_key: None,
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_writes_per_chat: 3,
            default_user_id: "default".into(),
            default_limit: 5,
        }
    }
}

impl Default for MemorySearchConfig {
    fn default() -> Self {
        Self {
            base_urls: vec![
                "http://localhost:3000".into(),
                "http://localhost:3002".into(),
            ],
            path: "/api/memory/search".into(),
            timeout_secs: 10,
        }
    }
}

impl Default for IntegrationsConfig {
    fn default() -> Self {
        Self {
            biometrics_url: None,
            status_url: None,
            timeout_secs: 10,
        }
    }
}

/// Returns `~/.agentic-gateway/`, or a relative `.agentic-gateway` when no home exists.
pub fn default_gateway_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".agentic-gateway")
}

/// Returns the default config file path: `~/.agentic-gateway/config.toml`
pub fn default_config_path() -> PathBuf {
    default_gateway_dir().join("config.toml")
}

impl GatewayConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            GatewayConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("XAI_API_KEY") {
            if !val.trim().is_empty() {
                self.model.api_key = Some(val);
            }
        }
        if let Some(max) = parse_env::<usize>("AGENTIC_MEMORY_MAX_PER_CHAT") {
            self.memory.max_writes_per_chat = max;
        }
        if let Ok(val) = std::env::var("NEXT_API_BASE_URL") {
            match self.memory_search.base_urls.first_mut() {
                Some(first) => *first = val,
                None => self.memory_search.base_urls.push(val),
            }
        }
        if let Some(port) = parse_env::<u16>("PORT") {
            self.server.port = port;
        }
        if let Ok(val) = std::env::var("GATEWAY_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("GATEWAY_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("WHOOP_API_URL") {
            self.integrations.biometrics_url = Some(val);
        }
        if let Ok(val) = std::env::var("GATEWAY_STATUS_URL") {
            self.integrations.status_url = Some(val);
        }
    }

    /// Startup check: a remote provider without a credential cannot serve anything.
    pub fn validate(&self) -> Result<(), GatewayError> {
        match self.model.provider.as_str() {
            "xai" => {
                if self.credential().is_none() {
                    return Err(GatewayError::Configuration(
                        "XAI_API_KEY environment variable not set".into(),
                    ));
                }
                Ok(())
            }
            "scripted" => Ok(()),
            other => Err(GatewayError::Configuration(format!(
                "unknown model provider: {other}. Supported: xai, scripted"
            ))),
        }
    }

    /// The backend credential, if one is configured and non-blank.
    pub fn credential(&self) -> Option<&str> {
        self.model
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

fn parse_env<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(val) => Some(val),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparseable environment override");
            None
        }
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = GatewayConfig::default();
        assert_eq!(config.server.port, 8001);
        assert_eq!(config.server.log_level, "info");
        assert_eq!(config.model.model, "grok-4-fast");
        assert_eq!(config.memory.max_writes_per_chat, 3);
        assert_eq!(config.memory.default_user_id, "default");
        assert_eq!(config.memory_search.base_urls.len(), 2);
        assert!(config.storage.db_path.ends_with("memory.db"));
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[server]
log_level = "debug"
port = 9000

[storage]
db_path = "/tmp/test.db"

[memory]
max_writes_per_chat = 1
"#;
        let config: GatewayConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.log_level, "debug");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.storage.db_path, "/tmp/test.db");
        assert_eq!(config.memory.max_writes_per_chat, 1);
        // defaults still apply for unset fields
        assert_eq!(config.memory.default_limit, 5);
        assert_eq!(config.model.provider, "xai");
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = GatewayConfig::default();
        std::env::set_var("GATEWAY_DB", "/tmp/override.db");
        std::env::set_var("AGENTIC_MEMORY_MAX_PER_CHAT", "7");
        std::env::set_var("NEXT_API_BASE_URL", "http://memory.internal:4000");
        std::env::set_var("GATEWAY_LOG_LEVEL", "trace");

        config.apply_env_overrides();

        assert_eq!(config.storage.db_path, "/tmp/override.db");
        assert_eq!(config.memory.max_writes_per_chat, 7);
        assert_eq!(config.memory_search.base_urls[0], "http://memory.internal:4000");
        assert_eq!(config.memory_search.base_urls[1], "http://localhost:3002");
        assert_eq!(config.server.log_level, "trace");

        // Clean up
        std::env::remove_var("GATEWAY_DB");
        std::env::remove_var("AGENTIC_MEMORY_MAX_PER_CHAT");
        std::env::remove_var("NEXT_API_BASE_URL");
        std::env::remove_var("GATEWAY_LOG_LEVEL");
    }

    #[test]
    fn missing_credential_fails_validation() {
        let mut config = GatewayConfig::default();
        config.model.api_key = Some("   ".into());
        let err = config.validate().unwrap_err();
        assert!(matches!(err, GatewayError::Configuration(_)));

        config.model.api_key = Some("xai-test".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn scripted_provider_needs_no_credential() {
        let mut config = GatewayConfig::default();
        config.model.provider = "scripted".into();
        assert!(config.validate().is_ok());
    }
}
