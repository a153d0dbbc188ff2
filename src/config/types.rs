// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration type definitions.
//!
//! [`WorkspaceConfig`] is the partial shape read from JSON or YAML files; every
//! field is optional so files only need to state what they change.
//! [`GatewayConfig`] is the fully resolved configuration after merging.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::providers::ProviderType;

/// Gateway configuration as written in a config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceConfig {
    /// MCP endpoint settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mcp: Option<McpSection>,

    /// Tool registry synchronization
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync: Option<SyncSection>,

    /// Language model settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpSection {
    /// Streamable HTTP endpoint, e.g. `http://localhost:3001/mcp`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_reconnect_attempts: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconnect_base_delay_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_refresh_secs: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_timeout_secs: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_timeout_secs: Option<u64>,

    /// Argument name tools use for the caller's token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSection {
    /// Provider to use (openai, ollama, openai-compatible)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// Fully resolved gateway configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    pub mcp: McpConfig,
    pub sync: SyncConfig,
    pub model: ModelConfig,
}

impl GatewayConfig {
    /// Check that everything needed to run is present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.mcp.url.as_deref() {
            None | Some("") => return Err(ConfigError::MissingField("mcp.url".to_string())),
            Some(url) if !url.starts_with("http://") && !url.starts_with("https://") => {
                return Err(ConfigError::InvalidValue {
                    field: "mcp.url".to_string(),
                    message: format!("expected an http(s) URL, got '{}'", url),
                });
            }
            Some(_) => {}
        }

        let provider: ProviderType =
            self.model.provider.parse().map_err(|_| ConfigError::InvalidValue {
                field: "model.provider".to_string(),
                message: format!("unknown provider '{}'", self.model.provider),
            })?;

        if provider.requires_api_key() && self.model.api_key.as_deref().is_none_or(str::is_empty) {
            return Err(ConfigError::MissingField("model.apiKey".to_string()));
        }

        if provider == ProviderType::OpenAICompatible && self.model.base_url.is_none() {
            return Err(ConfigError::MissingField("model.baseUrl".to_string()));
        }

        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(ConfigError::InvalidValue {
                field: "model.temperature".to_string(),
                message: "must be between 0 and 2".to_string(),
            });
        }

        if self.sync.interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sync.intervalSecs".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

/// Resolved MCP endpoint settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct McpConfig {
    pub url: Option<String>,
    pub max_reconnect_attempts: u32,
    pub reconnect_base_delay_ms: u64,
    pub schema_refresh_secs: u64,
    pub connect_timeout_secs: u64,
    pub tool_timeout_secs: u64,
    pub auth_key: String,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_reconnect_attempts: 5,
            reconnect_base_delay_ms: 2000,
            schema_refresh_secs: 300,
            connect_timeout_secs: 30,
            tool_timeout_secs: 30,
            auth_key: "token".to_string(),
        }
    }
}

impl McpConfig {
    pub fn reconnect_base_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_base_delay_ms)
    }

    pub fn schema_refresh(&self) -> Duration {
        Duration::from_secs(self.schema_refresh_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

/// Resolved synchronizer settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    pub interval_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { interval_secs: 30 }
    }
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Resolved language model settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    pub provider: String,
    pub model: Option<String>,
    pub base_url: Option<String>,
    /// Never serialized.
    #[serde(skip)]
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: None,
            base_url: None,
            api_key: None,
            temperature: 0.7,
            max_tokens: 1000,
            timeout_secs: 60,
        }
    }
}

impl ModelConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.mcp.url = Some("http://localhost:3001/mcp".to_string());
        config.model.api_key = Some("sk-test".to_string());
        config
    }

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.mcp.max_reconnect_attempts, 5);
        assert_eq!(config.mcp.reconnect_base_delay(), Duration::from_secs(2));
        assert_eq!(config.mcp.schema_refresh(), Duration::from_secs(300));
        assert_eq!(config.mcp.tool_timeout(), Duration::from_secs(30));
        assert_eq!(config.mcp.auth_key, "token");
        assert_eq!(config.sync.interval(), Duration::from_secs(30));
        assert_eq!(config.model.provider, "openai");
    }

    #[test]
    fn test_validate_ok() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_validate_missing_url() {
        let mut config = valid();
        config.mcp.url = None;
        assert!(matches!(config.validate(), Err(ConfigError::MissingField(f)) if f == "mcp.url"));
    }

    #[test]
    fn test_validate_bad_url() {
        let mut config = valid();
        config.mcp.url = Some("localhost:3001".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_validate_missing_api_key() {
        let mut config = valid();
        config.model.api_key = None;
        assert!(matches!(config.validate(), Err(ConfigError::MissingField(f)) if f == "model.apiKey"));
    }

    #[test]
    fn test_validate_ollama_needs_no_key() {
        let mut config = valid();
        config.model.provider = "ollama".to_string();
        config.model.api_key = None;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = valid();
        config.model.provider = "carrier-pigeon".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_api_key_not_serialized() {
        let json = serde_json::to_string(&valid()).unwrap();
        assert!(!json.contains("sk-test"));
        assert!(json.contains("maxReconnectAttempts"));
    }

    #[test]
    fn test_workspace_config_yaml() {
        let yaml = "mcp:\n  url: http://mcp:3001/mcp\n  toolTimeoutSecs: 10\nmodel:\n  model: gpt-4o-mini\n";
        let config: WorkspaceConfig = serde_yaml::from_str(yaml).unwrap();
        let mcp = config.mcp.unwrap();
        assert_eq!(mcp.url.as_deref(), Some("http://mcp:3001/mcp"));
        assert_eq!(mcp.tool_timeout_secs, Some(10));
        assert_eq!(config.model.unwrap().model.as_deref(), Some("gpt-4o-mini"));
        assert!(config.sync.is_none());
    }
}
