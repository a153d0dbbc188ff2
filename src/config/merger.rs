// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration merging.
//!
//! Handles merging configurations from different sources with proper precedence.

use super::types::{GatewayConfig, McpSection, ModelSection, SyncSection, WorkspaceConfig};

/// CLI options that can override configuration.
#[derive(Debug, Clone, Default)]
pub struct CliOptions {
    pub mcp_url: Option<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub sync_interval_secs: Option<u64>,
}

/// Values taken from environment variables.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    /// `WHISTLE_MCP_URL`
    pub mcp_url: Option<String>,
    /// `WHISTLE_PROVIDER`
    pub provider: Option<String>,
    /// `WHISTLE_MODEL`
    pub model: Option<String>,
    /// `WHISTLE_MODEL_BASE_URL`
    pub base_url: Option<String>,
    /// `OPENAI_API_KEY`
    pub api_key: Option<String>,
}

impl EnvOverrides {
    /// Read overrides from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read overrides through `lookup`; empty values are ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Self {
            mcp_url: get("WHISTLE_MCP_URL"),
            provider: get("WHISTLE_PROVIDER"),
            model: get("WHISTLE_MODEL"),
            base_url: get("WHISTLE_MODEL_BASE_URL"),
            api_key: get("OPENAI_API_KEY"),
        }
    }
}

/// Default configuration values.
pub fn default_config() -> GatewayConfig {
    GatewayConfig::default()
}

/// Merge multiple configurations with precedence.
///
/// Precedence (highest to lowest):
/// 1. CLI options
/// 2. Environment variables
/// 3. Workspace config (whistle-gateway.json)
/// 4. Global config (~/.whistle-gateway/config.json)
/// 5. Default values
pub fn merge_config(
    global: Option<WorkspaceConfig>,
    workspace: Option<WorkspaceConfig>,
    env: EnvOverrides,
    cli: CliOptions,
) -> GatewayConfig {
    let mut result = default_config();

    if let Some(config) = global {
        apply_workspace_config(&mut result, &config);
    }

    if let Some(config) = workspace {
        apply_workspace_config(&mut result, &config);
    }

    apply_env(&mut result, &env);

    // Apply CLI options (highest precedence)
    apply_cli_options(&mut result, &cli);

    result
}

fn apply_workspace_config(result: &mut GatewayConfig, config: &WorkspaceConfig) {
    if let Some(ref mcp) = config.mcp {
        apply_mcp_section(result, mcp);
    }
    if let Some(ref sync) = config.sync {
        apply_sync_section(result, sync);
    }
    if let Some(ref model) = config.model {
        apply_model_section(result, model);
    }
}

fn apply_mcp_section(result: &mut GatewayConfig, mcp: &McpSection) {
    let target = &mut result.mcp;

    if mcp.url.is_some() {
        target.url = mcp.url.clone();
    }
    if let Some(attempts) = mcp.max_reconnect_attempts {
        target.max_reconnect_attempts = attempts;
    }
    if let Some(delay) = mcp.reconnect_base_delay_ms {
        target.reconnect_base_delay_ms = delay;
    }
    if let Some(secs) = mcp.schema_refresh_secs {
        target.schema_refresh_secs = secs;
    }
    if let Some(secs) = mcp.connect_timeout_secs {
        target.connect_timeout_secs = secs;
    }
    if let Some(secs) = mcp.tool_timeout_secs {
        target.tool_timeout_secs = secs;
    }
    if let Some(ref key) = mcp.auth_key {
        target.auth_key = key.clone();
    }
}

fn apply_sync_section(result: &mut GatewayConfig, sync: &SyncSection) {
    if let Some(secs) = sync.interval_secs {
        result.sync.interval_secs = secs;
    }
}

fn apply_model_section(result: &mut GatewayConfig, model: &ModelSection) {
    let target = &mut result.model;

    if let Some(ref provider) = model.provider {
        target.provider = provider.clone();
    }
    if model.model.is_some() {
        target.model = model.model.clone();
    }
    if model.base_url.is_some() {
        target.base_url = model.base_url.clone();
    }
    if model.api_key.is_some() {
        target.api_key = model.api_key.clone();
    }
    if let Some(temperature) = model.temperature {
        target.temperature = temperature;
    }
    if let Some(max_tokens) = model.max_tokens {
        target.max_tokens = max_tokens;
    }
    if let Some(secs) = model.timeout_secs {
        target.timeout_secs = secs;
    }
}

fn apply_env(result: &mut GatewayConfig, env: &EnvOverrides) {
    if env.mcp_url.is_some() {
        result.mcp.url = env.mcp_url.clone();
    }
    if let Some(ref provider) = env.provider {
        result.model.provider = provider.clone();
    }
    if env.model.is_some() {
        result.model.model = env.model.clone();
    }
    if env.base_url.is_some() {
        result.model.base_url = env.base_url.clone();
    }
    if env.api_key.is_some() {
        result.model.api_key = env.api_key.clone();
    }
}

fn apply_cli_options(result: &mut GatewayConfig, cli: &CliOptions) {
    if cli.mcp_url.is_some() {
        result.mcp.url = cli.mcp_url.clone();
    }
    if let Some(ref provider) = cli.provider {
        result.model.provider = provider.clone();
    }
    if cli.model.is_some() {
        result.model.model = cli.model.clone();
    }
    if cli.base_url.is_some() {
        result.model.base_url = cli.base_url.clone();
    }
    if let Some(secs) = cli.sync_interval_secs {
        result.sync.interval_secs = secs;
    }
}
