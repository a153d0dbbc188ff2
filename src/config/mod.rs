// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration module for the gateway.
//!
//! Handles loading, merging, and validation of configuration from multiple sources:
//! - Global config: ~/.whistle-gateway/config.json
//! - Workspace config: whistle-gateway.json, .whistle-gateway.json, or whistle-gateway.yaml
//! - Environment: WHISTLE_MCP_URL, WHISTLE_PROVIDER, WHISTLE_MODEL, WHISTLE_MODEL_BASE_URL, OPENAI_API_KEY
//! - CLI options: command-line arguments
//!
//! Configuration is merged with precedence (CLI > env > workspace > global > defaults).

mod loader;
mod merger;
mod types;

pub use loader::{
    find_workspace_root, get_global_config_dir, get_global_config_path, load_config_file,
    load_global_config, load_workspace_config, CONFIG_FILES, GLOBAL_CONFIG_DIR, GLOBAL_CONFIG_FILE,
};

pub use merger::{default_config, merge_config, CliOptions, EnvOverrides};

pub use types::{
    GatewayConfig, McpConfig, McpSection, ModelConfig, ModelSection, SyncConfig, SyncSection,
    WorkspaceConfig,
};

use crate::error::ConfigError;
use std::path::Path;

/// Load and merge all configuration sources for a workspace.
///
/// This is the main entry point for configuration loading. The result is not
/// validated; call [`GatewayConfig::validate`] before building a gateway.
pub fn load_config(workspace_root: &Path, cli_options: CliOptions) -> Result<GatewayConfig, ConfigError> {
    load_config_with_env(workspace_root, EnvOverrides::from_env(), cli_options)
}

/// Like [`load_config`] but with explicit environment values.
pub fn load_config_with_env(
    workspace_root: &Path,
    env: EnvOverrides,
    cli_options: CliOptions,
) -> Result<GatewayConfig, ConfigError> {
    let global = load_global_config()?;
    let workspace = load_workspace_config(workspace_root)?;

    Ok(merge_config(global, workspace, env, cli_options))
}
