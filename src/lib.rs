// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Whistle gateway - an assistant that talks to users through a language
//! model and acts for them through the Whistle MCP tool endpoint.
//!
//! # Architecture
//!
//! - [`mcp`] - MCP session management, schema cache, argument sanitizing,
//!   tool execution and catalogue synchronization
//! - [`assistant`] - Prompt composition, tool-call detection and reply shaping
//! - [`providers`] - Language model completion providers
//! - [`gateway`] - Façade wiring the above together
//! - [`config`] - Configuration loading and merging
//! - [`telemetry`] - Tracing setup, correlation IDs and metrics
//! - [`error`] - Error types and result aliases
//!
//! # Example
//!
//! ```rust,ignore
//! use whistle_gateway::{load_config, AuthContext, ChatContext, CliOptions, Gateway};
//!
//! let config = load_config(Path::new("."), CliOptions::default())?;
//! let gateway = Gateway::from_config(&config)?;
//!
//! let auth = AuthContext::new(Some("Bearer abc".into()), None);
//! let outcome = gateway
//!     .process_turn("any burger places near me?", ChatContext::default(), &auth)
//!     .await?;
//! ```

pub mod assistant;
pub mod config;
pub mod error;
pub mod gateway;
pub mod mcp;
pub mod providers;
pub mod telemetry;

pub use assistant::{AIResponse, AssistantAction, ChatContext, TurnOutcome};
pub use config::{load_config, CliOptions, GatewayConfig};
pub use error::{AssistantError, ConfigError, GatewayError, ProviderError, Result};
pub use gateway::Gateway;
pub use mcp::{AuthContext, ConnectionStatus, ExecutionResult, McpError, ToolDefinition};
pub use providers::{CompletionProvider, ModelParams, ProviderType, SharedProvider};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
