// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The gateway façade.
//!
//! [`Gateway`] wires the MCP connection, schema cache, executor, registry
//! synchronizer and turn processor together and exposes the operations a
//! front door needs.
//!
//! # Example
//!
//! ```rust,ignore
//! use whistle_gateway::config::{load_config, CliOptions};
//! use whistle_gateway::gateway::Gateway;
//!
//! let config = load_config(Path::new("."), CliOptions::default())?;
//! let gateway = Gateway::from_config(&config)?;
//! gateway.start_sync().await;
//!
//! let outcome = gateway
//!     .process_turn("show my whistles", ChatContext::default(), &auth)
//!     .await?;
//! println!("{}", outcome.response.message);
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

use crate::assistant::{ChatContext, ToolCatalogue, TurnOutcome, TurnProcessor};
use crate::config::GatewayConfig;
use crate::error::{AssistantError, GatewayError};
use crate::mcp::{
    AuthContext, ConnectionConfig, ConnectionManager, ConnectionStatus, ExecutionResult, HttpTransport,
    McpError, McpTransport, RegistrySynchronizer, RequestSanitizer, SyncOutcome, ToolDefinition,
    ToolExecutor, ToolSchemaStore,
};
use crate::providers::{create_provider, ModelParams, SharedProvider};

pub struct Gateway {
    connection: Arc<ConnectionManager>,
    executor: Arc<ToolExecutor>,
    catalogue: Arc<ToolCatalogue>,
    synchronizer: Arc<RegistrySynchronizer>,
    processor: TurnProcessor,
}

impl Gateway {
    /// Validate the configuration and build a gateway talking to the real
    /// MCP endpoint and model.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, GatewayError> {
        config.validate()?;

        let url = config.mcp.url.clone().unwrap_or_default();
        let transport = Arc::new(HttpTransport::new(url)?);
        let provider = create_provider(&config.model)?;

        Ok(Self::with_parts(transport, provider, config))
    }

    /// Build a gateway over the given transport and provider. Nothing connects
    /// until the first operation that needs the endpoint.
    pub fn with_parts(
        transport: Arc<dyn McpTransport>,
        provider: SharedProvider,
        config: &GatewayConfig,
    ) -> Self {
        let schemas = Arc::new(ToolSchemaStore::new(config.mcp.schema_refresh()));
        let connection = ConnectionManager::new(
            transport,
            Arc::clone(&schemas),
            ConnectionConfig {
                max_reconnect_attempts: config.mcp.max_reconnect_attempts,
                reconnect_base_delay: config.mcp.reconnect_base_delay(),
                connect_timeout: config.mcp.connect_timeout(),
            },
        );

        let sanitizer = RequestSanitizer::with_auth_key(schemas, config.mcp.auth_key.clone());
        let executor = Arc::new(
            ToolExecutor::new(Arc::clone(&connection), sanitizer)
                .with_tool_timeout(config.mcp.tool_timeout()),
        );

        let catalogue = Arc::new(ToolCatalogue::new());
        let synchronizer = RegistrySynchronizer::new(
            executor.clone(),
            catalogue.clone(),
            config.sync.interval(),
        );

        let processor = TurnProcessor::new(provider, executor.clone(), Arc::clone(&catalogue))
            .with_params(ModelParams::from_config(&config.model));

        Self {
            connection,
            executor,
            catalogue,
            synchronizer,
            processor,
        }
    }

    /// Answer one user message, running at most one tool.
    ///
    /// Non-empty auth replaces the headers used for the next MCP connection.
    /// An empty catalogue is filled with one sync cycle first.
    #[instrument(skip_all)]
    pub async fn process_turn(
        &self,
        message: &str,
        context: ChatContext,
        auth: &AuthContext,
    ) -> Result<TurnOutcome, AssistantError> {
        self.set_auth(auth);

        if self.catalogue.is_empty() {
            let outcome = self.synchronizer.sync_once().await;
            debug!(?outcome, "Filled empty tool catalogue before turn");
        }

        self.processor.process(message, context, auth).await
    }

    /// Run a tool directly, without the model.
    pub async fn execute_named_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
        auth: &AuthContext,
    ) -> ExecutionResult {
        self.set_auth(auth);
        self.executor.execute(name, arguments, auth).await
    }

    /// Current tool list from the endpoint.
    pub async fn list_tools(&self) -> Result<Vec<ToolDefinition>, McpError> {
        self.executor.list_tools().await
    }

    /// Open the MCP session now rather than on first use.
    pub async fn connect(&self) -> Result<(), McpError> {
        self.connection.connect().await
    }

    pub async fn connection_status(&self) -> ConnectionStatus {
        self.connection.status().await
    }

    /// When the tool schema cache was last filled from the endpoint.
    pub fn schemas_refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.connection.schemas().last_refreshed()
    }

    /// Tools currently offered to the model.
    pub fn catalogue(&self) -> Vec<ToolDefinition> {
        self.catalogue.snapshot()
    }

    pub async fn sync_now(&self) -> SyncOutcome {
        self.synchronizer.sync_once().await
    }

    pub async fn start_sync(&self) {
        self.synchronizer.start().await;
    }

    pub async fn stop_sync(&self) {
        self.synchronizer.stop().await;
    }

    pub async fn is_syncing(&self) -> bool {
        self.synchronizer.is_running().await
    }

    /// Stop syncing and close the MCP session.
    pub async fn shutdown(&self) {
        self.stop_sync().await;
        self.connection.disconnect().await;
        info!("Gateway shut down");
    }

    /// Use these credentials for the next MCP connection. Empty auth is ignored.
    pub fn set_auth(&self, auth: &AuthContext) {
        if auth.token.is_some() || auth.user_id.is_some() {
            self.connection.set_auth(auth);
        }
    }
}
