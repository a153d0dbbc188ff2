// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Tool execution against the MCP endpoint.
//!
//! Every call goes ensure-connected, best-effort schema refresh, sanitize,
//! invoke. Errors never cross this boundary; they come back as a failed
//! [`ExecutionResult`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use super::connection::ConnectionManager;
use super::error::McpError;
use super::sanitizer::RequestSanitizer;
use super::schema::ToolSource;
use super::sync::ToolLister;
use super::types::{AuthContext, ExecutionResult, ToolDefinition};

#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;

/// Default bound on a single remote tool call.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs named tools through the connection manager.
pub struct ToolExecutor {
    connection: Arc<ConnectionManager>,
    sanitizer: RequestSanitizer,
    tool_timeout: Duration,
}

impl ToolExecutor {
    pub fn new(connection: Arc<ConnectionManager>, sanitizer: RequestSanitizer) -> Self {
        Self {
            connection,
            sanitizer,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Set the per-call timeout.
    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.connection
    }

    /// Execute `tool_name` with `arguments`.
    #[instrument(skip(self, arguments, auth), fields(tool = %tool_name))]
    pub async fn execute(
        &self,
        tool_name: &str,
        arguments: Map<String, Value>,
        auth: &AuthContext,
    ) -> ExecutionResult {
        if let Err(e) = self.connection.ensure_connected().await {
            debug!(error = %e, "Cannot execute tool without a connection");
            return ExecutionResult::failure(McpError::NotConnected.to_string());
        }

        self.connection
            .schemas()
            .refresh(self.connection.as_ref(), false)
            .await;

        let sanitized = self.sanitizer.sanitize(tool_name, arguments, auth);
        info!(
            sent = ?sanitized.sent_keys(),
            dropped = ?sanitized.dropped,
            schema_known = sanitized.schema_known,
            "Executing MCP tool"
        );

        let start = Instant::now();
        let result = self
            .connection
            .call_tool(tool_name, sanitized.arguments, self.tool_timeout)
            .await;
        let elapsed = start.elapsed();

        let outcome = match result {
            Ok(value) => match tool_error_message(&value) {
                Some(message) => ExecutionResult::failure(message),
                None => ExecutionResult::success(Some(value)),
            },
            Err(e) => ExecutionResult::failure(e.to_string()),
        };

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_tool(tool_name, elapsed, outcome.success);

        if outcome.success {
            debug!(elapsed_ms = elapsed.as_millis() as u64, "MCP tool succeeded");
        } else {
            warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                error = outcome.error.as_deref().unwrap_or_default(),
                "MCP tool failed"
            );
        }
        outcome
    }

    /// Connect if needed and fetch the endpoint's current tool list.
    ///
    /// A successful listing also replaces the schema cache.
    pub async fn list_tools(&self) -> Result<Vec<ToolDefinition>, McpError> {
        self.connection.ensure_connected().await?;
        let tools = self.connection.fetch_tools().await?;
        self.connection.schemas().replace(tools.clone());
        Ok(tools)
    }
}

#[async_trait]
impl ToolLister for ToolExecutor {
    async fn list_tools(&self) -> Result<Vec<ToolDefinition>, McpError> {
        ToolExecutor::list_tools(self).await
    }
}

/// Error text of a result the endpoint flagged with `isError`.
fn tool_error_message(result: &Value) -> Option<String> {
    if !result.get("isError").and_then(Value::as_bool).unwrap_or(false) {
        return None;
    }

    let text: Vec<&str> = result
        .get("content")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter(|item| item.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|item| item.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();

    let message = text.join("\n");
    Some(if message.trim().is_empty() {
        "Tool reported an error".to_string()
    } else {
        message
    })
}
