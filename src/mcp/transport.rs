// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! MCP transport over streamable HTTP.
//!
//! The connection manager is written against the [`McpTransport`] and
//! [`McpSession`] traits so that tests can substitute in-memory fakes. The
//! production implementation, [`HttpTransport`], runs an `rmcp` client service
//! over `StreamableHttpClientTransport`. Caller identity travels as default
//! headers on the reqwest client, so each session is bound to the auth
//! snapshot it was opened with.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use rmcp::model::CallToolRequestParam;
use rmcp::service::{Peer, RoleClient, RunningService, ServiceError};
use rmcp::transport::streamable_http_client::{
    StreamableHttpClientTransport, StreamableHttpClientTransportConfig,
};
use rmcp::ServiceExt;
use serde_json::{json, Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::error::McpError;
use super::types::{AuthHeaders, ToolDefinition};

/// Opens sessions against an MCP endpoint.
#[async_trait]
pub trait McpTransport: Send + Sync {
    /// Open and initialize a new session using the given headers.
    async fn open(&self, headers: &AuthHeaders) -> Result<Arc<dyn McpSession>, McpError>;

    /// Endpoint description for logs and errors.
    fn endpoint(&self) -> &str;
}

/// An initialized session with the MCP endpoint.
#[async_trait]
pub trait McpSession: Send + Sync {
    /// Fetch the full tool catalogue.
    async fn list_tools(&self) -> Result<Vec<ToolDefinition>, McpError>;

    /// Invoke a tool and return the raw `result` object.
    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> Result<Value, McpError>;

    /// Close the session.
    async fn close(&self) -> Result<(), McpError>;
}

/// Streamable HTTP transport.
pub struct HttpTransport {
    url: String,
}

impl HttpTransport {
    /// Create a transport for the given endpoint URL.
    pub fn new(url: impl Into<String>) -> Result<Self, McpError> {
        let url = url.into();
        reqwest::Url::parse(&url)
            .map_err(|e| McpError::Config(format!("Invalid MCP endpoint '{}': {}", url, e)))?;
        Ok(Self { url })
    }
}

#[async_trait]
impl McpTransport for HttpTransport {
    async fn open(&self, headers: &AuthHeaders) -> Result<Arc<dyn McpSession>, McpError> {
        let client = Client::builder()
            .default_headers(build_header_map(headers)?)
            .build()
            .map_err(|e| McpError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let config = StreamableHttpClientTransportConfig::with_uri(self.url.clone());
        let transport = StreamableHttpClientTransport::with_client(client, config);

        let service = ()
            .serve(transport)
            .await
            .map_err(|e| McpError::connection_failed(&self.url, e.to_string()))?;

        debug!(
            endpoint = %self.url,
            server = ?service.peer_info(),
            "MCP session initialized"
        );

        Ok(Arc::new(HttpSession {
            peer: service.peer().clone(),
            service: Mutex::new(Some(service)),
        }))
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}

/// One running client service. Requests go through the cloned peer; the
/// service handle is only taken to shut the session down.
struct HttpSession {
    peer: Peer<RoleClient>,
    service: Mutex<Option<RunningService<RoleClient, ()>>>,
}

#[async_trait]
impl McpSession for HttpSession {
    async fn list_tools(&self) -> Result<Vec<ToolDefinition>, McpError> {
        let tools = self.peer.list_all_tools().await.map_err(service_error)?;

        let mut definitions = Vec::with_capacity(tools.len());
        for tool in tools {
            match serde_json::to_value(&tool).and_then(serde_json::from_value::<ToolDefinition>) {
                Ok(definition) => definitions.push(definition),
                Err(e) => warn!(tool = %tool.name, error = %e, "Skipping malformed tool definition"),
            }
        }
        Ok(definitions)
    }

    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> Result<Value, McpError> {
        let request: CallToolRequestParam = serde_json::from_value(json!({
            "name": name,
            "arguments": arguments
        }))?;

        let result = self.peer.call_tool(request).await.map_err(service_error)?;
        serde_json::to_value(result)
            .map_err(|e| McpError::InvalidResponse(format!("Unreadable result from '{}': {}", name, e)))
    }

    async fn close(&self) -> Result<(), McpError> {
        let Some(service) = self.service.lock().await.take() else {
            return Ok(());
        };

        // Cancelling the service ends the session with DELETE; a 405 answer is tolerated.
        let reason = service
            .cancel()
            .await
            .map_err(|e| McpError::Transport(format!("Session close failed: {}", e)))?;
        debug!(?reason, "MCP session closed");
        Ok(())
    }
}

/// JSON-RPC errors keep their code; everything else is a transport failure.
fn service_error(err: ServiceError) -> McpError {
    match err {
        ServiceError::McpError(data) => McpError::protocol(i64::from(data.code.0), data.message),
        other => McpError::Transport(other.to_string()),
    }
}

fn build_header_map(headers: &AuthHeaders) -> Result<HeaderMap, McpError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers.iter() {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| McpError::Config(format!("Invalid header name '{}': {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| McpError::Config(format!("Invalid value for header '{}': {}", name, e)))?;
        map.insert(name, value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::types::AuthContext;
    use rmcp::model::{ErrorCode, ErrorData};

    #[test]
    fn test_build_header_map() {
        let headers = AuthHeaders::from_auth(&AuthContext::new(Some("tok".into()), Some("u1".into())));
        let map = build_header_map(&headers).unwrap();
        assert_eq!(map.get("authorization").unwrap(), "Bearer tok");
        assert_eq!(map.get("x-user-id").unwrap(), "u1");
    }

    #[test]
    fn test_build_header_map_rejects_control_characters() {
        let headers = AuthHeaders::from_auth(&AuthContext::new(Some("tok\nen".into()), None));
        assert!(matches!(build_header_map(&headers), Err(McpError::Config(_))));
    }

    #[test]
    fn test_http_transport_endpoint() {
        let transport = HttpTransport::new("http://localhost:3001/mcp").unwrap();
        assert_eq!(transport.endpoint(), "http://localhost:3001/mcp");
    }

    #[test]
    fn test_http_transport_rejects_malformed_url() {
        assert!(matches!(HttpTransport::new("not a url"), Err(McpError::Config(_))));
    }

    #[test]
    fn test_service_error_keeps_jsonrpc_code() {
        let err = service_error(ServiceError::McpError(ErrorData::new(
            ErrorCode::METHOD_NOT_FOUND,
            "Method not found",
            None,
        )));
        assert!(matches!(err, McpError::Protocol { code: -32601, .. }));
    }

    #[tokio::test]
    async fn test_open_unreachable_endpoint_fails() {
        let transport = HttpTransport::new("http://127.0.0.1:9/mcp").unwrap();
        let result = transport.open(&AuthHeaders::default()).await;
        assert!(matches!(result, Err(McpError::ConnectionFailed { .. })));
    }
}
