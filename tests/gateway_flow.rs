// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! End-to-end tests for the Gateway against an in-memory MCP endpoint and a
//! scripted language model.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use whistle_gateway::assistant::AssistantAction;
use whistle_gateway::config::GatewayConfig;
use whistle_gateway::mcp::{
    AuthHeaders, InputSchema, McpError, McpSession, McpTransport, SyncOutcome, ToolDefinition,
};
use whistle_gateway::providers::{CompletionProvider, ModelParams};
use whistle_gateway::{AssistantError, AuthContext, ChatContext, Gateway, ProviderError};

// ============================================================================
// Fakes
// ============================================================================

/// Shared state of the fake MCP endpoint.
#[derive(Default)]
struct Endpoint {
    tools: Mutex<Vec<ToolDefinition>>,
    results: Mutex<Vec<(String, Value)>>,
    calls: Mutex<Vec<(String, Map<String, Value>)>>,
    opened_with: Mutex<Vec<AuthHeaders>>,
    refuse_connections: bool,
}

impl Endpoint {
    fn with_tools(tools: Vec<ToolDefinition>) -> Arc<Self> {
        Arc::new(Self {
            tools: Mutex::new(tools),
            ..Default::default()
        })
    }

    fn unreachable() -> Arc<Self> {
        Arc::new(Self {
            refuse_connections: true,
            ..Default::default()
        })
    }

    fn respond(&self, tool: &str, result: Value) {
        self.results.lock().unwrap().push((tool.to_string(), result));
    }

    fn calls(&self) -> Vec<(String, Map<String, Value>)> {
        self.calls.lock().unwrap().clone()
    }

    fn opens(&self) -> usize {
        self.opened_with.lock().unwrap().len()
    }
}

struct EndpointTransport(Arc<Endpoint>);

#[async_trait]
impl McpTransport for EndpointTransport {
    async fn open(&self, headers: &AuthHeaders) -> Result<Arc<dyn McpSession>, McpError> {
        self.0.opened_with.lock().unwrap().push(headers.clone());
        if self.0.refuse_connections {
            return Err(McpError::connection_failed("memory://whistle", "connection refused"));
        }
        Ok(Arc::new(EndpointSession(Arc::clone(&self.0))))
    }

    fn endpoint(&self) -> &str {
        "memory://whistle"
    }
}

struct EndpointSession(Arc<Endpoint>);

#[async_trait]
impl McpSession for EndpointSession {
    async fn list_tools(&self) -> Result<Vec<ToolDefinition>, McpError> {
        Ok(self.0.tools.lock().unwrap().clone())
    }

    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> Result<Value, McpError> {
        self.0.calls.lock().unwrap().push((name.to_string(), arguments));
        let results = self.0.results.lock().unwrap();
        Ok(results
            .iter()
            .find(|(tool, _)| tool == name)
            .map(|(_, result)| result.clone())
            .unwrap_or_else(|| json!({"content": []})))
    }

    async fn close(&self) -> Result<(), McpError> {
        Ok(())
    }
}

/// Model that replies from a script and remembers the prompts it saw.
#[derive(Default)]
struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedModel {
    fn replying(replies: &[&str]) -> Arc<Self> {
        let model = Self::default();
        model
            .replies
            .lock()
            .unwrap()
            .extend(replies.iter().map(|r| Ok(r.to_string())));
        Arc::new(model)
    }

    fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedModel {
    async fn complete(
        &self,
        system_prompt: &str,
        _user_message: &str,
        _params: &ModelParams,
    ) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(system_prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::ParseError("script exhausted".to_string())))
    }
}

fn whistle_tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new("search_businesses", "Find businesses near a point").with_schema(
            InputSchema::new()
                .with_property("keyword", json!({"type": "string"}))
                .with_property("latitude", json!({"type": "number"}))
                .with_property("longitude", json!({"type": "number"}))
                .with_property("token", json!({"type": "string"}))
                .with_required(&["latitude", "longitude"]),
        ),
        ToolDefinition::new("list_whistles", "List your whistles").with_schema(
            InputSchema::new().with_property("token", json!({"type": "string"})),
        ),
        ToolDefinition::new("get_profile", "Show your profile"),
    ]
}

fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.mcp.url = Some("http://localhost:3001/mcp".to_string());
    config.mcp.reconnect_base_delay_ms = 1;
    config.mcp.max_reconnect_attempts = 2;
    config
}

fn gateway(endpoint: &Arc<Endpoint>, model: &Arc<ScriptedModel>) -> Gateway {
    Gateway::with_parts(
        Arc::new(EndpointTransport(Arc::clone(endpoint))),
        model.clone(),
        &test_config(),
    )
}

fn bearer(token: &str) -> AuthContext {
    AuthContext::new(Some(format!("Bearer {}", token)), Some("user-7".to_string()))
}

// ============================================================================
// Turn Tests
// ============================================================================

#[tokio::test]
async fn test_first_turn_fills_catalogue_and_runs_tool() {
    let endpoint = Endpoint::with_tools(whistle_tools());
    endpoint.respond(
        "list_whistles",
        json!({"structuredContent": {"whistles": [
            {"title": "Need a plumber", "isVisible": true},
            {"title": "Selling a bike", "isVisible": false}
        ]}}),
    );
    let model = ScriptedModel::replying(&[r#"{"tool": "list_whistles", "args": {}}"#]);
    let gateway = gateway(&endpoint, &model);

    let outcome = gateway
        .process_turn("show my whistles", ChatContext::default(), &bearer("abc"))
        .await
        .unwrap();

    assert!(model.last_prompt().contains("- list_whistles: List your whistles"));
    assert!(outcome.tool_executed);
    assert_eq!(
        outcome.response.message,
        "1. Need a plumber [visible]\n2. Selling a bike [hidden]"
    );
    assert_eq!(
        outcome.response.actions,
        vec![AssistantAction::ToolCall {
            tool: "list_whistles".to_string(),
            args: Map::new(),
        }]
    );
    assert!(outcome.response.suggestions.is_empty());
    assert_eq!(gateway.catalogue().len(), 3);
}

#[tokio::test]
async fn test_schema_refresh_time_recorded_on_connect() {
    let endpoint = Endpoint::with_tools(whistle_tools());
    let model = ScriptedModel::replying(&[]);
    let gateway = gateway(&endpoint, &model);

    assert!(gateway.schemas_refreshed_at().is_none());

    let before = chrono::Utc::now();
    gateway.connect().await.unwrap();

    let refreshed = gateway.schemas_refreshed_at().unwrap();
    assert!(refreshed >= before);
}

#[tokio::test]
async fn test_tool_arguments_are_sanitized_and_located() {
    let endpoint = Endpoint::with_tools(whistle_tools());
    endpoint.respond("search_businesses", json!({"structuredContent": {"businesses": []}}));
    let model = ScriptedModel::replying(&[
        r#"```json
{"tool": "search_businesses", "args": {"keyword": "burger", "radius": 99, "admin": true}}
```"#,
    ]);
    let gateway = gateway(&endpoint, &model);

    let context = ChatContext::from_value(json!({"location": "10.99,76.96"}));
    let outcome = gateway
        .process_turn("burgers near me", context, &bearer("abc"))
        .await
        .unwrap();

    assert_eq!(outcome.response.message, "No businesses found nearby.");

    let calls = endpoint.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        Value::Object(calls[0].1.clone()),
        json!({"keyword": "burger", "latitude": 10.99, "longitude": 76.96, "token": "abc"})
    );
}

#[tokio::test]
async fn test_plain_reply_runs_nothing() {
    let endpoint = Endpoint::with_tools(whistle_tools());
    let model = ScriptedModel::replying(&["I can help you find rides nearby."]);
    let gateway = gateway(&endpoint, &model);

    let outcome = gateway
        .process_turn("hello", ChatContext::default(), &AuthContext::default())
        .await
        .unwrap();

    assert!(!outcome.tool_executed);
    assert!(outcome.response.tool_call().is_none());
    assert!(!outcome.response.suggestions.is_empty());
    assert!(endpoint.calls().is_empty());
}

#[tokio::test]
async fn test_tool_error_is_reported_in_reply() {
    let endpoint = Endpoint::with_tools(whistle_tools());
    endpoint.respond(
        "get_profile",
        json!({"isError": true, "content": [{"type": "text", "text": "upstream timeout"}]}),
    );
    let model = ScriptedModel::replying(&[r#"{"tool": "get_profile", "args": {}}"#]);
    let gateway = gateway(&endpoint, &model);

    let outcome = gateway
        .process_turn("what's my email", ChatContext::default(), &bearer("abc"))
        .await
        .unwrap();

    assert!(outcome.tool_executed);
    assert!(outcome.response.message.contains("timeout"));
    let result = outcome.tool_result.unwrap();
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("upstream timeout"));
}

#[tokio::test]
async fn test_model_failure_fails_turn() {
    let endpoint = Endpoint::with_tools(whistle_tools());
    let model = ScriptedModel::replying(&[]);
    let gateway = gateway(&endpoint, &model);

    let err = gateway
        .process_turn("hello", ChatContext::default(), &AuthContext::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AssistantError::Provider(_)));
}

#[tokio::test]
async fn test_blank_message_never_reaches_model() {
    let endpoint = Endpoint::with_tools(whistle_tools());
    let model = ScriptedModel::replying(&["unused"]);
    let gateway = gateway(&endpoint, &model);

    let err = gateway
        .process_turn("  \n", ChatContext::default(), &AuthContext::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AssistantError::EmptyMessage));
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

// ============================================================================
// Direct Tool Execution Tests
// ============================================================================

#[tokio::test]
async fn test_execute_unknown_tool_passes_arguments_through() {
    let endpoint = Endpoint::with_tools(whistle_tools());
    let gateway = gateway(&endpoint, &ScriptedModel::replying(&[]));

    let args = json!({"anything": 1}).as_object().cloned().unwrap();
    let result = gateway
        .execute_named_tool("brand_new_tool", args.clone(), &AuthContext::default())
        .await;

    assert!(result.success);
    assert_eq!(endpoint.calls()[0].1, args);
}

#[tokio::test]
async fn test_execute_while_unreachable() {
    let endpoint = Endpoint::unreachable();
    let gateway = gateway(&endpoint, &ScriptedModel::replying(&[]));

    let result = gateway
        .execute_named_tool("list_whistles", Map::new(), &AuthContext::default())
        .await;

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("Not connected to MCP server"));
    assert!(endpoint.calls().is_empty());

    let status = gateway.connection_status().await;
    assert!(!status.connected);
    assert!(status.attempts >= 1 && status.attempts <= 2);
    gateway.shutdown().await;
}

#[tokio::test]
async fn test_list_tools() {
    let endpoint = Endpoint::with_tools(whistle_tools());
    let gateway = gateway(&endpoint, &ScriptedModel::replying(&[]));

    let names: Vec<String> = gateway
        .list_tools()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(names, vec!["search_businesses", "list_whistles", "get_profile"]);
    assert!(gateway.connection_status().await.connected);
}

// ============================================================================
// Connection and Sync Tests
// ============================================================================

#[tokio::test]
async fn test_auth_applies_to_next_connection() {
    let endpoint = Endpoint::with_tools(whistle_tools());
    let gateway = gateway(&endpoint, &ScriptedModel::replying(&[]));

    gateway.set_auth(&bearer("first"));
    gateway.connect().await.unwrap();

    gateway
        .execute_named_tool("get_profile", Map::new(), &bearer("second"))
        .await;
    assert_eq!(endpoint.opens(), 1);

    gateway.shutdown().await;
    gateway.connect().await.unwrap();

    let opened = endpoint.opened_with.lock().unwrap().clone();
    assert_eq!(opened[0].get("Authorization"), Some("Bearer first"));
    assert_eq!(opened[1].get("Authorization"), Some("Bearer second"));
    assert_eq!(opened[1].get("X-User-Id"), Some("user-7"));
}

#[tokio::test]
async fn test_sync_publishes_only_changes() {
    let endpoint = Endpoint::with_tools(whistle_tools());
    let gateway = gateway(&endpoint, &ScriptedModel::replying(&[]));

    assert_eq!(gateway.sync_now().await, SyncOutcome::Published(3));

    endpoint.tools.lock().unwrap().reverse();
    assert_eq!(gateway.sync_now().await, SyncOutcome::Unchanged);

    endpoint.tools.lock().unwrap()[0] = ToolDefinition::new("get_profile", "Show your profile")
        .with_schema(InputSchema::new().with_property("fields", json!({"type": "array"})));
    assert_eq!(gateway.sync_now().await, SyncOutcome::Published(3));
}

#[tokio::test]
async fn test_start_and_stop_sync() {
    let endpoint = Endpoint::with_tools(whistle_tools());
    let gateway = gateway(&endpoint, &ScriptedModel::replying(&[]));

    gateway.start_sync().await;
    assert!(gateway.is_syncing().await);
    assert_eq!(gateway.catalogue().len(), 3);

    gateway.stop_sync().await;
    gateway.stop_sync().await;
    assert!(!gateway.is_syncing().await);

    gateway.shutdown().await;
    assert!(!gateway.connection_status().await.connected);
}
