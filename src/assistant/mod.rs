// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Assistant turn processing.
//!
//! One turn: compose a system prompt from the tool catalogue and chat context,
//! ask the model, look for a tool call in the reply, run it, and shape the
//! structured result into reply text.
//!
//! ```text
//! message ──▶ prompt ──▶ model ──▶ parse_reply ─┬─ PlainText ──▶ signals ──▶ AIResponse
//!                                               └─ ToolCall ──▶ executor ──▶ payload ──▶ formatter
//! ```

pub mod context;
pub mod formatters;
pub mod parser;
pub mod payload;
pub mod prompt;
pub mod signals;
pub mod types;

pub use context::ChatContext;
pub use formatters::{FormatContext, Formatter, FormatterRegistry};
pub use parser::{parse_reply, ParsedReply, ToolCallDirective};
pub use signals::Signals;
pub use types::{AIResponse, AssistantAction, TurnOutcome};

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, field, info, info_span, Instrument};

use crate::error::AssistantError;
use crate::mcp::{AuthContext, ExecutionResult, ToolDefinition, ToolExecutor, ToolPublisher};
use crate::providers::{ModelParams, SharedProvider};
use crate::telemetry::{CorrelationId, CorrelationIdExt};

#[cfg(feature = "telemetry")]
use crate::telemetry::GLOBAL_METRICS;

/// Runs a tool on behalf of the assistant.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn invoke(&self, tool: &str, args: Map<String, Value>, auth: &AuthContext) -> ExecutionResult;
}

#[async_trait]
impl ToolInvoker for ToolExecutor {
    async fn invoke(&self, tool: &str, args: Map<String, Value>, auth: &AuthContext) -> ExecutionResult {
        self.execute(tool, args, auth).await
    }
}

/// Assistant-facing tool catalogue, fed by the registry synchronizer.
#[derive(Debug, Default)]
pub struct ToolCatalogue {
    tools: RwLock<Vec<ToolDefinition>>,
}

impl ToolCatalogue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<ToolDefinition> {
        self.tools.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.read().unwrap_or_else(PoisonError::into_inner).is_empty()
    }
}

impl ToolPublisher for ToolCatalogue {
    fn publish(&self, mut tools: Vec<ToolDefinition>) {
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        *self.tools.write().unwrap_or_else(PoisonError::into_inner) = tools;
    }
}

/// Interpret a model reply without running anything.
///
/// A tool call empties the text and records exactly one `tool_call` action.
/// Plain text gets keyword signals from the reply and the user's message.
pub fn interpret_reply(reply: &str, user_message: &str) -> (AIResponse, Option<ToolCallDirective>) {
    match parse_reply(reply) {
        ParsedReply::ToolCall(directive) => {
            let response = AIResponse {
                message: String::new(),
                actions: vec![AssistantAction::ToolCall {
                    tool: directive.tool.clone(),
                    args: directive.args.clone(),
                }],
                suggestions: Vec::new(),
            };
            (response, Some(directive))
        }
        ParsedReply::PlainText(text) => {
            let signals = Signals::detect(&text, user_message);
            let mut actions = Vec::new();
            if signals.booking {
                actions.push(AssistantAction::BookingIntent);
            }
            let response = AIResponse {
                message: text,
                actions,
                suggestions: signals.suggestions(),
            };
            (response, None)
        }
    }
}

/// Text shown when a tool run fails.
pub fn failure_message(error: &str) -> String {
    format!("Sorry, I couldn't complete that request: {}", error)
}

/// Processes assistant turns.
pub struct TurnProcessor {
    provider: SharedProvider,
    invoker: Arc<dyn ToolInvoker>,
    catalogue: Arc<ToolCatalogue>,
    formatters: FormatterRegistry,
    params: ModelParams,
}

impl TurnProcessor {
    pub fn new(provider: SharedProvider, invoker: Arc<dyn ToolInvoker>, catalogue: Arc<ToolCatalogue>) -> Self {
        Self {
            provider,
            invoker,
            catalogue,
            formatters: FormatterRegistry::default(),
            params: ModelParams::default(),
        }
    }

    pub fn with_params(mut self, params: ModelParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_formatters(mut self, formatters: FormatterRegistry) -> Self {
        self.formatters = formatters;
        self
    }

    pub fn catalogue(&self) -> &Arc<ToolCatalogue> {
        &self.catalogue
    }

    /// Run one turn.
    ///
    /// Only a missing message or a model failure is an error; tool failures
    /// end up in the reply text.
    pub async fn process(
        &self,
        message: &str,
        context: ChatContext,
        auth: &AuthContext,
    ) -> Result<TurnOutcome, AssistantError> {
        if message.trim().is_empty() {
            return Err(AssistantError::EmptyMessage);
        }

        let correlation_id = CorrelationId::new();
        let span = info_span!("turn", correlation_id = field::Empty, tool = field::Empty);
        span.record_correlation_id(&correlation_id);

        let outcome = self
            .process_inner(message, context, auth)
            .instrument(span)
            .await?;

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_turn(outcome.tool_executed);

        Ok(outcome)
    }

    async fn process_inner(
        &self,
        message: &str,
        context: ChatContext,
        auth: &AuthContext,
    ) -> Result<TurnOutcome, AssistantError> {
        let context = context.with_derived_coordinates();
        let tools = self.catalogue.snapshot();
        let system_prompt = prompt::build_system_prompt(&tools, &context);

        debug!(tools = tools.len(), prompt_chars = system_prompt.len(), "Asking model");
        let reply = self.provider.complete(&system_prompt, message, &self.params).await?;

        let (mut response, directive) = interpret_reply(&reply, message);
        let Some(directive) = directive else {
            debug!(suggestions = response.suggestions.len(), "Plain text reply");
            return Ok(TurnOutcome {
                response,
                tool_executed: false,
                tool_result: None,
            });
        };

        tracing::Span::current().record("tool", directive.tool.as_str());

        let mut args = directive.args;
        let schema = tools
            .iter()
            .find(|tool| tool.name == directive.tool)
            .map(|tool| &tool.input_schema);
        context.merge_coordinates(&mut args, schema);

        let result = self.invoker.invoke(&directive.tool, args, auth).await;
        info!(success = result.success, "Tool call finished");

        response.message = if result.success {
            let payload = payload::extract_payload(result.data.as_ref());
            self.formatters.format(
                &directive.tool,
                &payload,
                &FormatContext { user_message: message },
            )
        } else {
            failure_message(result.error.as_deref().unwrap_or("Unknown error"))
        };

        Ok(TurnOutcome {
            response,
            tool_executed: true,
            tool_result: Some(result),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::mcp::InputSchema;
    use crate::providers::MockCompletionProvider;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records calls and replies with a fixed result.
    struct FakeInvoker {
        result: ExecutionResult,
        calls: Mutex<Vec<(String, Map<String, Value>)>>,
    }

    impl FakeInvoker {
        fn new(result: ExecutionResult) -> Arc<Self> {
            Arc::new(Self {
                result,
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ToolInvoker for FakeInvoker {
        async fn invoke(&self, tool: &str, args: Map<String, Value>, _auth: &AuthContext) -> ExecutionResult {
            self.calls.lock().unwrap().push((tool.to_string(), args));
            self.result.clone()
        }
    }

    fn provider_replying(reply: &'static str) -> SharedProvider {
        let mut mock = MockCompletionProvider::new();
        mock.expect_complete()
            .times(1)
            .returning(move |_, _, _| Ok(reply.to_string()));
        Arc::new(mock)
    }

    fn processor(provider: SharedProvider, invoker: Arc<FakeInvoker>) -> TurnProcessor {
        TurnProcessor::new(provider, invoker, Arc::new(ToolCatalogue::new()))
    }

    fn located_catalogue() -> Arc<ToolCatalogue> {
        let catalogue = Arc::new(ToolCatalogue::new());
        catalogue.publish(vec![
            ToolDefinition::new("search_businesses", "Find businesses near a point").with_schema(
                InputSchema::new()
                    .with_property("keyword", json!({"type": "string"}))
                    .with_property("latitude", json!({"type": "number"}))
                    .with_property("longitude", json!({"type": "number"})),
            ),
            ToolDefinition::new("get_profile", "Current user profile"),
        ]);
        catalogue
    }

    #[test]
    fn test_interpret_tool_call() {
        let (response, directive) = interpret_reply(
            r#"{"tool":"search_businesses","args":{"latitude":10.99,"longitude":76.96,"keyword":"burger"}}"#,
            "burgers",
        );
        assert!(response.message.is_empty());
        assert_eq!(response.actions.len(), 1);
        assert!(response.suggestions.is_empty());
        assert_eq!(directive.unwrap().tool, "search_businesses");
    }

    #[test]
    fn test_interpret_plain_text() {
        let (response, directive) = interpret_reply("I can help you find rides nearby.", "hello");
        assert!(directive.is_none());
        assert_eq!(response.message, "I can help you find rides nearby.");
        assert!(response.tool_call().is_none());
        assert!(!response.suggestions.is_empty());
    }

    #[test]
    fn test_interpret_booking_intent() {
        let (response, _) = interpret_reply("Happy to help with that.", "Book me a cab at 6pm");
        assert_eq!(response.actions, vec![AssistantAction::BookingIntent]);
    }

    #[test]
    fn test_catalogue_publish_sorts() {
        let catalogue = ToolCatalogue::new();
        assert!(catalogue.is_empty());
        catalogue.publish(vec![ToolDefinition::new("b", ""), ToolDefinition::new("a", "")]);
        let names: Vec<String> = catalogue.snapshot().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_plain_text_turn() {
        let invoker = FakeInvoker::new(ExecutionResult::success(None));
        let processor = processor(provider_replying("I can help you find rides nearby."), invoker.clone());

        let outcome = processor
            .process("any rides?", ChatContext::default(), &AuthContext::default())
            .await
            .unwrap();

        assert!(!outcome.tool_executed);
        assert!(outcome.tool_result.is_none());
        assert_eq!(outcome.response.message, "I can help you find rides nearby.");
        assert!(invoker.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tool_turn_formats_result() {
        let invoker = FakeInvoker::new(ExecutionResult::success(Some(json!({
            "structuredContent": {"whistles": []}
        }))));
        let processor = processor(
            provider_replying(r#"{"tool": "list_whistles", "args": {}}"#),
            invoker.clone(),
        );

        let outcome = processor
            .process("show my whistles", ChatContext::default(), &AuthContext::default())
            .await
            .unwrap();

        assert!(outcome.tool_executed);
        assert_eq!(outcome.response.message, "No whistles found.");
        assert_eq!(outcome.response.tool_call().map(|(t, _)| t), Some("list_whistles"));
    }

    #[tokio::test]
    async fn test_tool_turn_merges_location() {
        let invoker = FakeInvoker::new(ExecutionResult::success(Some(json!({"businesses": []}))));
        let processor = TurnProcessor::new(
            provider_replying(r#"{"tool": "search_businesses", "args": {"keyword": "burger"}}"#),
            invoker.clone(),
            located_catalogue(),
        );

        let context = ChatContext::from_value(json!({"location": "10.99,76.96"}));
        processor
            .process("burgers near me", context, &AuthContext::default())
            .await
            .unwrap();

        let calls = invoker.calls.lock().unwrap();
        assert_eq!(calls[0].0, "search_businesses");
        assert_eq!(
            Value::Object(calls[0].1.clone()),
            json!({"keyword": "burger", "latitude": 10.99, "longitude": 76.96})
        );
    }

    #[tokio::test]
    async fn test_location_not_merged_into_tools_without_coordinates() {
        let invoker = FakeInvoker::new(ExecutionResult::success(Some(json!({"name": "Asha"}))));
        let processor = TurnProcessor::new(
            provider_replying(r#"{"tool": "get_profile", "args": {}}"#),
            invoker.clone(),
            located_catalogue(),
        );

        let context = ChatContext::from_value(json!({"location": "10.99,76.96"}));
        processor
            .process("show my profile", context, &AuthContext::default())
            .await
            .unwrap();

        let calls = invoker.calls.lock().unwrap();
        assert_eq!(calls[0].0, "get_profile");
        assert!(calls[0].1.is_empty());
    }

    #[tokio::test]
    async fn test_failed_tool_embeds_error() {
        let invoker = FakeInvoker::new(ExecutionResult::failure("timeout"));
        let processor = processor(
            provider_replying(r#"{"tool": "get_profile", "args": {}}"#),
            invoker,
        );

        let outcome = processor
            .process("what's my email", ChatContext::default(), &AuthContext::default())
            .await
            .unwrap();

        assert!(outcome.tool_executed);
        assert!(outcome.response.message.contains("timeout"));
        assert!(!outcome.tool_result.unwrap().success);
    }

    #[tokio::test]
    async fn test_prompt_includes_catalogue() {
        let mut mock = MockCompletionProvider::new();
        mock.expect_complete()
            .withf(|system, user, _| system.contains("- list_whistles: List whistles") && user == "hi")
            .times(1)
            .returning(|_, _, _| Ok("Hello!".to_string()));

        let catalogue = Arc::new(ToolCatalogue::new());
        catalogue.publish(vec![ToolDefinition::new("list_whistles", "List whistles")]);
        let processor = TurnProcessor::new(
            Arc::new(mock),
            FakeInvoker::new(ExecutionResult::success(None)),
            catalogue,
        );

        let outcome = processor
            .process("hi", ChatContext::default(), &AuthContext::default())
            .await
            .unwrap();
        assert_eq!(outcome.response.message, "Hello!");
    }

    #[tokio::test]
    async fn test_model_error_aborts_turn() {
        let mut mock = MockCompletionProvider::new();
        mock.expect_complete()
            .returning(|_, _, _| Err(ProviderError::Timeout(60_000)));

        let processor = processor(Arc::new(mock), FakeInvoker::new(ExecutionResult::success(None)));
        let err = processor
            .process("hi", ChatContext::default(), &AuthContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AssistantError::Provider(ProviderError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let mut mock = MockCompletionProvider::new();
        mock.expect_complete().never();

        let processor = processor(Arc::new(mock), FakeInvoker::new(ExecutionResult::success(None)));
        let err = processor
            .process("   ", ChatContext::default(), &AuthContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AssistantError::EmptyMessage));
    }
}
