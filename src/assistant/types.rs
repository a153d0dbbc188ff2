// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Assistant response types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::mcp::ExecutionResult;

/// Structured hint attached to an assistant reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssistantAction {
    /// The model asked for a tool to be run.
    ToolCall {
        tool: String,
        args: Map<String, Value>,
    },
    /// The conversation looks like the user wants to book something.
    BookingIntent,
}

/// What the client receives for one turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AIResponse {
    pub message: String,
    #[serde(default)]
    pub actions: Vec<AssistantAction>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl AIResponse {
    /// The tool call action, if any.
    pub fn tool_call(&self) -> Option<(&str, &Map<String, Value>)> {
        self.actions.iter().find_map(|action| match action {
            AssistantAction::ToolCall { tool, args } => Some((tool.as_str(), args)),
            AssistantAction::BookingIntent => None,
        })
    }

    pub fn has_booking_intent(&self) -> bool {
        self.actions.contains(&AssistantAction::BookingIntent)
    }
}

/// Result of processing a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnOutcome {
    pub response: AIResponse,
    pub tool_executed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<ExecutionResult>,
}
