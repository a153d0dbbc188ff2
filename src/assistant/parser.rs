// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Tool-call detection in model replies.
//!
//! A reply asks for a tool when it contains a JSON object with a string `tool`
//! and an object `args`. Strategies run in order and the first match wins:
//! fenced code blocks first, then the whole trimmed reply. Prose around a bare
//! JSON object (outside a fence) is treated as plain text.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallDirective {
    pub tool: String,
    pub args: Map<String, Value>,
}

/// Parsed model reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedReply {
    PlainText(String),
    ToolCall(ToolCallDirective),
}

type Strategy = fn(&str) -> Option<ToolCallDirective>;

const STRATEGIES: &[(&str, Strategy)] = &[
    ("fenced_block", from_fenced_block),
    ("whole_reply", from_whole_reply),
];

static FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[A-Za-z]*[ \t]*\r?\n?(.*?)```").unwrap());

/// Scan a reply for a tool call.
pub fn parse_reply(reply: &str) -> ParsedReply {
    for (name, strategy) in STRATEGIES {
        if let Some(directive) = strategy(reply) {
            tracing::debug!(strategy = *name, tool = %directive.tool, "Tool call detected");
            return ParsedReply::ToolCall(directive);
        }
    }
    ParsedReply::PlainText(reply.trim().to_string())
}

fn from_fenced_block(reply: &str) -> Option<ToolCallDirective> {
    FENCED_BLOCK
        .captures_iter(reply)
        .filter_map(|caps| caps.get(1))
        .find_map(|body| directive_from_json(body.as_str()))
}

fn from_whole_reply(reply: &str) -> Option<ToolCallDirective> {
    directive_from_json(reply)
}

fn directive_from_json(text: &str) -> Option<ToolCallDirective> {
    let text = text.trim();
    if !text.starts_with('{') {
        return None;
    }

    let value: Value = serde_json::from_str(text).ok()?;
    let object = value.as_object()?;
    let tool = object.get("tool")?.as_str()?.trim();
    let args = object.get("args")?.as_object()?;

    if tool.is_empty() {
        return None;
    }

    Some(ToolCallDirective {
        tool: tool.to_string(),
        args: args.clone(),
    })
}
