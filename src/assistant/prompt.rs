// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! System prompt composition.

use std::fmt::Write as _;

use crate::mcp::ToolDefinition;

use super::context::ChatContext;

const DOMAIN_KNOWLEDGE: &str = "\
You are the Whistle assistant. Whistle helps people discover local businesses, \
arrange rides and post short public requests called whistles.

Answer briefly and in a friendly tone. Never invent businesses, prices or \
whistles; use a tool when the user needs live data.";

const TOOL_INSTRUCTIONS: &str = "\
To use a tool, reply with ONLY a JSON object of the form \
{\"tool\": \"<tool name>\", \"args\": {...}} and nothing else. Use only the \
parameters listed for that tool. Otherwise reply in plain text.";

/// Render the tool catalogue section.
pub fn render_catalogue(tools: &[ToolDefinition]) -> String {
    if tools.is_empty() {
        return "No tools are currently available.".to_string();
    }

    let mut out = String::new();
    for tool in tools {
        let _ = write!(out, "- {}", tool.name);
        if !tool.description.is_empty() {
            let _ = write!(out, ": {}", tool.description);
        }
        out.push('\n');

        for name in tool.input_schema.properties.keys() {
            let _ = write!(out, "  - {}", name);
            if tool.input_schema.is_required(name) {
                out.push_str(" (required)");
            }
            if let Some(description) = tool.input_schema.property_description(name) {
                let _ = write!(out, ": {}", description);
            }
            out.push('\n');
        }
    }
    out.trim_end().to_string()
}

/// Compose the full system prompt for a turn.
pub fn build_system_prompt(tools: &[ToolDefinition], context: &ChatContext) -> String {
    let mut prompt = String::with_capacity(1024);
    prompt.push_str(DOMAIN_KNOWLEDGE);

    prompt.push_str("\n\n## Tools\n");
    prompt.push_str(&render_catalogue(tools));
    prompt.push_str("\n\n");
    prompt.push_str(TOOL_INSTRUCTIONS);

    if !context.is_empty() {
        prompt.push_str("\n\n## Context\n");
        match serde_json::to_string_pretty(context) {
            Ok(json) => prompt.push_str(&json),
            Err(e) => tracing::warn!(error = %e, "Could not render chat context"),
        }
    }

    prompt
}
