// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Tool-specific response formatting.
//!
//! A [`FormatterRegistry`] maps tool names to functions that turn a payload
//! into user-facing text. Tools without a registered formatter use the
//! default: the payload's `message` if present, else the pretty-printed payload.

use std::collections::HashMap;

use serde_json::Value;

/// Inputs a formatter may look at besides the payload.
#[derive(Debug, Clone, Copy)]
pub struct FormatContext<'a> {
    pub user_message: &'a str,
}

/// Turns a tool payload into reply text.
pub type Formatter = fn(&Value, &FormatContext<'_>) -> String;

pub struct FormatterRegistry {
    formatters: HashMap<String, Formatter>,
    fallback: Formatter,
}

impl FormatterRegistry {
    /// Registry with only the default formatter.
    pub fn empty() -> Self {
        Self {
            formatters: HashMap::new(),
            fallback: format_default,
        }
    }

    /// Register a formatter, replacing any previous one for the tool.
    pub fn register(&mut self, tool: impl Into<String>, formatter: Formatter) -> &mut Self {
        self.formatters.insert(tool.into(), formatter);
        self
    }

    pub fn has(&self, tool: &str) -> bool {
        self.formatters.contains_key(tool)
    }

    pub fn format(&self, tool: &str, payload: &Value, ctx: &FormatContext<'_>) -> String {
        let formatter = self.formatters.get(tool).copied().unwrap_or(self.fallback);
        formatter(payload, ctx)
    }
}

impl Default for FormatterRegistry {
    /// Registry with the Whistle tool formatters.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry
            .register("search_businesses", format_businesses)
            .register("list_whistles", format_whistles)
            .register("get_profile", format_profile);
        for tool in ["create_whistle", "update_whistle", "delete_whistle", "toggle_visibility"] {
            registry.register(tool, format_message_echo);
        }
        registry
    }
}

/// `message` if present, else pretty JSON.
pub fn format_default(payload: &Value, _ctx: &FormatContext<'_>) -> String {
    if let Some(message) = message_of(payload) {
        return message.to_string();
    }
    serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string())
}

fn format_message_echo(payload: &Value, ctx: &FormatContext<'_>) -> String {
    format_default(payload, ctx)
}

fn message_of(payload: &Value) -> Option<&str> {
    payload.get("message").and_then(Value::as_str)
}

/// The list under one of `keys`, or the payload itself when it is an array.
fn list_of<'a>(payload: &'a Value, keys: &[&str]) -> Option<&'a Vec<Value>> {
    if let Some(items) = payload.as_array() {
        return Some(items);
    }
    keys.iter().find_map(|k| payload.get(*k).and_then(Value::as_array))
}

fn str_field<'a>(item: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| item.get(*k).and_then(Value::as_str))
        .filter(|s| !s.trim().is_empty())
}

fn numbered(lines: impl Iterator<Item = String>) -> String {
    lines
        .enumerate()
        .map(|(i, line)| format!("{}. {}", i + 1, line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_businesses(payload: &Value, _ctx: &FormatContext<'_>) -> String {
    let Some(items) = list_of(payload, &["businesses", "results", "data"]) else {
        return message_of(payload)
            .unwrap_or("No businesses found nearby.")
            .to_string();
    };
    if items.is_empty() {
        return "No businesses found nearby.".to_string();
    }

    numbered(items.iter().map(|item| {
        let mut line = str_field(item, &["name", "title"]).unwrap_or("Unnamed business").to_string();
        if let Some(category) = str_field(item, &["category", "type"]) {
            line.push_str(&format!(" ({})", category));
        }
        if let Some(address) = str_field(item, &["address", "location"]) {
            line.push_str(&format!(" - {}", address));
        }
        if let Some(distance) = item.get("distance").and_then(Value::as_f64) {
            line.push_str(&format!(", {:.1} km away", distance));
        }
        line
    }))
}

fn format_whistles(payload: &Value, _ctx: &FormatContext<'_>) -> String {
    let Some(items) = list_of(payload, &["whistles", "results", "data"]) else {
        return message_of(payload).unwrap_or("No whistles found.").to_string();
    };
    if items.is_empty() {
        return "No whistles found.".to_string();
    }

    numbered(items.iter().map(|item| {
        let mut line = str_field(item, &["title", "name", "text"]).unwrap_or("Untitled whistle").to_string();
        if let Some(description) = str_field(item, &["description"]) {
            line.push_str(&format!(" - {}", description));
        }
        match item.get("isVisible").or_else(|| item.get("visible")).and_then(Value::as_bool) {
            Some(true) => line.push_str(" [visible]"),
            Some(false) => line.push_str(" [hidden]"),
            None => {}
        }
        line
    }))
}

/// Keyword in the user's message, label, and the profile fields that answer it.
const PROFILE_FIELDS: &[(&str, &str, &[&str])] = &[
    ("email", "email", &["email"]),
    ("phone", "phone number", &["phone", "phoneNumber", "mobile"]),
    ("number", "phone number", &["phone", "phoneNumber", "mobile"]),
    ("name", "name", &["name", "displayName", "fullName"]),
    ("address", "address", &["address", "location"]),
    ("bio", "bio", &["bio", "about"]),
];

const PROFILE_SUMMARY: &[(&str, &[&str])] = &[
    ("Name", &["name", "displayName", "fullName"]),
    ("Email", &["email"]),
    ("Phone", &["phone", "phoneNumber", "mobile"]),
    ("Address", &["address", "location"]),
    ("Bio", &["bio", "about"]),
];

fn format_profile(payload: &Value, ctx: &FormatContext<'_>) -> String {
    let profile = ["profile", "user"]
        .iter()
        .find_map(|k| payload.get(*k).filter(|v| v.is_object()))
        .unwrap_or(payload);

    let asked = ctx.user_message.to_lowercase();
    for (keyword, label, keys) in PROFILE_FIELDS {
        if asked.contains(keyword) {
            if let Some(value) = str_field(profile, keys) {
                return format!("Your {} is {}.", label, value);
            }
        }
    }

    let lines: Vec<String> = PROFILE_SUMMARY
        .iter()
        .filter_map(|(label, keys)| str_field(profile, keys).map(|v| format!("{}: {}", label, v)))
        .collect();

    if lines.is_empty() {
        return format_default(payload, ctx);
    }
    format!("Here is your profile:\n{}", lines.join("\n"))
}
