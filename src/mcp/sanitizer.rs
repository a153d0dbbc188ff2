// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Argument sanitization against cached tool schemas.
//!
//! Tools unknown to the cache pass through untouched. For known tools only the
//! declared properties survive; everything else is reported as dropped. The
//! authentication key is filled in from the caller's credentials, and only for
//! tools whose schema declares it.

use std::sync::Arc;

use serde_json::{Map, Value};

use super::schema::ToolSchemaStore;
use super::types::AuthContext;

/// Default argument name tools use for the caller's token.
pub const DEFAULT_AUTH_KEY: &str = "token";

/// Arguments after sanitization.
#[derive(Debug, Clone, PartialEq)]
pub struct SanitizedArgs {
    /// Arguments to forward.
    pub arguments: Map<String, Value>,
    /// Keys removed because the schema does not declare them.
    pub dropped: Vec<String>,
    /// Whether a schema was found for the tool.
    pub schema_known: bool,
}

impl SanitizedArgs {
    /// Names of the forwarded keys.
    pub fn sent_keys(&self) -> Vec<&str> {
        self.arguments.keys().map(String::as_str).collect()
    }
}

/// Filters tool arguments against the schema store.
#[derive(Debug, Clone)]
pub struct RequestSanitizer {
    schemas: Arc<ToolSchemaStore>,
    auth_key: String,
}

impl RequestSanitizer {
    pub fn new(schemas: Arc<ToolSchemaStore>) -> Self {
        Self::with_auth_key(schemas, DEFAULT_AUTH_KEY)
    }

    pub fn with_auth_key(schemas: Arc<ToolSchemaStore>, auth_key: impl Into<String>) -> Self {
        Self {
            schemas,
            auth_key: auth_key.into(),
        }
    }

    pub fn auth_key(&self) -> &str {
        &self.auth_key
    }

    /// Sanitize `raw` for `tool_name`.
    pub fn sanitize(&self, tool_name: &str, raw: Map<String, Value>, auth: &AuthContext) -> SanitizedArgs {
        let Some(tool) = self.schemas.lookup(tool_name) else {
            return SanitizedArgs {
                arguments: raw,
                dropped: Vec::new(),
                schema_known: false,
            };
        };

        let schema = &tool.input_schema;
        let mut arguments = Map::new();
        let mut dropped = Vec::new();

        for (key, value) in raw {
            if schema.declares(&key) {
                arguments.insert(key, value);
            } else {
                dropped.push(key);
            }
        }

        if schema.declares(&self.auth_key) {
            if let Some(token) = auth.bare_token() {
                arguments.insert(self.auth_key.clone(), Value::String(token.to_string()));
            }
        }

        SanitizedArgs {
            arguments,
            dropped,
            schema_known: true,
        }
    }
}
