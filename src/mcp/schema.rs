// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Tool schema cache.
//!
//! Holds the most recent tool catalogue fetched from the MCP endpoint. The cache
//! is replaced wholesale on every successful refresh and is never patched in
//! place. Staleness is purely time based.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::error::McpError;
use super::types::ToolDefinition;

/// Default age after which an unforced refresh refetches.
pub const DEFAULT_SCHEMA_REFRESH: Duration = Duration::from_secs(300);

/// Something that can produce the authoritative tool list.
#[async_trait]
pub trait ToolSource: Send + Sync {
    /// Whether a session is currently open.
    async fn is_connected(&self) -> bool;

    /// Fetch the tool list from the endpoint.
    async fn fetch_tools(&self) -> Result<Vec<ToolDefinition>, McpError>;
}

/// What a call to [`ToolSchemaStore::refresh`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Cache is younger than the refresh interval.
    Fresh,
    /// No session to fetch from.
    NotConnected,
    /// Cache replaced with this many tools.
    Refreshed(usize),
    /// Fetch failed; previous cache retained.
    Failed(String),
}

#[derive(Debug, Default)]
struct SchemaCache {
    tools: HashMap<String, ToolDefinition>,
    fetched_at: Option<Instant>,
    fetched_at_utc: Option<DateTime<Utc>>,
}

/// In-memory table of tool name to definition.
#[derive(Debug)]
pub struct ToolSchemaStore {
    cache: RwLock<SchemaCache>,
    refresh_interval: Duration,
}

impl Default for ToolSchemaStore {
    fn default() -> Self {
        Self::new(DEFAULT_SCHEMA_REFRESH)
    }
}

impl ToolSchemaStore {
    /// Create an empty store.
    pub fn new(refresh_interval: Duration) -> Self {
        Self {
            cache: RwLock::new(SchemaCache::default()),
            refresh_interval,
        }
    }

    /// Look up a tool definition by name.
    pub fn lookup(&self, name: &str) -> Option<ToolDefinition> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .tools
            .get(name)
            .cloned()
    }

    /// All cached tools, sorted by name.
    pub fn tools(&self) -> Vec<ToolDefinition> {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        let mut tools: Vec<ToolDefinition> = cache.tools.values().cloned().collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    /// Number of cached tools.
    pub fn len(&self) -> usize {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wall-clock time of the last successful fetch.
    pub fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).fetched_at_utc
    }

    /// Whether the cache is older than the refresh interval (or was never filled).
    pub fn is_stale(&self) -> bool {
        match self.cache.read().unwrap_or_else(PoisonError::into_inner).fetched_at {
            Some(at) => at.elapsed() >= self.refresh_interval,
            None => true,
        }
    }

    /// Replace the whole cache.
    pub fn replace(&self, tools: Vec<ToolDefinition>) {
        let tools: HashMap<String, ToolDefinition> =
            tools.into_iter().map(|t| (t.name.clone(), t)).collect();
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        *cache = SchemaCache {
            tools,
            fetched_at: Some(Instant::now()),
            fetched_at_utc: Some(Utc::now()),
        };
    }

    /// Refetch the catalogue from `source` if forced or stale.
    ///
    /// Never fails: fetch errors are logged and the previous cache is kept.
    pub async fn refresh(&self, source: &dyn ToolSource, force: bool) -> RefreshOutcome {
        if !force && !self.is_stale() {
            return RefreshOutcome::Fresh;
        }
        if !source.is_connected().await {
            debug!(force, "Skipping schema refresh, not connected");
            return RefreshOutcome::NotConnected;
        }

        match source.fetch_tools().await {
            Ok(tools) => {
                let count = tools.len();
                self.replace(tools);
                debug!(count, force, "Tool schemas refreshed");
                RefreshOutcome::Refreshed(count)
            }
            Err(e) => {
                warn!(error = %e, "Tool schema refresh failed, keeping previous cache");
                RefreshOutcome::Failed(e.to_string())
            }
        }
    }
}
