// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Model Context Protocol (MCP) client side of the gateway.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐      ┌────────────────────────┐
//! │ RegistrySynchronizer │─────▶│      ToolExecutor      │
//! └──────────────────────┘      │ ensure → refresh →     │
//!                               │ sanitize → invoke      │
//!                               └───────────┬────────────┘
//!                                           │
//!              ┌────────────────────────────▼───────────┐
//!              │           ConnectionManager            │
//!              │  state · retries · auth snapshot       │
//!              └──────┬──────────────────────┬──────────┘
//!                     │                      │
//!              ┌──────▼───────┐      ┌───────▼────────┐
//!              │ HttpTransport │      │ToolSchemaStore │
//!              └──────────────┘      └────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use whistle_gateway::mcp::*;
//!
//! let schemas = Arc::new(ToolSchemaStore::default());
//! let transport = Arc::new(HttpTransport::new("http://localhost:3001/mcp")?);
//! let connection = ConnectionManager::new(transport, schemas.clone(), ConnectionConfig::default());
//! let executor = ToolExecutor::new(connection, RequestSanitizer::new(schemas));
//!
//! let result = executor.execute("list_whistles", Default::default(), &AuthContext::default()).await;
//! ```

pub mod connection;
pub mod error;
pub mod executor;
pub mod sanitizer;
pub mod schema;
pub mod sync;
pub mod transport;
pub mod types;

pub use connection::{ConnectionConfig, ConnectionManager};
pub use error::McpError;
pub use executor::{ToolExecutor, DEFAULT_TOOL_TIMEOUT};
pub use sanitizer::{RequestSanitizer, SanitizedArgs, DEFAULT_AUTH_KEY};
pub use schema::{RefreshOutcome, ToolSchemaStore, ToolSource, DEFAULT_SCHEMA_REFRESH};
pub use sync::{RegistrySynchronizer, SyncOutcome, ToolLister, ToolPublisher, DEFAULT_SYNC_INTERVAL};
pub use transport::{HttpTransport, McpSession, McpTransport};
pub use types::*;
