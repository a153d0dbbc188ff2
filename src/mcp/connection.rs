// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! MCP connection manager.
//!
//! Owns the single session to the MCP endpoint. Attempts are single-flight:
//! `connect` takes a dedicated attempt lock, while the state mutex is only held
//! for short reads and writes, so status queries answer `Connecting` during a
//! slow open. Auth headers are an immutable snapshot swapped as a unit; the
//! snapshot in force when an attempt starts is the one the session is opened
//! with.
//!
//! Failed attempts schedule a single background retry after
//! `base_delay * attempt`, up to `max_reconnect_attempts`.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::error::McpError;
use super::schema::{ToolSchemaStore, ToolSource};
use super::transport::{McpSession, McpTransport};
use super::types::{AuthContext, AuthHeaders, ConnectionState, ConnectionStatus, ToolDefinition};

#[cfg(feature = "telemetry")]
use std::time::Instant;

#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;

/// Reconnection and timeout settings.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Failures after which no further automatic retry is scheduled.
    pub max_reconnect_attempts: u32,
    /// Linear backoff base; retry `n` waits `base * n`.
    pub reconnect_base_delay: Duration,
    /// Upper bound on one session-open attempt.
    pub connect_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: 5,
            reconnect_base_delay: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Default)]
struct ConnectionInner {
    state: ConnectionState,
    session: Option<Arc<dyn McpSession>>,
    session_headers: Option<Arc<AuthHeaders>>,
    attempts: u32,
    retry_pending: bool,
    /// Bumped on disconnect so stale retries give up.
    generation: u64,
}

/// Manager for the MCP endpoint session.
pub struct ConnectionManager {
    transport: Arc<dyn McpTransport>,
    schemas: Arc<ToolSchemaStore>,
    config: ConnectionConfig,
    inner: Mutex<ConnectionInner>,
    /// Held for the whole of one connection attempt.
    connect_lock: Mutex<()>,
    auth: RwLock<Arc<AuthHeaders>>,
}

impl ConnectionManager {
    /// Create a disconnected manager.
    pub fn new(
        transport: Arc<dyn McpTransport>,
        schemas: Arc<ToolSchemaStore>,
        config: ConnectionConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            transport,
            schemas,
            config,
            inner: Mutex::new(ConnectionInner::default()),
            connect_lock: Mutex::new(()),
            auth: RwLock::new(Arc::new(AuthHeaders::default())),
        })
    }

    /// Schema store refreshed on every successful connect.
    pub fn schemas(&self) -> &Arc<ToolSchemaStore> {
        &self.schemas
    }

    /// Replace the auth headers used by the next connection attempt.
    ///
    /// An already-open session keeps the headers it was opened with.
    pub fn set_auth(&self, auth: &AuthContext) {
        let headers = Arc::new(AuthHeaders::from_auth(auth));
        debug!(headers = ?headers.names(), "Auth headers replaced");
        *self.auth.write().unwrap_or_else(PoisonError::into_inner) = headers;
    }

    /// Headers the next attempt would use.
    pub fn auth_headers(&self) -> Arc<AuthHeaders> {
        Arc::clone(&self.auth.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Headers the open session was created with, if any.
    pub async fn session_headers(&self) -> Option<Arc<AuthHeaders>> {
        self.inner.lock().await.session_headers.clone()
    }

    /// Current connection state.
    pub async fn state(&self) -> ConnectionState {
        self.inner.lock().await.state
    }

    /// Connected flag and attempt counter.
    pub async fn status(&self) -> ConnectionStatus {
        let inner = self.inner.lock().await;
        ConnectionStatus {
            connected: inner.state == ConnectionState::Connected,
            attempts: inner.attempts,
        }
    }

    /// Open a session unless one is already open.
    ///
    /// On success the attempt counter resets and the schema cache is force
    /// refreshed. On failure one retry is scheduled unless the counter has
    /// reached the maximum. A session opened after a concurrent `disconnect`
    /// is closed again and reported as not connected.
    pub async fn connect(self: &Arc<Self>) -> Result<(), McpError> {
        let _attempt = self.connect_lock.lock().await;

        let (headers, generation) = {
            let mut inner = self.inner.lock().await;
            if inner.state == ConnectionState::Connected {
                return Ok(());
            }
            inner.state = ConnectionState::Connecting;
            (self.auth_headers(), inner.generation)
        };

        #[cfg(feature = "telemetry")]
        let start = Instant::now();

        let timeout = self.config.connect_timeout;
        let opened = match tokio::time::timeout(timeout, self.transport.open(&headers)).await {
            Ok(result) => result,
            Err(_) => Err(McpError::ConnectionTimeout {
                timeout_secs: timeout.as_secs(),
            }),
        };

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_operation("mcp.connect", start.elapsed());

        let mut inner = self.inner.lock().await;
        if inner.generation != generation {
            drop(inner);
            if let Ok(session) = opened {
                if let Err(e) = session.close().await {
                    warn!(error = %e, "Error closing abandoned MCP session");
                }
            }
            debug!("Connection attempt abandoned after disconnect");
            return Err(McpError::NotConnected);
        }

        match opened {
            Ok(session) => {
                inner.state = ConnectionState::Connected;
                inner.session = Some(session);
                inner.session_headers = Some(headers);
                inner.attempts = 0;
                drop(inner);

                info!(endpoint = self.transport.endpoint(), "Connected to MCP server");
                self.schemas.refresh(&**self, true).await;
                Ok(())
            }
            Err(e) => {
                let max = self.config.max_reconnect_attempts;
                inner.state = ConnectionState::Disconnected;
                inner.session = None;
                inner.session_headers = None;
                inner.attempts = (inner.attempts + 1).min(max);

                let attempt = inner.attempts;
                let schedule = attempt < max && !inner.retry_pending;
                if schedule {
                    inner.retry_pending = true;
                }
                drop(inner);

                warn!(
                    endpoint = self.transport.endpoint(),
                    attempt,
                    max,
                    error = %e,
                    "MCP connection failed"
                );

                if schedule {
                    self.schedule_retry(attempt, generation);
                }
                Err(e)
            }
        }
    }

    /// Spawn one delayed reconnect attempt.
    fn schedule_retry(self: &Arc<Self>, attempt: u32, generation: u64) {
        let delay = self.config.reconnect_base_delay * attempt;
        let weak = Arc::downgrade(self);
        debug!(attempt, delay_ms = delay.as_millis() as u64, "Scheduling MCP reconnect");

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(manager) = weak.upgrade() else {
                return;
            };

            {
                let mut inner = manager.inner.lock().await;
                if inner.generation != generation {
                    return;
                }
                inner.retry_pending = false;
            }

            // Failures are logged inside connect and reschedule themselves.
            let _ = manager.connect().await;
        });
    }

    /// Connect if not already connected.
    pub async fn ensure_connected(self: &Arc<Self>) -> Result<(), McpError> {
        if self.state().await == ConnectionState::Connected {
            return Ok(());
        }
        self.connect().await
    }

    /// Close the session. Close errors are logged and swallowed.
    pub async fn disconnect(&self) {
        let session = {
            let mut inner = self.inner.lock().await;
            inner.state = ConnectionState::Disconnected;
            inner.session_headers = None;
            inner.retry_pending = false;
            inner.generation += 1;
            inner.session.take()
        };

        if let Some(session) = session {
            if let Err(e) = session.close().await {
                warn!(error = %e, "Error closing MCP session");
            }
            info!("Disconnected from MCP server");
        }
    }

    async fn current_session(&self) -> Result<Arc<dyn McpSession>, McpError> {
        let inner = self.inner.lock().await;
        match (&inner.state, &inner.session) {
            (ConnectionState::Connected, Some(session)) => Ok(Arc::clone(session)),
            _ => Err(McpError::NotConnected),
        }
    }

    /// Drop the session if it is still the one that just failed at transport level.
    async fn mark_broken(&self, session: &Arc<dyn McpSession>) {
        let mut inner = self.inner.lock().await;
        let same = inner
            .session
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, session));
        if same {
            inner.state = ConnectionState::Disconnected;
            inner.session = None;
            inner.session_headers = None;
            warn!("MCP session marked broken, will reconnect on next use");
        }
    }

    /// Invoke a tool on the open session, bounded by `timeout`.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
        timeout: Duration,
    ) -> Result<Value, McpError> {
        let session = self.current_session().await?;
        let result = match tokio::time::timeout(timeout, session.call_tool(name, arguments)).await {
            Ok(result) => result,
            Err(_) => Err(McpError::ToolCallTimeout {
                tool: name.to_string(),
                timeout_secs: timeout.as_secs(),
            }),
        };

        if let Err(McpError::Transport(_)) = result {
            self.mark_broken(&session).await;
        }
        result
    }
}

#[async_trait]
impl ToolSource for ConnectionManager {
    async fn is_connected(&self) -> bool {
        self.state().await == ConnectionState::Connected
    }

    async fn fetch_tools(&self) -> Result<Vec<ToolDefinition>, McpError> {
        let session = self.current_session().await?;

        #[cfg(feature = "telemetry")]
        let start = Instant::now();

        let result = session.list_tools().await;

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_operation("mcp.list_tools", start.elapsed());

        if let Err(McpError::Transport(_)) = result {
            self.mark_broken(&session).await;
        }
        result
    }
}
