// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Background synchronization of the MCP tool catalogue.
//!
//! The synchronizer periodically lists the endpoint's tools and republishes
//! them to the assistant-facing catalogue, but only when the listing actually
//! changed. Two listings are the same when they contain the same tool names and
//! every tool has a structurally equal input schema; order is irrelevant.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::error::McpError;
use super::types::{InputSchema, ToolDefinition};

/// Default period between listing cycles.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(30);

/// Produces the current tool listing.
#[async_trait]
pub trait ToolLister: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<ToolDefinition>, McpError>;
}

/// Receives a changed tool listing.
pub trait ToolPublisher: Send + Sync {
    fn publish(&self, tools: Vec<ToolDefinition>);
}

/// Result of one listing cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Listing differed and was published.
    Published(usize),
    /// Listing matched the last published one.
    Unchanged,
    /// Listing failed; nothing published.
    Failed(String),
}

struct SyncTask {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Keeps a [`ToolPublisher`] in step with a [`ToolLister`].
pub struct RegistrySynchronizer {
    lister: Arc<dyn ToolLister>,
    publisher: Arc<dyn ToolPublisher>,
    interval: Duration,
    last_published: Mutex<Option<Vec<ToolDefinition>>>,
    task: tokio::sync::Mutex<Option<SyncTask>>,
}

impl RegistrySynchronizer {
    pub fn new(
        lister: Arc<dyn ToolLister>,
        publisher: Arc<dyn ToolPublisher>,
        interval: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            lister,
            publisher,
            interval,
            last_published: Mutex::new(None),
            task: tokio::sync::Mutex::new(None),
        })
    }

    /// Whether the periodic task is running.
    pub async fn is_running(&self) -> bool {
        self.task.lock().await.is_some()
    }

    /// Run one listing cycle.
    pub async fn sync_once(&self) -> SyncOutcome {
        let tools = match self.lister.list_tools().await {
            Ok(tools) => tools,
            Err(e) => {
                warn!(error = %e, "Tool listing failed, skipping sync cycle");
                return SyncOutcome::Failed(e.to_string());
            }
        };

        {
            let mut last = self
                .last_published
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if last.as_deref().is_some_and(|prev| same_catalogue(prev, &tools)) {
                debug!(count = tools.len(), "Tool catalogue unchanged");
                return SyncOutcome::Unchanged;
            }
            *last = Some(tools.clone());
        }

        let count = tools.len();
        self.publisher.publish(tools);
        info!(count, "Published tool catalogue");
        SyncOutcome::Published(count)
    }

    /// Run one cycle now, then keep syncing on the interval until stopped.
    ///
    /// Calling `start` while already running does nothing.
    pub async fn start(self: &Arc<Self>) {
        let mut task = self.task.lock().await;
        if task.is_some() {
            return;
        }

        self.sync_once().await;

        let (shutdown, mut rx) = watch::channel(false);
        let weak = Arc::downgrade(self);
        let period = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick fires immediately; the initial cycle already ran.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(sync) = weak.upgrade() else { break };
                        sync.sync_once().await;
                    }
                    changed = rx.changed() => {
                        if changed.is_err() || *rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("Tool sync loop stopped");
        });

        *task = Some(SyncTask { shutdown, handle });
        info!(interval_secs = period.as_secs(), "Tool sync started");
    }

    /// Stop the periodic task. Safe to call when not running.
    pub async fn stop(&self) {
        let Some(task) = self.task.lock().await.take() else {
            return;
        };
        let _ = task.shutdown.send(true);
        if let Err(e) = task.handle.await {
            warn!(error = %e, "Tool sync task ended abnormally");
        }
        info!("Tool sync stopped");
    }
}

/// Same tools by name, and structurally equal schemas for every tool.
///
/// Listing order is ignored; duplicate names count once per definition.
pub fn same_catalogue(a: &[ToolDefinition], b: &[ToolDefinition]) -> bool {
    fn sorted(tools: &[ToolDefinition]) -> Vec<(&str, &InputSchema)> {
        let mut entries: Vec<_> = tools.iter().map(|t| (t.name.as_str(), &t.input_schema)).collect();
        entries.sort_by(|x, y| x.0.cmp(y.0));
        entries
    }
    a.len() == b.len() && sorted(a) == sorted(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct ScriptedLister {
        listings: Mutex<Vec<Result<Vec<ToolDefinition>, McpError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedLister {
        /// Replays `listings` in order, repeating the last one.
        fn new(listings: Vec<Result<Vec<ToolDefinition>, McpError>>) -> Self {
            Self {
                listings: Mutex::new(listings),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ToolLister for ScriptedLister {
        async fn list_tools(&self) -> Result<Vec<ToolDefinition>, McpError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut listings = self.listings.lock().unwrap();
            let next = if listings.len() > 1 {
                listings.remove(0)
            } else {
                match &listings[0] {
                    Ok(tools) => Ok(tools.clone()),
                    Err(e) => Err(McpError::Transport(e.to_string())),
                }
            };
            next
        }
    }

    #[derive(Default)]
    struct CountingPublisher {
        published: Mutex<Vec<Vec<ToolDefinition>>>,
        touched: AtomicBool,
    }

    impl ToolPublisher for CountingPublisher {
        fn publish(&self, tools: Vec<ToolDefinition>) {
            self.touched.store(true, Ordering::SeqCst);
            self.published.lock().unwrap().push(tools);
        }
    }

    fn tool(name: &str, props: &[&str]) -> ToolDefinition {
        let schema = props.iter().fold(InputSchema::new(), |schema, p| {
            schema.with_property(*p, json!({"type": "string"}))
        });
        ToolDefinition::new(name, format!("{} tool", name)).with_schema(schema)
    }

    fn sync_with(
        listings: Vec<Result<Vec<ToolDefinition>, McpError>>,
    ) -> (Arc<RegistrySynchronizer>, Arc<ScriptedLister>, Arc<CountingPublisher>) {
        let lister = Arc::new(ScriptedLister::new(listings));
        let publisher = Arc::new(CountingPublisher::default());
        let sync = RegistrySynchronizer::new(
            lister.clone(),
            publisher.clone(),
            Duration::from_millis(10),
        );
        (sync, lister, publisher)
    }

    #[test]
    fn test_same_catalogue_ignores_order() {
        let a = vec![tool("a", &["x"]), tool("b", &["y"])];
        let b = vec![tool("b", &["y"]), tool("a", &["x"])];
        assert!(same_catalogue(&a, &b));
    }

    #[test]
    fn test_same_catalogue_detects_changes() {
        let base = vec![tool("a", &["x"])];
        assert!(!same_catalogue(&base, &[tool("a", &["x", "z"])]));
        assert!(!same_catalogue(&base, &[tool("a", &["x"]), tool("b", &[])]));
        assert!(!same_catalogue(&base, &[]));
    }

    #[test]
    fn test_same_catalogue_counts_duplicate_names() {
        let base = vec![tool("a", &["x"])];
        let doubled = vec![tool("a", &["x"]), tool("a", &["x"])];
        assert!(!same_catalogue(&base, &doubled));
        assert!(!same_catalogue(&doubled, &base));

        let conflicting = vec![tool("a", &["x"]), tool("a", &["y"])];
        assert!(!same_catalogue(&doubled, &conflicting));
    }

    #[tokio::test]
    async fn test_identical_listing_not_republished() {
        let (sync, _, publisher) = sync_with(vec![
            Ok(vec![tool("a", &["x"]), tool("b", &[])]),
            Ok(vec![tool("b", &[]), tool("a", &["x"])]),
        ]);

        assert_eq!(sync.sync_once().await, SyncOutcome::Published(2));
        assert_eq!(sync.sync_once().await, SyncOutcome::Unchanged);
        assert_eq!(publisher.published.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_new_property_republishes() {
        let (sync, _, publisher) = sync_with(vec![
            Ok(vec![tool("a", &["x"])]),
            Ok(vec![tool("a", &["x", "y"])]),
        ]);

        sync.sync_once().await;
        assert_eq!(sync.sync_once().await, SyncOutcome::Published(1));
        assert_eq!(publisher.published.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_listing_skipped() {
        let (sync, _, publisher) = sync_with(vec![
            Err(McpError::NotConnected),
            Ok(vec![tool("a", &[])]),
        ]);

        assert!(matches!(sync.sync_once().await, SyncOutcome::Failed(_)));
        assert!(!publisher.touched.load(Ordering::SeqCst));
        assert_eq!(sync.sync_once().await, SyncOutcome::Published(1));
    }

    #[tokio::test]
    async fn test_start_runs_immediately_and_periodically() {
        let (sync, lister, publisher) = sync_with(vec![Ok(vec![tool("a", &[])])]);

        sync.start().await;
        assert_eq!(lister.calls.load(Ordering::SeqCst), 1);
        assert_eq!(publisher.published.lock().unwrap().len(), 1);
        assert!(sync.is_running().await);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(lister.calls.load(Ordering::SeqCst) > 1);
        // Unchanged listings are not republished.
        assert_eq!(publisher.published.lock().unwrap().len(), 1);

        sync.stop().await;
        assert!(!sync.is_running().await);
        let calls = lister.calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(lister.calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test]
    async fn test_start_twice_is_noop() {
        let (sync, lister, _) = sync_with(vec![Ok(vec![])]);
        sync.start().await;
        sync.start().await;
        assert_eq!(lister.calls.load(Ordering::SeqCst), 1);
        sync.stop().await;
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let (sync, _, _) = sync_with(vec![Ok(vec![])]);
        sync.stop().await;
        sync.start().await;
        sync.stop().await;
        sync.stop().await;
        assert!(!sync.is_running().await);
    }
}
