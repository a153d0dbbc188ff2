// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! In-process gateway metrics.
//!
//! Tool calls, MCP and model round-trips, model token usage and assistant
//! turns are counted here. The `status` command prints a report; nothing is
//! exported over the network.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;

/// Process-wide metrics.
pub static GLOBAL_METRICS: Lazy<GatewayMetrics> = Lazy::new(GatewayMetrics::new);

#[derive(Debug)]
pub struct GatewayMetrics {
    tools: RwLock<BTreeMap<String, ToolMetrics>>,
    operations: RwLock<BTreeMap<String, OperationMetrics>>,
    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
    turns: AtomicU64,
    tool_turns: AtomicU64,
    started: Instant,
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(BTreeMap::new()),
            operations: RwLock::new(BTreeMap::new()),
            prompt_tokens: AtomicU64::new(0),
            completion_tokens: AtomicU64::new(0),
            turns: AtomicU64::new(0),
            tool_turns: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    /// Record one remote tool call.
    pub fn record_tool(&self, name: &str, duration: Duration, success: bool) {
        let mut tools = self.tools.write().unwrap_or_else(PoisonError::into_inner);
        tools.entry(name.to_string()).or_default().record(duration, success);
    }

    /// Record a timed round-trip such as `mcp.connect` or `provider.complete`.
    pub fn record_operation(&self, name: &str, duration: Duration) {
        let mut ops = self.operations.write().unwrap_or_else(PoisonError::into_inner);
        ops.entry(name.to_string()).or_default().record(duration);
    }

    pub fn record_tokens(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
    }

    /// Count an assistant turn.
    pub fn record_turn(&self, tool_executed: bool) {
        self.turns.fetch_add(1, Ordering::Relaxed);
        if tool_executed {
            self.tool_turns.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn tool_metrics(&self, name: &str) -> Option<ToolMetrics> {
        self.tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn operation_metrics(&self, name: &str) -> Option<OperationMetrics> {
        self.operations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tools: self.tools.read().unwrap_or_else(PoisonError::into_inner).clone(),
            operations: self.operations.read().unwrap_or_else(PoisonError::into_inner).clone(),
            prompt_tokens: self.prompt_tokens.load(Ordering::Relaxed),
            completion_tokens: self.completion_tokens.load(Ordering::Relaxed),
            turns: self.turns.load(Ordering::Relaxed),
            tool_turns: self.tool_turns.load(Ordering::Relaxed),
            uptime: self.started.elapsed(),
        }
    }

    pub fn reset(&self) {
        self.tools.write().unwrap_or_else(PoisonError::into_inner).clear();
        self.operations.write().unwrap_or_else(PoisonError::into_inner).clear();
        for counter in [&self.prompt_tokens, &self.completion_tokens, &self.turns, &self.tool_turns] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for GatewayMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-tool call statistics.
#[derive(Debug, Clone, Default)]
pub struct ToolMetrics {
    pub calls: u64,
    pub failures: u64,
    pub total_duration: Duration,
    pub max_duration: Duration,
}

impl ToolMetrics {
    pub fn record(&mut self, duration: Duration, success: bool) {
        self.calls += 1;
        if !success {
            self.failures += 1;
        }
        self.total_duration += duration;
        self.max_duration = self.max_duration.max(duration);
    }

    pub fn avg_duration(&self) -> Duration {
        average(self.total_duration, self.calls)
    }

    /// Fraction of calls that succeeded; 1.0 before any call.
    pub fn success_rate(&self) -> f64 {
        if self.calls == 0 {
            return 1.0;
        }
        (self.calls - self.failures) as f64 / self.calls as f64
    }
}

#[derive(Debug, Clone, Default)]
pub struct OperationMetrics {
    pub count: u64,
    pub total_duration: Duration,
    pub histogram: LatencyHistogram,
}

impl OperationMetrics {
    pub fn record(&mut self, duration: Duration) {
        self.count += 1;
        self.total_duration += duration;
        self.histogram.record(duration);
    }

    pub fn avg_duration(&self) -> Duration {
        average(self.total_duration, self.count)
    }
}

fn average(total: Duration, count: u64) -> Duration {
    match u32::try_from(count) {
        Ok(0) => Duration::ZERO,
        Ok(n) => total / n,
        Err(_) => Duration::from_secs_f64(total.as_secs_f64() / count as f64),
    }
}

/// Fixed-bucket latency histogram sized for network round-trips.
#[derive(Debug, Clone)]
pub struct LatencyHistogram {
    /// Upper bounds in milliseconds; one overflow bucket follows.
    bounds_ms: Vec<u64>,
    counts: Vec<u64>,
}

impl LatencyHistogram {
    pub fn with_bounds(bounds_ms: Vec<u64>) -> Self {
        let counts = vec![0; bounds_ms.len() + 1];
        Self { bounds_ms, counts }
    }

    pub fn record(&mut self, duration: Duration) {
        let ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        let idx = self
            .bounds_ms
            .iter()
            .position(|&bound| ms <= bound)
            .unwrap_or(self.bounds_ms.len());
        self.counts[idx] += 1;
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Upper bound of the bucket holding the `p`th percentile.
    ///
    /// The overflow bucket reports twice the largest bound.
    pub fn percentile(&self, p: f64) -> Duration {
        let total: u64 = self.counts.iter().sum();
        if total == 0 {
            return Duration::ZERO;
        }

        let target = ((total as f64 * p / 100.0).ceil() as u64).max(1);
        let mut seen = 0;
        for (i, &count) in self.counts.iter().enumerate() {
            seen += count;
            if seen >= target {
                let ms = match self.bounds_ms.get(i) {
                    Some(&bound) => bound,
                    None => self.bounds_ms.last().copied().unwrap_or(0) * 2,
                };
                return Duration::from_millis(ms);
            }
        }
        Duration::ZERO
    }

    pub fn p50(&self) -> Duration {
        self.percentile(50.0)
    }

    pub fn p95(&self) -> Duration {
        self.percentile(95.0)
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::with_bounds(vec![10, 50, 100, 250, 500, 1_000, 2_500, 5_000, 10_000, 30_000])
    }
}

/// Point-in-time copy of [`GatewayMetrics`].
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub tools: BTreeMap<String, ToolMetrics>,
    pub operations: BTreeMap<String, OperationMetrics>,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub turns: u64,
    pub tool_turns: u64,
    pub uptime: Duration,
}

impl MetricsSnapshot {
    pub fn format_report(&self) -> String {
        let mut report = String::new();
        let _ = writeln!(report, "Uptime: {:.1?}", self.uptime);
        let _ = writeln!(report, "Turns: {} ({} with tool calls)", self.turns, self.tool_turns);
        let _ = writeln!(
            report,
            "Model tokens: {} prompt, {} completion",
            self.prompt_tokens, self.completion_tokens
        );

        if !self.tools.is_empty() {
            report.push_str("\nTools:\n");
            for (name, m) in &self.tools {
                let _ = writeln!(
                    report,
                    "  {}: {} calls, {:.0}% ok, avg {:.1?}, max {:.1?}",
                    name,
                    m.calls,
                    m.success_rate() * 100.0,
                    m.avg_duration(),
                    m.max_duration
                );
            }
        }

        if !self.operations.is_empty() {
            report.push_str("\nRound-trips:\n");
            for (name, m) in &self.operations {
                let _ = writeln!(
                    report,
                    "  {}: {} ops, avg {:.1?}, p95 <= {:?}",
                    name,
                    m.count,
                    m.avg_duration(),
                    m.histogram.p95()
                );
            }
        }

        report
    }
}
