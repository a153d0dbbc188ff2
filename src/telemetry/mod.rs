// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Logging and metrics for the gateway.
//!
//! - **Tracing**: `tracing` spans and events, rendered to stderr by
//!   [`init_telemetry`]. Each assistant turn runs in a `turn` span carrying a
//!   [`CorrelationId`].
//! - **Metrics**: [`GLOBAL_METRICS`] counts tool calls, MCP and model
//!   round-trips, tokens and turns. Recording is compiled out without the
//!   `telemetry` feature.
//!
//! Never record auth tokens or argument values in span fields; tool calls log
//! argument key names only.

mod correlation;
mod init;
pub mod metrics;

pub use correlation::{CorrelationId, CorrelationIdExt};
pub use init::{init_telemetry, TelemetryConfig, TelemetryGuard};
pub use metrics::{
    GatewayMetrics, LatencyHistogram, MetricsSnapshot, OperationMetrics, ToolMetrics,
    GLOBAL_METRICS,
};
