// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Tracing subscriber setup.

use std::io;

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Crate target used in filter directives.
const CRATE_TARGET: &str = "whistle_gateway";

/// How logs are filtered and rendered. Logs always go to stderr so command
/// output on stdout stays clean.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryConfig {
    /// Level for this crate when `RUST_LOG` is unset.
    pub level: Level,
    /// Emit span close events with timings.
    pub span_timings: bool,
    pub show_source: bool,
    pub ansi_colors: bool,
    /// Explicit directive; wins over `RUST_LOG`.
    pub filter_directive: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            level: Level::WARN,
            span_timings: false,
            show_source: false,
            ansi_colors: true,
            filter_directive: None,
        }
    }
}

impl TelemetryConfig {
    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            span_timings: true,
            show_source: true,
            ..Self::default()
        }
    }

    /// No colours, info level; for running under a supervisor.
    pub fn production() -> Self {
        Self {
            level: Level::INFO,
            ansi_colors: false,
            ..Self::default()
        }
    }

    pub fn testing() -> Self {
        Self {
            level: Level::TRACE,
            span_timings: true,
            show_source: true,
            ansi_colors: false,
            filter_directive: Some(format!("{}=trace", CRATE_TARGET)),
        }
    }

    /// Preset for the command line `--verbose` / `--debug` flags.
    pub fn for_cli(verbose: bool, debug: bool) -> Self {
        if debug {
            Self::development()
        } else if verbose {
            Self::default().with_level(Level::INFO)
        } else {
            Self::default()
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter_directive = Some(filter.into());
        self
    }

    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi_colors = ansi;
        self
    }

    /// Directive used when neither an explicit filter nor `RUST_LOG` applies.
    /// Dependencies stay at `warn`.
    pub fn default_directive(&self) -> String {
        format!("warn,{}={}", CRATE_TARGET, self.level.as_str().to_lowercase())
    }

    fn env_filter(&self) -> EnvFilter {
        let fallback = || EnvFilter::new(self.default_directive());
        match &self.filter_directive {
            Some(directive) => EnvFilter::try_new(directive).unwrap_or_else(|_| fallback()),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback()),
        }
    }
}

/// Held for the life of the process.
#[must_use = "dropping the guard early ends telemetry setup"]
pub struct TelemetryGuard {
    _private: (),
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_telemetry(config: &TelemetryConfig) -> io::Result<TelemetryGuard> {
    let span_events = if config.span_timings {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let fmt_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(config.ansi_colors)
        .with_file(config.show_source)
        .with_line_number(config.show_source)
        .with_span_events(span_events)
        .compact();

    tracing_subscriber::registry()
        .with(config.env_filter())
        .with(fmt_layer)
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

    Ok(TelemetryGuard { _private: () })
}
