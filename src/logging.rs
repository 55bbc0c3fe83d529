// src/logging.rs

//! Logging setup using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log level:
//! 1. an explicit level passed by the host application
//! 2. the `TASKDAG_LOG` environment variable (e.g. "info", "debug")
//! 3. `[logging].level` from the dispatcher config
//! 4. default to `info`
//!
//! Logs go to STDERR.

use tracing_subscriber::fmt;

use crate::config::{LogLevel, LoggingConfig};
use crate::errors::{DispatchError, Result};

/// Install the global logging subscriber.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(explicit: Option<LogLevel>, config: &LoggingConfig) -> Result<()> {
    let level = resolve_level(
        explicit,
        std::env::var("TASKDAG_LOG").ok().as_deref(),
        config.level,
    );

    fmt()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| DispatchError::Other(anyhow::anyhow!(err)))
}

/// Pick the effective level from the three possible sources.
pub fn resolve_level(
    explicit: Option<LogLevel>,
    env: Option<&str>,
    configured: Option<LogLevel>,
) -> tracing::Level {
    explicit
        .map(level_from_log_level)
        .or_else(|| env.and_then(parse_level_str))
        .or_else(|| configured.map(level_from_log_level))
        .unwrap_or(tracing::Level::INFO)
}

fn level_from_log_level(lvl: LogLevel) -> tracing::Level {
    match lvl {
        LogLevel::Error => tracing::Level::ERROR,
        LogLevel::Warn => tracing::Level::WARN,
        LogLevel::Info => tracing::Level::INFO,
        LogLevel::Debug => tracing::Level::DEBUG,
        LogLevel::Trace => tracing::Level::TRACE,
    }
}

fn parse_level_str(s: &str) -> Option<tracing::Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(tracing::Level::ERROR),
        "warn" | "warning" => Some(tracing::Level::WARN),
        "info" => Some(tracing::Level::INFO),
        "debug" => Some(tracing::Level::DEBUG),
        "trace" => Some(tracing::Level::TRACE),
        _ => None,
    }
}
