// src/config/model.rs

use std::fmt;

use serde::Deserialize;

/// Dispatcher configuration as read from a TOML file.
///
/// ```toml
/// [scheduling]
/// interval_offset_ms = 30000
/// min_timeout_ms = 60000
/// timeout_event_offset_ms = 5000
/// min_alarm_interval_ms = 60000
/// failure_threshold = 3
///
/// [logging]
/// level = "info"
/// ```
///
/// Every section and key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawDispatcherConfig {
    #[serde(default)]
    pub scheduling: SchedulingConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Validated configuration. Build it through `TryFrom<RawDispatcherConfig>`.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub scheduling: SchedulingConfig,
    pub logging: LoggingConfig,
}

impl DispatcherConfig {
    pub(crate) fn new_unchecked(scheduling: SchedulingConfig, logging: LoggingConfig) -> Self {
        Self {
            scheduling,
            logging,
        }
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::new_unchecked(SchedulingConfig::default(), LoggingConfig::default())
    }
}

/// `[scheduling]` section. All durations are milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulingConfig {
    /// Tolerance for early wake-ups.
    #[serde(default = "default_interval_offset_ms")]
    pub interval_offset_ms: i64,

    /// Shortest execution window opened on a wake-up.
    #[serde(default = "default_min_timeout_ms")]
    pub min_timeout_ms: i64,

    /// The timeout event fires this long before the window closes.
    #[serde(default = "default_timeout_event_offset_ms")]
    pub timeout_event_offset_ms: i64,

    /// The wake alarm is never armed closer than this.
    #[serde(default = "default_min_alarm_interval_ms")]
    pub min_alarm_interval_ms: i64,

    /// One-shot tasks are abandoned once a failure counter exceeds this.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
}

fn default_interval_offset_ms() -> i64 {
    30_000
}

fn default_min_timeout_ms() -> i64 {
    60_000
}

fn default_timeout_event_offset_ms() -> i64 {
    5_000
}

fn default_min_alarm_interval_ms() -> i64 {
    60_000
}

fn default_failure_threshold() -> u32 {
    3
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            interval_offset_ms: default_interval_offset_ms(),
            min_timeout_ms: default_min_timeout_ms(),
            timeout_event_offset_ms: default_timeout_event_offset_ms(),
            min_alarm_interval_ms: default_min_alarm_interval_ms(),
            failure_threshold: default_failure_threshold(),
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: Option<LogLevel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        };
        f.write_str(s)
    }
}
