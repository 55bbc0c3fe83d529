// src/config/validate.rs

use crate::config::model::{DispatcherConfig, RawDispatcherConfig, SchedulingConfig};
use crate::errors::{DispatchError, Result};

impl TryFrom<RawDispatcherConfig> for DispatcherConfig {
    type Error = DispatchError;

    fn try_from(raw: RawDispatcherConfig) -> std::result::Result<Self, Self::Error> {
        validate_scheduling(&raw.scheduling)?;
        Ok(DispatcherConfig::new_unchecked(raw.scheduling, raw.logging))
    }
}

fn validate_scheduling(cfg: &SchedulingConfig) -> Result<()> {
    if cfg.failure_threshold == 0 {
        return Err(DispatchError::ConfigError(
            "[scheduling].failure_threshold must be >= 1 (got 0)".to_string(),
        ));
    }

    if cfg.interval_offset_ms < 0 {
        return Err(DispatchError::ConfigError(format!(
            "[scheduling].interval_offset_ms must be >= 0 (got {})",
            cfg.interval_offset_ms
        )));
    }

    if cfg.min_alarm_interval_ms < 0 {
        return Err(DispatchError::ConfigError(format!(
            "[scheduling].min_alarm_interval_ms must be >= 0 (got {})",
            cfg.min_alarm_interval_ms
        )));
    }

    if cfg.timeout_event_offset_ms < 0 || cfg.min_timeout_ms <= cfg.timeout_event_offset_ms {
        return Err(DispatchError::ConfigError(format!(
            "[scheduling].min_timeout_ms ({}) must be greater than timeout_event_offset_ms ({}), which must be >= 0",
            cfg.min_timeout_ms, cfg.timeout_event_offset_ms
        )));
    }

    Ok(())
}
