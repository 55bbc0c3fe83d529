// src/config/loader.rs

use std::fs;
use std::path::Path;

use crate::config::model::{DispatcherConfig, RawDispatcherConfig};
use crate::errors::Result;

/// Load a configuration file and return the raw, unvalidated model.
///
/// This only performs TOML deserialization. Use [`load_and_validate`] to
/// also check the values.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawDispatcherConfig> {
    let contents = fs::read_to_string(path.as_ref())?;
    let config: RawDispatcherConfig = toml::from_str(&contents)?;
    Ok(config)
}

/// Load a configuration file and validate it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<DispatcherConfig> {
    let raw = load_from_path(path)?;
    DispatcherConfig::try_from(raw)
}

impl DispatcherConfig {
    /// Parse and validate configuration from a TOML string.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let raw: RawDispatcherConfig = toml::from_str(contents)?;
        Self::try_from(raw)
    }
}
