// src/config/mod.rs

//! Configuration for the dispatcher.
//!
//! - [`model`]: the TOML-backed data model.
//! - [`loader`]: reading a config file from disk.
//! - [`validate`]: turning the raw model into a checked [`DispatcherConfig`].

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{DispatcherConfig, LogLevel, LoggingConfig, RawDispatcherConfig, SchedulingConfig};
