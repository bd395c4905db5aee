//! Configuration management infrastructure
//!
//! Hierarchical configuration using figment:
//! - YAML file loading (per-user and per-project)
//! - Environment variable overrides (`PYLO_*`)
//! - Configuration validation

pub mod loader;

pub use loader::{ConfigError, ConfigLoader};
