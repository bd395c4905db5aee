use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::models::config::Config;

/// Prefix of environment variables that override configuration
pub const ENV_PREFIX: &str = "PYLO_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid connectivity timeout: {0}. Must be at least 1 second")]
    InvalidTimeout(u64),

    #[error("Invalid connectivity scheme: {0}. Must be one of: http, https")]
    InvalidScheme(String),

    #[error("Invalid lock timeout: {0}. Must be at least 1 millisecond")]
    InvalidLockTimeout(u64),

    #[error(
        "Invalid lock backoff configuration: initial_backoff_ms ({0}) must not exceed max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. ~/.pylo/config.yaml (per-user)
    /// 3. .pylo/config.yaml (working directory)
    /// 4. Environment variables (PYLO_* prefix, `__` separates nested keys)
    pub fn load() -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if let Some(user_config) = Self::user_config_path() {
            figment = figment.merge(Yaml::file(user_config));
        }

        let config: Config = figment
            .merge(Yaml::file(".pylo/config.yaml"))
            .merge(Self::env_provider())
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honouring env overrides
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("Config file {} does not exist", path.display());
        }

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .merge(Self::env_provider())
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn user_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".pylo").join("config.yaml"))
    }

    /// `PYLO_FQDN`, `PYLO_API_KEY` and friends describe the environment
    /// profile, not configuration, so only known top-level keys are mapped.
    fn env_provider() -> Env {
        Env::prefixed(ENV_PREFIX).split("__").filter(|key| {
            let key = key.as_str().to_ascii_lowercase();
            key == "credential_file"
                || ["storage", "lock", "connectivity", "encryption", "logging"]
                    .iter()
                    .any(|section| {
                        key.strip_prefix(section)
                            .is_some_and(|rest| rest.starts_with("__") || rest.starts_with('.'))
                    })
        })
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        if config.connectivity.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout(config.connectivity.timeout_secs));
        }

        if !["http", "https"].contains(&config.connectivity.scheme.as_str()) {
            return Err(ConfigError::InvalidScheme(
                config.connectivity.scheme.clone(),
            ));
        }

        if config.lock.timeout_ms == 0 {
            return Err(ConfigError::InvalidLockTimeout(config.lock.timeout_ms));
        }

        if config.lock.initial_backoff_ms > config.lock.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.lock.initial_backoff_ms,
                config.lock.max_backoff_ms,
            ));
        }

        if config.storage.workdir_file.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "storage.workdir_file cannot be empty".to_string(),
            ));
        }

        if config
            .credential_file
            .as_ref()
            .is_some_and(|p| p.as_os_str().is_empty())
        {
            return Err(ConfigError::ValidationFailed(
                "credential_file cannot be empty when set".to_string(),
            ));
        }

        Ok(())
    }
}
