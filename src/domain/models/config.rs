use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Extra credential file, searched first and used as the default create target
    #[serde(default)]
    pub credential_file: Option<PathBuf>,

    /// Registry file locations
    #[serde(default)]
    pub storage: StorageConfig,

    /// Registry lock acquisition policy
    #[serde(default)]
    pub lock: LockConfig,

    /// Connectivity test settings
    #[serde(default)]
    pub connectivity: ConnectivityConfig,

    /// Key provider settings
    #[serde(default)]
    pub encryption: EncryptionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Registry file locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StorageConfig {
    /// Per-user credential file (default: `~/.pylo/credentials.json`)
    #[serde(default)]
    pub home_file: Option<PathBuf>,

    /// Credential file relative to the working directory
    #[serde(default = "default_workdir_file")]
    pub workdir_file: PathBuf,

    /// Expose the read-only `ENV` profile built from `PYLO_*` variables
    #[serde(default = "default_true")]
    pub environment_profile: bool,
}

fn default_workdir_file() -> PathBuf {
    PathBuf::from("credentials.json")
}

const fn default_true() -> bool {
    true
}

impl StorageConfig {
    /// Resolved per-user credential file
    pub fn resolved_home_file(&self) -> PathBuf {
        self.home_file.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".pylo")
                .join("credentials.json")
        })
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            home_file: None,
            workdir_file: default_workdir_file(),
            environment_profile: true,
        }
    }
}

/// Registry lock acquisition policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LockConfig {
    /// Give up on a contended lock after this many milliseconds
    #[serde(default = "default_lock_timeout_ms")]
    pub timeout_ms: u64,

    /// Initial backoff between lock attempts in milliseconds
    #[serde(default = "default_lock_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff between lock attempts in milliseconds
    #[serde(default = "default_lock_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

const fn default_lock_timeout_ms() -> u64 {
    5_000
}

const fn default_lock_initial_backoff_ms() -> u64 {
    25
}

const fn default_lock_max_backoff_ms() -> u64 {
    500
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_lock_timeout_ms(),
            initial_backoff_ms: default_lock_initial_backoff_ms(),
            max_backoff_ms: default_lock_max_backoff_ms(),
        }
    }
}

/// Connectivity test settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ConnectivityConfig {
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// URL scheme of the management API (http or https)
    #[serde(default = "default_scheme")]
    pub scheme: String,
}

const fn default_timeout_secs() -> u64 {
    10
}

fn default_scheme() -> String {
    "https".to_string()
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            scheme: default_scheme(),
        }
    }
}

/// Key provider settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EncryptionConfig {
    /// SSH agent socket; falls back to `SSH_AUTH_SOCK` when unset
    #[serde(default)]
    pub agent_socket: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,

    /// Directory for rolling log files (stderr only when unset)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Log file rotation policy
    #[serde(default)]
    pub rotation: RotationPolicy,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            log_dir: None,
            rotation: RotationPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    #[default]
    Daily,
    Hourly,
    Never,
}
