//! Common test utilities for integration tests
//!
//! Every fixture points the registry at a private temporary directory and
//! disables the environment profile, so tests never touch the real
//! `~/.pylo` files or depend on `PYLO_*` variables.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use pce_credentials::domain::models::{Config, CredentialFields};
use pce_credentials::domain::ports::{KeyProvider, MemoryKeyProvider, NullKeyProvider};
use pce_credentials::services::{CreateCredentialRequest, CredentialService, StorageLocation};
use tempfile::TempDir;

/// Create a temporary directory for test isolation
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

pub fn home_file(dir: &TempDir) -> PathBuf {
    dir.path().join("home").join(".pylo").join("credentials.json")
}

pub fn workdir_file(dir: &TempDir) -> PathBuf {
    dir.path().join("work").join("credentials.json")
}

/// Configuration confined to `dir`
pub fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.storage.home_file = Some(home_file(dir));
    config.storage.workdir_file = workdir_file(dir);
    config.storage.environment_profile = false;
    config.lock.timeout_ms = 5_000;
    config.connectivity.timeout_secs = 5;
    config
}

/// Provider holding one deterministic key
pub fn one_key_provider() -> Arc<MemoryKeyProvider> {
    Arc::new(MemoryKeyProvider::with_key([42u8; 32], Some("ops@test")))
}

pub fn service_with(config: &Config, provider: Arc<dyn KeyProvider>) -> CredentialService {
    CredentialService::new(config, provider)
}

/// Service with one encryption key available
pub fn service(dir: &TempDir) -> CredentialService {
    service_with(&test_config(dir), one_key_provider())
}

/// Service with no encryption keys at all
pub fn keyless_service(dir: &TempDir) -> CredentialService {
    service_with(&test_config(dir), Arc::new(NullKeyProvider))
}

pub fn fields(fqdn: &str) -> CredentialFields {
    CredentialFields {
        fqdn: fqdn.to_string(),
        port: 8443,
        org_id: 1,
        api_user: "api_123".to_string(),
        verify_ssl: true,
    }
}

pub fn create_request(name: &str, api_key: &str) -> CreateCredentialRequest {
    CreateCredentialRequest {
        name: name.to_string(),
        fields: fields("pce.example.com"),
        api_key: api_key.to_string(),
        encrypt: false,
        ssh_key_index: None,
        storage_location: StorageLocation::Default,
    }
}

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
