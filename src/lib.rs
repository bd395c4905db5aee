//! PCE credential profiles
//!
//! Stores named connection profiles (host, port, organization, API user and
//! API key) for a PCE management API across several JSON registry files, and
//! can protect each API key with a key held in the user's SSH agent.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): credential model, errors and the key provider port
//! - **Service Layer** (`services`): encryption, the registry store, connectivity
//!   tests and the request/response facade
//! - **Infrastructure Layer** (`infrastructure`): configuration, logging, the
//!   SSH agent client and registry file persistence
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use pce_credentials::{AgentKeyProvider, ConfigLoader, CredentialService};
//!
//! let config = ConfigLoader::load()?;
//! let provider = Arc::new(AgentKeyProvider::from_config(&config.encryption));
//! let service = CredentialService::new(&config, provider);
//! for profile in service.list_credentials()? {
//!     println!("{} -> {}:{}", profile.name, profile.fqdn, profile.port);
//! }
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::models::{
    ApiKey, Config, CredentialFields, CredentialPatch, CredentialRecord, CredentialSummary,
    EncryptionEnvelope, SecretAccess, SshKeyDescriptor,
};
pub use domain::ports::{KeyProvider, KeyProviderError, MemoryKeyProvider, NullKeyProvider};
pub use domain::{CredentialError, CredentialResult, ErrorKind};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use infrastructure::ssh_agent::AgentKeyProvider;
pub use services::{
    ConnectivityTester, CredentialService, CredentialStore, EditorSession, EncryptionEngine,
    StorageLocation, TestResult,
};
