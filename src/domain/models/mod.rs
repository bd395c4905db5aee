//! Domain models
//!
//! Credential profiles, their encrypted API key envelope, the SSH key
//! descriptors offered for encryption, and configuration.

pub mod config;
pub mod credential;
pub mod envelope;
pub mod ssh_key;

pub use config::{
    Config, ConnectivityConfig, EncryptionConfig, LockConfig, LogFormat, LoggingConfig,
    RotationPolicy, StorageConfig,
};
pub use credential::{
    ApiKey, CredentialFields, CredentialPatch, CredentialRecord, CredentialSummary, SecretAccess,
    ENVIRONMENT_ORIGIN, ENVIRONMENT_PROFILE_NAME,
};
pub use envelope::{
    EncryptionEnvelope, LEGACY_ENCRYPTED_PREFIX, SCHEME_LEGACY_SSH_FERNET,
    SCHEME_SSH_CHACHA20_POLY1305,
};
pub use ssh_key::{is_supported_key_type, sha256_fingerprint, SshKeyDescriptor};
