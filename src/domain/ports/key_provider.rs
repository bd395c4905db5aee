use crate::domain::errors::CredentialError;
use crate::domain::models::SshKeyDescriptor;

/// Error type for key provider operations
#[derive(Debug, thiserror::Error)]
pub enum KeyProviderError {
    #[error("no key with fingerprint {0}")]
    KeyNotFound(String),

    #[error("key type {0} cannot be used for encryption")]
    UnsupportedKey(String),

    #[error("ssh agent error: {0}")]
    Agent(String),
}

impl From<KeyProviderError> for CredentialError {
    fn from(err: KeyProviderError) -> Self {
        Self::KeyUnavailable(err.to_string())
    }
}

/// Source of asymmetric keys that can protect API keys.
///
/// Private key material never leaves the provider: callers only see
/// descriptors and signatures.
pub trait KeyProvider: Send + Sync {
    /// Enumerate usable keys, indexed in listing order.
    ///
    /// Returns an empty list when the key source is unreachable; that means
    /// "encryption unavailable", not an error.
    fn list_keys(&self) -> Vec<SshKeyDescriptor>;

    /// Whether at least one usable key exists
    fn is_available(&self) -> bool {
        !self.list_keys().is_empty()
    }

    /// Sign `data` with the key identified by `fingerprint`.
    ///
    /// Signatures must be deterministic for a given key and input.
    fn sign(&self, fingerprint: &str, data: &[u8]) -> Result<Vec<u8>, KeyProviderError>;
}
