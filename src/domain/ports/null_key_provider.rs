//! Null key provider implementation.
//!
//! Used when no SSH agent is reachable; every encryption request fails with
//! an unavailable key.

use super::{KeyProvider, KeyProviderError};
use crate::domain::models::SshKeyDescriptor;

/// A key provider that holds no keys.
#[derive(Debug, Clone, Default)]
pub struct NullKeyProvider;

impl NullKeyProvider {
    pub fn new() -> Self {
        Self
    }
}

impl KeyProvider for NullKeyProvider {
    fn list_keys(&self) -> Vec<SshKeyDescriptor> {
        Vec::new()
    }

    fn is_available(&self) -> bool {
        false
    }

    fn sign(&self, fingerprint: &str, _data: &[u8]) -> Result<Vec<u8>, KeyProviderError> {
        Err(KeyProviderError::KeyNotFound(fingerprint.to_string()))
    }
}
