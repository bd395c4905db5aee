//! In-process key provider.
//!
//! Keys are 32-byte secrets held in memory; a "signature" is the SHA-256 of
//! the secret followed by the signed data, which is deterministic and only
//! computable by a holder of the secret. Useful for embedding the store in
//! programs that manage their own key material, and for tests.

use parking_lot::RwLock;
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use super::{KeyProvider, KeyProviderError};
use crate::domain::models::{sha256_fingerprint, SshKeyDescriptor};

const KEY_TYPE: &str = "memory-sha256";
const PUBLIC_BLOB_CONTEXT: &[u8] = b"pce-credentials memory key v1";

struct MemoryKey {
    comment: Option<String>,
    secret: Zeroizing<[u8; 32]>,
    fingerprint: String,
}

/// Key provider backed by secrets held in process memory.
#[derive(Default)]
pub struct MemoryKeyProvider {
    keys: RwLock<Vec<MemoryKey>>,
}

impl MemoryKeyProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider holding a single key derived from `secret`.
    pub fn with_key(secret: [u8; 32], comment: Option<&str>) -> Self {
        let provider = Self::new();
        provider.add_key(secret, comment);
        provider
    }

    /// Add a key and return its fingerprint. Adding the same secret twice is a no-op.
    pub fn add_key(&self, secret: [u8; 32], comment: Option<&str>) -> String {
        let mut hasher = Sha256::new();
        hasher.update(PUBLIC_BLOB_CONTEXT);
        hasher.update(secret);
        let fingerprint = sha256_fingerprint(&hasher.finalize());

        let mut keys = self.keys.write();
        if !keys.iter().any(|k| k.fingerprint == fingerprint) {
            keys.push(MemoryKey {
                comment: comment.map(str::to_string),
                secret: Zeroizing::new(secret),
                fingerprint: fingerprint.clone(),
            });
        }
        fingerprint
    }

    /// Add a key with a random secret and return its fingerprint.
    pub fn generate_key(&self, comment: Option<&str>) -> String {
        let mut secret = Zeroizing::new([0u8; 32]);
        OsRng.fill_bytes(&mut secret[..]);
        self.add_key(*secret, comment)
    }

    /// Forget a key. Returns whether it was present.
    pub fn remove_key(&self, fingerprint: &str) -> bool {
        let mut keys = self.keys.write();
        let before = keys.len();
        keys.retain(|k| k.fingerprint != fingerprint);
        keys.len() != before
    }
}

impl KeyProvider for MemoryKeyProvider {
    fn list_keys(&self) -> Vec<SshKeyDescriptor> {
        self.keys
            .read()
            .iter()
            .enumerate()
            .map(|(index, key)| SshKeyDescriptor {
                index,
                key_type: KEY_TYPE.to_string(),
                fingerprint: key.fingerprint.clone(),
                comment: key.comment.clone(),
            })
            .collect()
    }

    fn sign(&self, fingerprint: &str, data: &[u8]) -> Result<Vec<u8>, KeyProviderError> {
        let keys = self.keys.read();
        let key = keys
            .iter()
            .find(|k| k.fingerprint == fingerprint)
            .ok_or_else(|| KeyProviderError::KeyNotFound(fingerprint.to_string()))?;

        let mut hasher = Sha256::new();
        hasher.update(&key.secret[..]);
        hasher.update(data);
        Ok(hasher.finalize().to_vec())
    }
}
