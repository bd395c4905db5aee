//! API key protection derived from an operator-held SSH key.
//!
//! For each encryption a random challenge is signed by the selected key. The
//! signature, which only the private key holder can produce, is stretched with
//! HKDF-SHA256 (salted with the key fingerprint) into a ChaCha20-Poly1305 key.
//! The envelope stores the challenge, so decryption asks the key provider for
//! the same signature again; the derived key itself is never persisted.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use hkdf::Hkdf;
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use tracing::{debug, info, instrument};
use zeroize::Zeroizing;

use crate::domain::models::{
    ApiKey, CredentialRecord, EncryptionEnvelope, SshKeyDescriptor, SCHEME_SSH_CHACHA20_POLY1305,
};
use crate::domain::ports::KeyProvider;
use crate::domain::{CredentialError, CredentialResult};

const CHALLENGE_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;
const HKDF_INFO: &[u8] = b"pce-credentials api-key protection v1";

/// Encrypts and decrypts API keys with keys from a [`KeyProvider`].
#[derive(Clone)]
pub struct EncryptionEngine {
    provider: Arc<dyn KeyProvider>,
}

impl EncryptionEngine {
    pub fn new(provider: Arc<dyn KeyProvider>) -> Self {
        Self { provider }
    }

    pub fn list_keys(&self) -> Vec<SshKeyDescriptor> {
        self.provider.list_keys()
    }

    pub fn is_available(&self) -> bool {
        self.provider.is_available()
    }

    /// The key currently listed at `key_index`.
    pub fn key_at(&self, key_index: usize) -> CredentialResult<SshKeyDescriptor> {
        let keys = self.provider.list_keys();
        if keys.is_empty() {
            return Err(CredentialError::KeyUnavailable(
                "no SSH keys are available for encryption".to_string(),
            ));
        }
        let count = keys.len();
        keys.into_iter()
            .find(|k| k.index == key_index)
            .ok_or_else(|| {
                CredentialError::KeyUnavailable(format!(
                    "SSH key index {key_index} is out of range ({count} keys available)"
                ))
            })
    }

    /// Encrypt with the key listed at `key_index`.
    #[instrument(skip(self, plaintext))]
    pub fn encrypt(&self, plaintext: &str, key_index: usize) -> CredentialResult<EncryptionEnvelope> {
        let key = self.key_at(key_index)?;
        self.encrypt_for(plaintext, &key.fingerprint)
    }

    /// Encrypt with the key identified by `fingerprint`.
    ///
    /// The envelope is decrypted once before being returned, so an envelope
    /// that could not be opened again is never handed out.
    pub fn encrypt_for(
        &self,
        plaintext: &str,
        fingerprint: &str,
    ) -> CredentialResult<EncryptionEnvelope> {
        let mut challenge = [0u8; CHALLENGE_LEN];
        OsRng.fill_bytes(&mut challenge);
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let cipher = self.cipher(fingerprint, &challenge)?;
        let ciphertext = cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext.as_bytes(),
                    aad: fingerprint.as_bytes(),
                },
            )
            .map_err(|_| CredentialError::DecryptionFailed("encryption failed".to_string()))?;

        let envelope = EncryptionEnvelope {
            scheme: SCHEME_SSH_CHACHA20_POLY1305.to_string(),
            key_fingerprint: fingerprint.to_string(),
            challenge: BASE64.encode(challenge),
            nonce: BASE64.encode(nonce),
            ciphertext: BASE64.encode(ciphertext),
            legacy: false,
        };

        if self.decrypt(&envelope)?.as_str() != plaintext {
            return Err(CredentialError::DecryptionFailed(format!(
                "key {fingerprint} does not produce stable signatures"
            )));
        }

        info!(key_fingerprint = %fingerprint, "api key encrypted");
        Ok(envelope)
    }

    /// Recover the plaintext sealed in `envelope`.
    pub fn decrypt(&self, envelope: &EncryptionEnvelope) -> CredentialResult<Zeroizing<String>> {
        if envelope.legacy {
            return Err(CredentialError::DecryptionFailed(format!(
                "unsupported scheme {}; set a new api_key to replace it",
                envelope.scheme
            )));
        }
        if envelope.scheme != SCHEME_SSH_CHACHA20_POLY1305 {
            return Err(CredentialError::DecryptionFailed(format!(
                "unsupported encryption scheme '{}'",
                envelope.scheme
            )));
        }

        let challenge = decode_field("challenge", &envelope.challenge, Some(CHALLENGE_LEN))?;
        let nonce = decode_field("nonce", &envelope.nonce, Some(NONCE_LEN))?;
        let ciphertext = decode_field("ciphertext", &envelope.ciphertext, None)?;

        let cipher = self.cipher(&envelope.key_fingerprint, &challenge)?;
        let plaintext = Zeroizing::new(
            cipher
                .decrypt(
                    Nonce::from_slice(&nonce),
                    Payload {
                        msg: &ciphertext,
                        aad: envelope.key_fingerprint.as_bytes(),
                    },
                )
                .map_err(|_| {
                    CredentialError::DecryptionFailed(
                        "authentication failed (corrupt envelope or wrong key)".to_string(),
                    )
                })?,
        );

        debug!(key_fingerprint = %envelope.key_fingerprint, "api key decrypted");
        std::str::from_utf8(&plaintext)
            .map(|s| Zeroizing::new(s.to_string()))
            .map_err(|_| CredentialError::DecryptionFailed("plaintext is not UTF-8".to_string()))
    }

    /// Plaintext API key of `record`, decrypting when needed.
    pub fn reveal(&self, record: &CredentialRecord) -> CredentialResult<Zeroizing<String>> {
        match &record.api_key {
            ApiKey::Plain(key) => Ok(Zeroizing::new(key.clone())),
            ApiKey::Encrypted(envelope) => self.decrypt(envelope),
            ApiKey::Redacted { .. } => Err(CredentialError::Validation(format!(
                "api_key of '{}' was read without secret access",
                record.name
            ))),
        }
    }

    fn cipher(&self, fingerprint: &str, challenge: &[u8]) -> CredentialResult<ChaCha20Poly1305> {
        let signature = Zeroizing::new(self.provider.sign(fingerprint, challenge)?);
        let key = derive_key(fingerprint, &signature)?;
        ChaCha20Poly1305::new_from_slice(&key[..])
            .map_err(|_| CredentialError::KeyUnavailable("derived key has wrong length".to_string()))
    }
}

fn derive_key(fingerprint: &str, signature: &[u8]) -> CredentialResult<Zeroizing<[u8; KEY_LEN]>> {
    let hk = Hkdf::<Sha256>::new(Some(fingerprint.as_bytes()), signature);
    let mut okm = Zeroizing::new([0u8; KEY_LEN]);
    hk.expand(HKDF_INFO, &mut okm[..])
        .map_err(|_| CredentialError::KeyUnavailable("key derivation failed".to_string()))?;
    Ok(okm)
}

fn decode_field(name: &str, value: &str, expected_len: Option<usize>) -> CredentialResult<Vec<u8>> {
    let bytes = BASE64.decode(value).map_err(|e| {
        CredentialError::DecryptionFailed(format!("envelope {name} is not valid base64: {e}"))
    })?;
    match expected_len {
        Some(len) if bytes.len() != len => Err(CredentialError::DecryptionFailed(format!(
            "envelope {name} has {} bytes, expected {len}",
            bytes.len()
        ))),
        _ => Ok(bytes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{KeyProviderError, MemoryKeyProvider, NullKeyProvider};

    fn engine_with_keys(n: u8) -> (Arc<MemoryKeyProvider>, EncryptionEngine) {
        let provider = Arc::new(MemoryKeyProvider::new());
        for i in 0..n {
            provider.add_key([i + 1; 32], None);
        }
        let engine = EncryptionEngine::new(provider.clone());
        (provider, engine)
    }

    /// Signs with fresh randomness every time, like ECDSA.
    struct RandomizedSigner;

    impl KeyProvider for RandomizedSigner {
        fn list_keys(&self) -> Vec<SshKeyDescriptor> {
            vec![SshKeyDescriptor {
                index: 0,
                key_type: "test-random".to_string(),
                fingerprint: "SHA256:random".to_string(),
                comment: None,
            }]
        }

        fn sign(&self, _fingerprint: &str, _data: &[u8]) -> Result<Vec<u8>, KeyProviderError> {
            let mut sig = vec![0u8; 32];
            OsRng.fill_bytes(&mut sig);
            Ok(sig)
        }
    }

    #[test]
    fn test_round_trip() {
        let (_, engine) = engine_with_keys(1);
        let envelope = engine.encrypt("secret", 0).unwrap();
        assert_eq!(envelope.scheme, SCHEME_SSH_CHACHA20_POLY1305);
        assert!(!envelope.ciphertext.contains("secret"));
        assert_eq!(engine.decrypt(&envelope).unwrap().as_str(), "secret");
    }

    #[test]
    fn test_envelope_binds_selected_key() {
        let (provider, engine) = engine_with_keys(2);
        let envelope = engine.encrypt("secret", 1).unwrap();
        assert_eq!(envelope.key_fingerprint, provider.list_keys()[1].fingerprint);
    }

    #[test]
    fn test_out_of_range_index_is_key_unavailable() {
        let (_, engine) = engine_with_keys(1);
        assert!(matches!(
            engine.encrypt("secret", 1),
            Err(CredentialError::KeyUnavailable(_))
        ));

        let empty = EncryptionEngine::new(Arc::new(NullKeyProvider));
        assert!(!empty.is_available());
        assert!(matches!(
            empty.encrypt("secret", 0),
            Err(CredentialError::KeyUnavailable(_))
        ));
    }

    #[test]
    fn test_removed_key_is_key_unavailable() {
        let (provider, engine) = engine_with_keys(1);
        let envelope = engine.encrypt("secret", 0).unwrap();
        provider.remove_key(&envelope.key_fingerprint);

        assert!(matches!(
            engine.decrypt(&envelope),
            Err(CredentialError::KeyUnavailable(_))
        ));
    }

    #[test]
    fn test_tampered_ciphertext_fails_authentication() {
        let (_, engine) = engine_with_keys(1);
        let mut envelope = engine.encrypt("secret", 0).unwrap();
        let mut bytes = BASE64.decode(&envelope.ciphertext).unwrap();
        bytes[0] ^= 0x01;
        envelope.ciphertext = BASE64.encode(bytes);

        assert!(matches!(
            engine.decrypt(&envelope),
            Err(CredentialError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn test_swapped_fingerprint_fails() {
        let (provider, engine) = engine_with_keys(2);
        let mut envelope = engine.encrypt("secret", 0).unwrap();
        envelope.key_fingerprint = provider.list_keys()[1].fingerprint.clone();

        assert!(matches!(
            engine.decrypt(&envelope),
            Err(CredentialError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn test_malformed_envelope_fields() {
        let (_, engine) = engine_with_keys(1);
        let good = engine.encrypt("secret", 0).unwrap();

        let mut bad_nonce = good.clone();
        bad_nonce.nonce = BASE64.encode([0u8; 4]);
        assert!(matches!(
            engine.decrypt(&bad_nonce),
            Err(CredentialError::DecryptionFailed(_))
        ));

        let mut bad_scheme = good;
        bad_scheme.scheme = "ssh-Fernet".to_string();
        assert!(matches!(
            engine.decrypt(&bad_scheme),
            Err(CredentialError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn test_fernet_string_is_never_revealed() {
        let (_, engine) = engine_with_keys(1);
        let envelope =
            EncryptionEnvelope::from_legacy("$encrypted$:ssh-Fernet:QUJD:REVG:gAAAAA").unwrap();

        match engine.decrypt(&envelope) {
            Err(CredentialError::DecryptionFailed(msg)) => {
                assert!(msg.contains("unsupported scheme ssh-Fernet"), "{msg}");
            }
            other => panic!("expected DecryptionFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_unstable_signatures_are_rejected() {
        let engine = EncryptionEngine::new(Arc::new(RandomizedSigner));
        assert!(matches!(
            engine.encrypt("secret", 0),
            Err(CredentialError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn test_reveal_plain_and_encrypted() {
        let (_, engine) = engine_with_keys(1);
        let mut record = CredentialRecord {
            name: "pce1".to_string(),
            fqdn: "pce.example.com".to_string(),
            port: 8443,
            org_id: 1,
            api_user: "api_123".to_string(),
            api_key: ApiKey::Plain("secret".to_string()),
            verify_ssl: true,
            originating_file: "credentials.json".into(),
        };
        assert_eq!(engine.reveal(&record).unwrap().as_str(), "secret");

        record.api_key = ApiKey::Encrypted(engine.encrypt("secret", 0).unwrap());
        assert_eq!(engine.reveal(&record).unwrap().as_str(), "secret");

        record.api_key = ApiKey::Redacted { encrypted: true };
        assert!(engine.reveal(&record).is_err());
    }
}
