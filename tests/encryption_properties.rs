use std::sync::Arc;

use pce_credentials::domain::ports::MemoryKeyProvider;
use pce_credentials::services::EncryptionEngine;
use pce_credentials::CredentialError;
use proptest::prelude::*;

fn engine_with_keys(count: u8) -> (EncryptionEngine, Arc<MemoryKeyProvider>) {
    let provider = Arc::new(MemoryKeyProvider::new());
    for i in 0..count {
        provider.add_key([i + 1; 32], None);
    }
    (EncryptionEngine::new(provider.clone()), provider)
}

proptest! {
    /// Property: decrypting what was encrypted yields the original key
    #[test]
    fn prop_round_trip(plaintext in "\\PC{1,64}", key_index in 0usize..3) {
        let (engine, _) = engine_with_keys(3);
        let envelope = engine.encrypt(&plaintext, key_index).unwrap();
        let opened = engine.decrypt(&envelope).unwrap();
        prop_assert_eq!(opened.as_str(), plaintext.as_str());
    }

    /// Property: two encryptions of the same key never share a ciphertext
    #[test]
    fn prop_encryption_is_randomized(plaintext in "[ -~]{1,48}") {
        let (engine, _) = engine_with_keys(1);
        let first = engine.encrypt(&plaintext, 0).unwrap();
        let second = engine.encrypt(&plaintext, 0).unwrap();
        prop_assert_ne!(&first.ciphertext, &second.ciphertext);
        prop_assert_ne!(&first.challenge, &second.challenge);
        prop_assert_eq!(&first.key_fingerprint, &second.key_fingerprint);
    }

    /// Property: an index past the end of the key list never encrypts
    #[test]
    fn prop_out_of_range_index(count in 0u8..4, extra in 0usize..8) {
        let (engine, _) = engine_with_keys(count);
        let result = engine.encrypt("secret", usize::from(count) + extra);
        prop_assert!(matches!(result, Err(CredentialError::KeyUnavailable(_))));
    }
}

#[test]
fn test_envelope_needs_the_sealing_key() {
    let (engine, provider) = engine_with_keys(2);
    let envelope = engine.encrypt("secret", 1).unwrap();

    provider.remove_key(&envelope.key_fingerprint);
    assert!(matches!(
        engine.decrypt(&envelope),
        Err(CredentialError::KeyUnavailable(_))
    ));
}

#[test]
fn test_envelope_opens_with_a_fresh_engine_over_the_same_key() {
    let (engine, _) = engine_with_keys(1);
    let envelope = engine.encrypt("secret", 0).unwrap();

    let (other, _) = engine_with_keys(1);
    assert_eq!(other.decrypt(&envelope).unwrap().as_str(), "secret");
}
