use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// An asymmetric key usable to protect API keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshKeyDescriptor {
    /// Ordinal used to select the key; stable for one listing.
    pub index: usize,
    #[serde(rename = "type")]
    pub key_type: String,
    /// `SHA256:<base64>` fingerprint of the public key.
    pub fingerprint: String,
    pub comment: Option<String>,
}

/// Key types whose signatures are randomized and therefore cannot re-derive
/// the same protection key twice.
pub fn is_supported_key_type(key_type: &str) -> bool {
    !(key_type.starts_with("ecdsa-sha2-nistp") || key_type.starts_with("sk-"))
}

/// OpenSSH-style fingerprint of a public key blob.
pub fn sha256_fingerprint(public_blob: &[u8]) -> String {
    format!("SHA256:{}", STANDARD_NO_PAD.encode(Sha256::digest(public_blob)))
}
