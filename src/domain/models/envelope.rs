use serde::{Deserialize, Serialize};

/// Scheme tag of envelopes sealed with an SSH-signature derived ChaCha20-Poly1305 key.
pub const SCHEME_SSH_CHACHA20_POLY1305: &str = "ssh-agent-chacha20poly1305";

/// Prefix of API keys stored in the older single-string form
/// `$encrypted$:<scheme>:<payload>`.
pub const LEGACY_ENCRYPTED_PREFIX: &str = "$encrypted$:";

/// Scheme of the older Fernet form; its payload is
/// `<fingerprint>:<session key>:<token>`.
pub const SCHEME_LEGACY_SSH_FERNET: &str = "ssh-Fernet";

/// Encrypted-at-rest form of an API key.
///
/// Byte fields are standard base64. The store treats the envelope as opaque;
/// only the encryption engine interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionEnvelope {
    pub scheme: String,
    /// Fingerprint of the SSH key that must sign `challenge` to re-derive the key.
    pub key_fingerprint: String,
    pub challenge: String,
    pub nonce: String,
    pub ciphertext: String,
    /// Read from the single-string form and written back in it.
    #[serde(skip)]
    pub legacy: bool,
}

impl EncryptionEnvelope {
    /// Parse `$encrypted$:<scheme>:<payload>`. The payload is kept verbatim in
    /// `ciphertext`.
    pub fn from_legacy(raw: &str) -> Option<Self> {
        let rest = raw.strip_prefix(LEGACY_ENCRYPTED_PREFIX)?;
        let (scheme, payload) = rest.split_once(':').unwrap_or((rest, ""));
        let key_fingerprint = if scheme == SCHEME_LEGACY_SSH_FERNET {
            payload.split(':').next().unwrap_or_default()
        } else {
            ""
        };
        Some(Self {
            scheme: scheme.to_string(),
            key_fingerprint: key_fingerprint.to_string(),
            challenge: String::new(),
            nonce: String::new(),
            ciphertext: payload.to_string(),
            legacy: true,
        })
    }

    /// The single-string form of an envelope read by [`Self::from_legacy`].
    pub fn to_legacy(&self) -> String {
        if self.ciphertext.is_empty() {
            format!("{LEGACY_ENCRYPTED_PREFIX}{}", self.scheme)
        } else {
            format!("{LEGACY_ENCRYPTED_PREFIX}{}:{}", self.scheme, self.ciphertext)
        }
    }
}
