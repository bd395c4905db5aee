//! Credential profile model and field validation.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::envelope::{EncryptionEnvelope, LEGACY_ENCRYPTED_PREFIX};
use crate::domain::errors::{CredentialError, CredentialResult};

/// Reserved name of the profile assembled from `PYLO_*` environment variables.
pub const ENVIRONMENT_PROFILE_NAME: &str = "ENV";

/// `originating_file` value of the environment profile.
pub const ENVIRONMENT_ORIGIN: &str = "environment";

const MAX_NAME_LEN: usize = 128;

/// The API key of a profile, in whichever representation the caller may see.
#[derive(Clone, PartialEq, Eq)]
pub enum ApiKey {
    /// Stored in clear text.
    Plain(String),
    /// Stored as an encryption envelope; only the encryption engine opens it.
    Encrypted(EncryptionEnvelope),
    /// Withheld from the caller.
    Redacted { encrypted: bool },
}

impl ApiKey {
    pub const fn is_encrypted(&self) -> bool {
        matches!(
            self,
            Self::Encrypted(_) | Self::Redacted { encrypted: true }
        )
    }

    pub const fn envelope(&self) -> Option<&EncryptionEnvelope> {
        match self {
            Self::Encrypted(envelope) => Some(envelope),
            _ => None,
        }
    }

    fn redacted(&self) -> Self {
        Self::Redacted {
            encrypted: self.is_encrypted(),
        }
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(_) => f.write_str("Plain(***)"),
            Self::Encrypted(envelope) => f
                .debug_tuple("Encrypted")
                .field(&envelope.key_fingerprint)
                .finish(),
            Self::Redacted { encrypted } => f
                .debug_struct("Redacted")
                .field("encrypted", encrypted)
                .finish(),
        }
    }
}

/// Whether a read operation may expose the API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecretAccess {
    /// `api_key` is replaced by [`ApiKey::Redacted`].
    #[default]
    Redacted,
    /// `api_key` is returned as stored (plaintext or envelope).
    Full,
}

/// One named connection profile for the remote management API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub name: String,
    pub fqdn: String,
    pub port: u16,
    pub org_id: u32,
    pub api_user: String,
    pub api_key: ApiKey,
    pub verify_ssl: bool,
    /// File persisting this record; set by the store.
    pub originating_file: PathBuf,
}

impl CredentialRecord {
    pub const fn encrypted(&self) -> bool {
        self.api_key.is_encrypted()
    }

    /// Whether this record comes from environment variables rather than a file.
    pub fn is_environment(&self) -> bool {
        self.originating_file == Path::new(ENVIRONMENT_ORIGIN)
    }

    pub fn with_access(mut self, access: SecretAccess) -> Self {
        if access == SecretAccess::Redacted {
            self.api_key = self.api_key.redacted();
        }
        self
    }

    pub fn summary(&self) -> CredentialSummary {
        CredentialSummary::from(self)
    }
}

/// Non-secret view of a record, as returned by listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSummary {
    pub name: String,
    pub fqdn: String,
    pub port: u16,
    pub org_id: u32,
    pub api_user: String,
    pub api_key_encrypted: bool,
    pub verify_ssl: bool,
    pub originating_file: String,
}

impl From<&CredentialRecord> for CredentialSummary {
    fn from(record: &CredentialRecord) -> Self {
        Self {
            name: record.name.clone(),
            fqdn: record.fqdn.clone(),
            port: record.port,
            org_id: record.org_id,
            api_user: record.api_user.clone(),
            api_key_encrypted: record.encrypted(),
            verify_ssl: record.verify_ssl,
            originating_file: record.originating_file.display().to_string(),
        }
    }
}

/// Caller-supplied non-secret fields of a new profile.
///
/// Numeric fields are wide so that out-of-range input reaches validation
/// instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialFields {
    pub fqdn: String,
    pub port: i64,
    pub org_id: i64,
    pub api_user: String,
    #[serde(default = "default_verify_ssl")]
    pub verify_ssl: bool,
}

const fn default_verify_ssl() -> bool {
    true
}

impl CredentialFields {
    /// Build a validated record around an already-prepared API key.
    pub(crate) fn into_record(
        self,
        name: &str,
        api_key: ApiKey,
        originating_file: PathBuf,
    ) -> CredentialResult<CredentialRecord> {
        validate_name(name)?;
        Ok(CredentialRecord {
            name: name.to_string(),
            fqdn: validate_fqdn(&self.fqdn)?,
            port: validate_port(self.port)?,
            org_id: validate_org_id(self.org_id)?,
            api_user: validate_api_user(&self.api_user)?,
            api_key,
            verify_ssl: self.verify_ssl,
            originating_file,
        })
    }

    pub fn validate(&self, name: &str) -> CredentialResult<()> {
        self.clone()
            .into_record(name, ApiKey::Redacted { encrypted: false }, PathBuf::new())
            .map(|_| ())
    }
}

/// Partial update of the mutable, non-secret fields.
///
/// `None` leaves the field as it is; a patch built from [`CredentialFields`]
/// replaces all of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPatch {
    pub fqdn: Option<String>,
    pub port: Option<i64>,
    pub org_id: Option<i64>,
    pub api_user: Option<String>,
    pub verify_ssl: Option<bool>,
}

impl CredentialPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Apply onto `current`, validating every replaced field. Name, API key
    /// and originating file are carried over untouched.
    pub(crate) fn apply(&self, current: &CredentialRecord) -> CredentialResult<CredentialRecord> {
        let mut next = current.clone();
        if let Some(fqdn) = &self.fqdn {
            next.fqdn = validate_fqdn(fqdn)?;
        }
        if let Some(port) = self.port {
            next.port = validate_port(port)?;
        }
        if let Some(org_id) = self.org_id {
            next.org_id = validate_org_id(org_id)?;
        }
        if let Some(api_user) = &self.api_user {
            next.api_user = validate_api_user(api_user)?;
        }
        if let Some(verify_ssl) = self.verify_ssl {
            next.verify_ssl = verify_ssl;
        }
        Ok(next)
    }
}

impl From<CredentialFields> for CredentialPatch {
    fn from(fields: CredentialFields) -> Self {
        Self {
            fqdn: Some(fields.fqdn),
            port: Some(fields.port),
            org_id: Some(fields.org_id),
            api_user: Some(fields.api_user),
            verify_ssl: Some(fields.verify_ssl),
        }
    }
}

pub fn validate_name(name: &str) -> CredentialResult<()> {
    if name.trim().is_empty() {
        return Err(CredentialError::Validation(
            "name cannot be empty".to_string(),
        ));
    }
    if name.trim() != name {
        return Err(CredentialError::Validation(format!(
            "name '{name}' has leading or trailing whitespace"
        )));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(CredentialError::Validation(format!(
            "name is longer than {MAX_NAME_LEN} characters"
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(CredentialError::Validation(
            "name cannot contain control characters".to_string(),
        ));
    }
    Ok(())
}

fn validate_fqdn(fqdn: &str) -> CredentialResult<String> {
    let fqdn = fqdn.trim();
    if fqdn.is_empty() {
        return Err(CredentialError::Validation(
            "fqdn cannot be empty".to_string(),
        ));
    }
    if fqdn.contains("://") || fqdn.contains('/') || fqdn.chars().any(char::is_whitespace) {
        return Err(CredentialError::Validation(format!(
            "fqdn '{fqdn}' must be a bare host name without scheme or path"
        )));
    }
    Ok(fqdn.to_string())
}

pub fn validate_port(port: i64) -> CredentialResult<u16> {
    u16::try_from(port)
        .ok()
        .filter(|p| *p != 0)
        .ok_or_else(|| {
            CredentialError::Validation(format!("port {port} is out of range 1-65535"))
        })
}

pub fn validate_org_id(org_id: i64) -> CredentialResult<u32> {
    u32::try_from(org_id)
        .ok()
        .filter(|id| *id != 0)
        .ok_or_else(|| {
            CredentialError::Validation(format!("org_id {org_id} must be a positive integer"))
        })
}

fn validate_api_user(api_user: &str) -> CredentialResult<String> {
    let api_user = api_user.trim();
    if api_user.is_empty() {
        return Err(CredentialError::Validation(
            "api_user cannot be empty".to_string(),
        ));
    }
    Ok(api_user.to_string())
}

pub fn validate_api_key(api_key: &str) -> CredentialResult<()> {
    if api_key.is_empty() {
        return Err(CredentialError::Validation(
            "api_key cannot be empty".to_string(),
        ));
    }
    if api_key.starts_with(LEGACY_ENCRYPTED_PREFIX) {
        return Err(CredentialError::Validation(format!(
            "api_key cannot start with '{LEGACY_ENCRYPTED_PREFIX}'"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> CredentialFields {
        CredentialFields {
            fqdn: "pce.example.com".to_string(),
            port: 8443,
            org_id: 1,
            api_user: "api_123".to_string(),
            verify_ssl: true,
        }
    }

    #[test]
    fn test_into_record_valid() {
        let record = fields()
            .into_record(
                "pce1",
                ApiKey::Plain("secret".into()),
                PathBuf::from("/tmp/c.json"),
            )
            .unwrap();
        assert_eq!(record.port, 8443);
        assert_eq!(record.org_id, 1);
        assert!(!record.encrypted());
    }

    #[test]
    fn test_port_bounds() {
        assert!(validate_port(0).is_err());
        assert!(validate_port(-1).is_err());
        assert!(validate_port(65_536).is_err());
        assert_eq!(validate_port(1).unwrap(), 1);
        assert_eq!(validate_port(65_535).unwrap(), 65_535);
    }

    #[test]
    fn test_org_id_must_be_positive() {
        assert!(validate_org_id(0).is_err());
        assert!(validate_org_id(-4).is_err());
        assert_eq!(validate_org_id(7).unwrap(), 7);
    }

    #[test]
    fn test_name_rules() {
        assert!(validate_name("").is_err());
        assert!(validate_name("   ").is_err());
        assert!(validate_name(" pce1").is_err());
        assert!(validate_name("pce\n1").is_err());
        assert!(validate_name(&"x".repeat(129)).is_err());
        assert!(validate_name("prod pce (eu)").is_ok());
    }

    #[test]
    fn test_api_key_rules() {
        assert!(validate_api_key("0123456789abcdef").is_ok());
        assert!(validate_api_key("").is_err());
        assert!(validate_api_key("$encrypted$:ssh-Fernet:a:b:c").is_err());
    }

    #[test]
    fn test_fqdn_rejects_urls() {
        let mut f = fields();
        f.fqdn = "https://pce.example.com".to_string();
        let err = f.validate("pce1").unwrap_err();
        assert!(matches!(err, CredentialError::Validation(_)));
    }

    #[test]
    fn test_patch_keeps_secret_and_origin() {
        let record = fields()
            .into_record(
                "pce1",
                ApiKey::Plain("secret".into()),
                PathBuf::from("/tmp/c.json"),
            )
            .unwrap();
        let patch = CredentialPatch {
            port: Some(443),
            verify_ssl: Some(false),
            ..Default::default()
        };
        let next = patch.apply(&record).unwrap();
        assert_eq!(next.port, 443);
        assert!(!next.verify_ssl);
        assert_eq!(next.api_key, record.api_key);
        assert_eq!(next.originating_file, record.originating_file);
        assert_eq!(next.fqdn, record.fqdn);
    }

    #[test]
    fn test_patch_validates_replaced_fields() {
        let record = fields()
            .into_record("pce1", ApiKey::Plain("k".into()), PathBuf::new())
            .unwrap();
        let patch = CredentialPatch {
            port: Some(70_000),
            ..Default::default()
        };
        assert!(patch.apply(&record).is_err());
    }

    #[test]
    fn test_redacted_access_hides_key() {
        let record = fields()
            .into_record("pce1", ApiKey::Plain("secret".into()), PathBuf::new())
            .unwrap();
        let redacted = record.with_access(SecretAccess::Redacted);
        assert_eq!(redacted.api_key, ApiKey::Redacted { encrypted: false });
        assert!(!format!("{redacted:?}").contains("secret"));
    }
}
