//! On-disk format of a credential registry file.
//!
//! A file is a JSON array of entries, written with four-space indentation.
//! Writes go to a temporary sibling which is fsynced and then renamed over
//! the live file, so readers see either the old or the new contents.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::domain::models::{
    ApiKey, CredentialFields, CredentialRecord, EncryptionEnvelope, LEGACY_ENCRYPTED_PREFIX,
};
use crate::domain::{CredentialError, CredentialResult};

/// One profile as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialFileEntry {
    pub name: String,
    pub fqdn: String,
    pub port: i64,
    pub org_id: i64,
    pub api_user: String,
    pub api_key: StoredApiKey,
    #[serde(default)]
    pub api_key_encrypted: bool,
    pub verify_ssl: bool,
}

/// `api_key` is a string when plaintext and an envelope object when encrypted.
/// A string starting with `$encrypted$:` is the older encrypted form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredApiKey {
    Plain(String),
    Envelope(EncryptionEnvelope),
}

impl CredentialFileEntry {
    /// Persisted form of `record`. Redacted keys cannot be written.
    pub fn from_record(record: &CredentialRecord) -> CredentialResult<Self> {
        let api_key = match &record.api_key {
            ApiKey::Plain(key) => StoredApiKey::Plain(key.clone()),
            ApiKey::Encrypted(envelope) if envelope.legacy => {
                StoredApiKey::Plain(envelope.to_legacy())
            }
            ApiKey::Encrypted(envelope) => StoredApiKey::Envelope(envelope.clone()),
            ApiKey::Redacted { .. } => {
                return Err(CredentialError::Validation(format!(
                    "record '{}' has a redacted api_key and cannot be persisted",
                    record.name
                )))
            }
        };
        Ok(Self {
            name: record.name.clone(),
            fqdn: record.fqdn.clone(),
            port: i64::from(record.port),
            org_id: i64::from(record.org_id),
            api_user: record.api_user.clone(),
            api_key_encrypted: record.encrypted(),
            api_key,
            verify_ssl: record.verify_ssl,
        })
    }

    /// Validate and convert into a record owned by `file`.
    pub fn into_record(self, file: &Path) -> CredentialResult<CredentialRecord> {
        let api_key = match (self.api_key, self.api_key_encrypted) {
            // The older form carries no marker of its own
            (StoredApiKey::Plain(key), _) if key.starts_with(LEGACY_ENCRYPTED_PREFIX) => {
                match EncryptionEnvelope::from_legacy(&key) {
                    Some(envelope) => ApiKey::Encrypted(envelope),
                    None => return Err(malformed(file, &self.name, "unreadable encrypted api_key")),
                }
            }
            (StoredApiKey::Plain(key), false) => ApiKey::Plain(key),
            (StoredApiKey::Envelope(envelope), true) => ApiKey::Encrypted(envelope),
            (StoredApiKey::Plain(_), true) => {
                return Err(malformed(
                    file,
                    &self.name,
                    "api_key_encrypted is set but api_key is a plain string",
                ))
            }
            (StoredApiKey::Envelope(_), false) => {
                return Err(malformed(
                    file,
                    &self.name,
                    "api_key is an envelope but api_key_encrypted is not set",
                ))
            }
        };

        let fields = CredentialFields {
            fqdn: self.fqdn,
            port: self.port,
            org_id: self.org_id,
            api_user: self.api_user,
            verify_ssl: self.verify_ssl,
        };
        fields
            .into_record(&self.name, api_key, file.to_path_buf())
            .map_err(|e| malformed(file, &self.name, e))
    }
}

fn malformed(file: &Path, name: &str, reason: impl std::fmt::Display) -> CredentialError {
    CredentialError::storage(file, format!("malformed entry '{name}': {reason}"))
}

/// Accepts the legacy single-object layout as well as an array.
#[derive(Deserialize)]
#[serde(untagged)]
enum FileContents {
    Many(Vec<CredentialFileEntry>),
    One(Box<CredentialFileEntry>),
}

/// Read all entries of `path`. A missing file has no entries.
pub fn read_entries(path: &Path) -> CredentialResult<Vec<CredentialFileEntry>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(CredentialError::storage(path, e)),
    };
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    let contents: FileContents = serde_json::from_str(&raw).map_err(|e| {
        CredentialError::storage(path, format!("not a valid credential file: {e}"))
    })?;
    Ok(match contents {
        FileContents::Many(entries) => entries,
        FileContents::One(entry) => vec![*entry],
    })
}

/// Read and validate every record of `path`.
pub fn read_records(path: &Path) -> CredentialResult<Vec<CredentialRecord>> {
    read_entries(path)?
        .into_iter()
        .map(|entry| entry.into_record(path))
        .collect()
}

/// Atomically replace `path` with `entries`, creating parent directories.
pub fn write_entries(path: &Path, entries: &[CredentialFileEntry]) -> CredentialResult<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(|e| CredentialError::storage(&parent, e))?;

    let mut body = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut body, formatter);
    entries
        .serialize(&mut serializer)
        .map_err(|e| CredentialError::storage(path, e))?;
    body.push(b'\n');

    let mut tmp = NamedTempFile::new_in(&parent).map_err(|e| CredentialError::storage(path, e))?;
    tmp.write_all(&body)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| CredentialError::storage(tmp.path(), e))?;

    // On failure `tmp` is dropped and removed; the live file is untouched
    fail_point::check(path)?;

    tmp.persist(path)
        .map_err(|e| CredentialError::storage(path, e.error))?;
    Ok(())
}


#[cfg(not(test))]
mod fail_point {
    use std::path::Path;

    use crate::domain::CredentialResult;

    #[inline]
    pub(super) fn check(_path: &Path) -> CredentialResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::SCHEME_SSH_CHACHA20_POLY1305;

    fn plain_entry(name: &str) -> CredentialFileEntry {
        CredentialFileEntry {
            name: name.to_string(),
            fqdn: "pce.example.com".to_string(),
            port: 8443,
            org_id: 1,
            api_user: "api_123".to_string(),
            api_key: StoredApiKey::Plain("secret".to_string()),
            api_key_encrypted: false,
            verify_ssl: true,
        }
    }

    fn envelope() -> EncryptionEnvelope {
        EncryptionEnvelope {
            scheme: SCHEME_SSH_CHACHA20_POLY1305.to_string(),
            key_fingerprint: "SHA256:abc".to_string(),
            challenge: "Y2hhbGxlbmdl".to_string(),
            nonce: "bm9uY2U=".to_string(),
            ciphertext: "Y2lwaGVy".to_string(),
            legacy: false,
        }
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_entries(&dir.path().join("none.json")).unwrap().is_empty());
    }

    #[test]
    fn test_write_uses_four_space_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("credentials.json");

        write_entries(&path, &[plain_entry("pce1")]).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.starts_with("[\n    {\n        \"name\": \"pce1\""));
        assert_eq!(read_entries(&path).unwrap(), vec![plain_entry("pce1")]);
    }

    #[test]
    fn test_single_object_file_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        fs::write(
            &path,
            r#"{"name": "solo", "fqdn": "pce.example.com", "port": 443, "org_id": 3,
                "api_user": "api_1", "api_key": "k", "verify_ssl": false}"#,
        )
        .unwrap();

        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "solo");
        assert!(!records[0].verify_ssl);
        assert_eq!(records[0].originating_file, path);
    }

    #[test]
    fn test_missing_verify_ssl_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        fs::write(
            &path,
            r#"[{"name": "pce1", "fqdn": "pce.example.com", "port": 8443, "org_id": 1,
                 "api_user": "api_1", "api_key": "k"}]"#,
        )
        .unwrap();

        assert!(matches!(
            read_records(&path).unwrap_err(),
            CredentialError::StorageIo { .. }
        ));
    }

    #[test]
    fn test_fernet_string_reads_as_encrypted_and_writes_back_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        let raw = "$encrypted$:ssh-Fernet:QUJD:REVG:gAAAAA";
        let mut entry = plain_entry("old");
        entry.api_key = StoredApiKey::Plain(raw.to_string());
        write_entries(&path, &[entry]).unwrap();

        let record = read_records(&path).unwrap().remove(0);
        assert!(record.encrypted());
        let envelope = record.api_key.envelope().unwrap();
        assert_eq!(envelope.scheme, "ssh-Fernet");

        let back = CredentialFileEntry::from_record(&record).unwrap();
        assert_eq!(back.api_key, StoredApiKey::Plain(raw.to_string()));
        assert!(back.api_key_encrypted);
    }

    #[test]
    fn test_envelope_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        let mut entry = plain_entry("enc");
        entry.api_key = StoredApiKey::Envelope(envelope());
        entry.api_key_encrypted = true;

        write_entries(&path, &[entry]).unwrap();
        let records = read_records(&path).unwrap();
        assert_eq!(records[0].api_key, ApiKey::Encrypted(envelope()));
    }

    #[test]
    fn test_marker_mismatch_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        let mut entry = plain_entry("bad");
        entry.api_key_encrypted = true;
        write_entries(&path, &[entry]).unwrap();

        let err = read_records(&path).unwrap_err();
        assert!(matches!(err, CredentialError::StorageIo { .. }));
    }

    #[test]
    fn test_missing_field_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        fs::write(&path, r#"[{"name": "x", "fqdn": "h", "port": 1}]"#).unwrap();

        assert!(matches!(
            read_entries(&path).unwrap_err(),
            CredentialError::StorageIo { .. }
        ));
    }

    #[test]
    fn test_injected_failure_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        write_entries(&path, &[plain_entry("pce1")]).unwrap();
        let before = fs::read(&path).unwrap();

        fail_point::fail_next_write();
        assert!(write_entries(&path, &[plain_entry("pce1"), plain_entry("pce2")]).is_err());

        assert_eq!(fs::read(&path).unwrap(), before);
        let leftovers = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1, "temporary file must be cleaned up");
    }
}
