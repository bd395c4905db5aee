//! Domain errors for the credential subsystem.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Every failure a credential operation can surface to the boundary layer.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("A credential named '{0}' already exists")]
    DuplicateName(String),

    #[error("Credential not found: {0}")]
    NotFound(String),

    #[error("Encryption key unavailable: {0}")]
    KeyUnavailable(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Storage error on {}: {message}", path.display())]
    StorageIo { path: PathBuf, message: String },
}

pub type CredentialResult<T> = Result<T, CredentialError>;

/// Stable, transport-neutral classification of a [`CredentialError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    DuplicateName,
    NotFound,
    KeyUnavailable,
    DecryptionFailed,
    StorageIo,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::DuplicateName => "duplicate_name",
            Self::NotFound => "not_found",
            Self::KeyUnavailable => "key_unavailable",
            Self::DecryptionFailed => "decryption_failed",
            Self::StorageIo => "storage_io",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CredentialError {
    pub fn storage(path: impl AsRef<Path>, message: impl fmt::Display) -> Self {
        Self::StorageIo {
            path: path.as_ref().to_path_buf(),
            message: message.to_string(),
        }
    }

    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::DuplicateName(_) => ErrorKind::DuplicateName,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::KeyUnavailable(_) => ErrorKind::KeyUnavailable,
            Self::DecryptionFailed(_) => ErrorKind::DecryptionFailed,
            Self::StorageIo { .. } => ErrorKind::StorageIo,
        }
    }

    /// HTTP-equivalent status the boundary layer relays for this error.
    pub const fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation | ErrorKind::KeyUnavailable => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::DuplicateName => 409,
            ErrorKind::DecryptionFailed => 422,
            ErrorKind::StorageIo => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(CredentialError::Validation("port".into()).status_code(), 400);
        assert_eq!(CredentialError::DuplicateName("pce1".into()).status_code(), 409);
        assert_eq!(CredentialError::NotFound("pce1".into()).status_code(), 404);
        assert_eq!(CredentialError::KeyUnavailable("idx 3".into()).status_code(), 400);
        assert_eq!(CredentialError::DecryptionFailed("tag".into()).status_code(), 422);
        assert_eq!(CredentialError::storage("/tmp/x", "disk full").status_code(), 500);
    }

    #[test]
    fn test_messages_distinguish_kinds() {
        let dup = CredentialError::DuplicateName("pce1".into());
        assert_eq!(dup.to_string(), "A credential named 'pce1' already exists");
        assert_eq!(dup.kind().as_str(), "duplicate_name");

        let io = CredentialError::storage("/tmp/creds.json", "permission denied");
        assert_eq!(
            io.to_string(),
            "Storage error on /tmp/creds.json: permission denied"
        );
    }
}
