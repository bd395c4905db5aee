//! Per-session editor state.
//!
//! Each interactive session owns its key snapshot, its encryption choice and
//! its pending deletion, so concurrent sessions never see each other's
//! selections.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::credential_service::{
    CreateCredentialRequest, CredentialService, EncryptionStatus, UpdateCredentialRequest,
};
use super::credential_store::StorageLocation;
use crate::domain::models::{CredentialFields, CredentialPatch, SshKeyDescriptor};
use crate::domain::{CredentialError, CredentialResult};

/// Whether the editor offers encryption and what the user chose.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EncryptionOffer {
    /// No usable key; the encrypt option is hidden.
    #[default]
    NotOffered,
    /// Option shown, not selected.
    Unchecked,
    /// Option selected; the key selector is shown.
    Checked { key_index: usize },
}

impl EncryptionOffer {
    pub const fn from_status(status: EncryptionStatus) -> Self {
        if status.available {
            Self::Unchecked
        } else {
            Self::NotOffered
        }
    }

    /// Tick or untick the encrypt option. Ignored when not offered.
    #[must_use]
    pub const fn toggle(self, checked: bool) -> Self {
        match (self, checked) {
            (Self::NotOffered, _) => Self::NotOffered,
            (Self::Checked { key_index }, true) => Self::Checked { key_index },
            (_, true) => Self::Checked { key_index: 0 },
            (_, false) => Self::Unchecked,
        }
    }

    /// Choose a key. Only meaningful once encryption is checked.
    #[must_use]
    pub const fn select_key(self, key_index: usize) -> Self {
        match self {
            Self::Checked { .. } => Self::Checked { key_index },
            other => other,
        }
    }

    pub const fn shows_key_selector(self) -> bool {
        matches!(self, Self::Checked { .. })
    }

    pub const fn key_index(self) -> Option<usize> {
        match self {
            Self::Checked { key_index } => Some(key_index),
            _ => None,
        }
    }
}

/// State of one editor session.
#[derive(Debug, Clone, Default)]
pub struct EditorSession {
    keys: Vec<SshKeyDescriptor>,
    offer: EncryptionOffer,
    pending_delete: Option<String>,
}

impl EditorSession {
    /// Start a session with a fresh key snapshot.
    pub fn open(service: &CredentialService) -> Self {
        let mut session = Self::default();
        session.refresh_keys(service);
        session
    }

    /// Re-read the available keys. A selection that no longer resolves
    /// falls back to unchecked.
    pub fn refresh_keys(&mut self, service: &CredentialService) {
        self.keys = service.list_ssh_keys().0;
        let status = EncryptionStatus {
            available: !self.keys.is_empty(),
        };
        self.offer = match self.offer {
            _ if !status.available => EncryptionOffer::NotOffered,
            EncryptionOffer::Checked { key_index } if self.has_key(key_index) => self.offer,
            EncryptionOffer::NotOffered | EncryptionOffer::Checked { .. } => {
                EncryptionOffer::from_status(status)
            }
            EncryptionOffer::Unchecked => EncryptionOffer::Unchecked,
        };
        debug!(keys = self.keys.len(), offer = ?self.offer, "editor keys refreshed");
    }

    pub fn keys(&self) -> &[SshKeyDescriptor] {
        &self.keys
    }

    pub const fn offer(&self) -> EncryptionOffer {
        self.offer
    }

    pub fn set_encrypt(&mut self, checked: bool) {
        self.offer = self.offer.toggle(checked);
    }

    /// Choose the key used when encryption is checked.
    pub fn select_key(&mut self, key_index: usize) -> CredentialResult<()> {
        if !self.offer.shows_key_selector() {
            return Err(CredentialError::Validation(
                "encryption is not selected".to_string(),
            ));
        }
        if !self.has_key(key_index) {
            return Err(CredentialError::KeyUnavailable(format!(
                "SSH key index {key_index} is not in this session's key list"
            )));
        }
        self.offer = self.offer.select_key(key_index);
        Ok(())
    }

    /// Build a create request carrying this session's encryption choice.
    pub fn create_request(
        &self,
        name: &str,
        fields: CredentialFields,
        api_key: &str,
        storage_location: StorageLocation,
    ) -> CreateCredentialRequest {
        CreateCredentialRequest {
            name: name.to_string(),
            fields,
            api_key: api_key.to_string(),
            encrypt: self.offer.shows_key_selector(),
            ssh_key_index: self.offer.key_index(),
            storage_location,
        }
    }

    /// Build an update request carrying this session's encryption choice.
    pub fn update_request(
        &self,
        patch: CredentialPatch,
        api_key: Option<&str>,
    ) -> UpdateCredentialRequest {
        UpdateCredentialRequest {
            patch,
            api_key: api_key.map(str::to_string),
            encrypt: self.offer.shows_key_selector(),
            ssh_key_index: self.offer.key_index(),
        }
    }

    /// Mark `name` for deletion pending confirmation. Replaces any earlier mark.
    pub fn request_delete(&mut self, name: &str) {
        self.pending_delete = Some(name.to_string());
    }

    pub fn pending_delete(&self) -> Option<&str> {
        self.pending_delete.as_deref()
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
    }

    /// Delete the marked profile and return its name.
    ///
    /// The mark is cleared whether or not the deletion succeeds.
    pub fn confirm_delete(&mut self, service: &CredentialService) -> CredentialResult<String> {
        let name = self.pending_delete.take().ok_or_else(|| {
            CredentialError::Validation("no deletion is pending confirmation".to_string())
        })?;
        service.delete_credential(&name)?;
        Ok(name)
    }

    fn has_key(&self, key_index: usize) -> bool {
        self.keys.iter().any(|k| k.index == key_index)
    }
}
