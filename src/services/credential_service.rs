//! Boundary facade: the request/response operations offered to an HTTP or
//! CLI front end.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::connectivity::{ConnectivityTester, TestResult};
use super::credential_store::{CredentialStore, StorageLocation};
use super::encryption::EncryptionEngine;
use crate::domain::models::{
    Config, CredentialFields, CredentialPatch, CredentialRecord, CredentialSummary, SecretAccess,
    SshKeyDescriptor,
};
use crate::domain::ports::KeyProvider;
use crate::domain::{CredentialError, CredentialResult};

/// Fields of a new profile as submitted by a client.
#[derive(Clone, Serialize, Deserialize)]
pub struct CreateCredentialRequest {
    pub name: String,
    #[serde(flatten)]
    pub fields: CredentialFields,
    pub api_key: String,
    #[serde(default)]
    pub encrypt: bool,
    #[serde(default)]
    pub ssh_key_index: Option<usize>,
    #[serde(default)]
    pub storage_location: StorageLocation,
}

/// Changes to an existing profile. Absent fields are kept.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct UpdateCredentialRequest {
    #[serde(flatten)]
    pub patch: CredentialPatch,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub encrypt: bool,
    #[serde(default)]
    pub ssh_key_index: Option<usize>,
}

/// A profile with the API key included only when explicitly revealed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialDetail {
    #[serde(flatten)]
    pub summary: CredentialSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionStatus {
    pub available: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SshKeyList(pub Vec<SshKeyDescriptor>);

/// Failure as relayed to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: u16,
    pub kind: String,
    pub message: String,
}

impl From<&CredentialError> for ErrorResponse {
    fn from(err: &CredentialError) -> Self {
        Self {
            status: err.status_code(),
            kind: err.kind().as_str().to_string(),
            message: err.to_string(),
        }
    }
}

/// `encrypt` selects a key (the first when no index is given); without it
/// any index is ignored.
const fn key_choice(encrypt: bool, ssh_key_index: Option<usize>) -> Option<usize> {
    if encrypt {
        match ssh_key_index {
            Some(index) => Some(index),
            None => Some(0),
        }
    } else {
        None
    }
}

const fn access(reveal: bool) -> SecretAccess {
    if reveal {
        SecretAccess::Full
    } else {
        SecretAccess::Redacted
    }
}

/// Every credential operation a front end needs, behind one handle.
#[derive(Clone)]
pub struct CredentialService {
    store: Arc<CredentialStore>,
    tester: ConnectivityTester,
}

impl CredentialService {
    pub fn new(config: &Config, provider: Arc<dyn KeyProvider>) -> Self {
        let store = Arc::new(CredentialStore::new(
            config,
            EncryptionEngine::new(provider),
        ));
        let tester = ConnectivityTester::new(Arc::clone(&store), config.connectivity.clone());
        Self { store, tester }
    }

    pub const fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn list_credentials(&self) -> CredentialResult<Vec<CredentialSummary>> {
        self.store.summaries()
    }

    /// The profile named `name`; `reveal` adds the plaintext API key.
    pub fn get_credential(&self, name: &str, reveal: bool) -> CredentialResult<CredentialDetail> {
        let record = self.store.get(name, access(reveal))?;
        self.detail(record, reveal)
    }

    /// Like [`Self::get_credential`], falling back to a match on the fqdn.
    pub fn find_credential(
        &self,
        name_or_fqdn: &str,
        reveal: bool,
    ) -> CredentialResult<CredentialDetail> {
        let record = self.store.resolve(name_or_fqdn, access(reveal))?;
        self.detail(record, reveal)
    }

    fn detail(&self, record: CredentialRecord, reveal: bool) -> CredentialResult<CredentialDetail> {
        if !reveal {
            return Ok(CredentialDetail {
                summary: record.summary(),
                api_key: None,
            });
        }

        let api_key = self.store.engine().reveal(&record)?;
        debug!(name = %record.name, "api key revealed");
        Ok(CredentialDetail {
            summary: record.summary(),
            api_key: Some(api_key.as_str().to_string()),
        })
    }

    pub fn create_credential(
        &self,
        request: CreateCredentialRequest,
    ) -> CredentialResult<CredentialSummary> {
        let record = self.store.create(
            &request.name,
            request.fields,
            &request.api_key,
            key_choice(request.encrypt, request.ssh_key_index),
            &request.storage_location,
        )?;
        Ok(record.summary())
    }

    pub fn update_credential(
        &self,
        name: &str,
        request: &UpdateCredentialRequest,
    ) -> CredentialResult<CredentialSummary> {
        let record = self.store.update(
            name,
            &request.patch,
            request.api_key.as_deref(),
            key_choice(request.encrypt, request.ssh_key_index),
        )?;
        Ok(record.summary())
    }

    pub fn delete_credential(&self, name: &str) -> CredentialResult<()> {
        self.store.delete(name)
    }

    pub async fn test_credential(&self, name: &str) -> CredentialResult<TestResult> {
        self.tester.test(name).await
    }

    pub fn encryption_status(&self) -> EncryptionStatus {
        EncryptionStatus {
            available: self.store.engine().is_available(),
        }
    }

    pub fn list_ssh_keys(&self) -> SshKeyList {
        SshKeyList(self.store.engine().list_keys())
    }
}
