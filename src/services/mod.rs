//! Service layer
//!
//! Credential protection, persistence and connectivity checks built on the
//! domain ports and infrastructure adapters.

pub mod connectivity;
pub mod credential_service;
pub mod credential_store;
pub mod editor_session;
pub mod encryption;

pub use connectivity::{ConnectivityTester, TestResult};
pub use credential_service::{
    CreateCredentialRequest, CredentialDetail, CredentialService, EncryptionStatus,
    ErrorResponse, SshKeyList, UpdateCredentialRequest,
};
pub use credential_store::{CredentialStore, RegistryFiles, StorageLocation};
pub use editor_session::{EditorSession, EncryptionOffer};
pub use encryption::EncryptionEngine;
