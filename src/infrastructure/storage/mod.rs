//! File-backed persistence for credential profiles
//!
//! - JSON registry files with atomic replace
//! - Advisory lock files serializing writers
//! - The read-only environment profile

pub mod credentials_file;
pub mod environment;
pub mod file_lock;

pub use credentials_file::{
    read_entries, read_records, write_entries, CredentialFileEntry, StoredApiKey,
};
pub use environment::environment_record;
pub use file_lock::RegistryLock;
