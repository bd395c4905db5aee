//! SSH key listing for API key encryption.

use anyhow::Result;
use serde::Serialize;

use crate::cli::output::{key_table, output, CommandOutput};
use crate::domain::models::SshKeyDescriptor;
use crate::services::CredentialService;

#[derive(Debug, Serialize)]
pub struct KeyListOutput {
    pub keys: Vec<SshKeyDescriptor>,
}

impl CommandOutput for KeyListOutput {
    fn to_human(&self) -> String {
        if self.keys.is_empty() {
            return "No usable SSH keys found. Start an agent and add an ed25519 or RSA key."
                .to_string();
        }
        key_table(&self.keys)
    }
}

#[derive(Debug, Serialize)]
pub struct EncryptionStatusOutput {
    pub available: bool,
}

impl CommandOutput for EncryptionStatusOutput {
    fn to_human(&self) -> String {
        if self.available {
            "Encryption available".to_string()
        } else {
            "Encryption unavailable: no usable SSH agent key".to_string()
        }
    }
}

pub fn list(service: &CredentialService, json_mode: bool) -> Result<i32> {
    let keys = service.list_ssh_keys().0;
    output(&KeyListOutput { keys }, json_mode);
    Ok(0)
}

pub fn status(service: &CredentialService, json_mode: bool) -> Result<i32> {
    let status = service.encryption_status();
    output(
        &EncryptionStatusOutput {
            available: status.available,
        },
        json_mode,
    );
    Ok(0)
}
