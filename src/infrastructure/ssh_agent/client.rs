//! Key provider backed by a running OpenSSH-compatible agent.

use bytes::Bytes;
use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use super::protocol::{
    read_message, signature_bytes, Identity, Request, Response, SSH_AGENT_RSA_SHA2_256,
};
use crate::domain::models::{is_supported_key_type, EncryptionConfig, SshKeyDescriptor};
use crate::domain::ports::{KeyProvider, KeyProviderError};

/// Environment variable naming the agent socket
pub const SSH_AUTH_SOCK: &str = "SSH_AUTH_SOCK";

/// Agents may block on a user confirmation or PIN prompt while signing.
const AGENT_IO_TIMEOUT: Duration = Duration::from_secs(60);

/// Talks to the SSH agent listening on a unix socket.
///
/// A fresh connection is opened per operation, so the listing always
/// reflects the agent's current keys.
#[derive(Debug, Clone)]
pub struct AgentKeyProvider {
    socket: Option<PathBuf>,
}

impl AgentKeyProvider {
    pub fn new(socket: Option<PathBuf>) -> Self {
        Self { socket }
    }

    /// Use the socket from `SSH_AUTH_SOCK`
    pub fn from_env() -> Self {
        Self::new(env::var_os(SSH_AUTH_SOCK).map(PathBuf::from))
    }

    /// Use the configured socket, falling back to `SSH_AUTH_SOCK`
    pub fn from_config(config: &EncryptionConfig) -> Self {
        match &config.agent_socket {
            Some(socket) => Self::new(Some(socket.clone())),
            None => Self::from_env(),
        }
    }

    pub fn socket(&self) -> Option<&Path> {
        self.socket.as_deref()
    }

    fn round_trip(&self, request: &Request) -> Result<Response, KeyProviderError> {
        let socket = self
            .socket
            .as_deref()
            .ok_or_else(|| KeyProviderError::Agent(format!("{SSH_AUTH_SOCK} is not set")))?;

        let mut stream = connect(socket)?;
        stream
            .write_all(&request.encode())
            .map_err(|e| KeyProviderError::Agent(format!("write to agent failed: {e}")))?;
        let payload = read_message(&mut stream)
            .map_err(|e| KeyProviderError::Agent(format!("read from agent failed: {e}")))?;
        Response::decode(payload)
            .map_err(|e| KeyProviderError::Agent(format!("malformed agent response: {e}")))
    }

    /// Identities whose signatures are deterministic, in agent order
    fn usable_identities(&self) -> Result<Vec<(Identity, String)>, KeyProviderError> {
        match self.round_trip(&Request::RequestIdentities)? {
            Response::Identities(identities) => Ok(identities
                .into_iter()
                .filter_map(|identity| match identity.key_type() {
                    Ok(key_type) if is_supported_key_type(&key_type) => {
                        Some((identity, key_type))
                    }
                    Ok(key_type) => {
                        debug!(key_type = %key_type, "skipping key with randomized signatures");
                        None
                    }
                    Err(e) => {
                        warn!(error = %e, "skipping unparseable agent key");
                        None
                    }
                })
                .collect()),
            Response::Failure => Err(KeyProviderError::Agent(
                "agent refused to list identities".to_string(),
            )),
            Response::SignResponse(_) => Err(KeyProviderError::Agent(
                "unexpected sign response to identity request".to_string(),
            )),
        }
    }
}

impl KeyProvider for AgentKeyProvider {
    fn list_keys(&self) -> Vec<SshKeyDescriptor> {
        match self.usable_identities() {
            Ok(identities) => identities
                .into_iter()
                .enumerate()
                .map(|(index, (identity, key_type))| SshKeyDescriptor {
                    index,
                    key_type,
                    fingerprint: identity.fingerprint(),
                    comment: Some(identity.comment).filter(|c| !c.is_empty()),
                })
                .collect(),
            Err(e) => {
                debug!(error = %e, "ssh agent unavailable, encryption disabled");
                Vec::new()
            }
        }
    }

    fn sign(&self, fingerprint: &str, data: &[u8]) -> Result<Vec<u8>, KeyProviderError> {
        let (identity, key_type) = self
            .usable_identities()?
            .into_iter()
            .find(|(identity, _)| identity.fingerprint() == fingerprint)
            .ok_or_else(|| KeyProviderError::KeyNotFound(fingerprint.to_string()))?;

        let flags = if key_type == "ssh-rsa" {
            SSH_AGENT_RSA_SHA2_256
        } else {
            0
        };

        let request = Request::Sign {
            key_blob: identity.key_blob,
            data: Bytes::copy_from_slice(data),
            flags,
        };

        match self.round_trip(&request)? {
            Response::SignResponse(blob) => signature_bytes(&blob)
                .map(|sig| sig.to_vec())
                .map_err(|e| KeyProviderError::Agent(format!("malformed signature: {e}"))),
            Response::Failure => Err(KeyProviderError::Agent(format!(
                "agent refused to sign with {fingerprint}"
            ))),
            Response::Identities(_) => Err(KeyProviderError::Agent(
                "unexpected identities answer to sign request".to_string(),
            )),
        }
    }
}

#[cfg(unix)]
fn connect(socket: &Path) -> Result<std::os::unix::net::UnixStream, KeyProviderError> {
    let stream = std::os::unix::net::UnixStream::connect(socket).map_err(|e| {
        KeyProviderError::Agent(format!("cannot connect to {}: {e}", socket.display()))
    })?;
    stream
        .set_read_timeout(Some(AGENT_IO_TIMEOUT))
        .and_then(|()| stream.set_write_timeout(Some(AGENT_IO_TIMEOUT)))
        .map_err(|e| KeyProviderError::Agent(e.to_string()))?;
    Ok(stream)
}

#[cfg(not(unix))]
fn connect(socket: &Path) -> Result<std::fs::File, KeyProviderError> {
    Err(KeyProviderError::Agent(format!(
        "ssh agent sockets are not supported on this platform ({})",
        socket.display()
    )))
}
