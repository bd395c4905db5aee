//! OpenSSH agent wire protocol (the subset needed to list keys and sign)
//!
//! Frame format:
//! ```text
//! +--------+--------+--------+--------+--------+-- ... --+
//! | Length (4 bytes, big-endian)      | Type   | Body    |
//! +--------+--------+--------+--------+--------+-- ... --+
//! ```
//!
//! Strings inside a body are a 4-byte big-endian length followed by the bytes.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::{self, ErrorKind, Read};

use crate::domain::models::sha256_fingerprint;

pub const SSH_AGENT_FAILURE: u8 = 5;
pub const SSH_AGENTC_REQUEST_IDENTITIES: u8 = 11;
pub const SSH_AGENT_IDENTITIES_ANSWER: u8 = 12;
pub const SSH_AGENTC_SIGN_REQUEST: u8 = 13;
pub const SSH_AGENT_SIGN_RESPONSE: u8 = 14;

/// Sign-request flag selecting `rsa-sha2-256` signatures for RSA keys
pub const SSH_AGENT_RSA_SHA2_256: u32 = 0x02;

/// Maximum accepted message size (256 KiB, as in OpenSSH)
pub const MAX_MESSAGE_SIZE: usize = 256 * 1024;

/// A public key held by the agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub key_blob: Bytes,
    pub comment: String,
}

impl Identity {
    /// Key algorithm name, the leading string of the public key blob
    pub fn key_type(&self) -> io::Result<String> {
        let mut blob = self.key_blob.clone();
        let name = get_string(&mut blob)?;
        String::from_utf8(name.to_vec())
            .map_err(|_| invalid_data("key type is not valid UTF-8"))
    }

    pub fn fingerprint(&self) -> String {
        sha256_fingerprint(&self.key_blob)
    }
}

/// Client-to-agent messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    RequestIdentities,
    Sign {
        key_blob: Bytes,
        data: Bytes,
        flags: u32,
    },
}

impl Request {
    /// Encode into a length-prefixed frame
    pub fn encode(&self) -> Bytes {
        let mut body = BytesMut::new();
        match self {
            Self::RequestIdentities => body.put_u8(SSH_AGENTC_REQUEST_IDENTITIES),
            Self::Sign {
                key_blob,
                data,
                flags,
            } => {
                body.put_u8(SSH_AGENTC_SIGN_REQUEST);
                put_string(&mut body, key_blob);
                put_string(&mut body, data);
                body.put_u32(*flags);
            }
        }
        frame(&body)
    }

    /// Decode a frame payload (without the length prefix)
    pub fn decode(mut payload: Bytes) -> io::Result<Self> {
        if !payload.has_remaining() {
            return Err(invalid_data("empty agent message"));
        }
        match payload.get_u8() {
            SSH_AGENTC_REQUEST_IDENTITIES => Ok(Self::RequestIdentities),
            SSH_AGENTC_SIGN_REQUEST => {
                let key_blob = get_string(&mut payload)?;
                let data = get_string(&mut payload)?;
                let flags = get_u32(&mut payload)?;
                Ok(Self::Sign {
                    key_blob,
                    data,
                    flags,
                })
            }
            other => Err(invalid_data(format!("unsupported request type {other}"))),
        }
    }
}

/// Agent-to-client messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Identities(Vec<Identity>),
    /// Signature blob: string(algorithm) || string(signature)
    SignResponse(Bytes),
    Failure,
}

impl Response {
    pub fn encode(&self) -> Bytes {
        let mut body = BytesMut::new();
        match self {
            Self::Identities(identities) => {
                body.put_u8(SSH_AGENT_IDENTITIES_ANSWER);
                body.put_u32(identities.len() as u32);
                for identity in identities {
                    put_string(&mut body, &identity.key_blob);
                    put_string(&mut body, identity.comment.as_bytes());
                }
            }
            Self::SignResponse(signature) => {
                body.put_u8(SSH_AGENT_SIGN_RESPONSE);
                put_string(&mut body, signature);
            }
            Self::Failure => body.put_u8(SSH_AGENT_FAILURE),
        }
        frame(&body)
    }

    pub fn decode(mut payload: Bytes) -> io::Result<Self> {
        if !payload.has_remaining() {
            return Err(invalid_data("empty agent message"));
        }
        match payload.get_u8() {
            SSH_AGENT_IDENTITIES_ANSWER => {
                let count = get_u32(&mut payload)? as usize;
                // Each identity needs at least two length prefixes
                if count > payload.remaining() / 8 {
                    return Err(invalid_data(format!("implausible identity count {count}")));
                }
                let mut identities = Vec::with_capacity(count);
                for _ in 0..count {
                    let key_blob = get_string(&mut payload)?;
                    let comment = get_string(&mut payload)?;
                    identities.push(Identity {
                        key_blob,
                        comment: String::from_utf8_lossy(&comment).into_owned(),
                    });
                }
                Ok(Self::Identities(identities))
            }
            SSH_AGENT_SIGN_RESPONSE => Ok(Self::SignResponse(get_string(&mut payload)?)),
            SSH_AGENT_FAILURE => Ok(Self::Failure),
            other => Err(invalid_data(format!("unexpected response type {other}"))),
        }
    }
}

/// Read one frame and return its payload
pub fn read_message<R: Read>(reader: &mut R) -> io::Result<Bytes> {
    let mut len = [0u8; 4];
    reader.read_exact(&mut len)?;
    let length = u32::from_be_bytes(len) as usize;

    if length == 0 || length > MAX_MESSAGE_SIZE {
        return Err(invalid_data(format!("invalid agent message length {length}")));
    }

    let mut payload = vec![0u8; length];
    reader.read_exact(&mut payload)?;
    Ok(Bytes::from(payload))
}

/// Extract the raw signature from a signature blob
pub fn signature_bytes(signature_blob: &Bytes) -> io::Result<Bytes> {
    let mut blob = signature_blob.clone();
    let _algorithm = get_string(&mut blob)?;
    get_string(&mut blob)
}

/// Build a signature blob from an algorithm name and raw signature
pub fn signature_blob(algorithm: &str, signature: &[u8]) -> Bytes {
    let mut blob = BytesMut::new();
    put_string(&mut blob, algorithm.as_bytes());
    put_string(&mut blob, signature);
    blob.freeze()
}

fn frame(body: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(4 + body.len());
    buf.put_u32(body.len() as u32);
    buf.extend_from_slice(body);
    buf.freeze()
}

fn put_string(buf: &mut BytesMut, data: &[u8]) {
    buf.put_u32(data.len() as u32);
    buf.extend_from_slice(data);
}

fn get_u32(buf: &mut Bytes) -> io::Result<u32> {
    if buf.remaining() < 4 {
        return Err(invalid_data("truncated agent message"));
    }
    Ok(buf.get_u32())
}

fn get_string(buf: &mut Bytes) -> io::Result<Bytes> {
    let len = get_u32(buf)? as usize;
    if buf.remaining() < len {
        return Err(invalid_data("truncated agent string"));
    }
    Ok(buf.split_to(len))
}

fn invalid_data(msg: impl Into<String>) -> io::Error {
    io::Error::new(ErrorKind::InvalidData, msg.into())
}
