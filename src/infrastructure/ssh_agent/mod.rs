//! SSH agent integration
//!
//! A minimal client for the OpenSSH agent protocol, used as the production
//! [`KeyProvider`](crate::domain::ports::KeyProvider).

mod client;
pub mod protocol;

pub use client::{AgentKeyProvider, SSH_AUTH_SOCK};
