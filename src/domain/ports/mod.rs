//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines the interface that key sources must implement:
//! - KeyProvider: enumerate asymmetric keys and sign with them
//!
//! Implementations shipped here need no external process; the SSH agent
//! adapter lives in the infrastructure layer.

pub mod key_provider;
pub mod memory_key_provider;
pub mod null_key_provider;

pub use key_provider::{KeyProvider, KeyProviderError};
pub use memory_key_provider::MemoryKeyProvider;
pub use null_key_provider::NullKeyProvider;
