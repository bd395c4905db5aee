//! Domain layer for the credential subsystem
//!
//! This module contains the credential data model, the error taxonomy and the
//! key provider port.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{CredentialError, CredentialResult, ErrorKind};
