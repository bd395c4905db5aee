//! CLI command implementations.

pub mod credential;
pub mod keys;
