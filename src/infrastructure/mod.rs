//! Infrastructure layer module
//!
//! This module contains the adapters to the outside world:
//! - Configuration management
//! - Logging infrastructure
//! - SSH agent key provider
//! - Registry file storage
//!
//! Infrastructure implementations satisfy the port traits defined in the domain layer.

pub mod config;
pub mod logging;
pub mod ssh_agent;
pub mod storage;
