//! Command-line front end for the credential store.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::CredentialError;
use crate::services::ErrorResponse;
use commands::credential::CredentialCommands;

#[derive(Parser, Debug)]
#[command(name = "pce-cred")]
#[command(about = "Manage PCE API credential profiles", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file to load instead of the default locations
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(flatten)]
    Credential(CredentialCommands),

    /// List SSH agent keys usable for API key encryption
    Keys,

    /// Report whether API key encryption is currently possible
    EncryptionStatus,
}

/// Report a failed command and pick the process exit code.
///
/// Credential errors keep their kind in JSON mode so scripts can branch on
/// it; anything else is reported as an internal error.
pub fn handle_error(err: &anyhow::Error, json_mode: bool) -> i32 {
    let response = err.downcast_ref::<CredentialError>().map_or_else(
        || ErrorResponse {
            status: 500,
            kind: "internal".to_string(),
            message: format!("{err:#}"),
        },
        ErrorResponse::from,
    );

    if json_mode {
        let body = serde_json::json!({ "error": response });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!(
            "{} {}",
            console::style("Error:").red().bold(),
            response.message
        );
    }

    exit_code(response.status)
}

const fn exit_code(status: u16) -> i32 {
    match status {
        400 => 2,
        404 => 3,
        409 => 4,
        _ => 1,
    }
}
