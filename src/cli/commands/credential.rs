//! Credential profile CLI commands.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand, ValueEnum};
use console::Term;
use serde::Serialize;
use zeroize::Zeroizing;

use crate::cli::output::{credential_table, output, spinner, CommandOutput};
use crate::domain::models::{CredentialFields, CredentialPatch, CredentialSummary};
use crate::services::{
    CreateCredentialRequest, CredentialDetail, CredentialService, EditorSession, StorageLocation,
    TestResult, UpdateCredentialRequest,
};

#[derive(Subcommand, Debug)]
pub enum CredentialCommands {
    /// List credential profiles from every registry file
    List,
    /// Show one profile
    Show {
        /// Profile name or FQDN
        name: String,
        /// Include the decrypted API key
        #[arg(long)]
        reveal: bool,
    },
    /// Create a profile
    Create(CreateArgs),
    /// Change fields of an existing profile
    Update(UpdateArgs),
    /// Delete a profile
    Delete {
        /// Profile name
        name: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Check that a profile can authenticate against its PCE
    Test {
        /// Profile name
        name: String,
    },
}

/// Registry file a new profile is written to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LocationArg {
    /// Configured credential file, else the per-user file
    #[default]
    Default,
    /// Per-user file under the home directory
    Home,
    /// File in the working directory
    Workdir,
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Profile name
    pub name: String,

    /// PCE host name
    #[arg(long)]
    pub fqdn: String,

    #[arg(long, default_value_t = 8443)]
    pub port: i64,

    #[arg(long, default_value_t = 1)]
    pub org_id: i64,

    /// API key user, e.g. api_1a2b3c
    #[arg(long)]
    pub api_user: String,

    /// Skip TLS certificate verification when connecting
    #[arg(long)]
    pub no_verify_ssl: bool,

    /// Read the API key from this environment variable instead of prompting
    #[arg(long, value_name = "VAR")]
    pub api_key_env: Option<String>,

    /// Protect the API key with an SSH agent key
    #[arg(long)]
    pub encrypt: bool,

    /// Agent key to encrypt with (see `pce-cred keys`)
    #[arg(long, requires = "encrypt")]
    pub ssh_key_index: Option<usize>,

    #[arg(long, value_enum, default_value_t = LocationArg::Default)]
    pub location: LocationArg,

    /// Write to this registry file (or directory) instead of a standard location
    #[arg(long, value_name = "PATH", conflicts_with = "location")]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Profile name
    pub name: String,

    #[arg(long)]
    pub fqdn: Option<String>,

    #[arg(long)]
    pub port: Option<i64>,

    #[arg(long)]
    pub org_id: Option<i64>,

    #[arg(long)]
    pub api_user: Option<String>,

    #[arg(long, value_name = "BOOL")]
    pub verify_ssl: Option<bool>,

    /// Replace the API key with the value of this environment variable
    #[arg(long, value_name = "VAR")]
    pub api_key_env: Option<String>,

    /// Prompt for a replacement API key
    #[arg(long, conflicts_with = "api_key_env")]
    pub prompt_api_key: bool,

    /// Protect the API key with an SSH agent key
    #[arg(long)]
    pub encrypt: bool,

    #[arg(long, requires = "encrypt")]
    pub ssh_key_index: Option<usize>,
}

fn storage_location(location: LocationArg, file: Option<PathBuf>) -> StorageLocation {
    match (file, location) {
        (Some(path), _) => StorageLocation::Path(path),
        (None, LocationArg::Default) => StorageLocation::Default,
        (None, LocationArg::Home) => StorageLocation::Home,
        (None, LocationArg::Workdir) => StorageLocation::WorkingDirectory,
    }
}

/// API key from a named variable, or typed at a hidden prompt.
fn read_api_key(env_var: Option<&str>) -> Result<Zeroizing<String>> {
    if let Some(var) = env_var {
        return env::var(var)
            .map(Zeroizing::new)
            .with_context(|| format!("environment variable {var} is not set"));
    }

    let term = Term::stderr();
    term.write_str("API key: ")
        .context("failed to write prompt")?;
    term.read_secure_line()
        .map(Zeroizing::new)
        .context("failed to read API key")
}

fn confirm(question: &str) -> Result<bool> {
    let term = Term::stderr();
    term.write_str(&format!("{question} [y/N] "))
        .context("failed to write prompt")?;
    let answer = term.read_line().context("failed to read answer")?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

#[derive(Debug, Serialize)]
pub struct CredentialListOutput {
    pub credentials: Vec<CredentialSummary>,
    pub total: usize,
}

impl CommandOutput for CredentialListOutput {
    fn to_human(&self) -> String {
        if self.credentials.is_empty() {
            return "No credential profiles found.".to_string();
        }
        format!(
            "Found {} credential profile(s):\n{}",
            self.total,
            credential_table(&self.credentials)
        )
    }
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct CredentialDetailOutput(pub CredentialDetail);

impl CommandOutput for CredentialDetailOutput {
    fn to_human(&self) -> String {
        let summary = &self.0.summary;
        let lines = [
            format!("Credential: {}", summary.name),
            format!("FQDN: {}", summary.fqdn),
            format!("Port: {}", summary.port),
            format!("Org ID: {}", summary.org_id),
            format!("API User: {}", summary.api_user),
            format!(
                "API Key: {}",
                self.0.api_key.as_deref().unwrap_or(if summary.api_key_encrypted {
                    "(encrypted)"
                } else {
                    "(hidden, use --reveal)"
                })
            ),
            format!("Verify SSL: {}", summary.verify_ssl),
            format!("File: {}", summary.originating_file),
        ];
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct CredentialActionOutput {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<CredentialSummary>,
}

impl CommandOutput for CredentialActionOutput {
    fn to_human(&self) -> String {
        self.message.clone()
    }
}

#[derive(Debug, Serialize)]
pub struct TestOutput {
    pub name: String,
    #[serde(flatten)]
    pub result: TestResult,
}

impl CommandOutput for TestOutput {
    fn to_human(&self) -> String {
        let mark = if self.result.success {
            console::style("✓").green()
        } else {
            console::style("✗").red()
        };
        format!("{mark} {}: {}", self.name, self.result.detail)
    }
}

/// Run a credential command and return the process exit code.
pub async fn execute(
    command: CredentialCommands,
    service: &CredentialService,
    json_mode: bool,
) -> Result<i32> {
    match command {
        CredentialCommands::List => {
            let credentials = service.list_credentials()?;
            let out = CredentialListOutput {
                total: credentials.len(),
                credentials,
            };
            output(&out, json_mode);
        }

        CredentialCommands::Show { name, reveal } => {
            let detail = service.find_credential(&name, reveal)?;
            output(&CredentialDetailOutput(detail), json_mode);
        }

        CredentialCommands::Create(args) => {
            let api_key = read_api_key(args.api_key_env.as_deref())?;
            let request = CreateCredentialRequest {
                name: args.name,
                fields: CredentialFields {
                    fqdn: args.fqdn,
                    port: args.port,
                    org_id: args.org_id,
                    api_user: args.api_user,
                    verify_ssl: !args.no_verify_ssl,
                },
                api_key: api_key.as_str().to_string(),
                encrypt: args.encrypt,
                ssh_key_index: args.ssh_key_index,
                storage_location: storage_location(args.location, args.file),
            };
            let summary = service.create_credential(request)?;
            output(
                &CredentialActionOutput {
                    success: true,
                    message: format!(
                        "Created credential '{}' in {}",
                        summary.name, summary.originating_file
                    ),
                    credential: Some(summary),
                },
                json_mode,
            );
        }

        CredentialCommands::Update(args) => {
            let api_key = if args.api_key_env.is_some() || args.prompt_api_key {
                Some(read_api_key(args.api_key_env.as_deref())?)
            } else {
                None
            };
            let request = UpdateCredentialRequest {
                patch: CredentialPatch {
                    fqdn: args.fqdn,
                    port: args.port,
                    org_id: args.org_id,
                    api_user: args.api_user,
                    verify_ssl: args.verify_ssl,
                },
                api_key: api_key.as_ref().map(|key| key.as_str().to_string()),
                encrypt: args.encrypt,
                ssh_key_index: args.ssh_key_index,
            };
            let summary = service.update_credential(&args.name, &request)?;
            output(
                &CredentialActionOutput {
                    success: true,
                    message: format!("Updated credential '{}'", summary.name),
                    credential: Some(summary),
                },
                json_mode,
            );
        }

        CredentialCommands::Delete { name, yes } => {
            let mut session = EditorSession::default();
            session.request_delete(&name);

            if !yes && !confirm(&format!("Delete credential '{name}'?"))? {
                session.cancel_delete();
                output(
                    &CredentialActionOutput {
                        success: false,
                        message: "Deletion cancelled".to_string(),
                        credential: None,
                    },
                    json_mode,
                );
                return Ok(1);
            }

            let deleted = session.confirm_delete(service)?;
            output(
                &CredentialActionOutput {
                    success: true,
                    message: format!("Deleted credential '{deleted}'"),
                    credential: None,
                },
                json_mode,
            );
        }

        CredentialCommands::Test { name } => {
            let progress = spinner(format!("Testing {name}..."), json_mode);
            let result = service.test_credential(&name).await;
            progress.finish_and_clear();

            let out = TestOutput { name, result: result? };
            let code = i32::from(!out.result.success);
            output(&out, json_mode);
            return Ok(code);
        }
    }

    Ok(0)
}
