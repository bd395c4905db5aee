//! pce-cred CLI entry point.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use pce_credentials::cli::commands::{credential, keys};
use pce_credentials::cli::{handle_error, Cli, Commands};
use pce_credentials::infrastructure::config::ConfigLoader;
use pce_credentials::infrastructure::logging::LoggerImpl;
use pce_credentials::infrastructure::ssh_agent::AgentKeyProvider;
use pce_credentials::services::CredentialService;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = run(cli.command, cli.config.as_deref(), cli.json).await;
    let code = match result {
        Ok(code) => code,
        Err(err) => handle_error(&err, cli.json),
    };
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

async fn run(
    command: Commands,
    config_path: Option<&std::path::Path>,
    json_mode: bool,
) -> anyhow::Result<i32> {
    let config = match config_path {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };
    let _logger = LoggerImpl::init(&config.logging)?;

    let provider = Arc::new(AgentKeyProvider::from_config(&config.encryption));
    let service = CredentialService::new(&config, provider);

    match command {
        Commands::Credential(command) => credential::execute(command, &service, json_mode).await,
        Commands::Keys => keys::list(&service, json_mode),
        Commands::EncryptionStatus => keys::status(&service, json_mode),
    }
}
