//! Output formatting utilities for the CLI.

use std::env;
use std::time::Duration;

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::domain::models::{CredentialSummary, SshKeyDescriptor};

const SPINNER_TEMPLATE: &str = "{spinner:.green} {msg}";
const SPINNER_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

pub trait CommandOutput: Serialize {
    fn to_human(&self) -> String;

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub fn output<T: CommandOutput>(result: &T, json_mode: bool) {
    if json_mode {
        println!(
            "{}",
            serde_json::to_string_pretty(&result.to_json()).unwrap_or_default()
        );
    } else {
        println!("{}", result.to_human());
    }
}

/// Truncate a string to a maximum number of characters, appending "..." if truncated.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

/// Spinner on stderr for the duration of a network call. Hidden in JSON mode.
pub fn spinner(message: impl Into<String>, json_mode: bool) -> ProgressBar {
    if json_mode {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template(SPINNER_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars(SPINNER_CHARS),
    );
    spinner.set_message(message.into());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

fn base_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    if !supports_color() {
        table.force_no_tty();
    }
    table
}

fn header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(label).add_attribute(Attribute::Bold))
        .collect()
}

pub fn credential_table(credentials: &[CredentialSummary]) -> String {
    let mut table = base_table();
    table.set_header(header(&[
        "Name", "FQDN", "Port", "Org", "API User", "Key", "Verify SSL", "File",
    ]));

    for credential in credentials {
        let key_cell = if credential.api_key_encrypted {
            Cell::new("encrypted").fg(Color::Green)
        } else {
            Cell::new("plain").fg(Color::Yellow)
        };
        let ssl_cell = if credential.verify_ssl {
            Cell::new("yes")
        } else {
            Cell::new("no").fg(Color::Red)
        };
        table.add_row(vec![
            Cell::new(&credential.name),
            Cell::new(&credential.fqdn),
            Cell::new(credential.port),
            Cell::new(credential.org_id),
            Cell::new(&credential.api_user),
            key_cell,
            ssl_cell,
            Cell::new(truncate(&credential.originating_file, 48)),
        ]);
    }

    table.to_string()
}

pub fn key_table(keys: &[SshKeyDescriptor]) -> String {
    let mut table = base_table();
    table.set_header(header(&["Index", "Type", "Fingerprint", "Comment"]));

    for key in keys {
        table.add_row(vec![
            Cell::new(key.index),
            Cell::new(&key.key_type),
            Cell::new(&key.fingerprint),
            Cell::new(key.comment.as_deref().unwrap_or("-")),
        ]);
    }

    table.to_string()
}

fn supports_color() -> bool {
    if env::var("NO_COLOR").is_ok() {
        return false;
    }
    !matches!(env::var("TERM").as_deref(), Ok("dumb"))
}
