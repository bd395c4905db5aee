//! Read-only profile assembled from `PYLO_*` environment variables.

use std::env;
use std::path::PathBuf;

use crate::domain::models::{
    ApiKey, CredentialFields, CredentialRecord, ENVIRONMENT_ORIGIN, ENVIRONMENT_PROFILE_NAME,
};
use crate::domain::{CredentialError, CredentialResult};

pub const ENV_FQDN: &str = "PYLO_FQDN";
pub const ENV_PORT: &str = "PYLO_PORT";
pub const ENV_ORG_ID: &str = "PYLO_ORG_ID";
pub const ENV_API_USER: &str = "PYLO_API_USER";
pub const ENV_API_KEY: &str = "PYLO_API_KEY";
pub const ENV_VERIFY_SSL: &str = "PYLO_VERIFY_SSL";

const SAAS_DOMAIN_SUFFIX: &str = ".illum.io";

/// Build the `ENV` profile from the process environment.
///
/// Returns `Ok(None)` when none of the required variables is set. A partial
/// set is a validation error naming what is missing.
pub fn environment_record() -> CredentialResult<Option<CredentialRecord>> {
    let fqdn = var(ENV_FQDN);
    let api_user = var(ENV_API_USER);
    let api_key = var(ENV_API_KEY);

    let (fqdn, api_user, api_key) = match (fqdn, api_user, api_key) {
        (None, None, None) => return Ok(None),
        (Some(fqdn), Some(user), Some(key)) => (fqdn, user, key),
        (fqdn, user, key) => {
            let missing: Vec<&str> = [
                (ENV_FQDN, fqdn.is_none()),
                (ENV_API_USER, user.is_none()),
                (ENV_API_KEY, key.is_none()),
            ]
            .into_iter()
            .filter_map(|(name, absent)| absent.then_some(name))
            .collect();
            return Err(CredentialError::Validation(format!(
                "incomplete environment profile, missing {}",
                missing.join(", ")
            )));
        }
    };

    let saas = fqdn.to_lowercase().ends_with(SAAS_DOMAIN_SUFFIX);

    let port = match var(ENV_PORT) {
        Some(raw) => parse_int(ENV_PORT, &raw)?,
        None if saas => 443,
        None => 8443,
    };

    let org_id = match var(ENV_ORG_ID) {
        Some(raw) => parse_int(ENV_ORG_ID, &raw)?,
        None if saas => {
            return Err(CredentialError::Validation(format!(
                "{ENV_ORG_ID} is required for {SAAS_DOMAIN_SUFFIX} hosts"
            )))
        }
        None => 1,
    };

    let verify_ssl = match var(ENV_VERIFY_SSL) {
        Some(raw) => parse_bool(&raw)?,
        None => true,
    };

    CredentialFields {
        fqdn,
        port,
        org_id,
        api_user,
        verify_ssl,
    }
    .into_record(
        ENVIRONMENT_PROFILE_NAME,
        ApiKey::Plain(api_key),
        PathBuf::from(ENVIRONMENT_ORIGIN),
    )
    .map(Some)
}

fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_int(name: &str, raw: &str) -> CredentialResult<i64> {
    raw.trim().parse().map_err(|_| {
        CredentialError::Validation(format!("{name} must be an integer, got '{raw}'"))
    })
}

fn parse_bool(raw: &str) -> CredentialResult<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Ok(true),
        "false" | "0" | "no" | "n" => Ok(false),
        _ => Err(CredentialError::Validation(format!(
            "{ENV_VERIFY_SSL} must be a boolean, got '{raw}'"
        ))),
    }
}
