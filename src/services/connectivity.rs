//! Checks that a stored profile can authenticate against its endpoint.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::ACCEPT;
use reqwest::{Client as ReqwestClient, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use zeroize::Zeroizing;

use super::credential_store::CredentialStore;
use crate::domain::models::{ConnectivityConfig, CredentialRecord, SecretAccess};
use crate::domain::{CredentialError, CredentialResult};
use crate::infrastructure::logging::SecretScrubber;

/// Endpoint queried by a connectivity test; it requires authentication and
/// has no side effects.
pub const PRODUCT_VERSION_PATH: &str = "/api/v2/product_version";

/// Outcome of one connectivity test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub success: bool,
    /// Human-readable outcome, free of secrets
    pub detail: String,
    /// Product version reported by the endpoint on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl TestResult {
    fn success(detail: String, version: Option<String>) -> Self {
        Self {
            success: true,
            detail,
            version,
            checked_at: Utc::now(),
        }
    }

    fn failure(detail: String) -> Self {
        Self {
            success: false,
            detail,
            version: None,
            checked_at: Utc::now(),
        }
    }
}

#[derive(Deserialize)]
struct ProductVersion {
    version: Option<String>,
}

/// Issues one bounded, authenticated request per test.
#[derive(Clone)]
pub struct ConnectivityTester {
    store: Arc<CredentialStore>,
    config: ConnectivityConfig,
}

impl ConnectivityTester {
    pub fn new(store: Arc<CredentialStore>, config: ConnectivityConfig) -> Self {
        Self { store, config }
    }

    /// Test the profile named `name`.
    ///
    /// Unreachable hosts, TLS problems, rejected credentials and timeouts are
    /// reported in the result. Only an unknown name or an unrecoverable
    /// secret is an error.
    #[instrument(skip(self))]
    pub async fn test(&self, name: &str) -> CredentialResult<TestResult> {
        let (record, api_key) = self.load(name).await?;
        let scrubber = SecretScrubber::new().with_secrets([api_key.as_str()]);
        let url = self.url_for(&record);

        let client = match ReqwestClient::builder()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .danger_accept_invalid_certs(!record.verify_ssl)
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                return Ok(TestResult::failure(
                    scrubber.scrub_message(&format!("failed to build HTTP client: {e}")),
                ))
            }
        };

        let response = client
            .get(&url)
            .basic_auth(&record.api_user, Some(api_key.as_str()))
            .header(ACCEPT, "application/json")
            .send()
            .await;

        let result = match response {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    let version = response
                        .json::<ProductVersion>()
                        .await
                        .ok()
                        .and_then(|v| v.version);
                    let detail = version.as_ref().map_or_else(
                        || format!("connected to {}", record.fqdn),
                        |v| format!("connected to {} (version {v})", record.fqdn),
                    );
                    TestResult::success(detail, version)
                } else if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
                    TestResult::failure(format!("authentication rejected (HTTP {status})"))
                } else {
                    TestResult::failure(format!("unexpected response: HTTP {status}"))
                }
            }
            Err(e) if e.is_timeout() => TestResult::failure(format!(
                "timed out after {}s waiting for {}",
                self.config.timeout_secs, record.fqdn
            )),
            Err(e) if e.is_connect() => {
                TestResult::failure(scrubber.scrub_message(&format!("connection failed: {e}")))
            }
            Err(e) => TestResult::failure(scrubber.scrub_message(&format!("request failed: {e}"))),
        };

        if result.success {
            info!(name = %record.name, "connectivity test passed");
        } else {
            warn!(name = %record.name, detail = %result.detail, "connectivity test failed");
        }
        Ok(result)
    }

    /// Read the record and recover its secret off the async executor; agent
    /// signing and file reads block.
    async fn load(&self, name: &str) -> CredentialResult<(CredentialRecord, Zeroizing<String>)> {
        let store = Arc::clone(&self.store);
        let owned = name.to_string();
        tokio::task::spawn_blocking(move || {
            let record = store.get(&owned, SecretAccess::Full)?;
            let api_key = store.engine().reveal(&record)?;
            Ok((record.with_access(SecretAccess::Redacted), api_key))
        })
        .await
        .map_err(|e| {
            CredentialError::storage(Path::new(name), format!("credential load task failed: {e}"))
        })?
    }

    fn url_for(&self, record: &CredentialRecord) -> String {
        format!(
            "{}://{}:{}{PRODUCT_VERSION_PATH}",
            self.config.scheme, record.fqdn, record.port
        )
    }
}
