//! Credentials trait and implementations.
//!
//! All credential types implement custom Debug to redact sensitive data.

use std::time::Duration;

use tracing::debug;
use ultraload_client::{ClientConfig, SalesforceClient};

use crate::error::{Error, ErrorKind, Result};
use crate::storage::{CredentialStore, StoredCredential};

/// Trait for Salesforce credentials.
pub trait Credentials: Send + Sync {
    /// Get the Salesforce instance URL.
    fn instance_url(&self) -> &str;

    /// Get the access token.
    fn access_token(&self) -> &str;

    /// Get the API version (e.g., "53.0").
    fn api_version(&self) -> &str;

    /// Returns true if the credentials appear to be valid (non-empty).
    fn is_valid(&self) -> bool {
        !self.instance_url().is_empty() && !self.access_token().is_empty()
    }
}

/// Resolved credentials for one invocation: where to send requests, the
/// bearer token, and the timeouts to apply.
///
/// The access token is redacted in Debug output.
#[derive(Clone)]
pub struct SalesforceCredentials {
    instance_url: String,
    access_token: String,
    api_version: String,
    client_timeout: Duration,
    download_timeout: Duration,
    connect_timeout: Duration,
}

impl std::fmt::Debug for SalesforceCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SalesforceCredentials")
            .field("instance_url", &self.instance_url)
            .field("access_token", &"[REDACTED]")
            .field("api_version", &self.api_version)
            .field("client_timeout", &self.client_timeout)
            .field("download_timeout", &self.download_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl SalesforceCredentials {
    /// Create new credentials with default timeouts.
    pub fn new(
        instance_url: impl Into<String>,
        access_token: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Self {
        let defaults = ClientConfig::default();
        Self {
            instance_url: instance_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            api_version: api_version.into(),
            client_timeout: defaults.timeout,
            download_timeout: defaults.download_timeout,
            connect_timeout: defaults.connect_timeout,
        }
    }

    /// Build credentials from a cached login.
    pub fn from_stored(stored: &StoredCredential, api_version: impl Into<String>) -> Result<Self> {
        if stored.instance_url.is_empty() || stored.token.is_empty() {
            return Err(Error::new(ErrorKind::InvalidCredentials(
                "stored credential is missing the instance URL or token".to_string(),
            )));
        }

        Ok(Self::new(&stored.instance_url, &stored.token, api_version).with_timeouts(
            Duration::from_secs(stored.client_timeout),
            Duration::from_secs(stored.download_timeout),
            Duration::from_secs(stored.connect_timeout),
        ))
    }

    /// Resolve credentials for a command.
    ///
    /// An explicit instance URL and token (from flags or `SF_INSTANCE_URL` /
    /// `SF_ACCESS_TOKEN`) win; otherwise the cached login is used.
    pub fn resolve(
        instance_url: Option<String>,
        access_token: Option<String>,
        api_version: &str,
        store: &dyn CredentialStore,
    ) -> Result<Self> {
        match (instance_url, access_token) {
            (Some(url), Some(token)) => {
                debug!(instance_url = %url, "Using explicitly supplied credentials");
                Ok(Self::new(url, token, api_version))
            }
            (Some(_), None) | (None, Some(_)) => Err(Error::new(ErrorKind::InvalidInput(
                "instance URL and access token must be supplied together".to_string(),
            ))),
            (None, None) => match store.load()? {
                Some(stored) => {
                    debug!(username = %stored.username, "Using cached login");
                    Self::from_stored(&stored, api_version)
                }
                None => Err(Error::new(ErrorKind::NotLoggedIn(
                    "run `ultra login` or set SF_INSTANCE_URL and SF_ACCESS_TOKEN".to_string(),
                ))),
            },
        }
    }

    /// Change the API version.
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Set the client, download and connect timeouts.
    pub fn with_timeouts(mut self, client: Duration, download: Duration, connect: Duration) -> Self {
        self.client_timeout = client;
        self.download_timeout = download;
        self.connect_timeout = connect;
        self
    }

    /// Timeout for result-page downloads and batch uploads.
    pub fn download_timeout(&self) -> Duration {
        self.download_timeout
    }

    /// Get the Bulk API 2.0 URL for this org.
    pub fn bulk_api_url(&self) -> String {
        format!(
            "{}/services/data/v{}/jobs",
            self.instance_url, self.api_version
        )
    }

    /// HTTP configuration carrying these credentials' timeouts. Retries are
    /// left to the caller.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::builder()
            .without_retry()
            .with_timeout(self.client_timeout)
            .with_download_timeout(self.download_timeout)
            .with_connect_timeout(self.connect_timeout)
            .build()
    }

    /// Build an authenticated API client.
    pub fn connect(&self) -> Result<SalesforceClient> {
        let client =
            SalesforceClient::with_config(&self.instance_url, &self.access_token, self.client_config())?
                .with_api_version(&self.api_version);
        Ok(client)
    }
}

impl Credentials for SalesforceCredentials {
    fn instance_url(&self) -> &str {
        &self.instance_url
    }

    fn access_token(&self) -> &str {
        &self.access_token
    }

    fn api_version(&self) -> &str {
        &self.api_version
    }
}
