//! High-level Salesforce client with typed HTTP methods.
//!
//! This module provides `SalesforceClient`, which combines credentials with
//! an HTTP client and provides typed JSON methods for API interactions.
//!
//! ## Security
//!
//! - Access tokens are redacted in Debug output
//! - Sensitive parameters are skipped in tracing spans

use serde::{de::DeserializeOwned, Serialize};
use tracing::instrument;

use crate::client::HttpClient;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::request::RequestBuilder;
use crate::response::Response;
use crate::DEFAULT_API_VERSION;

/// High-level Salesforce API client.
///
/// Holds the instance URL, bearer token, and API version used to build
/// authenticated Bulk API 2.0 requests. Clones share one connection pool, so
/// a single client can be handed to many concurrent workers.
///
/// The access token is redacted in Debug output.
///
/// # Example
///
/// ```rust,ignore
/// use ultraload_client::SalesforceClient;
///
/// let client = SalesforceClient::new("https://myorg.my.salesforce.com", token)?;
/// let job: serde_json::Value = client
///     .get_json(&client.bulk_url("query/750xx0000000001AAA"))
///     .await?;
/// ```
#[derive(Clone)]
pub struct SalesforceClient {
    http: HttpClient,
    instance_url: String,
    access_token: String,
    api_version: String,
}

impl std::fmt::Debug for SalesforceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SalesforceClient")
            .field("instance_url", &self.instance_url)
            .field("access_token", &"[REDACTED]")
            .field("api_version", &self.api_version)
            .finish_non_exhaustive()
    }
}

impl SalesforceClient {
    /// Create a new Salesforce client with the given instance URL and access token.
    pub fn new(instance_url: impl Into<String>, access_token: impl Into<String>) -> Result<Self> {
        Self::with_config(instance_url, access_token, ClientConfig::default())
    }

    /// Create a new Salesforce client with custom configuration.
    pub fn with_config(
        instance_url: impl Into<String>,
        access_token: impl Into<String>,
        config: ClientConfig,
    ) -> Result<Self> {
        let http = HttpClient::new(config)?;
        Ok(Self {
            http,
            instance_url: instance_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
        })
    }

    /// Set the API version (e.g., "53.0").
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Get the instance URL.
    pub fn instance_url(&self) -> &str {
        &self.instance_url
    }

    /// Get the access token.
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Get the API version.
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Get the HTTP configuration (timeouts, retry).
    pub fn config(&self) -> &ClientConfig {
        self.http.config()
    }

    /// Build the full URL for a path.
    ///
    /// If the path starts with `/`, it's appended to the instance URL.
    /// Otherwise, it's assumed to be a full URL.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.instance_url, path)
        } else {
            format!("{}/{}", self.instance_url, path)
        }
    }

    /// Build the Bulk API 2.0 URL for a path using the client's API version.
    ///
    /// Example: `bulk_url("query")` -> `{instance}/services/data/v53.0/jobs/query`
    pub fn bulk_url(&self, path: &str) -> String {
        self.bulk_url_for(&self.api_version, path)
    }

    /// Build the Bulk API 2.0 URL for a path pinned to a specific API version.
    pub fn bulk_url_for(&self, api_version: &str, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!(
            "{}/services/data/v{}/jobs/{}",
            self.instance_url, api_version, path
        )
    }

    // =========================================================================
    // Base HTTP Methods (with authentication)
    // =========================================================================

    /// Create a GET request builder with authentication.
    pub fn get(&self, url: &str) -> RequestBuilder {
        self.http.get(url).bearer_auth(&self.access_token)
    }

    /// Create a POST request builder with authentication.
    pub fn post(&self, url: &str) -> RequestBuilder {
        self.http.post(url).bearer_auth(&self.access_token)
    }

    /// Create a PATCH request builder with authentication.
    pub fn patch(&self, url: &str) -> RequestBuilder {
        self.http.patch(url).bearer_auth(&self.access_token)
    }

    /// Create a PUT request builder with authentication.
    pub fn put(&self, url: &str) -> RequestBuilder {
        self.http.put(url).bearer_auth(&self.access_token)
    }

    /// Execute a request and return the raw response.
    pub async fn execute(&self, request: RequestBuilder) -> Result<Response> {
        self.http.execute(request).await
    }

    // =========================================================================
    // Typed JSON Methods
    // =========================================================================

    /// GET request with JSON response deserialization.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let full_url = self.url(url);
        self.http.send_json(self.get(&full_url)).await
    }

    /// POST request with JSON body and response.
    #[instrument(skip(self, body), fields(url = %url))]
    pub async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T> {
        let full_url = self.url(url);
        let request = self.post(&full_url).json(body)?;
        self.http.send_json(request).await
    }

    /// PATCH request with JSON body and response.
    #[instrument(skip(self, body), fields(url = %url))]
    pub async fn patch_json<T: DeserializeOwned, B: Serialize>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T> {
        let full_url = self.url(url);
        let request = self.patch(&full_url).json(body)?;
        self.http.send_json(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_url_building() {
        let client = SalesforceClient::new("https://na1.salesforce.com", "token123").unwrap();

        assert_eq!(
            client.url("/services/data"),
            "https://na1.salesforce.com/services/data"
        );
        assert_eq!(
            client.url("services/data"),
            "https://na1.salesforce.com/services/data"
        );
        assert_eq!(client.url("https://other.com/path"), "https://other.com/path");
        assert_eq!(
            client.bulk_url("ingest"),
            "https://na1.salesforce.com/services/data/v53.0/jobs/ingest"
        );
        assert_eq!(
            client.bulk_url_for("58.0", "/query/750xx/results"),
            "https://na1.salesforce.com/services/data/v58.0/jobs/query/750xx/results"
        );
    }

    #[test]
    fn test_api_version_and_trailing_slash() {
        let client = SalesforceClient::new("https://na1.salesforce.com/", "token")
            .unwrap()
            .with_api_version("60.0");

        assert_eq!(client.instance_url(), "https://na1.salesforce.com");
        assert_eq!(client.api_version(), "60.0");
        assert_eq!(
            client.bulk_url("query"),
            "https://na1.salesforce.com/services/data/v60.0/jobs/query"
        );
    }

    #[test]
    fn test_debug_redacts_token() {
        let client = SalesforceClient::new("https://na1.salesforce.com", "secret-token").unwrap();
        let debug = format!("{client:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("secret-token"));
    }

    #[tokio::test]
    async fn test_post_json_sends_bearer_and_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/services/data/v53.0/jobs/query"))
            .and(header("Authorization", "Bearer tok"))
            .and(body_json(serde_json::json!({"operation": "query"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "750"})))
            .mount(&server)
            .await;

        let client = SalesforceClient::with_config(
            server.uri(),
            "tok",
            ClientConfig::builder().without_retry().build(),
        )
        .unwrap();

        let value: serde_json::Value = client
            .post_json(&client.bulk_url("query"), &serde_json::json!({"operation": "query"}))
            .await
            .unwrap();

        assert_eq!(value["id"], "750");
    }

    #[tokio::test]
    async fn test_default_client_sends_single_request_on_503() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/services/data/v53.0/jobs/query/750"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let client = SalesforceClient::new(server.uri(), "tok").unwrap();
        assert!(client.config().retry.is_none());

        let err = client
            .get_json::<serde_json::Value>(&client.bulk_url("query/750"))
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(503));
        assert!(!matches!(err.kind, crate::ErrorKind::RetriesExhausted { .. }));
        server.verify().await;
    }
}
