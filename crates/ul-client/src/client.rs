//! Core HTTP client with retry, compression, and Salesforce-specific handling.

use tracing::{debug, info, instrument};

use crate::config::ClientConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::request::{RequestBody, RequestBuilder, RequestMethod};
use crate::response::{Response, ResponseExt};
use crate::retry::RetryPolicy;

/// HTTP client for Salesforce APIs with optional retry, compression, and
/// error mapping. Cloning is cheap and shares the connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
    config: ClientConfig,
}

impl HttpClient {
    /// Create a new HTTP client.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .user_agent(&config.user_agent)
            .gzip(config.compression.accept_compressed)
            .deflate(config.compression.accept_compressed);

        let inner = builder
            .build()
            .map_err(|e| Error::with_source(ErrorKind::Config(e.to_string()), e))?;

        Ok(Self { inner, config })
    }

    /// Create a new HTTP client with default configuration.
    pub fn default_client() -> Result<Self> {
        Self::new(ClientConfig::default())
    }

    /// Get the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Create a GET request builder.
    pub fn get(&self, url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(RequestMethod::Get, url)
    }

    /// Create a POST request builder.
    pub fn post(&self, url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(RequestMethod::Post, url)
    }

    /// Create a PATCH request builder.
    pub fn patch(&self, url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(RequestMethod::Patch, url)
    }

    /// Create a PUT request builder.
    pub fn put(&self, url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(RequestMethod::Put, url)
    }

    /// Execute a request, retrying according to the configured policy.
    #[instrument(skip(self, request), fields(method = ?request.method, url = %request.url))]
    pub async fn execute(&self, request: RequestBuilder) -> Result<Response> {
        match self.config.retry.clone() {
            Some(config) => {
                let this = self;
                let request = &request;
                RetryPolicy::new(config)
                    .run(move || this.execute_once(request))
                    .await
            }
            None => self.execute_once(&request).await,
        }
    }

    /// Execute a single request without retry logic.
    async fn execute_once(&self, request: &RequestBuilder) -> Result<Response> {
        let mut url = url::Url::parse(&request.url)?;
        if !request.query_params.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query_params);
        }

        let mut req = self.inner.request(request.method.to_reqwest(), url);

        if let Some(ref token) = request.bearer_token {
            req = req.bearer_auth(token);
        }

        for (name, value) in &request.headers {
            req = req.header(name.as_str(), value.as_str());
        }

        if let Some(timeout) = request.timeout {
            req = req.timeout(timeout);
        }

        if let Some(ref body) = request.body {
            req = match body {
                RequestBody::Json(value) => req.json(value),
                RequestBody::Bytes(bytes) => req.body(bytes.clone()),
            };
        }

        if self.config.enable_tracing {
            debug!(method = ?request.method, url = %request.url, "Sending request");
        }

        let response = Response::new(req.send().await?);

        if self.config.enable_tracing {
            let status = response.status();
            if response.is_success() {
                debug!(status, "Response received");
            } else {
                info!(status, "Non-success response");
            }
            if let Some(usage) = response.api_usage() {
                debug!(used = usage.used, limit = usage.limit, "API usage");
            }
        }

        response.check_salesforce_error().await
    }

    /// Execute a request and deserialize the JSON response.
    pub async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T> {
        let response = self.execute(request).await?;
        response.json().await
    }
}
