//! Client configuration.

use crate::retry::RetryConfig;
use std::time::Duration;

/// Configuration for the HTTP client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Retry configuration applied inside `execute`. `None` means a single
    /// attempt; callers then layer their own policy on top.
    pub retry: Option<RetryConfig>,
    /// Compression configuration.
    pub compression: CompressionConfig,
    /// Timeout for ordinary API requests.
    pub timeout: Duration,
    /// Timeout for result-page downloads and batch uploads.
    pub download_timeout: Duration,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Pool idle timeout.
    pub pool_idle_timeout: Duration,
    /// Maximum idle connections per host.
    pub pool_max_idle_per_host: usize,
    /// User-Agent header value.
    pub user_agent: String,
    /// Whether to enable request/response tracing.
    pub enable_tracing: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            retry: None,
            compression: CompressionConfig::default(),
            timeout: Duration::from_secs(10),
            download_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(60),
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 32,
            user_agent: crate::USER_AGENT.to_string(),
            enable_tracing: true,
        }
    }
}

impl ClientConfig {
    /// Create a new client config builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }
}

/// Builder for ClientConfig.
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = Some(retry);
        self
    }

    /// Disable retries.
    pub fn without_retry(mut self) -> Self {
        self.config.retry = None;
        self
    }

    /// Set compression configuration.
    pub fn with_compression_config(mut self, config: CompressionConfig) -> Self {
        self.config.compression = config;
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the timeout for downloads and uploads.
    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.config.download_timeout = timeout;
        self
    }

    /// Set connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set custom User-Agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Build the client configuration.
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

/// Configuration for response compression.
#[derive(Debug, Clone)]
pub struct CompressionConfig {
    /// Accept gzip/deflate encoded responses.
    pub accept_compressed: bool,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            accept_compressed: true,
        }
    }
}

impl CompressionConfig {
    /// Disable all compression.
    pub fn disabled() -> Self {
        Self {
            accept_compressed: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert!(config.retry.is_none());
        assert!(config.compression.accept_compressed);
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.download_timeout, Duration::from_secs(60));
        assert_eq!(config.connect_timeout, Duration::from_secs(60));
        assert!(config.user_agent.starts_with("ultraload/"));
    }

    #[test]
    fn test_builder() {
        let config = ClientConfig::builder()
            .with_timeout(Duration::from_secs(20))
            .with_download_timeout(Duration::from_secs(120))
            .without_retry()
            .with_compression_config(CompressionConfig::disabled())
            .with_user_agent("custom-agent/1.0")
            .build();

        assert!(config.retry.is_none());
        assert!(!config.compression.accept_compressed);
        assert_eq!(config.timeout, Duration::from_secs(20));
        assert_eq!(config.download_timeout, Duration::from_secs(120));
        assert_eq!(config.user_agent, "custom-agent/1.0");
    }
}
