//! # ultraload-client
//!
//! Core HTTP client infrastructure for the Salesforce Bulk API 2.0.
//!
//! This crate provides the foundational HTTP client with:
//! - A configurable retry policy (error predicate, backoff schedule, attempt ceiling)
//! - Compression support (gzip, deflate)
//! - Rate limit detection
//! - Connection pooling shared across concurrent workers
//! - Request/response tracing
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Application Layer                        │
//! │  (ultraload-bulk: job client, orchestrator, poller)         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   SalesforceClient                          │
//! │  - Holds instance URL, bearer token, API version            │
//! │  - Provides typed JSON methods (get_json, post_json, ...)   │
//! │  - Builds Bulk API 2.0 URLs                                 │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      HttpClient                             │
//! │  - Raw HTTP with optional retry, compression, rate limits   │
//! │  - Maps every non-2xx response to an error                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use ultraload_client::{ClientConfig, SalesforceClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ultraload_client::Error> {
//!     let client = SalesforceClient::with_config(
//!         "https://myorg.my.salesforce.com",
//!         "access_token",
//!         ClientConfig::builder().without_retry().build(),
//!     )?
//!     .with_api_version("53.0");
//!
//!     let job: serde_json::Value = client
//!         .get_json(&client.bulk_url("query/750xx0000000001"))
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod error;
mod request;
mod response;
mod retry;
mod salesforce_client;
pub mod security;

pub use client::HttpClient;
pub use config::{ClientConfig, ClientConfigBuilder, CompressionConfig};
pub use error::{Error, ErrorKind, Result};
pub use request::{RequestBuilder, RequestMethod};
pub use response::{ApiUsage, Response, ResponseExt};
pub use retry::{RetryConfig, RetryOn, RetryPolicy, Retryable};
pub use salesforce_client::SalesforceClient;

/// Default Salesforce API version
pub const DEFAULT_API_VERSION: &str = "53.0";

/// User-Agent string for the client
pub const USER_AGENT: &str = concat!("ultraload/", env!("CARGO_PKG_VERSION"));
