//! # ultraload-auth
//!
//! Salesforce authentication for ultraload: the OAuth 2.0 JWT bearer flow and
//! a local credential cache.
//!
//! ## Security
//!
//! - Tokens and private keys are redacted in Debug output
//! - Tracing skips credential parameters
//! - Private key material is never written to the credential cache
//! - The cache file is created with mode 0600 on Unix
//!
//! ## Example
//!
//! ```rust,ignore
//! use ultraload_auth::{
//!     load_private_key, CredentialStore, Environment, FileCredentialStore, JwtAuth,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ultraload_auth::Error> {
//!     let key = load_private_key(Some("server.key".as_ref()))?;
//!     let auth = JwtAuth::new("consumer_key", "user@example.com", key);
//!     let login = auth.authenticate_environment(Environment::Sandbox).await?;
//!
//!     FileCredentialStore::new()?.save(&login.into_stored("consumer_key", Environment::Sandbox))?;
//!     Ok(())
//! }
//! ```

mod credentials;
mod error;
mod jwt;
mod storage;

pub use credentials::{Credentials, SalesforceCredentials};
pub use error::{Error, ErrorKind, Result};
pub use jwt::{load_private_key, Environment, JwtAuth, LoginResult};
pub use storage::{
    default_credential_path, CredentialStore, FileCredentialStore, LoginProfile, StoredCredential,
};

/// Salesforce login URL for production.
pub const PRODUCTION_LOGIN_URL: &str = "https://login.salesforce.com";

/// Salesforce login URL for sandbox.
pub const SANDBOX_LOGIN_URL: &str = "https://test.salesforce.com";

/// Environment variable holding PEM private key material.
pub const PRIVATE_KEY_ENV: &str = "SFDC_PRIVATE_KEY";
