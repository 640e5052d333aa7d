//! JWT Bearer authentication flow.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{Error, ErrorKind, Result};
use crate::storage::StoredCredential;

/// Which Salesforce login server to authenticate against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    Sandbox,
}

impl Environment {
    /// The OAuth login URL for this environment.
    pub fn login_url(&self) -> &'static str {
        match self {
            Environment::Production => crate::PRODUCTION_LOGIN_URL,
            Environment::Sandbox => crate::SANDBOX_LOGIN_URL,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Production => "production",
            Environment::Sandbox => "sandbox",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "production" => Ok(Environment::Production),
            "sandbox" => Ok(Environment::Sandbox),
            other => Err(Error::new(ErrorKind::InvalidInput(format!(
                "environment must be sandbox or production, got {other}"
            )))),
        }
    }
}

/// Read PEM private key material from `path`, or from the `SFDC_PRIVATE_KEY`
/// environment variable when no path is given.
pub fn load_private_key(path: Option<&Path>) -> Result<Vec<u8>> {
    resolve_private_key(path, std::env::var(crate::PRIVATE_KEY_ENV).ok())
}

fn resolve_private_key(path: Option<&Path>, env_value: Option<String>) -> Result<Vec<u8>> {
    match path {
        Some(path) => {
            if !path.is_file() {
                return Err(Error::new(ErrorKind::InvalidCredentials(format!(
                    "the private key could not be found at {}",
                    path.display()
                ))));
            }
            Ok(std::fs::read(path)?)
        }
        None => env_value
            .filter(|key| !key.trim().is_empty())
            .map(String::into_bytes)
            .ok_or_else(|| Error::new(ErrorKind::EnvVar(crate::PRIVATE_KEY_ENV.to_string()))),
    }
}

/// JWT Bearer authentication for server-to-server integration.
///
/// Requires a connected app with a certificate configured.
#[derive(Clone)]
pub struct JwtAuth {
    /// Consumer key (client_id) from the connected app.
    consumer_key: String,
    /// Username of the Salesforce user to authenticate as.
    username: String,
    /// Private key for signing the JWT (PEM format).
    private_key: Vec<u8>,
    /// Assertion lifetime.
    expiration: Duration,
    /// Timeout for the token request.
    timeout: StdDuration,
}

impl std::fmt::Debug for JwtAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtAuth")
            .field("consumer_key", &self.consumer_key)
            .field("username", &self.username)
            .field("private_key", &"[REDACTED]")
            .field("expiration", &self.expiration)
            .finish()
    }
}

impl JwtAuth {
    /// Create a new JWT authenticator.
    ///
    /// # Arguments
    ///
    /// * `consumer_key` - The consumer key from the connected app
    /// * `username` - The Salesforce username to authenticate as
    /// * `private_key` - The private key in PEM format (RSA)
    pub fn new(
        consumer_key: impl Into<String>,
        username: impl Into<String>,
        private_key: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            username: username.into(),
            private_key: private_key.into(),
            expiration: Duration::minutes(3),
            timeout: StdDuration::from_secs(10),
        }
    }

    /// Set the JWT expiration duration.
    pub fn with_expiration(mut self, expiration: Duration) -> Self {
        self.expiration = expiration;
        self
    }

    /// Set the token request timeout.
    pub fn with_timeout(mut self, timeout: StdDuration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Generate a signed JWT assertion.
    fn generate_assertion(&self, audience: &str) -> Result<String> {
        let now = Utc::now();
        let exp = now + self.expiration;

        let claims = JwtClaims {
            iss: self.consumer_key.clone(),
            sub: self.username.clone(),
            aud: audience.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        let header = Header::new(Algorithm::RS256);
        let key = EncodingKey::from_rsa_pem(&self.private_key)?;

        Ok(encode(&header, &claims, &key)?)
    }

    /// Authenticate using the JWT Bearer flow against `login_url`.
    ///
    /// Returns the instance URL and access token issued for the user.
    #[instrument(skip(self), fields(username = %self.username))]
    pub async fn authenticate(&self, login_url: &str) -> Result<LoginResult> {
        let login_url = login_url.trim_end_matches('/');
        let assertion = self.generate_assertion(login_url)?;

        debug!(login_url, "Authenticating with JWT Bearer flow");

        let body = serde_urlencoded::to_string([
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", assertion.as_str()),
        ])?;

        let client = reqwest::Client::builder().timeout(self.timeout).build()?;
        let response = client
            .post(format!("{}/services/oauth2/token", login_url))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let error = serde_json::from_slice::<OAuthErrorResponse>(&bytes).unwrap_or_else(|_| {
                OAuthErrorResponse {
                    error: format!("http_{}", status.as_u16()),
                    error_description: "unexpected response from the login server".to_string(),
                }
            });
            return Err(Error::new(ErrorKind::OAuth {
                error: error.error,
                description: error.error_description,
            }));
        }

        let token_response: JwtTokenResponse = serde_json::from_slice(&bytes)?;

        Ok(LoginResult {
            username: self.username.clone(),
            instance_url: token_response.instance_url,
            access_token: token_response.access_token,
            issued_at: Utc::now(),
        })
    }

    /// Authenticate against the login server for `environment`.
    pub async fn authenticate_environment(&self, environment: Environment) -> Result<LoginResult> {
        self.authenticate(environment.login_url()).await
    }
}

/// Tokens issued by a successful login.
#[derive(Clone)]
pub struct LoginResult {
    pub username: String,
    pub instance_url: String,
    pub access_token: String,
    pub issued_at: DateTime<Utc>,
}

impl std::fmt::Debug for LoginResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginResult")
            .field("username", &self.username)
            .field("instance_url", &self.instance_url)
            .field("access_token", &"[REDACTED]")
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

impl LoginResult {
    /// Convert into the record persisted by a credential store.
    pub fn into_stored(
        self,
        consumer_id: impl Into<String>,
        environment: Environment,
    ) -> StoredCredential {
        StoredCredential {
            username: self.username,
            consumer_id: consumer_id.into(),
            environment,
            instance_url: self.instance_url,
            token: self.access_token,
            issued_at: Some(self.issued_at),
            ..StoredCredential::default()
        }
    }
}

/// JWT claims for Salesforce OAuth.
#[derive(Debug, Serialize, Deserialize)]
struct JwtClaims {
    /// Issuer (consumer key).
    iss: String,
    /// Subject (username).
    sub: String,
    /// Audience (login URL).
    aud: String,
    /// Expiration time (Unix timestamp).
    exp: i64,
    /// Issued at time (Unix timestamp).
    iat: i64,
}

/// Token response from JWT authentication.
#[derive(Debug, Deserialize)]
struct JwtTokenResponse {
    access_token: String,
    instance_url: String,
}

/// OAuth error response.
#[derive(Debug, Deserialize)]
struct OAuthErrorResponse {
    error: String,
    #[serde(default)]
    error_description: String,
}
