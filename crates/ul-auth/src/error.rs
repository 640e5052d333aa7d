//! Error types for ultraload-auth.
//!
//! Error messages are designed to avoid exposing sensitive credential data.

/// Result type alias for ultraload-auth operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for ultraload-auth operations.
///
/// Error messages are sanitized to prevent accidental credential exposure.
#[derive(Debug, thiserror::Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional source error.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Create a new error with the given kind.
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, source: None }
    }

    /// Create a new error with the given kind and source.
    pub fn with_source(
        kind: ErrorKind,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            source: Some(Box::new(source)),
        }
    }
}

/// The kind of error that occurred.
///
/// Error messages avoid including credential values.
#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    /// OAuth error response from the login server.
    #[error("Authentication failed: {error} - {description}")]
    OAuth { error: String, description: String },

    /// JWT signing error.
    #[error("JWT error: {0}")]
    Jwt(String),

    /// Invalid credentials configuration.
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// No cached or supplied credentials were found.
    #[error("Not logged in: {0}")]
    NotLoggedIn(String),

    /// HTTP error during authentication.
    #[error("HTTP error: {0}")]
    Http(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(String),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Environment variable not set.
    #[error("Environment variable not set: {0}")]
    EnvVar(String),

    /// No home directory to hold the credential cache.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The HTTP client could not be built or a request could not be sent.
    #[error("Client error: {0}")]
    Client(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        // URLs on the token endpoint can carry assertions
        let message = err.to_string();
        let sanitized = if message.contains("assertion") || message.contains("token=") {
            "HTTP request failed (details redacted for security)".to_string()
        } else {
            message
        };
        Error::with_source(ErrorKind::Http(sanitized), err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::with_source(ErrorKind::Json(err.to_string()), err)
    }
}

impl From<serde_urlencoded::ser::Error> for Error {
    fn from(err: serde_urlencoded::ser::Error) -> Self {
        Error::with_source(ErrorKind::Serialization(err.to_string()), err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::with_source(ErrorKind::Io(err.to_string()), err)
    }
}

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Error::with_source(ErrorKind::Jwt(err.to_string()), err)
    }
}

impl From<ultraload_client::Error> for Error {
    fn from(err: ultraload_client::Error) -> Self {
        let message = err.to_string();
        let sanitized = if message.contains("Bearer") || message.contains("token") {
            "Client error (details redacted for security)".to_string()
        } else {
            message
        };
        Error::with_source(ErrorKind::Client(sanitized), err)
    }
}
