//! Error types for ultraload-bulk.

use std::time::Duration;

use ultraload_client::Retryable;

/// Result type alias for ultraload-bulk operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for ultraload-bulk operations.
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

    /// Returns true if the request timed out before the server answered.
    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::Timeout)
    }

    /// HTTP status of a remote rejection, if there was one.
    pub fn status(&self) -> Option<u16> {
        match &self.kind {
            ErrorKind::RemoteProtocol { status, .. } => Some(*status),
            ErrorKind::Auth(_) => Some(401),
            _ => None,
        }
    }
}

/// Bulk API error kinds.
#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    /// Input path missing, of the wrong type, or a bad glob pattern.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Credentials were rejected or could not be obtained.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Upsert requested without an external id field.
    #[error("Missing external id: {0}")]
    MissingExternalId(String),

    /// A unit of work ran out of attempts.
    #[error("Retries exhausted after {attempts} attempts")]
    RetryExhausted { attempts: u32 },

    /// The server answered with a non-2xx status.
    #[error("Remote API error ({status}): {message}")]
    RemoteProtocol { status: u16, message: String },

    /// Local file error.
    #[error("IO error: {0}")]
    Io(String),

    /// A single request timed out.
    #[error("Request timeout")]
    Timeout,

    /// A job did not reach a terminal state in time.
    #[error("Job {job_id} did not finish within {waited:?}")]
    JobTimeout { job_id: String, waited: Duration },

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Transport or decoding failure in the HTTP client.
    #[error("Client error: {0}")]
    Client(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl Retryable for Error {
    fn is_timeout(&self) -> bool {
        Error::is_timeout(self)
    }

    fn is_transient(&self) -> bool {
        match &self.kind {
            ErrorKind::Timeout => true,
            ErrorKind::RemoteProtocol { status, .. } => {
                matches!(status, 429 | 500 | 502 | 503 | 504)
            }
            _ => false,
        }
    }

    fn exhausted(attempts: u32, last: Self) -> Self {
        Error::with_source(ErrorKind::RetryExhausted { attempts }, last)
    }
}

impl From<ultraload_client::Error> for Error {
    fn from(err: ultraload_client::Error) -> Self {
        use ultraload_client::ErrorKind as ClientKind;

        let kind = match &err.kind {
            ClientKind::Authentication(msg) => ErrorKind::Auth(msg.clone()),
            ClientKind::Timeout => ErrorKind::Timeout,
            ClientKind::RetriesExhausted { attempts } => ErrorKind::RetryExhausted {
                attempts: *attempts,
            },
            ClientKind::Http { status, message } => ErrorKind::RemoteProtocol {
                status: *status,
                message: message.clone(),
            },
            ClientKind::SalesforceApi {
                status,
                error_code,
                message,
            } => ErrorKind::RemoteProtocol {
                status: *status,
                message: format!("{error_code}: {message}"),
            },
            ClientKind::Authorization(msg) => ErrorKind::RemoteProtocol {
                status: 403,
                message: msg.clone(),
            },
            ClientKind::NotFound(msg) => ErrorKind::RemoteProtocol {
                status: 404,
                message: msg.clone(),
            },
            ClientKind::RateLimited { .. } => ErrorKind::RemoteProtocol {
                status: 429,
                message: err.kind.to_string(),
            },
            ClientKind::InvalidUrl(msg) => ErrorKind::InvalidInput(msg.clone()),
            other => ErrorKind::Client(other.to_string()),
        };
        Error::with_source(kind, err)
    }
}

impl From<ultraload_auth::Error> for Error {
    fn from(err: ultraload_auth::Error) -> Self {
        let kind = match &err.kind {
            ultraload_auth::ErrorKind::Io(msg) => ErrorKind::Io(msg.clone()),
            ultraload_auth::ErrorKind::InvalidInput(msg) => ErrorKind::InvalidInput(msg.clone()),
            other => ErrorKind::Auth(other.to_string()),
        };
        Error::with_source(kind, err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::with_source(ErrorKind::Io(err.to_string()), err)
    }
}

impl From<glob::PatternError> for Error {
    fn from(err: glob::PatternError) -> Self {
        Error::with_source(ErrorKind::InvalidPath(err.to_string()), err)
    }
}

impl From<glob::GlobError> for Error {
    fn from(err: glob::GlobError) -> Self {
        Error::with_source(ErrorKind::Io(err.to_string()), err)
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::with_source(ErrorKind::Other(format!("worker task failed: {err}")), err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ultraload_client::ErrorKind as ClientKind;

    #[test]
    fn test_client_error_mapping() {
        let err: Error = ultraload_client::Error::new(ClientKind::Authentication(
            "Session expired".to_string(),
        ))
        .into();
        assert!(matches!(err.kind, ErrorKind::Auth(_)));
        assert_eq!(err.status(), Some(401));

        let err: Error = ultraload_client::Error::new(ClientKind::Timeout).into();
        assert!(err.is_timeout());

        let err: Error = ultraload_client::Error::new(ClientKind::SalesforceApi {
            status: 400,
            error_code: "INVALIDJOB".to_string(),
            message: "bad job".to_string(),
        })
        .into();
        match err.kind {
            ErrorKind::RemoteProtocol { status, ref message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "INVALIDJOB: bad job");
            }
            ref other => panic!("unexpected kind: {other:?}"),
        }

        let err: Error = ultraload_client::Error::new(ClientKind::NotFound("gone".into())).into();
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn test_retryable_classification() {
        let timeout = Error::new(ErrorKind::Timeout);
        assert!(Retryable::is_timeout(&timeout));
        assert!(timeout.is_transient());

        let unavailable = Error::new(ErrorKind::RemoteProtocol {
            status: 503,
            message: "down".to_string(),
        });
        assert!(!Retryable::is_timeout(&unavailable));
        assert!(unavailable.is_transient());

        let bad_request = Error::new(ErrorKind::RemoteProtocol {
            status: 400,
            message: "nope".to_string(),
        });
        assert!(!bad_request.is_transient());

        let exhausted = Error::exhausted(10, timeout);
        assert!(matches!(
            exhausted.kind,
            ErrorKind::RetryExhausted { attempts: 10 }
        ));
        assert!(exhausted.source.is_some());
    }

    #[test]
    fn test_display() {
        let err = ErrorKind::JobTimeout {
            job_id: "7505f000002XvzqAAC".to_string(),
            waited: Duration::from_secs(5),
        };
        assert_eq!(
            err.to_string(),
            "Job 7505f000002XvzqAAC did not finish within 5s"
        );
    }
}
