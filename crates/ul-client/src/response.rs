//! HTTP response handling with Salesforce-specific extensions.

use regex_lite::Regex;
use serde::de::DeserializeOwned;
use std::sync::LazyLock;
use std::time::Duration;

use crate::error::{Error, ErrorKind, Result};

/// Salesforce access tokens: org id prefix, "!", then the opaque part.
static TOKEN_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"00[A-Za-z0-9]{13,}[!][A-Za-z0-9_.]+").ok());

static SESSION_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"sid=[A-Za-z0-9]{20,}").ok());

/// Wrapper around HTTP response with additional functionality.
#[derive(Debug)]
pub struct Response {
    inner: reqwest::Response,
}

impl Response {
    pub(crate) fn new(inner: reqwest::Response) -> Self {
        Self { inner }
    }

    /// Get the HTTP status code.
    pub fn status(&self) -> u16 {
        self.inner.status().as_u16()
    }

    /// Returns true if the response status is successful (2xx).
    pub fn is_success(&self) -> bool {
        self.inner.status().is_success()
    }

    /// Get a header value.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner.headers().get(name)?.to_str().ok()
    }

    /// Get the Retry-After header as a Duration. Only the delta-seconds
    /// form is understood.
    pub fn retry_after(&self) -> Option<Duration> {
        self.header("retry-after")?
            .parse::<u64>()
            .ok()
            .map(Duration::from_secs)
    }

    /// Get the response body as text.
    pub async fn text(self) -> Result<String> {
        self.inner.text().await.map_err(Into::into)
    }

    /// Get the response body as bytes.
    pub async fn bytes(self) -> Result<bytes::Bytes> {
        self.inner.bytes().await.map_err(Into::into)
    }

    /// Deserialize the response body as JSON.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T> {
        let body = self.inner.bytes().await?;
        serde_json::from_slice(&body).map_err(Into::into)
    }

    /// Get API usage limits from the `Sforce-Limit-Info` header
    /// (format: `api-usage=25/15000`).
    pub fn api_usage(&self) -> Option<ApiUsage> {
        let info = self.header("sforce-limit-info")?;

        for part in info.split(',') {
            if let Some(usage) = part.trim().strip_prefix("api-usage=") {
                let (used, limit) = usage.split_once('/')?;
                return Some(ApiUsage {
                    used: used.parse().ok()?,
                    limit: limit.parse().ok()?,
                });
            }
        }

        None
    }
}

/// API usage information from response headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiUsage {
    /// Number of API calls used.
    pub used: u64,
    /// Total API call limit.
    pub limit: u64,
}

impl ApiUsage {
    /// Get the remaining API calls.
    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.used)
    }

    /// Get the usage percentage.
    pub fn percentage(&self) -> f64 {
        if self.limit == 0 {
            100.0
        } else {
            (self.used as f64 / self.limit as f64) * 100.0
        }
    }
}

/// Extension trait for processing Salesforce API responses.
pub trait ResponseExt {
    /// Turn any non-2xx response into an error carrying the status and a
    /// sanitized message.
    fn check_salesforce_error(self) -> impl std::future::Future<Output = Result<Response>> + Send;
}

impl ResponseExt for Response {
    async fn check_salesforce_error(self) -> Result<Response> {
        if self.is_success() {
            return Ok(self);
        }

        let status = self.status();
        let retry_after = self.retry_after();
        let body = self.text().await.unwrap_or_default();
        Err(parse_error_response(status, retry_after, &body))
    }
}

/// Convert an error response body into the matching error kind.
fn parse_error_response(status: u16, retry_after: Option<Duration>, body: &str) -> Error {
    if status == 429 {
        return Error::new(ErrorKind::RateLimited { retry_after });
    }

    let api_error = serde_json::from_str::<Vec<SalesforceErrorResponse>>(body)
        .ok()
        .and_then(|errors| errors.into_iter().next())
        .or_else(|| serde_json::from_str::<SalesforceErrorResponse>(body).ok());

    // Credentials problems stay recognizable regardless of body shape
    if status == 401 {
        let message = match api_error {
            Some(err) => format!("{}: {}", err.error_code, sanitize_error_message(&err.message)),
            None => sanitize_error_message(body),
        };
        return Error::new(ErrorKind::Authentication(message));
    }

    if let Some(err) = api_error {
        return Error::new(ErrorKind::SalesforceApi {
            status,
            error_code: err.error_code,
            message: sanitize_error_message(&err.message),
        });
    }

    let sanitized = sanitize_error_message(body);
    let kind = match status {
        403 => ErrorKind::Authorization(sanitized),
        404 => ErrorKind::NotFound(sanitized),
        _ => ErrorKind::Http {
            status,
            message: sanitized,
        },
    };

    Error::new(kind)
}

/// Strip access tokens and session ids from a message and cap its length.
pub(crate) fn sanitize_error_message(message: &str) -> String {
    const MAX_LENGTH: usize = 500;

    let mut sanitized = message.to_string();

    if let Some(pattern) = TOKEN_PATTERN.as_ref() {
        sanitized = pattern
            .replace_all(&sanitized, "[REDACTED_TOKEN]")
            .to_string();
    }

    if let Some(pattern) = SESSION_PATTERN.as_ref() {
        sanitized = pattern
            .replace_all(&sanitized, "sid=[REDACTED]")
            .to_string();
    }

    if sanitized.len() > MAX_LENGTH {
        let mut cut = MAX_LENGTH;
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized.truncate(cut);
        sanitized.push_str("...[truncated]");
    }

    sanitized
}

/// Salesforce API error response format.
#[derive(Debug, serde::Deserialize)]
struct SalesforceErrorResponse {
    #[serde(alias = "errorCode")]
    error_code: String,
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_usage() {
        let usage = ApiUsage {
            used: 100,
            limit: 1000,
        };

        assert_eq!(usage.remaining(), 900);
        assert!((usage.percentage() - 10.0).abs() < 0.001);

        let usage = ApiUsage { used: 0, limit: 0 };
        assert_eq!(usage.remaining(), 0);
        assert!((usage.percentage() - 100.0).abs() < 0.001);
    }

    #[test]
    fn test_parse_error_array_body() {
        let body = r#"[{"errorCode":"INVALIDJOB","message":"Unable to find object: Acount"}]"#;
        let err = parse_error_response(400, None, body);

        match err.kind {
            ErrorKind::SalesforceApi {
                status,
                error_code,
                message,
            } => {
                assert_eq!(status, 400);
                assert_eq!(error_code, "INVALIDJOB");
                assert_eq!(message, "Unable to find object: Acount");
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn test_parse_error_single_object_body() {
        let body = r#"{"errorCode":"NOT_FOUND","message":"The requested resource does not exist"}"#;
        let err = parse_error_response(404, None, body);
        assert!(matches!(err.kind, ErrorKind::SalesforceApi { status: 404, .. }));
    }

    #[test]
    fn test_parse_error_401_is_authentication() {
        let body = r#"[{"errorCode":"INVALID_SESSION_ID","message":"Session expired or invalid"}]"#;
        let err = parse_error_response(401, None, body);

        assert!(matches!(err.kind, ErrorKind::Authentication(_)));
        assert!(err.to_string().contains("INVALID_SESSION_ID"));

        let err = parse_error_response(401, None, "unauthorized");
        assert!(matches!(err.kind, ErrorKind::Authentication(_)));
    }

    #[test]
    fn test_parse_error_plain_body() {
        let err = parse_error_response(502, None, "<html>bad gateway</html>");
        assert!(matches!(err.kind, ErrorKind::Http { status: 502, .. }));
        assert!(err.is_retryable());

        let err = parse_error_response(403, None, "denied");
        assert!(matches!(err.kind, ErrorKind::Authorization(_)));
    }

    #[test]
    fn test_parse_error_rate_limited() {
        let err = parse_error_response(429, Some(Duration::from_secs(5)), "");
        assert_eq!(err.status(), Some(429));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_sanitize_redacts_access_tokens() {
        let msg = "Session expired: 00Dxx0000001gEF!AQcAQH3k9s7LKbp_example_token_value.here";
        let sanitized = sanitize_error_message(msg);
        assert!(sanitized.contains("[REDACTED_TOKEN]"), "{sanitized}");
        assert!(!sanitized.contains("AQcAQH3k9s7LKbp"), "{sanitized}");
    }

    #[test]
    fn test_sanitize_redacts_session_ids() {
        let msg = "Invalid session: sid=abc123def456ghi789jkl012";
        let sanitized = sanitize_error_message(msg);
        assert!(sanitized.contains("sid=[REDACTED]"), "{sanitized}");
        assert!(!sanitized.contains("abc123def456"), "{sanitized}");
    }

    #[test]
    fn test_sanitize_truncates_long_messages() {
        let sanitized = sanitize_error_message(&"x".repeat(600));
        assert!(sanitized.len() < 600);
        assert!(sanitized.ends_with("...[truncated]"));

        // Multi-byte characters straddling the cut must not panic
        let sanitized = sanitize_error_message(&"é".repeat(400));
        assert!(sanitized.ends_with("...[truncated]"));
    }

    #[test]
    fn test_sanitize_passes_through_clean_messages() {
        let msg = "No such column 'foo' on entity 'Account'";
        assert_eq!(sanitize_error_message(msg), msg);
    }
}
