//! HTTP request building with Salesforce-specific headers.

use bytes::Bytes;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::Result;

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMethod {
    Get,
    Post,
    Patch,
    Put,
}

impl RequestMethod {
    /// Convert to reqwest::Method.
    pub fn to_reqwest(&self) -> reqwest::Method {
        match self {
            RequestMethod::Get => reqwest::Method::GET,
            RequestMethod::Post => reqwest::Method::POST,
            RequestMethod::Patch => reqwest::Method::PATCH,
            RequestMethod::Put => reqwest::Method::PUT,
        }
    }
}

/// Builder for HTTP requests with Salesforce-specific options.
///
/// Bodies are held as owned values so the same request can be re-sent by a
/// retry loop.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    pub(crate) method: RequestMethod,
    pub(crate) url: String,
    pub(crate) headers: HashMap<String, String>,
    pub(crate) query_params: Vec<(String, String)>,
    pub(crate) body: Option<RequestBody>,
    pub(crate) bearer_token: Option<String>,
    pub(crate) timeout: Option<Duration>,
}

/// Request body content.
#[derive(Debug, Clone)]
pub enum RequestBody {
    Json(serde_json::Value),
    Bytes(Bytes),
}

impl RequestBuilder {
    /// Create a new request builder.
    pub fn new(method: RequestMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            query_params: Vec::new(),
            body: None,
            bearer_token: None,
            timeout: None,
        }
    }

    /// Set the bearer token for authentication.
    pub fn bearer_auth(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Add a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Add a query parameter.
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.push((name.into(), value.into()));
        self
    }

    /// Override the client-wide timeout for this request.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set JSON body.
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self> {
        let value = serde_json::to_value(body)?;
        self.body = Some(RequestBody::Json(value));
        self.headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        Ok(self)
    }

    /// Set CSV body (for Bulk API uploads).
    pub fn csv(mut self, data: impl Into<Bytes>) -> Self {
        self.body = Some(RequestBody::Bytes(data.into()));
        self.headers
            .insert("Content-Type".to_string(), "text/csv".to_string());
        self
    }

    /// Set the Accept header.
    pub fn accept(mut self, content_type: impl Into<String>) -> Self {
        self.headers.insert("Accept".to_string(), content_type.into());
        self
    }
}
