//! Types for Bulk API 2.0 jobs and batches.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, ErrorKind, Result};

/// Deserialize API version that can be either a float (53.0) or string ("53.0").
pub(crate) fn deserialize_api_version<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ApiVersion {
        Float(f64),
        String(String),
    }

    Option::<ApiVersion>::deserialize(deserializer).map(|opt| {
        opt.map(|v| match v {
            ApiVersion::Float(f) => format!("{:.1}", f),
            ApiVersion::String(s) => s,
        })
    })
}

/// Bulk API 2.0 job states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    /// Job is open and accepting data
    Open,
    /// Upload is complete, job is queued for processing
    UploadComplete,
    /// Job is processing
    InProgress,
    /// Job was aborted
    Aborted,
    /// Job completed successfully
    JobComplete,
    /// Job failed
    Failed,
}

impl JobState {
    /// Check if job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Aborted | JobState::JobComplete | JobState::Failed
        )
    }

    /// Check if job completed successfully.
    pub fn is_success(&self) -> bool {
        matches!(self, JobState::JobComplete)
    }
}

/// Bulk API 2.0 operation types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BulkOperation {
    Insert,
    Update,
    Upsert,
    Delete,
    HardDelete,
    Query,
    QueryAll,
}

impl BulkOperation {
    /// Get the API string for this operation.
    pub fn api_name(&self) -> &'static str {
        match self {
            BulkOperation::Insert => "insert",
            BulkOperation::Update => "update",
            BulkOperation::Upsert => "upsert",
            BulkOperation::Delete => "delete",
            BulkOperation::HardDelete => "hardDelete",
            BulkOperation::Query => "query",
            BulkOperation::QueryAll => "queryAll",
        }
    }

    /// Check if this is a query operation.
    pub fn is_query(&self) -> bool {
        matches!(self, BulkOperation::Query | BulkOperation::QueryAll)
    }

    /// Check if this is an ingest operation.
    pub fn is_ingest(&self) -> bool {
        !self.is_query()
    }
}

impl fmt::Display for BulkOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_name())
    }
}

impl FromStr for BulkOperation {
    type Err = Error;

    /// Accepts the API names case-insensitively, plus `hard-delete` and
    /// `query-all`.
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "insert" => Ok(BulkOperation::Insert),
            "update" => Ok(BulkOperation::Update),
            "upsert" => Ok(BulkOperation::Upsert),
            "delete" => Ok(BulkOperation::Delete),
            "harddelete" => Ok(BulkOperation::HardDelete),
            "query" => Ok(BulkOperation::Query),
            "queryall" => Ok(BulkOperation::QueryAll),
            _ => Err(Error::new(ErrorKind::InvalidInput(format!(
                "unknown operation '{s}'"
            )))),
        }
    }
}

/// Which job family a job id belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Query,
    Ingest,
}

impl JobKind {
    /// Path segment under `/jobs/`.
    pub fn path(&self) -> &'static str {
        match self {
            JobKind::Query => "query",
            JobKind::Ingest => "ingest",
        }
    }
}

/// Column delimiter for Bulk API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnDelimiter {
    #[default]
    Comma,
    Tab,
    Semicolon,
    Pipe,
    Backquote,
    Caret,
}

/// Line ending style for Bulk API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LineEnding {
    #[default]
    #[serde(rename = "LF")]
    Lf,
    #[serde(rename = "CRLF")]
    Crlf,
}

// =============================================================================
// Request Types
// =============================================================================

/// Request body for `POST jobs/query`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQueryJobRequest {
    pub operation: BulkOperation,
    pub query: String,
    pub content_type: String,
    pub column_delimiter: ColumnDelimiter,
    pub line_ending: LineEnding,
}

impl CreateQueryJobRequest {
    pub fn new(query: impl Into<String>, operation: BulkOperation) -> Self {
        Self {
            operation,
            query: query.into(),
            content_type: "CSV".to_string(),
            column_delimiter: ColumnDelimiter::default(),
            line_ending: LineEnding::default(),
        }
    }
}

/// Request body for `POST jobs/ingest`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIngestJobRequest {
    pub object: String,
    pub operation: BulkOperation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id_field_name: Option<String>,
    pub content_type: String,
    pub column_delimiter: ColumnDelimiter,
    pub line_ending: LineEnding,
}

impl CreateIngestJobRequest {
    pub fn new(object: impl Into<String>, operation: BulkOperation) -> Self {
        Self {
            object: object.into(),
            operation,
            external_id_field_name: None,
            content_type: "CSV".to_string(),
            column_delimiter: ColumnDelimiter::default(),
            line_ending: LineEnding::default(),
        }
    }

    /// Set the external ID field for upsert operations.
    pub fn with_external_id_field(mut self, field: impl Into<String>) -> Self {
        self.external_id_field_name = Some(field.into());
        self
    }
}

/// Request body for `PATCH jobs/ingest/{id}`.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateJobStateRequest {
    pub state: JobState,
}

impl UpdateJobStateRequest {
    pub fn upload_complete() -> Self {
        Self {
            state: JobState::UploadComplete,
        }
    }

    pub fn abort() -> Self {
        Self {
            state: JobState::Aborted,
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// A query or ingest job as reported by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub state: JobState,
    pub operation: BulkOperation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
    #[serde(default)]
    pub number_records_processed: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_records_failed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_modstamp: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_api_version",
        skip_serializing_if = "Option::is_none"
    )]
    pub api_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id_field_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Position within a query job's result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Record offset, sent base64-encoded.
    Offset(u64),
    /// Cursor returned in a previous page's `Sforce-Locator` header, sent as-is.
    Cursor(String),
}

impl Locator {
    /// Value for the `locator` query parameter.
    pub fn encode(&self) -> String {
        match self {
            Locator::Offset(offset) => {
                base64::engine::general_purpose::STANDARD.encode(offset.to_string())
            }
            Locator::Cursor(cursor) => cursor.clone(),
        }
    }
}

/// One page of query results.
#[derive(Debug, Clone)]
pub struct QueryPage {
    /// CSV body, header included.
    pub data: bytes::Bytes,
    /// Cursor for the following page, `None` on the last page.
    pub next_locator: Option<Locator>,
    /// Value of `Sforce-NumberOfRecords`, when present.
    pub record_count: Option<u64>,
}

/// One slice of a query job's results: fetched with one request and
/// written to one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Batch {
    pub job_id: String,
    /// Instance URL the batch is fetched from.
    pub base_path: String,
    pub start_offset: u64,
    pub size: u64,
    pub api_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
}

impl Batch {
    /// First DNS label of the instance host, used as a per-org namespace.
    pub fn domain(&self) -> Result<String> {
        let parsed = url::Url::parse(&self.base_path).map_err(|e| {
            Error::with_source(
                ErrorKind::InvalidInput(format!("invalid instance URL '{}'", self.base_path)),
                e,
            )
        })?;
        let host = parsed.host_str().ok_or_else(|| {
            Error::new(ErrorKind::InvalidInput(format!(
                "instance URL '{}' has no host",
                self.base_path
            )))
        })?;
        Ok(host.split('.').next().unwrap_or(host).to_string())
    }

    /// `{job_id}_{start_offset:012}.csv`
    pub fn file_name(&self) -> String {
        format!("{}_{:012}.csv", self.job_id, self.start_offset)
    }

    /// Where this batch lands under `data_dir`.
    pub fn output_path(&self, data_dir: &Path) -> Result<PathBuf> {
        Ok(data_dir.join(self.domain()?).join(self.file_name()))
    }

    pub fn locator(&self) -> Locator {
        Locator::Offset(self.start_offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_state_terminal() {
        assert!(!JobState::Open.is_terminal());
        assert!(!JobState::UploadComplete.is_terminal());
        assert!(!JobState::InProgress.is_terminal());
        assert!(JobState::JobComplete.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(JobState::Aborted.is_terminal());
        assert!(!JobState::Failed.is_success());
    }

    #[test]
    fn test_bulk_operation_parse() {
        assert_eq!("insert".parse::<BulkOperation>().unwrap(), BulkOperation::Insert);
        assert_eq!("hardDelete".parse::<BulkOperation>().unwrap(), BulkOperation::HardDelete);
        assert_eq!("hard-delete".parse::<BulkOperation>().unwrap(), BulkOperation::HardDelete);
        assert_eq!("QUERYALL".parse::<BulkOperation>().unwrap(), BulkOperation::QueryAll);
        assert!("merge".parse::<BulkOperation>().is_err());

        assert!(BulkOperation::QueryAll.is_query());
        assert!(BulkOperation::Upsert.is_ingest());
        assert_eq!(BulkOperation::HardDelete.to_string(), "hardDelete");
    }

    #[test]
    fn test_request_bodies() {
        let body =
            serde_json::to_value(CreateQueryJobRequest::new("SELECT Id FROM Account", BulkOperation::QueryAll))
                .unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "operation": "queryAll",
                "query": "SELECT Id FROM Account",
                "contentType": "CSV",
                "columnDelimiter": "COMMA",
                "lineEnding": "LF"
            })
        );

        let body = serde_json::to_value(
            CreateIngestJobRequest::new("Contact", BulkOperation::Upsert)
                .with_external_id_field("Ext_Id__c"),
        )
        .unwrap();
        assert_eq!(body["operation"], "upsert");
        assert_eq!(body["externalIdFieldName"], "Ext_Id__c");

        let body = serde_json::to_value(CreateIngestJobRequest::new("Contact", BulkOperation::Insert))
            .unwrap();
        assert!(body.get("externalIdFieldName").is_none());

        let body = serde_json::to_value(UpdateJobStateRequest::abort()).unwrap();
        assert_eq!(body, serde_json::json!({"state": "Aborted"}));
    }

    #[test]
    fn test_job_deserialize() {
        let job: Job = serde_json::from_value(serde_json::json!({
            "id": "7505f000002XvzqAAC",
            "operation": "query",
            "object": "Account",
            "state": "JobComplete",
            "apiVersion": 53.0,
            "numberRecordsProcessed": 1000,
            "concurrencyMode": "Parallel"
        }))
        .unwrap();

        assert_eq!(job.state, JobState::JobComplete);
        assert_eq!(job.operation, BulkOperation::Query);
        assert_eq!(job.api_version.as_deref(), Some("53.0"));
        assert_eq!(job.number_records_processed, 1000);
        assert!(job.number_records_failed.is_none());
    }

    #[test]
    fn test_locator_encoding() {
        assert_eq!(Locator::Offset(0).encode(), "MA==");
        assert_eq!(Locator::Offset(250).encode(), "MjUw");
        assert_eq!(Locator::Cursor("MTAwMDA".to_string()).encode(), "MTAwMDA");
    }

    #[test]
    fn test_batch_paths() {
        let batch = Batch {
            job_id: "7505f000002XvzqAAC".to_string(),
            base_path: "https://acme.my.salesforce.com".to_string(),
            start_offset: 250,
            size: 250,
            api_version: "53.0".to_string(),
            object: Some("Account".to_string()),
        };

        assert_eq!(batch.domain().unwrap(), "acme");
        assert_eq!(batch.file_name(), "7505f000002XvzqAAC_000000000250.csv");
        assert_eq!(
            batch.output_path(Path::new("data")).unwrap(),
            Path::new("data/acme/7505f000002XvzqAAC_000000000250.csv")
        );

        let local = Batch {
            base_path: "http://127.0.0.1:8080".to_string(),
            ..batch
        };
        assert_eq!(local.domain().unwrap(), "127");
    }
}
