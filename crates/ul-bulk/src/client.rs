//! Bulk API 2.0 job client.
//!
//! A thin typed layer over [`SalesforceClient`]: one method per remote call,
//! no retries and no concurrency. Those belong to the orchestrator.

use std::time::Duration;

use bytes::Bytes;
use tracing::{instrument, warn};

use ultraload_client::security::{names, url as url_security};
use ultraload_client::SalesforceClient;

use crate::error::{Error, ErrorKind, Result};
use crate::types::*;

/// Salesforce Bulk API 2.0 client.
///
/// # Example
///
/// ```rust,ignore
/// use ultraload_bulk::{BulkApiClient, BulkOperation};
/// use ultraload_client::SalesforceClient;
///
/// let client = BulkApiClient::new(SalesforceClient::new(
///     "https://myorg.my.salesforce.com",
///     "access_token_here",
/// )?);
///
/// let job = client
///     .create_ingest_job("Account", BulkOperation::Insert, None)
///     .await?;
/// client.upload_ingest_batch(&job.id, "Name\nAcme\n").await?;
/// client.finalize_ingest_job(&job.id, true).await?;
/// ```
#[derive(Debug, Clone)]
pub struct BulkApiClient {
    client: SalesforceClient,
    download_timeout: Duration,
}

impl BulkApiClient {
    /// Wrap an authenticated client. Page downloads and batch uploads use
    /// the client's `download_timeout`.
    pub fn new(client: SalesforceClient) -> Self {
        let download_timeout = client.config().download_timeout;
        Self {
            client,
            download_timeout,
        }
    }

    /// Override the timeout applied to page downloads and batch uploads.
    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    /// Get the underlying SalesforceClient.
    pub fn inner(&self) -> &SalesforceClient {
        &self.client
    }

    /// Get the instance URL.
    pub fn instance_url(&self) -> &str {
        self.client.instance_url()
    }

    /// Get the API version.
    pub fn api_version(&self) -> &str {
        self.client.api_version()
    }

    // =========================================================================
    // Query Jobs
    // =========================================================================

    /// Create a query job. `operation` must be `query` or `queryAll`.
    #[instrument(skip(self, query))]
    pub async fn create_query_job(&self, query: &str, operation: BulkOperation) -> Result<Job> {
        if !operation.is_query() {
            return Err(Error::new(ErrorKind::InvalidInput(format!(
                "'{operation}' is not a query operation"
            ))));
        }
        if query.trim().is_empty() {
            return Err(Error::new(ErrorKind::InvalidInput(
                "query must not be empty".to_string(),
            )));
        }

        let url = self.client.bulk_url("query");
        let request = CreateQueryJobRequest::new(query, operation);
        self.client
            .post_json(&url, &request)
            .await
            .map_err(|e| remote_failure("create query job", e))
    }

    /// Get a job's current status.
    #[instrument(skip(self))]
    pub async fn get_job(&self, kind: JobKind, job_id: &str) -> Result<Job> {
        validate_job_id(job_id)?;
        let url = self.client.bulk_url(&format!("{}/{}", kind.path(), job_id));
        self.client
            .get_json(&url)
            .await
            .map_err(|e| remote_failure("get job", e))
    }

    /// Fetch one page of a query job's results.
    ///
    /// The server caps the page at `max_records` when given; `locator`
    /// selects the start of the page.
    #[instrument(skip(self))]
    pub async fn get_query_page(
        &self,
        job_id: &str,
        locator: Option<&Locator>,
        max_records: Option<u64>,
    ) -> Result<QueryPage> {
        self.get_query_page_for(self.api_version(), job_id, locator, max_records)
            .await
    }

    /// Like [`get_query_page`](Self::get_query_page), pinned to an API version.
    #[instrument(skip(self))]
    pub async fn get_query_page_for(
        &self,
        api_version: &str,
        job_id: &str,
        locator: Option<&Locator>,
        max_records: Option<u64>,
    ) -> Result<QueryPage> {
        validate_job_id(job_id)?;
        let url = self
            .client
            .bulk_url_for(api_version, &format!("query/{job_id}/results"));

        let mut request = self
            .client
            .get(&url)
            .accept("text/csv")
            .timeout(self.download_timeout);
        if let Some(max) = max_records {
            request = request.query("maxRecords", max.to_string());
        }
        if let Some(locator) = locator {
            request = request.query("locator", locator.encode());
        }

        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| remote_failure("get query results", e))?;

        let next_locator = response
            .header("Sforce-Locator")
            .filter(|value| !value.is_empty() && *value != "null")
            .map(|value| Locator::Cursor(value.to_string()));
        let record_count = response
            .header("Sforce-NumberOfRecords")
            .and_then(|value| value.parse().ok());
        let data = response.bytes().await?;

        Ok(QueryPage {
            data,
            next_locator,
            record_count,
        })
    }

    // =========================================================================
    // Ingest Jobs
    // =========================================================================

    /// Create an ingest job.
    ///
    /// Upserts require `external_id_field`; the check happens before any
    /// request is sent.
    #[instrument(skip(self))]
    pub async fn create_ingest_job(
        &self,
        object: &str,
        operation: BulkOperation,
        external_id_field: Option<&str>,
    ) -> Result<Job> {
        if operation.is_query() {
            return Err(Error::new(ErrorKind::InvalidInput(format!(
                "'{operation}' is not an ingest operation"
            ))));
        }

        let external_id_field = external_id_field.filter(|f| !f.trim().is_empty());
        if operation == BulkOperation::Upsert && external_id_field.is_none() {
            return Err(Error::new(ErrorKind::MissingExternalId(format!(
                "upsert on {object} requires an external id field"
            ))));
        }

        if !names::is_safe_sobject_name(object) {
            return Err(Error::new(ErrorKind::InvalidInput(format!(
                "invalid object name '{object}'"
            ))));
        }

        let mut request = CreateIngestJobRequest::new(object, operation);
        if let Some(field) = external_id_field {
            if !names::is_safe_field_name(field) {
                return Err(Error::new(ErrorKind::InvalidInput(format!(
                    "invalid external id field '{field}'"
                ))));
            }
            request = request.with_external_id_field(field);
        }

        let url = self.client.bulk_url("ingest");
        self.client
            .post_json(&url, &request)
            .await
            .map_err(|e| remote_failure("create ingest job", e))
    }

    /// Upload CSV content to an open ingest job.
    #[instrument(skip(self, content))]
    pub async fn upload_ingest_batch(&self, job_id: &str, content: impl Into<Bytes>) -> Result<()> {
        validate_job_id(job_id)?;
        let url = self.client.bulk_url(&format!("ingest/{job_id}/batches"));

        let request = self
            .client
            .put(&url)
            .csv(content)
            .timeout(self.download_timeout);

        self.client
            .execute(request)
            .await
            .map_err(|e| remote_failure("upload batch", e))?;
        Ok(())
    }

    /// Close an ingest job: `UploadComplete` when the upload went through,
    /// `Aborted` otherwise.
    #[instrument(skip(self))]
    pub async fn finalize_ingest_job(&self, job_id: &str, upload_succeeded: bool) -> Result<Job> {
        validate_job_id(job_id)?;
        let url = self.client.bulk_url(&format!("ingest/{job_id}"));
        let request = if upload_succeeded {
            UpdateJobStateRequest::upload_complete()
        } else {
            UpdateJobStateRequest::abort()
        };

        self.client
            .patch_json(&url, &request)
            .await
            .map_err(|e| remote_failure("finalize ingest job", e))
    }
}

fn validate_job_id(job_id: &str) -> Result<()> {
    if url_security::is_valid_salesforce_id(job_id) {
        Ok(())
    } else {
        Err(Error::new(ErrorKind::InvalidInput(format!(
            "invalid job id '{job_id}'"
        ))))
    }
}

fn remote_failure(operation: &str, err: ultraload_client::Error) -> Error {
    warn!(operation, status = ?err.status(), error = %err, "Bulk API call failed");
    err.into()
}
