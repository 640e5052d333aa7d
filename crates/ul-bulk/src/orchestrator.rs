//! Batch orchestration: concurrent result download and chunked upload.
//!
//! Page downloads, uploads and job state changes run under their own
//! [`RetryPolicy`]; a unit that fails is reported and never stops its
//! siblings.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use ultraload_client::{RetryConfig, RetryPolicy};

use crate::client::BulkApiClient;
use crate::error::{Error, ErrorKind, Result};
use crate::types::{Batch, BulkOperation, Job};

/// Number of workers used when none is configured.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// How to slice a query job's results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPlan {
    /// Split into this many equal batches (the last may be short).
    Workers(usize),
    /// Fixed number of records per batch.
    Size(u64),
}

impl Default for BatchPlan {
    fn default() -> Self {
        BatchPlan::Workers(default_workers())
    }
}

/// Slice a finished query job into batches starting at offset 0.
///
/// Returns no batches for a job without records.
pub fn plan_query_batches(
    job: &Job,
    instance_url: &str,
    api_version: &str,
    plan: BatchPlan,
) -> Result<Vec<Batch>> {
    let records = job.number_records_processed;
    if records == 0 {
        return Ok(Vec::new());
    }

    let size = match plan {
        BatchPlan::Workers(workers) => records.div_ceil(workers.max(1) as u64),
        BatchPlan::Size(0) => {
            return Err(Error::new(ErrorKind::InvalidInput(
                "batch size must be greater than zero".to_string(),
            )))
        }
        BatchPlan::Size(size) => size,
    };

    let mut batches = Vec::new();
    let mut offset = 0;
    while offset < records {
        batches.push(Batch {
            job_id: job.id.clone(),
            base_path: instance_url.to_string(),
            start_offset: offset,
            size,
            api_version: api_version.to_string(),
            object: job.object.clone(),
        });
        offset += size;
    }
    Ok(batches)
}

/// Stops the orchestrator from starting new units. Units already running
/// complete normally.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Orchestrator settings.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Units in flight at once.
    pub concurrency: usize,
    /// Retry policy applied to each remote call of a unit.
    pub retry: RetryConfig,
    /// Root of the download tree.
    pub data_dir: PathBuf,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            concurrency: default_workers(),
            retry: RetryConfig::batch_unit(),
            data_dir: PathBuf::from("./data"),
        }
    }
}

impl OrchestratorConfig {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }
}

/// What happened to one unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchStatus {
    Succeeded { bytes: u64 },
    Failed { error: String },
    Cancelled,
}

/// Outcome of one batch (download) or chunk (upload).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    /// Record offset for downloads, chunk index for uploads.
    pub offset: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    /// File written (download) or read (upload).
    pub path: PathBuf,
    #[serde(flatten)]
    pub status: BatchStatus,
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, BatchStatus::Succeeded { .. })
    }
}

/// Per-unit outcomes of one orchestrated run, ordered by offset.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub outcomes: Vec<BatchOutcome>,
}

impl RunReport {
    pub fn new(mut outcomes: Vec<BatchOutcome>) -> Self {
        outcomes.sort_by_key(|o| o.offset);
        let count = |f: fn(&BatchStatus) -> bool| outcomes.iter().filter(|o| f(&o.status)).count();
        Self {
            total: outcomes.len(),
            succeeded: count(|s| matches!(s, BatchStatus::Succeeded { .. })),
            failed: count(|s| matches!(s, BatchStatus::Failed { .. })),
            cancelled: count(|s| matches!(s, BatchStatus::Cancelled)),
            outcomes,
        }
    }

    /// True when every unit succeeded.
    pub fn is_success(&self) -> bool {
        self.succeeded == self.total
    }
}

/// Where uploaded chunks go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestTarget {
    pub object: String,
    pub operation: BulkOperation,
    pub external_id_field: Option<String>,
}

impl IngestTarget {
    pub fn new(object: impl Into<String>, operation: BulkOperation) -> Self {
        Self {
            object: object.into(),
            operation,
            external_id_field: None,
        }
    }

    pub fn with_external_id_field(mut self, field: impl Into<String>) -> Self {
        self.external_id_field = Some(field.into());
        self
    }

    /// Reject targets that no job could be created for.
    pub fn validate(&self) -> Result<()> {
        if self.operation.is_query() {
            return Err(Error::new(ErrorKind::InvalidInput(format!(
                "'{}' is not an ingest operation",
                self.operation
            ))));
        }
        let has_external_id = self
            .external_id_field
            .as_deref()
            .is_some_and(|f| !f.trim().is_empty());
        if self.operation == BulkOperation::Upsert && !has_external_id {
            return Err(Error::new(ErrorKind::MissingExternalId(format!(
                "upsert on {} requires an external id field",
                self.object
            ))));
        }
        Ok(())
    }
}

/// Drives concurrent downloads and uploads over a shared [`BulkApiClient`].
#[derive(Debug, Clone)]
pub struct Orchestrator {
    client: BulkApiClient,
    config: OrchestratorConfig,
    abort: AbortHandle,
}

impl Orchestrator {
    pub fn new(client: BulkApiClient, config: OrchestratorConfig) -> Self {
        Self {
            client,
            config,
            abort: AbortHandle::new(),
        }
    }

    /// Share an existing abort handle, e.g. one tied to Ctrl-C.
    pub fn with_abort_handle(mut self, abort: AbortHandle) -> Self {
        self.abort = abort;
        self
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn client(&self) -> &BulkApiClient {
        &self.client
    }

    /// Plan batches for `job` against this orchestrator's org.
    pub fn plan(&self, job: &Job, plan: BatchPlan) -> Result<Vec<Batch>> {
        plan_query_batches(
            job,
            self.client.instance_url(),
            self.client.api_version(),
            plan,
        )
    }

    /// Download every record of a finished query job.
    pub async fn download_job(&self, job: &Job, plan: BatchPlan) -> Result<RunReport> {
        if job.number_records_processed == 0 {
            warn!(job_id = %job.id, "Record count is 0, no results to download");
            return Ok(RunReport::default());
        }
        let batches = self.plan(job, plan)?;
        Ok(self.download(batches).await)
    }

    /// Fetch each batch into `{data_dir}/{domain}/{job_id}_{offset:012}.csv`.
    pub async fn download(&self, batches: Vec<Batch>) -> RunReport {
        info!(batches = batches.len(), concurrency = self.config.concurrency, "Starting download");
        let outcomes: Vec<BatchOutcome> = stream::iter(batches)
            .map(|batch| self.download_batch(batch))
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;
        RunReport::new(outcomes)
    }

    async fn download_batch(&self, batch: Batch) -> BatchOutcome {
        let mut outcome = BatchOutcome {
            offset: batch.start_offset,
            job_id: Some(batch.job_id.clone()),
            path: self.config.data_dir.join(batch.file_name()),
            status: BatchStatus::Cancelled,
        };

        if self.abort.is_aborted() {
            debug!(offset = batch.start_offset, "Batch cancelled before start");
            return outcome;
        }

        let result = match batch.output_path(&self.config.data_dir) {
            Ok(path) => {
                outcome.path = path;
                self.fetch_batch(&batch, &outcome.path).await
            }
            Err(err) => Err(err),
        };

        outcome.status = match result {
            Ok(bytes) => {
                debug!(offset = batch.start_offset, bytes, "Batch downloaded");
                BatchStatus::Succeeded { bytes }
            }
            Err(err) => {
                warn!(offset = batch.start_offset, error = %err, "Batch download failed");
                BatchStatus::Failed {
                    error: err.to_string(),
                }
            }
        };
        outcome
    }

    async fn fetch_batch(&self, batch: &Batch, path: &Path) -> Result<u64> {
        let client = &self.client;
        let locator = batch.locator();
        let locator = &locator;
        let page = RetryPolicy::new(self.config.retry.clone())
            .run(move || {
                client.get_query_page_for(
                    &batch.api_version,
                    &batch.job_id,
                    Some(locator),
                    Some(batch.size),
                )
            })
            .await?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, &page.data).await?;
        Ok(page.data.len() as u64)
    }

    /// Upload each file as its own ingest job.
    ///
    /// The target is validated before any request is sent.
    pub async fn upload(&self, target: &IngestTarget, files: Vec<PathBuf>) -> Result<RunReport> {
        target.validate()?;
        info!(chunks = files.len(), object = %target.object, operation = %target.operation, "Starting upload");

        let outcomes: Vec<BatchOutcome> = stream::iter(files.into_iter().enumerate())
            .map(|(index, path)| self.upload_chunk(target, index as u64, path))
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;
        Ok(RunReport::new(outcomes))
    }

    /// Create one ingest job for `path` and load the chunk into it.
    ///
    /// The job creation is attempted once. The upload and the state change
    /// that follows run under the batch-unit retry policy.
    async fn upload_chunk(&self, target: &IngestTarget, index: u64, path: PathBuf) -> BatchOutcome {
        let mut outcome = BatchOutcome {
            offset: index,
            job_id: None,
            path,
            status: BatchStatus::Cancelled,
        };

        if self.abort.is_aborted() {
            debug!(index, "Chunk cancelled before start");
            return outcome;
        }

        // Not retried: a create that timed out may still have opened a job
        let created = self
            .client
            .create_ingest_job(
                &target.object,
                target.operation,
                target.external_id_field.as_deref(),
            )
            .await;

        outcome.status = match created {
            Ok(job) => {
                outcome.job_id = Some(job.id.clone());
                match self.load_file(&job.id, &outcome.path).await {
                    Ok((_, bytes)) => BatchStatus::Succeeded { bytes },
                    Err(err) => BatchStatus::Failed {
                        error: err.to_string(),
                    },
                }
            }
            Err(err) => BatchStatus::Failed {
                error: err.to_string(),
            },
        };

        if let BatchStatus::Failed { error } = &outcome.status {
            warn!(index, path = %outcome.path.display(), error = %error, "Chunk upload failed");
        }
        outcome
    }

    /// Upload one file to an existing open job and finalize it.
    ///
    /// The job is marked `UploadComplete` when the upload succeeds and
    /// `Aborted` when it fails; the upload error is returned in that case.
    pub async fn load_file(&self, job_id: &str, path: &Path) -> Result<(Job, u64)> {
        let content = match tokio::fs::read(path).await {
            Ok(content) => bytes::Bytes::from(content),
            Err(err) => {
                self.abort_job(job_id).await;
                return Err(err.into());
            }
        };
        let bytes = content.len() as u64;

        let client = &self.client;
        let uploaded = RetryPolicy::new(self.config.retry.clone())
            .run(move || client.upload_ingest_batch(job_id, content.clone()))
            .await;

        match uploaded {
            Ok(()) => {
                let job = self.finalize(job_id, true).await?;
                debug!(job_id, bytes, "Chunk uploaded");
                Ok((job, bytes))
            }
            Err(err) => {
                self.abort_job(job_id).await;
                Err(err)
            }
        }
    }

    async fn abort_job(&self, job_id: &str) {
        if let Err(err) = self.finalize(job_id, false).await {
            warn!(job_id, error = %err, "Could not abort job after failed upload");
        }
    }

    async fn finalize(&self, job_id: &str, upload_succeeded: bool) -> Result<Job> {
        let client = &self.client;
        RetryPolicy::new(self.config.retry.clone())
            .run(move || client.finalize_ingest_job(job_id, upload_succeeded))
            .await
    }
}
