//! # ultraload-bulk
//!
//! Salesforce Bulk API 2.0 engine for ultraload.
//!
//! - [`BulkApiClient`]: one typed method per remote job call
//! - [`JobPoller`]: waits for a job to reach a terminal state
//! - [`Orchestrator`]: concurrent page download and chunk upload with a
//!   per-unit retry policy
//! - [`batcher`]: merges input files into size-bounded upload chunks
//!
//! ## Example
//!
//! ```rust,ignore
//! use ultraload_bulk::{
//!     BatchPlan, BulkApiClient, BulkOperation, JobKind, JobPoller, Orchestrator,
//!     OrchestratorConfig,
//! };
//!
//! let client = BulkApiClient::new(salesforce_client);
//! let job = client
//!     .create_query_job("SELECT Id, Name FROM Account", BulkOperation::Query)
//!     .await?;
//! let job = JobPoller::default().wait(&client, JobKind::Query, job).await?;
//!
//! let report = Orchestrator::new(client, OrchestratorConfig::default())
//!     .download_job(&job, BatchPlan::default())
//!     .await?;
//! println!("{} of {} batches downloaded", report.succeeded, report.total);
//! ```

pub mod batcher;
mod client;
mod error;
mod orchestrator;
mod poller;
mod types;

pub use batcher::{combine, enumerate_inputs, write_chunks, write_chunks_blocking, Chunk, Combiner};
pub use client::BulkApiClient;
pub use error::{Error, ErrorKind, Result};
pub use orchestrator::{
    default_workers, plan_query_batches, AbortHandle, BatchOutcome, BatchPlan, BatchStatus,
    IngestTarget, Orchestrator, OrchestratorConfig, RunReport,
};
pub use poller::{JobPoller, DEFAULT_CHECK_INTERVAL, DEFAULT_MAX_WAIT};
pub use types::{
    Batch, BulkOperation, ColumnDelimiter, CreateIngestJobRequest, CreateQueryJobRequest, Job,
    JobKind, JobState, LineEnding, Locator, QueryPage, UpdateJobStateRequest,
};
