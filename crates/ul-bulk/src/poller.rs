//! Job status polling.

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, instrument};

use crate::client::BulkApiClient;
use crate::error::{Error, ErrorKind, Result};
use crate::types::{Job, JobKind};

/// Default polling interval for job status checks.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// Default maximum wait time for job completion.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(3600);

/// Waits for a job to reach a terminal state.
///
/// The poller does not judge the outcome: a `Failed` or `Aborted` job is
/// returned like a `JobComplete` one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobPoller {
    check_interval: Duration,
    max_wait: Duration,
}

impl Default for JobPoller {
    fn default() -> Self {
        Self {
            check_interval: DEFAULT_CHECK_INTERVAL,
            max_wait: DEFAULT_MAX_WAIT,
        }
    }
}

impl JobPoller {
    pub fn new(check_interval: Duration) -> Self {
        Self {
            check_interval,
            ..Self::default()
        }
    }

    /// Set the maximum wait time for job completion.
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn check_interval(&self) -> Duration {
        self.check_interval
    }

    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    /// Poll from a job snapshot already in hand, sleeping before each check.
    #[instrument(skip(self, client, job), fields(job_id = %job.id))]
    pub async fn wait(&self, client: &BulkApiClient, kind: JobKind, job: Job) -> Result<Job> {
        let start = Instant::now();
        let mut job = job;

        while !job.state.is_terminal() {
            if start.elapsed() >= self.max_wait {
                return Err(Error::new(ErrorKind::JobTimeout {
                    job_id: job.id,
                    waited: self.max_wait,
                }));
            }

            debug!(state = ?job.state, "Job not finished, waiting");
            sleep(self.check_interval).await;
            job = client.get_job(kind, &job.id).await?;
        }

        debug!(state = ?job.state, records = job.number_records_processed, "Job finished");
        Ok(job)
    }

    /// Fetch the job, then poll until it finishes.
    pub async fn wait_for(&self, client: &BulkApiClient, kind: JobKind, job_id: &str) -> Result<Job> {
        let job = client.get_job(kind, job_id).await?;
        self.wait(client, kind, job).await
    }
}
