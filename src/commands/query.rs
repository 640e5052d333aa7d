use std::time::Duration;

use anyhow::{Context as _, Result};
use serde_json::json;
use tracing::warn;

use ultraload_bulk::{BatchPlan, BulkApiClient, Job, JobKind, JobPoller, OrchestratorConfig};

use super::{connect, orchestrator, CommandOutput, Context};
use crate::cli::{DownloadArgs, GlobalArgs, QueryCommand};

pub async fn run(cmd: QueryCommand, global: &GlobalArgs, ctx: &Context) -> Result<CommandOutput> {
    let client = connect(global, ctx)?;

    match cmd {
        QueryCommand::CreateJob { query, operation } => {
            let job = client
                .create_query_job(&query, operation)
                .await
                .context("could not create query job")?;
            CommandOutput::ok(&job)
        }
        QueryCommand::GetJob { job_id } => {
            let job = client
                .get_job(JobKind::Query, &job_id)
                .await
                .with_context(|| format!("could not get query job {job_id}"))?;
            CommandOutput::ok(&job)
        }
        QueryCommand::DownloadData { job_id, download } => {
            let job = client
                .get_job(JobKind::Query, &job_id)
                .await
                .with_context(|| format!("could not get query job {job_id}"))?;
            download_job(client, &job, &download, ctx).await
        }
        QueryCommand::Run {
            query,
            operation,
            check_interval,
            max_wait,
            download,
        } => {
            let job = client
                .create_query_job(&query, operation)
                .await
                .context("could not create query job")?;

            let poller = JobPoller::new(Duration::from_secs(check_interval))
                .with_max_wait(Duration::from_secs(max_wait));
            let job = poller
                .wait(&client, JobKind::Query, job)
                .await
                .context("query job did not finish")?;

            if !job.state.is_success() {
                warn!(job_id = %job.id, state = ?job.state, "Query job did not complete");
                return Ok(CommandOutput {
                    value: serde_json::to_value(&job)?,
                    success: false,
                });
            }

            download_job(client, &job, &download, ctx).await
        }
    }
}

async fn download_job(
    client: BulkApiClient,
    job: &Job,
    args: &DownloadArgs,
    ctx: &Context,
) -> Result<CommandOutput> {
    let config = OrchestratorConfig::default().with_data_dir(&args.download_path);
    let orch = orchestrator(client, args.workers, config, ctx);

    let plan = match (args.batch_size, args.workers) {
        (Some(size), _) => BatchPlan::Size(size),
        (None, Some(workers)) => BatchPlan::Workers(workers),
        (None, None) => BatchPlan::default(),
    };

    if args.dry_run {
        let batches = orch.plan(job, plan).context("could not plan batches")?;
        return CommandOutput::ok(json!({
            "job_id": job.id,
            "records": job.number_records_processed,
            "batches": batches,
        }));
    }

    let report = orch
        .download_job(job, plan)
        .await
        .context("could not download query results")?;
    CommandOutput::report(&report)
}
