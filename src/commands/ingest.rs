use anyhow::{Context as _, Result};
use serde_json::json;

use ultraload_bulk::{
    enumerate_inputs, write_chunks_blocking, IngestTarget, JobKind, OrchestratorConfig,
};

use super::{connect, orchestrator, CommandOutput, Context};
use crate::cli::{CombineArgs, GlobalArgs, IngestCommand};

pub async fn run(cmd: IngestCommand, global: &GlobalArgs, ctx: &Context) -> Result<CommandOutput> {
    match cmd {
        IngestCommand::CreateJob {
            object,
            operation,
            external_id_field,
        } => {
            let client = connect(global, ctx)?;
            let job = client
                .create_ingest_job(&object, operation, external_id_field.as_deref())
                .await
                .context("could not create ingest job")?;
            CommandOutput::ok(&job)
        }
        IngestCommand::GetJob { job_id } => {
            let client = connect(global, ctx)?;
            let job = client
                .get_job(JobKind::Ingest, &job_id)
                .await
                .with_context(|| format!("could not get ingest job {job_id}"))?;
            CommandOutput::ok(&job)
        }
        IngestCommand::Load {
            object,
            operation,
            path_or_file,
            external_id_field,
            workers,
            combine,
        } => {
            let mut target = IngestTarget::new(object, operation);
            if let Some(field) = external_id_field {
                target = target.with_external_id_field(field);
            }
            // Fail fast before touching files or the network
            target.validate()?;

            let client = connect(global, ctx)?;
            let chunks = combine_files(&path_or_file, &combine).await?;

            let report = orchestrator(client, workers, OrchestratorConfig::default(), ctx)
                .upload(&target, chunks)
                .await
                .context("could not load data")?;
            CommandOutput::report(&report)
        }
        IngestCommand::LoadData { job_id, file } => {
            let client = connect(global, ctx)?;
            let (job, bytes) = orchestrator(client, None, OrchestratorConfig::default(), ctx)
                .load_file(&job_id, &file)
                .await
                .with_context(|| format!("could not load {} into job {job_id}", file.display()))?;
            CommandOutput::ok(json!({ "job": job, "bytes": bytes }))
        }
        IngestCommand::Combine {
            path_or_file,
            combine,
        } => {
            let chunks = combine_files(&path_or_file, &combine).await?;
            CommandOutput::ok(json!({ "files": chunks }))
        }
    }
}

async fn combine_files(
    path_or_file: &std::path::Path,
    args: &CombineArgs,
) -> Result<Vec<std::path::PathBuf>> {
    let inputs = enumerate_inputs(path_or_file, args.pattern.as_deref())
        .with_context(|| format!("could not read inputs from {}", path_or_file.display()))?;

    write_chunks_blocking(
        inputs,
        args.batch_size,
        args.working_directory.clone(),
        args.prefix.clone(),
    )
    .await
    .with_context(|| {
        format!(
            "could not write chunks to {}",
            args.working_directory.display()
        )
    })
}
