//! Command implementations.
//!
//! Every command returns a JSON document for stdout plus a success flag; the
//! binary decides how to print it and which exit code to use.

mod ingest;
mod login;
mod query;

use std::sync::Arc;

use anyhow::{Context as _, Result};
use serde::Serialize;

use ultraload_auth::{CredentialStore, SalesforceCredentials};
use ultraload_bulk::{AbortHandle, BulkApiClient, Orchestrator, OrchestratorConfig, RunReport};

use crate::cli::{Cli, Commands, GlobalArgs};

/// Dependencies shared by all commands for one invocation.
#[derive(Clone)]
pub struct Context {
    pub store: Arc<dyn CredentialStore>,
    pub abort: AbortHandle,
}

impl Context {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            abort: AbortHandle::new(),
        }
    }
}

/// What a command produced.
#[derive(Debug)]
pub struct CommandOutput {
    pub value: serde_json::Value,
    pub success: bool,
}

impl CommandOutput {
    pub fn ok(value: impl Serialize) -> Result<Self> {
        Ok(Self {
            value: serde_json::to_value(value)?,
            success: true,
        })
    }

    pub fn report(report: &RunReport) -> Result<Self> {
        Ok(Self {
            value: serde_json::to_value(report)?,
            success: report.is_success(),
        })
    }
}

/// Run the parsed command line.
pub async fn run(cli: Cli, ctx: &Context) -> Result<CommandOutput> {
    match cli.command {
        Commands::Login(args) => login::run(&args, ctx).await,
        Commands::Query(cmd) => query::run(cmd, &cli.global, ctx).await,
        Commands::Ingest(cmd) => ingest::run(cmd, &cli.global, ctx).await,
    }
}

/// Resolve credentials and build the job client.
fn connect(global: &GlobalArgs, ctx: &Context) -> Result<BulkApiClient> {
    let credentials = SalesforceCredentials::resolve(
        global.instance_url.clone(),
        global.access_token.clone(),
        &global.api_version,
        ctx.store.as_ref(),
    )
    .context("could not resolve Salesforce credentials")?;

    let client = credentials
        .connect()
        .context("could not build the Salesforce client")?;
    Ok(BulkApiClient::new(client))
}

fn orchestrator(
    client: BulkApiClient,
    workers: Option<usize>,
    config: OrchestratorConfig,
    ctx: &Context,
) -> Orchestrator {
    let config = match workers {
        Some(workers) => config.with_concurrency(workers),
        None => config,
    };
    Orchestrator::new(client, config).with_abort_handle(ctx.abort.clone())
}
