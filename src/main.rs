use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ultraload::auth::{CredentialStore, FileCredentialStore};
use ultraload::cli::Cli;
use ultraload::commands::{self, Context};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    let store: Arc<dyn CredentialStore> = match &cli.global.credential_file {
        Some(path) => Arc::new(FileCredentialStore::with_path(path)),
        None => Arc::new(FileCredentialStore::new().context("could not locate the credential cache")?),
    };
    let ctx = Context::new(store);

    let abort = ctx.abort.clone();
    let ctrlc_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling pending batches");
            abort.abort();
        }
    });

    let result = commands::run(cli, &ctx).await;
    ctrlc_task.abort();

    let output = result?;
    println!("{}", serde_json::to_string_pretty(&output.value)?);
    Ok(output.success)
}

/// Logs go to stderr so stdout stays machine-readable. `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
