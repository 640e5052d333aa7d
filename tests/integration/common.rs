use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tempfile::TempDir;

use ultraload::auth::FileCredentialStore;
use ultraload::cli::Cli;
use ultraload::commands::{self, CommandOutput, Context};

pub const JOB_ID: &str = "7505f000002XvzqAAC";
pub const TOKEN: &str = "00Dxx!token";

/// A scratch directory with its own credential cache.
pub struct Harness {
    pub dir: TempDir,
    ctx: Context,
}

impl Harness {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let store = FileCredentialStore::with_path(dir.path().join("credentials.json"));
        Self {
            ctx: Context::new(Arc::new(store)),
            dir,
        }
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    pub fn path_str(&self, relative: &str) -> String {
        self.path(relative).to_string_lossy().into_owned()
    }

    pub async fn run(&self, args: &[&str]) -> anyhow::Result<CommandOutput> {
        let cli = Cli::try_parse_from(std::iter::once("ultra").chain(args.iter().copied()))?;
        commands::run(cli, &self.ctx).await
    }
}

pub fn job_json(id: &str, operation: &str, state: &str, records: u64) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "operation": operation,
        "object": "Account",
        "state": state,
        "numberRecordsProcessed": records,
        "apiVersion": 53.0
    })
}
