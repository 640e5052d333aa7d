//! Command-line definitions for `ultra`.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use ultraload_auth::Environment;
use ultraload_bulk::batcher::{DEFAULT_CHUNK_PREFIX, DEFAULT_CHUNK_SIZE};
use ultraload_bulk::BulkOperation;
use ultraload_client::DEFAULT_API_VERSION;

#[derive(Debug, Parser)]
#[command(name = "ultra", about = "Salesforce Bulk API 2.0 loader", version)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command.
#[derive(Debug, Clone, Args)]
pub struct GlobalArgs {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Instance URL, overriding the cached login (or via SF_INSTANCE_URL)
    #[arg(long, env = "SF_INSTANCE_URL", global = true)]
    pub instance_url: Option<String>,

    /// Access token, overriding the cached login (or via SF_ACCESS_TOKEN)
    #[arg(long, env = "SF_ACCESS_TOKEN", hide_env_values = true, global = true)]
    pub access_token: Option<String>,

    /// Salesforce API version
    #[arg(long, env = "ULTRA_API_VERSION", default_value = DEFAULT_API_VERSION, global = true)]
    pub api_version: String,

    /// Credential cache file [default: ~/.ultra/credentials.json]
    #[arg(long, env = "ULTRA_CREDENTIAL_FILE", global = true)]
    pub credential_file: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Authenticate with the JWT bearer flow and cache the token
    Login(LoginArgs),
    /// Query jobs: create, inspect, download results
    #[command(subcommand)]
    Query(QueryCommand),
    /// Ingest jobs: create, inspect, load files
    #[command(subcommand)]
    Ingest(IngestCommand),
}

#[derive(Debug, Clone, Args)]
pub struct LoginArgs {
    /// Salesforce username, e.g. user@example.com
    pub username: Option<String>,

    /// Connected app consumer key
    pub consumer_id: Option<String>,

    /// production or sandbox
    pub environment: Option<Environment>,

    /// PEM private key file; SFDC_PRIVATE_KEY is read when omitted
    #[arg(long)]
    pub private_key: Option<PathBuf>,

    /// JSON file with username, consumer_id, environment and optionally private_key
    #[arg(long)]
    pub json_credential_file: Option<PathBuf>,

    /// Print the credential instead of saving it
    #[arg(long)]
    pub json_out: bool,

    /// Login server, overriding the one implied by the environment
    #[arg(long, env = "ULTRA_LOGIN_URL")]
    pub login_url: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum QueryCommand {
    /// Create a query job
    CreateJob {
        /// SOQL query
        query: String,

        /// query, or queryAll to include deleted and archived records
        #[arg(long, default_value = "query")]
        operation: BulkOperation,
    },
    /// Show a query job
    GetJob { job_id: String },
    /// Download the results of a finished query job
    DownloadData {
        job_id: String,

        #[command(flatten)]
        download: DownloadArgs,
    },
    /// Create a query job, wait for it, then download its results
    Run {
        /// SOQL query
        query: String,

        /// query or queryAll
        #[arg(long, default_value = "query")]
        operation: BulkOperation,

        /// Seconds between job status checks
        #[arg(long, default_value_t = 5)]
        check_interval: u64,

        /// Give up waiting after this many seconds
        #[arg(long, default_value_t = 3600)]
        max_wait: u64,

        #[command(flatten)]
        download: DownloadArgs,
    },
}

#[derive(Debug, Clone, Args)]
pub struct DownloadArgs {
    /// Root directory for downloaded files
    #[arg(long, default_value = "./data")]
    pub download_path: PathBuf,

    /// Records per batch; by default the job is split evenly across workers
    #[arg(long)]
    pub batch_size: Option<u64>,

    /// Concurrent downloads [default: available parallelism]
    #[arg(long)]
    pub workers: Option<usize>,

    /// Print the batch plan without downloading
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Subcommand)]
pub enum IngestCommand {
    /// Create an ingest job
    CreateJob {
        /// Object API name, e.g. Account
        object: String,

        /// insert, update, upsert, delete or hardDelete
        operation: BulkOperation,

        /// External id field, required for upsert
        #[arg(long)]
        external_id_field: Option<String>,
    },
    /// Show an ingest job
    GetJob { job_id: String },
    /// Combine input files into chunks and load each chunk as its own job
    Load {
        object: String,

        operation: BulkOperation,

        path_or_file: PathBuf,

        #[arg(long)]
        external_id_field: Option<String>,

        /// Concurrent uploads [default: available parallelism]
        #[arg(long)]
        workers: Option<usize>,

        #[command(flatten)]
        combine: CombineArgs,
    },
    /// Upload one file to an existing job and close it
    LoadData { job_id: String, file: PathBuf },
    /// Combine input files into upload-sized chunks without loading them
    Combine {
        path_or_file: PathBuf,

        #[command(flatten)]
        combine: CombineArgs,
    },
}

#[derive(Debug, Clone, Args)]
pub struct CombineArgs {
    /// Glob matched recursively under a directory input
    #[arg(long)]
    pub pattern: Option<String>,

    /// Maximum chunk size in bytes
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub batch_size: usize,

    /// Where chunk files are written
    #[arg(long, default_value = "./batches")]
    pub working_directory: PathBuf,

    /// Chunk file name prefix
    #[arg(long, default_value = DEFAULT_CHUNK_PREFIX)]
    pub prefix: String,
}
