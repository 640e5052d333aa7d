//! # ultraload
//!
//! `ultra`, a command-line loader for the Salesforce Bulk API 2.0.
//!
//! ## Crates
//!
//! - **ultraload-client** - HTTP client with retry, compression and Salesforce error mapping
//! - **ultraload-auth** - JWT bearer login and the local credential cache
//! - **ultraload-bulk** - Bulk API 2.0 jobs, polling, concurrent download and chunked upload
//!
//! This crate holds the command line ([`cli`]) and the command
//! implementations ([`commands`]); the binary only wires up logging, the
//! credential store and Ctrl-C handling.

pub mod cli;
pub mod commands;

pub use ultraload_auth as auth;
pub use ultraload_bulk as bulk;
pub use ultraload_client as client;
