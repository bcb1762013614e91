//! Command implementations.

pub mod batch;
pub mod discover;
mod snapshot;

use std::io::Write;

use serde::Serialize;
use thiserror::Error;

use odooflow_sync::{ConfigError, HttpTransport, MemoryStore, OdooConfig, SyncError, SyncService};

/// Errors that end a command with exit code 1.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("Store file {path}: {message}")]
    StoreFile { path: String, message: String },

    #[error("Unsupported store format: {0} (use .yaml, .yml or .json)")]
    StoreFormat(String),

    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),

    #[error("Failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Invalid id {0}: ids must be positive")]
    InvalidId(i64),
}

/// Service over the configured instance and a given store.
fn service(store: MemoryStore) -> Result<SyncService<HttpTransport, MemoryStore>, CliError> {
    let config = OdooConfig::from_env()?;
    let transport = HttpTransport::from_config(&config)?;
    Ok(SyncService::new(transport, store, config))
}

/// Write a value to stdout as pretty JSON.
fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}
