//! Instance discovery commands.
//!
//! # Usage
//!
//! ```bash
//! odooflow version
//! odooflow databases
//! odooflow modules
//! ```

use serde_json::json;
use tracing::info;

use odooflow_sync::MemoryStore;

use super::{CliError, print_json, service};

/// Print the server version.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the call fails.
pub async fn version() -> Result<(), CliError> {
    let service = service(MemoryStore::new())?;
    let version = service.server_version().await?;
    info!(%version, "Server version");
    print_json(&json!({ "server_version": version }))
}

/// Print the databases an operator can choose from.
///
/// # Errors
///
/// Returns an error if the databases cannot be determined.
pub async fn databases() -> Result<(), CliError> {
    let service = service(MemoryStore::new())?;
    let databases = service.list_databases().await?;
    print_json(&databases)
}

/// Print installed modules.
///
/// # Errors
///
/// Returns an error if the configuration is incomplete or the call fails.
pub async fn modules() -> Result<(), CliError> {
    let service = service(MemoryStore::new())?;
    let modules = service.installed_modules().await?;
    info!(count = modules.len(), "Listed installed modules");
    print_json(&modules)
}
