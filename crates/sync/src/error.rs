//! Unified error handling for the sync core.
//!
//! Every public operation returns `Result<_, SyncError>`. Configuration and
//! authentication errors abort a whole batch; everything else is caught at
//! the entity boundary and recorded in the batch report.

use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;

/// Errors that can occur while synchronizing with the ERP.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Connection settings are missing (URL, username, API key or database).
    #[error("Odoo connection settings are incomplete: {0}")]
    ConfigIncomplete(String),

    /// Network failure, timeout or non-2xx HTTP status.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Credentials rejected or no usable uid returned.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The ERP answered with an XML-RPC fault (validation or business error).
    #[error("Odoo fault {code}: {message}")]
    RemoteFault {
        /// `faultCode` from the response.
        code: i64,
        /// `faultString` from the response.
        message: String,
    },

    /// The response body could not be decoded, or had an unexpected shape.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A required local field is missing or invalid.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The host store could not be read or written.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Machine-readable error kind, surfaced next to the message in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ConfigIncomplete,
    Transport,
    Auth,
    RemoteFault,
    Parse,
    Validation,
    Store,
}

impl SyncError {
    /// The machine-readable kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfigIncomplete(_) => ErrorKind::ConfigIncomplete,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Auth(_) => ErrorKind::Auth,
            Self::RemoteFault { .. } => ErrorKind::RemoteFault,
            Self::Parse(_) => ErrorKind::Parse,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Store(_) => ErrorKind::Store,
        }
    }

    /// Whether this error stops a batch instead of failing a single entity.
    #[must_use]
    pub const fn is_batch_fatal(&self) -> bool {
        matches!(self, Self::ConfigIncomplete(_) | Self::Auth(_))
    }

    pub(crate) fn parse(context: &str, detail: impl std::fmt::Display) -> Self {
        Self::Parse(format!("{context}: {detail}"))
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Transport(format!("request timed out: {err}"))
        } else {
            Self::Transport(err.to_string())
        }
    }
}
