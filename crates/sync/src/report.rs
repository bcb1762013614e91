//! Per-entity outcomes and the batch report handed to the host UI.

use std::fmt::Write as _;

use serde::Serialize;

use odooflow_core::{EntityKind, RemoteId};

use crate::error::{ErrorKind, SyncError};

/// Result of one entity in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Created,
    Updated,
    Failed,
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Failed => "failed",
        })
    }
}

/// Outcome of syncing a single entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    /// Operator-facing name (`Order #1001`, a product name, ...).
    pub name: String,
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<RemoteId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl SyncOutcome {
    #[must_use]
    pub fn succeeded(name: impl Into<String>, status: OutcomeStatus, remote_id: RemoteId) -> Self {
        Self {
            name: name.into(),
            status,
            remote_id: Some(remote_id),
            error: None,
            error_kind: None,
        }
    }

    #[must_use]
    pub fn failed(name: impl Into<String>, error: &SyncError) -> Self {
        Self {
            name: name.into(),
            status: OutcomeStatus::Failed,
            remote_id: None,
            error: Some(error.to_string()),
            error_kind: Some(error.kind()),
        }
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.status == OutcomeStatus::Failed
    }
}

/// Whether a batch pushed local data to Odoo or pulled Odoo data in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Export,
    Import,
}

/// A failed entity in a [`BatchReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedItem {
    pub name: String,
    pub error: String,
    pub kind: ErrorKind,
}

/// Every attempted entity in a [`BatchReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessedItem {
    pub name: String,
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<RemoteId>,
}

/// Aggregated result of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub new: usize,
    pub updated: usize,
    pub failed: Vec<FailedItem>,
    pub processed: Vec<ProcessedItem>,
    pub message: String,
    pub details: String,
}

impl BatchReport {
    /// Summarize `outcomes` in the order they were recorded.
    #[must_use]
    pub fn from_outcomes(kind: EntityKind, direction: Direction, outcomes: &[SyncOutcome]) -> Self {
        let count = |status: OutcomeStatus| outcomes.iter().filter(|o| o.status == status).count();
        let new = count(OutcomeStatus::Created);
        let updated = count(OutcomeStatus::Updated);

        let failed: Vec<FailedItem> = outcomes
            .iter()
            .filter_map(|o| {
                Some(FailedItem {
                    name: o.name.clone(),
                    error: o.error.clone()?,
                    kind: o.error_kind?,
                })
            })
            .collect();

        let processed = outcomes
            .iter()
            .map(|o| ProcessedItem {
                name: o.name.clone(),
                status: o.status,
                remote_id: o.remote_id,
            })
            .collect();

        let message = match direction {
            Direction::Export => format!(
                "Export completed. Created: {new}, Updated: {updated}, Failed: {}",
                failed.len()
            ),
            Direction::Import => format!(
                "{new} {} imported, {updated} updated, {} failed.",
                plural(kind),
                failed.len()
            ),
        };

        let details = details(kind, direction, outcomes);

        Self {
            new,
            updated,
            failed,
            processed,
            message,
            details,
        }
    }

    /// Number of attempted entities.
    #[must_use]
    pub fn total(&self) -> usize {
        self.processed.len()
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

const fn plural(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Order => "orders",
        EntityKind::Customer => "customers",
        EntityKind::Product => "products",
    }
}

const fn title(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Order => "Orders",
        EntityKind::Customer => "Customers",
        EntityKind::Product => "Products",
    }
}

fn details(kind: EntityKind, direction: Direction, outcomes: &[SyncOutcome]) -> String {
    let created_heading = match direction {
        Direction::Export => "Created",
        Direction::Import => "Imported",
    };

    let mut out = String::new();
    for (heading, status) in [
        (created_heading, OutcomeStatus::Created),
        ("Updated", OutcomeStatus::Updated),
        ("Failed", OutcomeStatus::Failed),
    ] {
        let mut items = outcomes.iter().filter(|o| o.status == status).peekable();
        if items.peek().is_none() {
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        let _ = writeln!(out, "{heading} {}:", title(kind));
        for item in items {
            match &item.error {
                Some(error) => {
                    let _ = writeln!(out, "- {}: {error}", item.name);
                }
                None => {
                    let _ = writeln!(out, "- {}", item.name);
                }
            }
        }
    }
    out
}
