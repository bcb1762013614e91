//! Translation between local commerce records and Odoo models.
//!
//! # Entities
//!
//! - [`products`] - `LocalProduct` <-> `product.template`
//! - [`customers`] - `Contact` <-> `res.partner`, with country, state and
//!   identification-type enrichment through the reference cache
//! - [`orders`] - `LocalOrder` -> `sale.order` with one2many line commands
//! - [`identification`] - DIAN document-type codes and aliases
//!
//! Outbound payloads only carry the fields named in a [`FieldSelection`],
//! plus the fixed required set of each model.

pub mod customers;
pub mod identification;
pub mod orders;
pub mod products;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::rpc::RemoteStruct;

pub use customers::CustomerFields;
pub use orders::{OrderRefs, WriteMode};
pub use products::ProductFields;

/// Values struct sent to `create` or `write`.
pub type RemotePayload = RemoteStruct;

/// Optional remote fields chosen for a sync.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldSelection(BTreeSet<String>);

impl FieldSelection {
    /// Select every field of a catalog.
    #[must_use]
    pub fn all(catalog: &[&str]) -> Self {
        catalog.iter().copied().collect()
    }

    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains(field)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Reject fields outside `catalog`.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Validation` naming the unknown fields.
    pub fn validate(&self, catalog: &[&str]) -> Result<(), SyncError> {
        let unknown: Vec<&str> = self.names().filter(|f| !catalog.contains(f)).collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(SyncError::Validation(format!(
                "unknown field(s): {}",
                unknown.join(", ")
            )))
        }
    }
}

impl<S: Into<String>> FromIterator<S> for FieldSelection {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}
