//! Sync orchestration: create-vs-update decisions and batch reports.
//!
//! [`SyncService`] is built once per process from a transport, a store and
//! the connection settings. Each batch opens a [`SyncSession`] with
//! [`SyncService::connect`], which checks the settings, authenticates and
//! owns a fresh [`ReferenceCache`] for the lifetime of the batch.
//!
//! Every entity goes through the same steps:
//! 1. read the stored remote id
//! 2. without one, search Odoo by natural key (order name, email, SKU)
//! 3. `write` when a record was found, `create` otherwise
//! 4. store the remote id (best effort) and record the outcome
//!
//! Entities are processed one after the other. Configuration and
//! authentication errors end the batch; anything else fails only the
//! entity it happened on.

mod customers;
mod import;
mod manual;
mod orders;
mod products;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use odooflow_core::{CustomerId, EntityKind, OrderId, ProductId, RemoteId, RemoteRef};

use crate::cache::ReferenceCache;
use crate::config::OdooConfig;
use crate::discovery::{self, InstalledModule};
use crate::error::SyncError;
use crate::mapper::identification::DEFAULT_IDENTIFICATION_CODE;
use crate::mapper::{self, FieldSelection, ProductFields};
use crate::report::{BatchReport, Direction, OutcomeStatus, SyncOutcome};
use crate::rpc::{RpcSession, RpcTransport};
use crate::store::EntityStore;

pub use manual::{ManualLine, ManualOrder, RemoteCustomer};

/// Product type given to products created on the fly for order lines.
pub const DEFAULT_PRODUCT_TYPE: &str = "product";

/// Tunables of a sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncOptions {
    pub order_fields: FieldSelection,
    pub customer_fields: FieldSelection,
    pub product_fields: FieldSelection,
    /// DIAN code used when a customer's document type is not recognized.
    pub default_identification_code: String,
    /// `type` of `product.product` records created for order lines.
    pub product_type: String,
    /// Delivery product put on shipping lines.
    pub shipping_product: Option<RemoteId>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            order_fields: FieldSelection::all(mapper::orders::SELECTABLE_FIELDS),
            customer_fields: FieldSelection::all(mapper::customers::SELECTABLE_FIELDS),
            product_fields: FieldSelection::all(mapper::products::SELECTABLE_FIELDS),
            default_identification_code: DEFAULT_IDENTIFICATION_CODE.to_string(),
            product_type: DEFAULT_PRODUCT_TYPE.to_string(),
            shipping_product: None,
        }
    }
}

impl SyncOptions {
    /// Reject field selections naming fields outside each model's catalog.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Validation` naming the unknown fields.
    pub fn validate(&self) -> Result<(), SyncError> {
        self.order_fields
            .validate(mapper::orders::SELECTABLE_FIELDS)?;
        self.customer_fields
            .validate(mapper::customers::SELECTABLE_FIELDS)?;
        self.product_fields
            .validate(mapper::products::SELECTABLE_FIELDS)
    }
}

// =============================================================================
// SyncService
// =============================================================================

/// Entry point for every sync, import and discovery operation.
pub struct SyncService<T, S> {
    transport: T,
    store: S,
    config: OdooConfig,
    options: SyncOptions,
}

impl<T, S> std::fmt::Debug for SyncService<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncService")
            .field("config", &self.config)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<T: RpcTransport, S: EntityStore> SyncService<T, S> {
    /// Create a service with default [`SyncOptions`].
    #[must_use]
    pub fn new(transport: T, store: S, config: OdooConfig) -> Self {
        Self {
            transport,
            store,
            config,
            options: SyncOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    pub const fn transport(&self) -> &T {
        &self.transport
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn config(&self) -> &OdooConfig {
        &self.config
    }

    pub const fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Check the settings, authenticate and open a session.
    ///
    /// No RPC call is made unless URL, username, API key and database are
    /// all configured.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::ConfigIncomplete`, `SyncError::Validation` for
    /// bad field selections, or the authentication error.
    #[instrument(skip(self))]
    pub async fn connect(&self) -> Result<SyncSession<'_, T, S>, SyncError> {
        let credentials = self.config.credentials()?;
        self.options.validate()?;
        let rpc = RpcSession::authenticate(&self.transport, &credentials).await?;
        Ok(SyncSession {
            rpc,
            store: &self.store,
            options: &self.options,
            cache: ReferenceCache::new(&self.options.default_identification_code),
        })
    }

    /// Export orders.
    ///
    /// # Errors
    ///
    /// Returns batch-fatal errors only; per-order failures are in the report.
    pub async fn sync_orders(&self, ids: &[OrderId]) -> Result<BatchReport, SyncError> {
        self.connect().await?.sync_orders(ids).await
    }

    /// Export customers.
    ///
    /// # Errors
    ///
    /// Returns batch-fatal errors only.
    pub async fn sync_customers(&self, ids: &[CustomerId]) -> Result<BatchReport, SyncError> {
        self.connect().await?.sync_customers(ids).await
    }

    /// Export products.
    ///
    /// # Errors
    ///
    /// Returns batch-fatal errors only.
    pub async fn sync_products(&self, ids: &[ProductId]) -> Result<BatchReport, SyncError> {
        self.connect().await?.sync_products(ids).await
    }

    /// Import products; an empty `remote_ids` imports the active catalog.
    ///
    /// # Errors
    ///
    /// Returns batch-fatal errors and failures to list the records.
    pub async fn import_products(&self, remote_ids: &[RemoteId]) -> Result<BatchReport, SyncError> {
        self.connect().await?.import_products(remote_ids).await
    }

    /// Import partners; an empty `remote_ids` imports every customer.
    ///
    /// # Errors
    ///
    /// Returns batch-fatal errors and failures to list the records.
    pub async fn import_customers(&self, remote_ids: &[RemoteId]) -> Result<BatchReport, SyncError> {
        self.connect().await?.import_customers(remote_ids).await
    }

    /// Create a sale order from explicitly chosen remote records.
    ///
    /// # Errors
    ///
    /// Returns the first error; nothing is retried.
    pub async fn create_manual_order(&self, order: &ManualOrder) -> Result<RemoteId, SyncError> {
        self.connect().await?.create_manual_order(order).await
    }

    /// Active customers, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns connection and call errors.
    pub async fn list_remote_customers(&self) -> Result<Vec<RemoteCustomer>, SyncError> {
        self.connect().await?.list_remote_customers().await
    }

    /// Active product templates available for import.
    ///
    /// # Errors
    ///
    /// Returns connection and call errors.
    pub async fn list_remote_products(&self) -> Result<Vec<ProductFields>, SyncError> {
        self.connect().await?.list_remote_products().await
    }

    /// Sellable product variants for manual orders, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns connection and call errors.
    pub async fn list_sellable_products(&self) -> Result<Vec<ProductFields>, SyncError> {
        self.connect().await?.list_sellable_products().await
    }

    /// Server version reported by the common endpoint.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::ConfigIncomplete` without a URL, or call errors.
    pub async fn server_version(&self) -> Result<String, SyncError> {
        discovery::server_version(&self.transport).await
    }

    /// Databases available to the configured instance.
    ///
    /// # Errors
    ///
    /// See [`discovery::list_databases`].
    pub async fn list_databases(&self) -> Result<Vec<String>, SyncError> {
        discovery::list_databases(&self.transport, &self.config).await
    }

    /// Installed Odoo modules.
    ///
    /// # Errors
    ///
    /// Returns connection and call errors.
    pub async fn installed_modules(&self) -> Result<Vec<InstalledModule>, SyncError> {
        let session = self.connect().await?;
        discovery::installed_modules(session.rpc()).await
    }
}

// =============================================================================
// SyncSession
// =============================================================================

/// An authenticated batch with its own reference cache.
pub struct SyncSession<'s, T, S> {
    rpc: RpcSession<'s, T>,
    store: &'s S,
    options: &'s SyncOptions,
    cache: ReferenceCache,
}

impl<T, S> std::fmt::Debug for SyncSession<'_, T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSession")
            .field("rpc", &self.rpc)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl<'s, T: RpcTransport, S: EntityStore> SyncSession<'s, T, S> {
    pub const fn rpc(&self) -> &RpcSession<'s, T> {
        &self.rpc
    }

    pub const fn cache(&self) -> &ReferenceCache {
        &self.cache
    }

    /// Export orders one by one.
    ///
    /// # Errors
    ///
    /// Returns batch-fatal errors only.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn sync_orders(&mut self, ids: &[OrderId]) -> Result<BatchReport, SyncError> {
        let mut outcomes = Vec::with_capacity(ids.len());
        for &id in ids {
            outcomes.push(self.sync_order(id).await?);
        }
        Ok(finish(EntityKind::Order, Direction::Export, &outcomes))
    }

    /// Export customers one by one.
    ///
    /// # Errors
    ///
    /// Returns batch-fatal errors only.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn sync_customers(&mut self, ids: &[CustomerId]) -> Result<BatchReport, SyncError> {
        let mut outcomes = Vec::with_capacity(ids.len());
        for &id in ids {
            outcomes.push(self.sync_customer(id).await?);
        }
        Ok(finish(EntityKind::Customer, Direction::Export, &outcomes))
    }

    /// Export products one by one.
    ///
    /// # Errors
    ///
    /// Returns batch-fatal errors only.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn sync_products(&mut self, ids: &[ProductId]) -> Result<BatchReport, SyncError> {
        let mut outcomes = Vec::with_capacity(ids.len());
        for &id in ids {
            outcomes.push(self.sync_product(id).await?);
        }
        Ok(finish(EntityKind::Product, Direction::Export, &outcomes))
    }

    /// Store a remote id on its local entity. Failures are logged only:
    /// the remote write already happened.
    async fn remember(&self, reference: RemoteRef) {
        if let Err(e) = self.store.set_remote_ref(reference).await {
            warn!(
                kind = %reference.entity_kind,
                local_id = reference.local_id,
                remote_id = %reference.remote_id,
                error = %e,
                "Failed to store remote id"
            );
        }
    }
}

/// Turn an entity result into an outcome, passing batch-fatal errors up.
fn settle(
    name: String,
    result: Result<(OutcomeStatus, RemoteId), SyncError>,
) -> Result<SyncOutcome, SyncError> {
    match result {
        Ok((status, remote_id)) => {
            info!(entity = %name, %status, %remote_id, "Synced");
            Ok(SyncOutcome::succeeded(name, status, remote_id))
        }
        Err(e) if e.is_batch_fatal() => Err(e),
        Err(e) => {
            warn!(entity = %name, error = %e, "Sync failed");
            Ok(SyncOutcome::failed(name, &e))
        }
    }
}

fn finish(kind: EntityKind, direction: Direction, outcomes: &[SyncOutcome]) -> BatchReport {
    let report = BatchReport::from_outcomes(kind, direction, outcomes);
    info!(
        %kind,
        created = report.new,
        updated = report.updated,
        failed = report.failed.len(),
        "Batch finished"
    );
    report
}
