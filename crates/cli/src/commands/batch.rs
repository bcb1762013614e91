//! Sync and import batches over a store snapshot.
//!
//! # Usage
//!
//! ```bash
//! # Export all orders of the snapshot
//! odooflow sync orders --store store.yaml
//!
//! # Export two customers, sending only phone and city
//! odooflow sync customers --store store.yaml --ids 3,4 --fields phone,city
//!
//! # Import two Odoo partners
//! odooflow import customers --store store.json --ids 12,15
//! ```
//!
//! The report is printed as JSON on stdout and the snapshot is written back
//! with the remote ids, notes and imported records. Failed entities do not
//! change the exit code; configuration and authentication errors do.

use std::path::PathBuf;

use tracing::info;

use odooflow_core::{CustomerId, EntityKind, OrderId, ProductId, RemoteId};
use odooflow_sync::{
    BatchReport, EntityStore, FieldSelection, MemoryStore, RpcTransport, SyncError, SyncOptions,
    SyncService,
};

use super::snapshot::SnapshotFile;
use super::{CliError, print_json, service};

/// A batch command as parsed from the command line.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    pub store: PathBuf,
    /// Empty means every record.
    pub ids: Vec<i64>,
    /// Empty means every selectable field.
    pub fields: Vec<String>,
}

/// Export records of `kind` from the snapshot.
///
/// # Errors
///
/// Returns snapshot, configuration and batch-fatal sync errors.
pub async fn export(kind: EntityKind, batch: Batch) -> Result<(), CliError> {
    let file = SnapshotFile::new(&batch.store)?;
    let store = MemoryStore::from_snapshot(file.load().await?);
    let service = service(store)?.with_options(options_for(kind, &batch.fields));

    let report = run_export(&service, kind, &batch.ids).await?;
    finish(&service, &file, &report).await
}

/// Import Odoo records of `kind` into the snapshot.
///
/// # Errors
///
/// Returns snapshot, configuration and batch-fatal sync errors.
pub async fn import(kind: EntityKind, batch: Batch) -> Result<(), CliError> {
    let file = SnapshotFile::new(&batch.store)?;
    let store = MemoryStore::from_snapshot(file.load().await?);
    let service = service(store)?.with_options(options_for(kind, &batch.fields));

    let report = run_import(&service, kind, &batch.ids).await?;
    finish(&service, &file, &report).await
}

async fn finish<T: RpcTransport>(
    service: &SyncService<T, MemoryStore>,
    file: &SnapshotFile,
    report: &BatchReport,
) -> Result<(), CliError> {
    file.save(&service.store().snapshot().await).await?;
    info!(total = report.total(), failed = report.failed.len(), "Store saved");
    print_json(report)
}

/// Default options with `fields` selected for the model of `kind`.
fn options_for(kind: EntityKind, fields: &[String]) -> SyncOptions {
    let mut options = SyncOptions::default();
    if fields.is_empty() {
        return options;
    }
    let selection: FieldSelection = fields.iter().map(|f| f.trim().to_string()).collect();
    match kind {
        EntityKind::Order => options.order_fields = selection,
        EntityKind::Customer => options.customer_fields = selection,
        EntityKind::Product => options.product_fields = selection,
    }
    options
}

async fn run_export<T: RpcTransport, S: EntityStore>(
    service: &SyncService<T, S>,
    kind: EntityKind,
    ids: &[i64],
) -> Result<BatchReport, CliError> {
    let ids = if ids.is_empty() {
        service.store().ids(kind).await.map_err(SyncError::from)?
    } else {
        ids.to_vec()
    };
    info!(%kind, count = ids.len(), "Exporting");

    let report = match kind {
        EntityKind::Order => {
            let ids: Vec<OrderId> = ids.into_iter().map(OrderId::new).collect();
            service.sync_orders(&ids).await?
        }
        EntityKind::Customer => {
            let ids: Vec<CustomerId> = ids.into_iter().map(CustomerId::new).collect();
            service.sync_customers(&ids).await?
        }
        EntityKind::Product => {
            let ids: Vec<ProductId> = ids.into_iter().map(ProductId::new).collect();
            service.sync_products(&ids).await?
        }
    };
    Ok(report)
}

async fn run_import<T: RpcTransport, S: EntityStore>(
    service: &SyncService<T, S>,
    kind: EntityKind,
    ids: &[i64],
) -> Result<BatchReport, CliError> {
    let remote_ids = ids
        .iter()
        .map(|&id| RemoteId::positive(id).ok_or(CliError::InvalidId(id)))
        .collect::<Result<Vec<_>, _>>()?;
    info!(%kind, count = remote_ids.len(), "Importing");

    let report = match kind {
        EntityKind::Product => service.import_products(&remote_ids).await?,
        EntityKind::Customer => service.import_customers(&remote_ids).await?,
        EntityKind::Order => {
            return Err(SyncError::Validation("orders cannot be imported".to_string()).into());
        }
    };
    Ok(report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use odooflow_core::LocalProduct;
    use odooflow_sync::mapper::customers;
    use odooflow_sync::testing::{ScriptedTransport, test_config};

    use super::*;

    fn product(id: i64, sku: &str) -> LocalProduct {
        LocalProduct {
            id: ProductId::new(id),
            sku: sku.to_string(),
            name: format!("Product {sku}"),
            price: Some(Decimal::from(5)),
            stock_qty: None,
            weight: None,
            description: None,
        }
    }

    #[test]
    fn test_fields_only_change_the_target_model() {
        let options = options_for(EntityKind::Customer, &["phone".to_string()]);
        assert_eq!(options.customer_fields, FieldSelection::all(&["phone"]));
        assert_eq!(options.order_fields, SyncOptions::default().order_fields);

        assert_eq!(options_for(EntityKind::Product, &[]), SyncOptions::default());
    }

    #[test]
    fn test_documented_customer_fields_are_selectable() {
        let fields = ["phone".to_string(), " city".to_string()];
        let options = options_for(EntityKind::Customer, &fields);
        assert!(options.customer_fields.validate(customers::SELECTABLE_FIELDS).is_ok());

        // Name and email identify the partner and are always sent
        let options = options_for(EntityKind::Customer, &["email".to_string()]);
        assert!(options.customer_fields.validate(customers::SELECTABLE_FIELDS).is_err());
    }

    #[tokio::test]
    async fn test_export_without_ids_syncs_every_product() {
        let store = MemoryStore::new();
        store.insert_product(product(10, "A-1")).await;
        store.insert_product(product(11, "A-2")).await;
        let service = SyncService::new(ScriptedTransport::new(), store, test_config());

        let report = run_export(&service, EntityKind::Product, &[]).await.unwrap();
        assert_eq!(report.new, 2);
        assert_eq!(service.transport().count("product.template", "create"), 2);

        let snapshot = service.store().snapshot().await;
        assert_eq!(snapshot.remote_refs.len(), 2);
    }

    #[tokio::test]
    async fn test_import_rejects_non_positive_ids() {
        let service = SyncService::new(ScriptedTransport::new(), MemoryStore::new(), test_config());
        let err = run_import(&service, EntityKind::Product, &[4, 0]).await.unwrap_err();
        assert!(matches!(err, CliError::InvalidId(0)));
        assert!(service.transport().calls().is_empty());
    }
}
