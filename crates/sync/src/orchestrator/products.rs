//! Product export.

use tracing::instrument;

use odooflow_core::{EntityKind, LocalProduct, ProductId, RemoteId, RemoteRef};

use super::{SyncSession, settle};
use crate::error::SyncError;
use crate::mapper::products;
use crate::report::{OutcomeStatus, SyncOutcome};
use crate::rpc::{Domain, RpcTransport};
use crate::store::EntityStore;

impl<T: RpcTransport, S: EntityStore> SyncSession<'_, T, S> {
    /// Export one product as a `product.template`, matched by SKU.
    ///
    /// # Errors
    ///
    /// Returns batch-fatal errors only.
    #[instrument(skip(self))]
    pub async fn sync_product(&mut self, id: ProductId) -> Result<SyncOutcome, SyncError> {
        let product = match self.store.product(id).await {
            Ok(product) => product,
            Err(e) => return settle(format!("Product #{id}"), Err(e.into())),
        };
        let name = if product.name.trim().is_empty() {
            format!("Product #{id}")
        } else {
            product.name.clone()
        };
        let result = self.export_product(&product).await;
        settle(name, result)
    }

    async fn export_product(
        &mut self,
        product: &LocalProduct,
    ) -> Result<(OutcomeStatus, RemoteId), SyncError> {
        if product.name.trim().is_empty() {
            return Err(SyncError::Validation("product name is required".to_string()));
        }
        let payload = products::to_remote(product, &self.options.product_fields);

        let existing = match self
            .store
            .remote_id(EntityKind::Product, product.id.as_i64())
            .await?
        {
            Some(remote_id) => Some(remote_id),
            None if product.sku.trim().is_empty() => None,
            None => {
                self.rpc
                    .search_one(
                        products::MODEL,
                        Domain::new().equals("default_code", product.sku.trim()),
                    )
                    .await?
            }
        };

        let (status, remote_id) = match existing {
            Some(remote_id) => {
                self.rpc.write(products::MODEL, remote_id, payload).await?;
                (OutcomeStatus::Updated, remote_id)
            }
            None => (
                OutcomeStatus::Created,
                self.rpc.create(products::MODEL, payload).await?,
            ),
        };

        self.remember(RemoteRef::new(
            EntityKind::Product,
            product.id.as_i64(),
            remote_id,
        ))
        .await;
        Ok((status, remote_id))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use crate::error::ErrorKind;
    use crate::mapper::FieldSelection;
    use crate::orchestrator::{SyncOptions, SyncService};
    use crate::rpc::RemoteValue;
    use crate::store::MemoryStore;
    use crate::testing::{ScriptedTransport, test_config};

    use super::*;

    fn product(id: i64, sku: &str, name: &str) -> LocalProduct {
        LocalProduct {
            id: ProductId::new(id),
            sku: sku.to_string(),
            name: name.to_string(),
            price: Some(Decimal::from(20)),
            stock_qty: Some(3),
            weight: None,
            description: None,
        }
    }

    async fn service(products: Vec<LocalProduct>) -> SyncService<ScriptedTransport, MemoryStore> {
        let store = MemoryStore::new();
        for p in products {
            store.insert_product(p).await;
        }
        SyncService::new(ScriptedTransport::new(), store, test_config())
    }

    #[tokio::test]
    async fn test_sku_match_is_updated_with_selected_fields() {
        let service = service(vec![product(10, "MUG-01", "Coffee Mug")])
            .await
            .with_options(SyncOptions {
                product_fields: FieldSelection::all(&["list_price"]),
                ..SyncOptions::default()
            });
        service
            .transport()
            .on("product.template", "search", |_| Ok(vec![RemoteValue::Int(31)].into()));

        let report = service.sync_products(&[ProductId::new(10)]).await.unwrap();
        assert_eq!(report.updated, 1);

        let writes = service.transport().calls_to("product.template", "write");
        let values = writes[0].values().unwrap();
        assert_eq!(values.len(), 3);
        assert_eq!(values["list_price"], RemoteValue::Double(20.0));
    }

    #[tokio::test]
    async fn test_product_without_sku_skips_search() {
        let service = service(vec![product(10, "", "Gift Wrap")]).await;
        let report = service.sync_products(&[ProductId::new(10)]).await.unwrap();
        assert_eq!(report.new, 1);
        assert_eq!(service.transport().count("product.template", "search"), 0);
    }

    #[tokio::test]
    async fn test_nameless_product_is_a_validation_failure() {
        let service = service(vec![product(10, "X-1", "  ")]).await;
        let report = service.sync_products(&[ProductId::new(10)]).await.unwrap();
        assert_eq!(report.failed[0].name, "Product #10");
        assert_eq!(report.failed[0].kind, ErrorKind::Validation);
        assert_eq!(service.transport().count("product.template", "create"), 0);
    }

    #[tokio::test]
    async fn test_unknown_field_selection_is_rejected_before_auth() {
        let service = service(vec![]).await.with_options(SyncOptions {
            product_fields: FieldSelection::all(&["color"]),
            ..SyncOptions::default()
        });
        let err = service.sync_products(&[]).await.unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
        assert!(service.transport().calls().is_empty());
    }
}
