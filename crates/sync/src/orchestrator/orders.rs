//! Order export.

use tracing::{debug, instrument, warn};

use odooflow_core::{Contact, EntityKind, LocalOrder, OrderId, ProductId, RemoteId, RemoteRef};

use super::{SyncSession, settle};
use crate::cache::LookupKind;
use crate::error::SyncError;
use crate::mapper::{customers, orders, products, OrderRefs, WriteMode};
use crate::report::{OutcomeStatus, SyncOutcome};
use crate::rpc::{Domain, RpcTransport};
use crate::store::{EntityStore, StoreError};

/// Model order lines point at.
const VARIANT_MODEL: &str = "product.product";

impl<T: RpcTransport, S: EntityStore> SyncSession<'_, T, S> {
    /// Export one order, with its lines, in a single `create` or `write`.
    ///
    /// The outcome is also left as a note on the order.
    ///
    /// # Errors
    ///
    /// Returns batch-fatal errors only.
    #[instrument(skip(self))]
    pub async fn sync_order(&mut self, id: OrderId) -> Result<SyncOutcome, SyncError> {
        let order = match self.store.order(id).await {
            Ok(order) => order,
            Err(e) => return settle(format!("Order #{id}"), Err(e.into())),
        };

        let result = self.export_order(&order).await;
        let note = match &result {
            Ok((_, remote_id)) => format!("Order successfully synced to Odoo (ID: {remote_id})"),
            Err(e) => format!("Odoo Sync Failed: {e}"),
        };
        if let Err(e) = self.store.add_order_note(order.id, &note).await {
            warn!(order_id = %order.id, error = %e, "Failed to add order note");
        }

        settle(format!("Order #{}", order.number), result)
    }

    async fn export_order(
        &mut self,
        order: &LocalOrder,
    ) -> Result<(OutcomeStatus, RemoteId), SyncError> {
        let options = self.options;
        let selection = &options.order_fields;

        let existing = match self
            .store
            .remote_id(EntityKind::Order, order.id.as_i64())
            .await?
        {
            Some(remote_id) => Some(remote_id),
            None => {
                self.rpc
                    .search_one(
                        orders::MODEL,
                        Domain::new().equals("name", order.remote_name()),
                    )
                    .await?
            }
        };

        let refs = self.order_refs(order).await?;

        let (status, remote_id) = match existing {
            Some(remote_id) => {
                let payload = orders::to_remote(order, &refs, selection, WriteMode::Update);
                self.rpc.write(orders::MODEL, remote_id, payload).await?;
                (OutcomeStatus::Updated, remote_id)
            }
            None => {
                let payload = orders::to_remote(order, &refs, selection, WriteMode::Create);
                let remote_id = self.rpc.create(orders::MODEL, payload).await?;
                (OutcomeStatus::Created, remote_id)
            }
        };

        self.remember(RemoteRef::new(EntityKind::Order, order.id.as_i64(), remote_id))
            .await;
        Ok((status, remote_id))
    }

    async fn order_refs(&mut self, order: &LocalOrder) -> Result<OrderRefs, SyncError> {
        let partner_id = self.resolve_partner(order).await?;

        let mut line_products = Vec::with_capacity(order.line_items.len());
        if self.options.order_fields.contains("order_line") {
            for item in &order.line_items {
                let resolved = match item.product_id {
                    Some(product_id) => self.resolve_line_product(product_id).await?,
                    None => None,
                };
                if resolved.is_none() {
                    warn!(order = %order.number, line = %item.name, "Line item has no product, skipped");
                }
                line_products.push(resolved);
            }
        }

        let currency_id = if self.options.order_fields.contains("currency_id") {
            self.cache
                .resolve(&self.rpc, LookupKind::Currency, order.currency.as_str(), None)
                .await
        } else {
            None
        };

        Ok(OrderRefs {
            partner_id: Some(partner_id),
            line_products,
            currency_id,
            shipping_product: self.options.shipping_product,
        })
    }

    /// Partner of an order: the registered customer's stored ref, else the
    /// customer synced now, else a guest partner matched or created from the
    /// billing contact. A registered customer missing from the store is
    /// treated as a guest.
    async fn resolve_partner(&mut self, order: &LocalOrder) -> Result<RemoteId, SyncError> {
        if let Some(customer_id) = order.customer_ref {
            if let Some(remote_id) = self
                .store
                .remote_id(EntityKind::Customer, customer_id.as_i64())
                .await?
            {
                return Ok(remote_id);
            }
            match self.store.customer(customer_id).await {
                Ok(customer) => {
                    let (_, remote_id) = self.export_customer(&customer).await?;
                    return Ok(remote_id);
                }
                Err(StoreError::NotFound { .. }) => {
                    warn!(
                        order_id = %order.id,
                        customer_id = %customer_id,
                        "Order customer not found, using billing contact"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        let email = customers::contact_email(&order.billing)?;
        if let Some(remote_id) = self
            .rpc
            .search_one(
                customers::MODEL,
                Domain::new().equals("email", email.as_str()),
            )
            .await?
        {
            debug!(%remote_id, "Matched guest partner by email");
            return Ok(remote_id);
        }

        let mut contact: Contact = order.billing.clone();
        if contact.name.trim().is_empty() {
            contact.name = email.local_part().to_string();
        }
        let payload = customers::to_remote(
            &contact,
            &self.options.customer_fields,
            &mut self.cache,
            &self.rpc,
        )
        .await?;
        self.rpc.create(customers::MODEL, payload).await
    }

    /// `product.product` id for a line: matched by SKU, or created.
    async fn resolve_line_product(
        &mut self,
        product_id: ProductId,
    ) -> Result<Option<RemoteId>, SyncError> {
        let product = match self.store.product(product_id).await {
            Ok(product) => product,
            Err(StoreError::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if let Some(remote_id) = self
            .cache
            .resolve(&self.rpc, LookupKind::ProductVariant, &product.sku, None)
            .await
        {
            return Ok(Some(remote_id));
        }

        let payload = products::variant_payload(&product, &self.options.product_type);
        let remote_id = self.rpc.create(VARIANT_MODEL, payload).await?;
        debug!(sku = %product.sku, %remote_id, "Created product variant for order line");
        if !product.sku.trim().is_empty() {
            self.cache
                .insert(LookupKind::ProductVariant, &product.sku, remote_id);
        }
        Ok(Some(remote_id))
    }
}
