//! Manual sale orders and the remote listings an operator picks from.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use odooflow_core::{EntityKind, OrderId, OrderKind, RemoteId, RemoteRef};

use super::SyncSession;
use crate::error::SyncError;
use crate::mapper::orders::{self, create_command};
use crate::mapper::{ProductFields, RemotePayload, customers, products};
use crate::rpc::{Domain, RemoteStruct, RemoteValue, RpcTransport};
use crate::store::EntityStore;

const VARIANT_MODEL: &str = "product.product";

/// Templates listed for import.
const LISTING_LIMIT: i64 = 100;

/// One line of a [`ManualOrder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualLine {
    /// `product.product` id.
    pub product_id: RemoteId,
    pub quantity: Decimal,
    pub price_unit: Decimal,
}

/// A sale order assembled by an operator from remote records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualOrder {
    pub partner_id: RemoteId,
    pub lines: Vec<ManualLine>,
    /// `Sale` confirms the order after creating it.
    #[serde(default)]
    pub kind: OrderKind,
    /// Local order the remote one stands for, if any.
    #[serde(default)]
    pub local_order: Option<OrderId>,
    /// Customer-facing number, sent as the client reference.
    #[serde(default)]
    pub number: Option<String>,
}

/// Partner entry of [`SyncSession::list_remote_customers`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteCustomer {
    pub id: RemoteId,
    pub name: String,
    pub email: String,
    pub phone: String,
}

fn manual_payload(order: &ManualOrder) -> Result<RemotePayload, SyncError> {
    if order.lines.is_empty() {
        return Err(SyncError::Validation("order has no lines".to_string()));
    }

    let mut lines = Vec::with_capacity(order.lines.len());
    for line in &order.lines {
        if line.quantity <= Decimal::ZERO {
            return Err(SyncError::Validation(format!(
                "quantity of product {} must be positive",
                line.product_id
            )));
        }
        let mut values = RemotePayload::new();
        values.insert("product_id".into(), line.product_id.into());
        values.insert("product_uom_qty".into(), line.quantity.into());
        values.insert("price_unit".into(), line.price_unit.into());
        lines.push(create_command(values));
    }

    let mut payload = RemotePayload::new();
    payload.insert("partner_id".into(), order.partner_id.into());
    payload.insert("order_line".into(), RemoteValue::Array(lines));
    if let Some(number) = order.number.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        payload.insert("client_order_ref".into(), number.into());
        payload.insert("origin".into(), format!("WooCommerce Order #{number}").into());
    }
    if order.kind == OrderKind::Sale {
        payload.insert("state".into(), "sale".into());
    }
    Ok(payload)
}

fn text(record: &RemoteStruct, field: &str) -> String {
    record
        .get(field)
        .and_then(RemoteValue::text)
        .unwrap_or_default()
        .to_string()
}

impl<T: RpcTransport, S: EntityStore> SyncSession<'_, T, S> {
    /// Create a sale order; `OrderKind::Sale` orders are confirmed with
    /// `action_confirm`.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Validation` for an empty order or a non-positive
    /// quantity, otherwise the failing call's error.
    #[instrument(skip(self, order), fields(partner_id = %order.partner_id, lines = order.lines.len()))]
    pub async fn create_manual_order(&mut self, order: &ManualOrder) -> Result<RemoteId, SyncError> {
        let payload = manual_payload(order)?;
        let remote_id = self.rpc.create(orders::MODEL, payload).await?;
        info!(%remote_id, kind = ?order.kind, "Created manual order");

        // The ref is stored even when the confirm below fails
        if let Some(local_id) = order.local_order {
            self.remember(RemoteRef::new(EntityKind::Order, local_id.as_i64(), remote_id))
                .await;
            let note = format!("Order successfully created in Odoo (ID: {remote_id})");
            if let Err(e) = self.store.add_order_note(local_id, &note).await {
                warn!(order_id = %local_id, error = %e, "Failed to add order note");
            }
        }

        if order.kind == OrderKind::Sale {
            self.rpc
                .call_method(orders::MODEL, "action_confirm", &[remote_id])
                .await
                .inspect_err(|e| warn!(%remote_id, error = %e, "Created order could not be confirmed"))?;
        }
        Ok(remote_id)
    }

    /// Active partners with a customer rank, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns the call error.
    pub async fn list_remote_customers(&self) -> Result<Vec<RemoteCustomer>, SyncError> {
        let records = self
            .rpc
            .search_read_ordered(
                customers::MODEL,
                Domain::new()
                    .filter("customer_rank", ">", 0_i64)
                    .equals("active", true),
                &["id", "name", "email", "phone"],
                Some("name ASC"),
                None,
            )
            .await?;

        Ok(records
            .iter()
            .filter_map(|record| {
                Some(RemoteCustomer {
                    id: record.get("id")?.as_remote_id()?,
                    name: text(record, "name"),
                    email: text(record, "email"),
                    phone: text(record, "phone"),
                })
            })
            .collect())
    }

    /// Active product templates offered for import.
    ///
    /// # Errors
    ///
    /// Returns the call error.
    pub async fn list_remote_products(&self) -> Result<Vec<ProductFields>, SyncError> {
        let fields = products::read_fields(&self.options.product_fields);
        let records = self
            .rpc
            .search_read(
                products::MODEL,
                Domain::new().equals("active", true),
                &fields,
                Some(LISTING_LIMIT),
            )
            .await?;
        Ok(decode_products(&records))
    }

    /// Sellable product variants for manual orders, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns the call error.
    pub async fn list_sellable_products(&self) -> Result<Vec<ProductFields>, SyncError> {
        let records = self
            .rpc
            .search_read_ordered(
                VARIANT_MODEL,
                Domain::new().equals("sale_ok", true).equals("active", true),
                &["id", "name", "list_price", "default_code"],
                Some("name ASC"),
                None,
            )
            .await?;
        Ok(decode_products(&records))
    }
}

fn decode_products(records: &[RemoteStruct]) -> Vec<ProductFields> {
    records
        .iter()
        .filter_map(|record| match products::from_remote(record) {
            Ok(fields) => Some(fields),
            Err(e) => {
                warn!(error = %e, "Skipping product record");
                None
            }
        })
        .collect()
}
