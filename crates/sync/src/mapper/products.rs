//! `LocalProduct` <-> `product.template`.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;

use odooflow_core::{LocalProduct, RemoteId};

use super::{FieldSelection, RemotePayload};
use crate::error::SyncError;
use crate::rpc::{RemoteStruct, RemoteValue};

/// Odoo model products are exported to and imported from.
pub const MODEL: &str = "product.template";

/// Always sent and always read.
pub const REQUIRED_FIELDS: &[&str] = &["name", "default_code"];

/// Fields an operator may add to a product sync.
pub const SELECTABLE_FIELDS: &[&str] = &["list_price", "description", "qty_available", "weight"];

/// Product values read from Odoo.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ProductFields {
    pub remote_id: Option<RemoteId>,
    pub name: String,
    pub sku: String,
    pub price: Option<Decimal>,
    pub description: Option<String>,
    pub stock_qty: Option<i64>,
    pub weight: Option<Decimal>,
}

/// Build the `create`/`write` values for a product.
///
/// Unset numeric fields are omitted rather than sent as zero.
#[must_use]
pub fn to_remote(product: &LocalProduct, selection: &FieldSelection) -> RemotePayload {
    let mut payload = RemotePayload::new();
    payload.insert("name".into(), product.name.as_str().into());
    payload.insert("default_code".into(), product.sku.as_str().into());

    if selection.contains("list_price")
        && let Some(price) = product.price
    {
        payload.insert("list_price".into(), price.into());
    }
    if selection.contains("description") {
        payload.insert(
            "description".into(),
            product.description.clone().unwrap_or_default().into(),
        );
    }
    if selection.contains("qty_available")
        && let Some(qty) = product.stock_qty
    {
        payload.insert("qty_available".into(), Decimal::from(qty).into());
    }
    if selection.contains("weight")
        && let Some(weight) = product.weight
    {
        payload.insert("weight".into(), weight.into());
    }
    payload
}

/// Fields to request when reading products for import.
#[must_use]
pub fn read_fields(selection: &FieldSelection) -> Vec<&str> {
    let mut fields = vec!["id"];
    fields.extend_from_slice(REQUIRED_FIELDS);
    fields.extend(SELECTABLE_FIELDS.iter().copied().filter(|f| selection.contains(f)));
    fields
}

/// Decode a `product.template` record.
///
/// # Errors
///
/// Returns `SyncError::Validation` if the record has no name.
pub fn from_remote(record: &RemoteStruct) -> Result<ProductFields, SyncError> {
    let text = |field: &str| record.get(field).and_then(RemoteValue::text).map(str::to_string);
    let number = |field: &str| record.get(field).and_then(RemoteValue::as_decimal);

    let name = text("name").unwrap_or_default();
    if name.trim().is_empty() {
        return Err(SyncError::Validation("product record has no name".to_string()));
    }

    Ok(ProductFields {
        remote_id: record.get("id").and_then(RemoteValue::as_remote_id),
        name,
        sku: text("default_code").unwrap_or_default(),
        price: number("list_price"),
        description: text("description"),
        stock_qty: number("qty_available").and_then(|q| q.trunc().to_i64()),
        weight: number("weight"),
    })
}

/// Values for the `product.product` auto-created for an order line whose
/// product has never been exported.
#[must_use]
pub fn variant_payload(product: &LocalProduct, product_type: &str) -> RemotePayload {
    let mut payload = to_remote(product, &FieldSelection::all(&["list_price"]));
    payload.insert("type".into(), product_type.into());
    payload.insert("sale_ok".into(), true.into());
    payload
}
