//! `LocalOrder` -> `sale.order`.
//!
//! Lines are sent as one2many commands inside the order payload, so an
//! order's header and lines are written in a single call.

use odooflow_core::{LineItem, LocalOrder, RemoteId};
use rust_decimal::Decimal;

use super::{FieldSelection, RemotePayload};
use crate::rpc::RemoteValue;

/// Odoo model orders are exported to.
pub const MODEL: &str = "sale.order";

/// Always sent.
pub const REQUIRED_FIELDS: &[&str] = &["name", "partner_id"];

/// Fields an operator may add to an order sync.
pub const SELECTABLE_FIELDS: &[&str] = &[
    "date_order",
    "state",
    "order_line",
    "currency_id",
    "note",
    "amount_tax",
    "amount_total",
];

/// Line name used when the order has no shipping method title.
const DEFAULT_SHIPPING_NAME: &str = "Shipping";

/// Whether the payload creates a new order or rewrites an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Create,
    /// Existing lines are cleared first so a re-sync replaces them.
    Update,
}

/// Remote ids an order payload refers to, resolved before mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderRefs {
    pub partner_id: Option<RemoteId>,
    /// `product.product` id per line item, `None` when unresolved.
    pub line_products: Vec<Option<RemoteId>>,
    pub currency_id: Option<RemoteId>,
    /// Delivery product attached to the shipping line, if configured.
    pub shipping_product: Option<RemoteId>,
}

/// One2many "create" command: `(0, 0, values)`.
#[must_use]
pub fn create_command(values: RemotePayload) -> RemoteValue {
    RemoteValue::Array(vec![
        RemoteValue::Int(0),
        RemoteValue::Int(0),
        RemoteValue::Struct(values),
    ])
}

/// One2many "clear" command: `(5, 0, 0)`.
#[must_use]
pub fn clear_command() -> RemoteValue {
    RemoteValue::Array(vec![
        RemoteValue::Int(5),
        RemoteValue::Int(0),
        RemoteValue::Int(0),
    ])
}

/// Build the `create`/`write` values for an order.
#[must_use]
pub fn to_remote(
    order: &LocalOrder,
    refs: &OrderRefs,
    selection: &FieldSelection,
    mode: WriteMode,
) -> RemotePayload {
    let mut payload = RemotePayload::new();
    payload.insert("name".into(), order.remote_name().into());
    if let Some(partner_id) = refs.partner_id {
        payload.insert("partner_id".into(), partner_id.into());
    }

    if selection.contains("date_order") {
        payload.insert(
            "date_order".into(),
            order.created_at.format("%Y-%m-%d %H:%M:%S").to_string().into(),
        );
    }
    if selection.contains("state") {
        payload.insert("state".into(), order.status.to_sale_state().as_str().into());
    }
    if selection.contains("order_line") {
        let mut commands = Vec::new();
        if mode == WriteMode::Update {
            commands.push(clear_command());
        }
        commands.extend(order_lines(order, refs));
        payload.insert("order_line".into(), RemoteValue::Array(commands));
    }
    if selection.contains("currency_id")
        && let Some(currency_id) = refs.currency_id
    {
        payload.insert("currency_id".into(), currency_id.into());
    }
    if selection.contains("note") {
        payload.insert("note".into(), order.note.as_str().into());
    }
    if selection.contains("amount_tax") {
        payload.insert("amount_tax".into(), order.tax_total.into());
    }
    if selection.contains("amount_total") {
        payload.insert("amount_total".into(), order.total.into());
    }
    payload
}

/// Line commands for every item with a resolved product, plus shipping.
#[must_use]
pub fn order_lines(order: &LocalOrder, refs: &OrderRefs) -> Vec<RemoteValue> {
    let mut lines: Vec<RemoteValue> = order
        .line_items
        .iter()
        .zip(refs.line_products.iter().chain(std::iter::repeat(&None)))
        .filter_map(|(item, product)| product.map(|id| create_command(line_values(item, id))))
        .collect();

    if order.shipping_total > Decimal::ZERO {
        lines.push(create_command(shipping_values(order, refs.shipping_product)));
    }
    lines
}

fn line_values(item: &LineItem, product_id: RemoteId) -> RemotePayload {
    let mut values = RemotePayload::new();
    values.insert("product_id".into(), product_id.into());
    values.insert("name".into(), item.name.as_str().into());
    values.insert("product_uom_qty".into(), item.quantity.into());
    values.insert("price_unit".into(), item.unit_price().into());
    values.insert("discount".into(), item.discount_percent().into());
    values
}

fn shipping_values(order: &LocalOrder, shipping_product: Option<RemoteId>) -> RemotePayload {
    let name = if order.shipping_method.trim().is_empty() {
        DEFAULT_SHIPPING_NAME
    } else {
        order.shipping_method.as_str()
    };

    let mut values = RemotePayload::new();
    if let Some(product_id) = shipping_product {
        values.insert("product_id".into(), product_id.into());
    }
    values.insert("name".into(), name.into());
    values.insert("price_unit".into(), order.shipping_total.into());
    values.insert("product_uom_qty".into(), RemoteValue::Int(1));
    values.insert("is_delivery".into(), true.into());
    values
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use odooflow_core::{CurrencyCode, OrderId, OrderStatus, ProductId};

    fn order(status: &str) -> LocalOrder {
        LocalOrder {
            id: OrderId::new(1001),
            number: "1001".to_string(),
            status: OrderStatus::from(status),
            customer_ref: None,
            billing: odooflow_core::Contact::default(),
            line_items: vec![
                LineItem {
                    product_id: Some(ProductId::new(10)),
                    name: "Coffee Mug".to_string(),
                    quantity: Decimal::from(2),
                    subtotal: Decimal::from(50),
                    total: Decimal::from(40),
                },
                LineItem {
                    product_id: Some(ProductId::new(11)),
                    name: "Tote Bag".to_string(),
                    quantity: Decimal::ONE,
                    subtotal: Decimal::from(20),
                    total: Decimal::from(20),
                },
            ],
            shipping_total: Decimal::from(8),
            shipping_method: "Flat rate".to_string(),
            tax_total: Decimal::from(11),
            total: Decimal::from(79),
            currency: CurrencyCode::default(),
            note: "Leave at the door".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 0).unwrap(),
        }
    }

    fn refs() -> OrderRefs {
        OrderRefs {
            partner_id: RemoteId::positive(12),
            line_products: vec![RemoteId::positive(31), RemoteId::positive(32)],
            currency_id: RemoteId::positive(8),
            shipping_product: None,
        }
    }

    fn all() -> FieldSelection {
        FieldSelection::all(SELECTABLE_FIELDS)
    }

    #[test]
    fn test_header_fields() {
        let payload = to_remote(&order("processing"), &refs(), &all(), WriteMode::Create);
        assert_eq!(payload["name"], RemoteValue::from("WC1001"));
        assert_eq!(payload["partner_id"], RemoteValue::Int(12));
        assert_eq!(payload["state"], RemoteValue::from("sale"));
        assert_eq!(payload["date_order"], RemoteValue::from("2024-03-05 14:30:00"));
        assert_eq!(payload["currency_id"], RemoteValue::Int(8));
        assert_eq!(payload["amount_total"], RemoteValue::Double(79.0));
        assert!(!payload.contains_key("order_type"));
    }

    #[test]
    fn test_unknown_status_is_draft() {
        for status in ["pending", "awaiting-shipment", "wc-something-custom", ""] {
            let payload = to_remote(&order(status), &refs(), &all(), WriteMode::Create);
            assert_eq!(payload["state"], RemoteValue::from("draft"), "{status}");
        }
    }

    #[test]
    fn test_line_commands() {
        let payload = to_remote(&order("completed"), &refs(), &all(), WriteMode::Create);
        let lines = payload["order_line"].items().unwrap();
        assert_eq!(lines.len(), 3);

        let first = lines[0].items().unwrap();
        assert_eq!(first[0], RemoteValue::Int(0));
        let values = &first[2];
        assert_eq!(values.get("product_id"), Some(&RemoteValue::Int(31)));
        assert_eq!(values.get("product_uom_qty"), Some(&RemoteValue::Double(2.0)));
        assert_eq!(values.get("price_unit"), Some(&RemoteValue::Double(20.0)));
        assert_eq!(values.get("discount"), Some(&RemoteValue::Double(20.0)));

        let shipping = &lines[2].items().unwrap()[2];
        assert_eq!(shipping.get("name"), Some(&RemoteValue::from("Flat rate")));
        assert_eq!(shipping.get("price_unit"), Some(&RemoteValue::Double(8.0)));
        assert_eq!(shipping.get("is_delivery"), Some(&RemoteValue::Bool(true)));
        assert_eq!(shipping.get("product_id"), None);
    }

    #[test]
    fn test_update_clears_lines_first() {
        let payload = to_remote(&order("processing"), &refs(), &all(), WriteMode::Update);
        let lines = payload["order_line"].items().unwrap();
        assert_eq!(lines[0], clear_command());
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_unresolved_products_are_skipped() {
        let refs = OrderRefs {
            line_products: vec![None],
            ..refs()
        };
        let lines = order_lines(&order("processing"), &refs);
        // second item has no entry at all, first is unresolved: only shipping remains
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn test_no_shipping_line_without_shipping_total() {
        let mut order = order("processing");
        order.shipping_total = Decimal::ZERO;
        assert_eq!(order_lines(&order, &refs()).len(), 2);
    }

    #[test]
    fn test_selection_limits_payload() {
        let selection: FieldSelection = ["state"].into_iter().collect();
        let payload = to_remote(&order("on-hold"), &refs(), &selection, WriteMode::Create);
        assert_eq!(payload.len(), 3);
        assert_eq!(payload["state"], RemoteValue::from("sent"));
    }
}
