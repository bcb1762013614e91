//! Local commerce entities and their remote references.
//!
//! These records are owned by the host commerce system. The sync core only
//! reads them; the one thing it writes back is a [`RemoteRef`] once an
//! entity has been created or updated in the ERP.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{CurrencyCode, CustomerId, OrderId, OrderStatus, ProductId, RemoteId};

/// Kind of entity a [`RemoteRef`] annotates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Order,
    Customer,
    Product,
}

impl EntityKind {
    /// Metadata key the remote id is stored under on the local entity.
    #[must_use]
    pub const fn meta_key(&self) -> &'static str {
        match self {
            Self::Order => "remote_order_id",
            Self::Customer => "remote_customer_id",
            Self::Product => "remote_product_id",
        }
    }

    /// Odoo model the entity is synchronized with.
    #[must_use]
    pub const fn remote_model(&self) -> &'static str {
        match self {
            Self::Order => "sale.order",
            Self::Customer => "res.partner",
            Self::Product => "product.template",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Order => "order",
            Self::Customer => "customer",
            Self::Product => "product",
        })
    }
}

/// Durable mapping from a local entity to its ERP record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteRef {
    pub entity_kind: EntityKind,
    pub local_id: i64,
    pub remote_id: RemoteId,
}

impl RemoteRef {
    #[must_use]
    pub const fn new(entity_kind: EntityKind, local_id: i64, remote_id: RemoteId) -> Self {
        Self {
            entity_kind,
            local_id,
            remote_id,
        }
    }
}

/// Postal address as captured at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    pub street: String,
    pub street2: String,
    pub city: String,
    /// Free-text state / department name (matched case-insensitively).
    pub state: String,
    /// ISO 3166-1 alpha-2 country code.
    pub country: String,
    pub postal: String,
}

/// Contact details shared by registered customers and guest checkouts.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Contact {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub billing_address: Address,
    /// National tax / identity document number (NIT, CC, ...).
    pub tax_id: String,
    /// Document type code or alias (`31`, `nit`, `cc`, ...).
    pub tax_id_type: String,
}

/// A registered WooCommerce customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalCustomer {
    pub id: CustomerId,
    #[serde(flatten)]
    pub contact: Contact,
}

/// A WooCommerce product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalProduct {
    pub id: ProductId,
    #[serde(default)]
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub stock_qty: Option<i64>,
    #[serde(default)]
    pub weight: Option<Decimal>,
    #[serde(default)]
    pub description: Option<String>,
}

/// One line of a WooCommerce order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Product the line was sold from; `None` when the product was deleted.
    #[serde(default)]
    pub product_id: Option<ProductId>,
    pub name: String,
    pub quantity: Decimal,
    /// Line total before discounts.
    pub subtotal: Decimal,
    /// Line total after discounts.
    pub total: Decimal,
}

impl LineItem {
    /// Net unit price (`total / quantity`), zero for empty lines or when
    /// the quotient does not fit a `Decimal`.
    #[must_use]
    pub fn unit_price(&self) -> Decimal {
        self.total.checked_div(self.quantity).unwrap_or_default()
    }

    /// Discount percentage implied by subtotal vs. total. Zero without a
    /// positive subtotal or on overflow.
    #[must_use]
    pub fn discount_percent(&self) -> Decimal {
        if self.subtotal <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        self.total
            .checked_div(self.subtotal)
            .and_then(|ratio| Decimal::ONE.checked_sub(ratio))
            .and_then(|share| share.checked_mul(Decimal::ONE_HUNDRED))
            .unwrap_or_default()
    }
}

/// A WooCommerce order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalOrder {
    pub id: OrderId,
    /// Customer-facing order number (usually equal to the id).
    pub number: String,
    pub status: OrderStatus,
    /// Registered customer, `None` for guest checkouts.
    #[serde(default)]
    pub customer_ref: Option<CustomerId>,
    /// Billing contact captured on the order itself.
    #[serde(default)]
    pub billing: Contact,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub shipping_total: Decimal,
    #[serde(default)]
    pub shipping_method: String,
    #[serde(default)]
    pub tax_total: Decimal,
    #[serde(default)]
    pub total: Decimal,
    #[serde(default)]
    pub currency: CurrencyCode,
    #[serde(default)]
    pub note: String,
    pub created_at: DateTime<Utc>,
}

impl LocalOrder {
    /// Unique external code of the order in the ERP (`WC{number}`).
    #[must_use]
    pub fn remote_name(&self) -> String {
        format!("WC{}", self.number)
    }
}
