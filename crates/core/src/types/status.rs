//! Status enums on both sides of the order sync.
//!
//! [`OrderStatus`] is the WooCommerce order status; [`SaleOrderState`] is the
//! Odoo `sale.order` state it translates to. The translation is a fixed
//! lookup table: unknown local statuses land on the least committal remote
//! state (a draft quotation) instead of failing the sync.

use serde::{Deserialize, Serialize};

/// WooCommerce order status.
///
/// Statuses registered by third-party plugins are preserved verbatim in
/// [`OrderStatus::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    OnHold,
    Completed,
    Cancelled,
    Refunded,
    Failed,
    Other(String),
}

impl OrderStatus {
    /// The status slug as WooCommerce stores it (without the `wc-` prefix).
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::OnHold => "on-hold",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
            Self::Failed => "failed",
            Self::Other(s) => s,
        }
    }

    /// Remote state this status maps to.
    #[must_use]
    pub const fn to_sale_state(&self) -> SaleOrderState {
        match self {
            Self::Processing => SaleOrderState::Sale,
            Self::OnHold => SaleOrderState::Sent,
            Self::Completed => SaleOrderState::Done,
            Self::Cancelled | Self::Refunded | Self::Failed => SaleOrderState::Cancel,
            Self::Pending | Self::Other(_) => SaleOrderState::Draft,
        }
    }

    /// Commercial document kind for this status.
    #[must_use]
    pub const fn order_kind(&self) -> OrderKind {
        match self {
            Self::Completed => OrderKind::Sale,
            Self::Pending | Self::OnHold => OrderKind::Quote,
            _ => OrderKind::Order,
        }
    }
}

impl From<String> for OrderStatus {
    fn from(value: String) -> Self {
        let slug = value.trim().to_ascii_lowercase();
        match slug.strip_prefix("wc-").unwrap_or(&slug) {
            "pending" => Self::Pending,
            "processing" => Self::Processing,
            "on-hold" => Self::OnHold,
            "completed" => Self::Completed,
            "cancelled" => Self::Cancelled,
            "refunded" => Self::Refunded,
            "failed" => Self::Failed,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for OrderStatus {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Odoo `sale.order` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SaleOrderState {
    /// Quotation.
    #[default]
    Draft,
    /// Quotation sent.
    Sent,
    /// Confirmed sales order.
    Sale,
    /// Locked / fully processed.
    Done,
    /// Cancelled.
    Cancel,
}

impl SaleOrderState {
    /// The selection value Odoo expects.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Sale => "sale",
            Self::Done => "done",
            Self::Cancel => "cancel",
        }
    }
}

impl std::fmt::Display for SaleOrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of commercial document an order represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    /// Quotation awaiting customer confirmation.
    #[default]
    Quote,
    /// Open order being fulfilled.
    Order,
    /// Finished sale; manual creations of this kind are confirmed remotely.
    Sale,
}

impl std::str::FromStr for OrderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "quote" => Ok(Self::Quote),
            "order" => Ok(Self::Order),
            "sale" => Ok(Self::Sale),
            _ => Err(format!("invalid order kind: {s}")),
        }
    }
}
