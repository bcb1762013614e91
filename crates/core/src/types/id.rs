//! Newtype IDs for type-safe entity references.
//!
//! Local ids (WooCommerce posts and users) and remote ids (Odoo record ids)
//! are both plain integers on the wire. Wrapping them keeps an order id from
//! ever being written where a partner id is expected.

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around `i64` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Conversion methods: `new()`, `as_i64()`
/// - `From<i64>` and `Into<i64>` implementations
///
/// # Example
///
/// ```rust
/// # use odooflow_core::define_id;
/// define_id!(InvoiceId);
/// define_id!(RefundId);
///
/// let invoice = InvoiceId::new(1);
/// let refund = RefundId::new(1);
///
/// // These are different types, so this won't compile:
/// // let _: InvoiceId = refund;
/// # let _ = (invoice, refund);
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Create a new ID from an i64 value.
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Get the underlying i64 value.
            #[must_use]
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

// Local (host commerce system) ids
define_id!(OrderId);
define_id!(CustomerId);
define_id!(ProductId);

/// Id of a record in the ERP.
///
/// Odoo ids are strictly positive; `0` and negative values never identify a
/// record, so they are rejected by [`RemoteId::positive`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
pub struct RemoteId(i64);

impl RemoteId {
    /// Wrap a raw id, returning `None` unless it is positive.
    #[must_use]
    pub const fn positive(id: i64) -> Option<Self> {
        if id > 0 { Some(Self(id)) } else { None }
    }

    /// Get the underlying i64 value.
    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }
}

impl core::fmt::Display for RemoteId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<RemoteId> for i64 {
    fn from(id: RemoteId) -> Self {
        id.0
    }
}
