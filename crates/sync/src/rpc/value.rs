//! Tagged representation of XML-RPC values.
//!
//! Odoo answers the same logical type in several shapes: an empty char field
//! comes back as `false`, an unset many2one as `false` instead of
//! `[id, "name"]`, an empty one2many as `false` or `[]`. The accessors here
//! normalize those shapes so call sites match on one meaning, not on the
//! wire encoding.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use odooflow_core::RemoteId;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::error::SyncError;

/// Members of an XML-RPC `<struct>`.
pub type RemoteStruct = BTreeMap<String, RemoteValue>;

/// An XML-RPC value as decoded from (or encoded to) the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteValue {
    Int(i64),
    Bool(bool),
    Str(String),
    Double(f64),
    DateTime(NaiveDateTime),
    Base64(Vec<u8>),
    Struct(RemoteStruct),
    Array(Vec<RemoteValue>),
    Nil,
    /// A `<fault>` response. Never sent, only received.
    Fault { code: i64, message: String },
}

impl RemoteValue {
    /// Build a struct value from key/value pairs.
    pub fn structure<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Self)>,
        K: Into<String>,
    {
        Self::Struct(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Turn a fault into `SyncError::RemoteFault`, pass anything else through.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::RemoteFault` if `self` is a fault.
    pub fn into_result(self) -> Result<Self, SyncError> {
        match self {
            Self::Fault { code, message } => Err(SyncError::RemoteFault { code, message }),
            other => Ok(other),
        }
    }

    #[must_use]
    pub const fn is_fault(&self) -> bool {
        matches!(self, Self::Fault { .. })
    }

    /// Name of the variant, for error messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Bool(_) => "boolean",
            Self::Str(_) => "string",
            Self::Double(_) => "double",
            Self::DateTime(_) => "dateTime.iso8601",
            Self::Base64(_) => "base64",
            Self::Struct(_) => "struct",
            Self::Array(_) => "array",
            Self::Nil => "nil",
            Self::Fault { .. } => "fault",
        }
    }

    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// String content, with `false` and `nil` read as the empty string.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            Self::Bool(false) | Self::Nil => Some(""),
            _ => None,
        }
    }

    /// Array items, with `false` and `nil` read as an empty list.
    #[must_use]
    pub fn items(&self) -> Option<&[Self]> {
        match self {
            Self::Array(items) => Some(items),
            Self::Bool(false) | Self::Nil => Some(&[]),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_struct(&self) -> Option<&RemoteStruct> {
        match self {
            Self::Struct(members) => Some(members),
            _ => None,
        }
    }

    /// Member of a struct value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Self> {
        self.as_struct().and_then(|members| members.get(key))
    }

    /// Numeric content as a decimal. Accepts int, double and numeric strings.
    #[must_use]
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Int(i) => Some(Decimal::from(*i)),
            Self::Double(f) => Decimal::try_from(*f).ok().map(|d| d.normalize()),
            Self::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Record id of a many2one value.
    ///
    /// Odoo reads many2one fields as `[id, "display name"]`, writes them as a
    /// bare id, and reports an empty one as `false`.
    #[must_use]
    pub fn many2one_id(&self) -> Option<RemoteId> {
        match self {
            Self::Int(id) => RemoteId::positive(*id),
            Self::Array(items) => items.first().and_then(Self::as_i64).and_then(RemoteId::positive),
            _ => None,
        }
    }

    /// Positive record id, as returned by `create`.
    #[must_use]
    pub fn as_remote_id(&self) -> Option<RemoteId> {
        self.as_i64().and_then(RemoteId::positive)
    }
}

impl From<i64> for RemoteValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for RemoteValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<bool> for RemoteValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for RemoteValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

/// Odoo float fields take doubles; precision beyond f64 is dropped.
impl From<Decimal> for RemoteValue {
    fn from(value: Decimal) -> Self {
        Self::Double(value.to_f64().unwrap_or_default())
    }
}

impl From<&str> for RemoteValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for RemoteValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<RemoteId> for RemoteValue {
    fn from(value: RemoteId) -> Self {
        Self::Int(value.as_i64())
    }
}

impl From<NaiveDateTime> for RemoteValue {
    fn from(value: NaiveDateTime) -> Self {
        Self::DateTime(value)
    }
}

impl From<RemoteStruct> for RemoteValue {
    fn from(value: RemoteStruct) -> Self {
        Self::Struct(value)
    }
}

impl<T: Into<Self>> From<Vec<T>> for RemoteValue {
    fn from(value: Vec<T>) -> Self {
        Self::Array(value.into_iter().map(Into::into).collect())
    }
}
