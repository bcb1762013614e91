//! `Contact` <-> `res.partner`.
//!
//! Partners are matched by email. Export enriches the payload with the
//! country, state and identification type resolved through the session's
//! [`ReferenceCache`]; an unresolved reference simply leaves its field out.

use serde::Serialize;

use odooflow_core::{Contact, Email, RemoteId};

use super::identification::normalize_vat;
use super::{FieldSelection, RemotePayload};
use crate::cache::{LookupKind, ReferenceCache};
use crate::error::SyncError;
use crate::rpc::{RemoteStruct, RemoteValue, RpcSession, RpcTransport};

/// Odoo model customers are exported to and imported from.
pub const MODEL: &str = "res.partner";

/// Always sent.
pub const REQUIRED_FIELDS: &[&str] = &["name", "email"];

/// Fields an operator may add to a customer sync.
pub const SELECTABLE_FIELDS: &[&str] = &[
    "phone",
    "street",
    "street2",
    "city",
    "zip",
    "vat",
    "country_id",
    "state_id",
    "l10n_latam_identification_type_id",
];

/// Fields read when importing partners.
pub const IMPORT_FIELDS: &[&str] = &[
    "id",
    "name",
    "email",
    "phone",
    "mobile",
    "street",
    "street2",
    "city",
    "zip",
    "country_id",
    "state_id",
    "vat",
    "company_name",
    "l10n_latam_identification_type_id",
];

/// Partner values read from Odoo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerFields {
    pub remote_id: Option<RemoteId>,
    pub name: String,
    pub email: Email,
    pub phone: String,
    pub street: String,
    pub street2: String,
    pub city: String,
    pub zip: String,
    pub company_name: String,
    pub vat: String,
    pub country_id: Option<RemoteId>,
    pub state_id: Option<RemoteId>,
    pub identification_type_id: Option<RemoteId>,
}

/// Validated partner email of a contact.
///
/// # Errors
///
/// Returns `SyncError::Validation` if the email is missing or malformed.
pub fn contact_email(contact: &Contact) -> Result<Email, SyncError> {
    Email::parse(&contact.email)
        .map_err(|e| SyncError::Validation(format!("customer email: {e}")))
}

/// Build the `create`/`write` values for a partner.
///
/// # Errors
///
/// Returns `SyncError::Validation` if the contact has no name or no valid
/// email. Reference lookups never fail the mapping.
pub async fn to_remote<T: RpcTransport>(
    contact: &Contact,
    selection: &FieldSelection,
    cache: &mut ReferenceCache,
    rpc: &RpcSession<'_, T>,
) -> Result<RemotePayload, SyncError> {
    let name = contact.name.trim();
    if name.is_empty() {
        return Err(SyncError::Validation("customer name is required".to_string()));
    }
    let email = contact_email(contact)?;
    let address = &contact.billing_address;

    let mut payload = RemotePayload::new();
    payload.insert("name".into(), name.into());
    payload.insert("email".into(), email.as_str().into());
    payload.insert("customer_rank".into(), RemoteValue::Int(1));
    payload.insert("type".into(), "contact".into());

    let texts = [
        ("phone", contact.phone.as_str()),
        ("street", address.street.as_str()),
        ("street2", address.street2.as_str()),
        ("city", address.city.as_str()),
        ("zip", address.postal.as_str()),
    ];
    for (field, value) in texts {
        if selection.contains(field) {
            payload.insert(field.into(), value.into());
        }
    }

    if selection.contains("vat") {
        let vat = normalize_vat(&contact.tax_id);
        if !vat.is_empty() {
            payload.insert("vat".into(), vat.into());
        }
    }

    if selection.contains("country_id")
        && let Some(id) = cache
            .resolve(rpc, LookupKind::Country, &address.country, None)
            .await
    {
        payload.insert("country_id".into(), id.into());
    }

    if selection.contains("state_id")
        && let Some(id) = cache
            .resolve(rpc, LookupKind::State, &address.state, Some(&address.country))
            .await
    {
        payload.insert("state_id".into(), id.into());
    }

    if selection.contains("l10n_latam_identification_type_id")
        && let Some(id) = cache
            .resolve(rpc, LookupKind::IdentificationType, &contact.tax_id_type, None)
            .await
    {
        payload.insert("l10n_latam_identification_type_id".into(), id.into());
    }

    Ok(payload)
}

/// Decode a `res.partner` record. Phone falls back to mobile.
///
/// # Errors
///
/// Returns `SyncError::Validation` if the record has no usable email.
pub fn from_remote(record: &RemoteStruct) -> Result<CustomerFields, SyncError> {
    let text = |field: &str| {
        record
            .get(field)
            .and_then(RemoteValue::text)
            .unwrap_or_default()
            .trim()
            .to_string()
    };
    let many2one = |field: &str| record.get(field).and_then(RemoteValue::many2one_id);

    let name = text("name");
    let email = Email::parse(&text("email")).map_err(|e| {
        SyncError::Validation(format!("partner {name:?} has no usable email: {e}"))
    })?;
    let phone = Some(text("phone"))
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| text("mobile"));

    Ok(CustomerFields {
        remote_id: record.get("id").and_then(RemoteValue::as_remote_id),
        name,
        email,
        phone,
        street: text("street"),
        street2: text("street2"),
        city: text("city"),
        zip: text("zip"),
        company_name: text("company_name"),
        vat: text("vat"),
        country_id: many2one("country_id"),
        state_id: many2one("state_id"),
        identification_type_id: many2one("l10n_latam_identification_type_id"),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedTransport, test_credentials};
    use odooflow_core::Address;

    fn ana() -> Contact {
        Contact {
            name: "Ana Gómez".to_string(),
            email: "Ana@Example.com".to_string(),
            phone: "+57 300 123 4567".to_string(),
            billing_address: Address {
                street: "Cra 43A # 1-50".to_string(),
                street2: "Of. 301".to_string(),
                city: "Medellín".to_string(),
                state: "Antioquia".to_string(),
                country: "co".to_string(),
                postal: "050021".to_string(),
            },
            tax_id: "900.123.456-7".to_string(),
            tax_id_type: "NIT".to_string(),
        }
    }

    fn scripted() -> ScriptedTransport {
        let transport = ScriptedTransport::new();
        transport.on("res.country", "search", |_| Ok(vec![RemoteValue::Int(49)].into()));
        transport.on("res.country.state", "search", |_| Ok(vec![RemoteValue::Int(640)].into()));
        transport.on("l10n_latam.identification.type", "search", |_| {
            Ok(vec![RemoteValue::Int(6)].into())
        });
        transport
    }

    #[tokio::test]
    async fn test_to_remote_enriches_references() {
        let transport = scripted();
        let rpc = RpcSession::authenticate(&transport, &test_credentials()).await.unwrap();
        let mut cache = ReferenceCache::default();

        let payload = to_remote(
            &ana(),
            &FieldSelection::all(SELECTABLE_FIELDS),
            &mut cache,
            &rpc,
        )
        .await
        .unwrap();

        assert_eq!(payload["email"], RemoteValue::from("ana@example.com"));
        assert_eq!(payload["customer_rank"], RemoteValue::Int(1));
        assert_eq!(payload["type"], RemoteValue::from("contact"));
        assert_eq!(payload["vat"], RemoteValue::from("9001234567"));
        assert_eq!(payload["country_id"], RemoteValue::Int(49));
        assert_eq!(payload["state_id"], RemoteValue::Int(640));
        assert_eq!(payload["l10n_latam_identification_type_id"], RemoteValue::Int(6));
        assert_eq!(cache.lookups(), 3);
    }

    #[tokio::test]
    async fn test_unresolved_reference_is_omitted() {
        let transport = ScriptedTransport::new();
        let rpc = RpcSession::authenticate(&transport, &test_credentials()).await.unwrap();
        let mut cache = ReferenceCache::default();

        let payload = to_remote(
            &ana(),
            &FieldSelection::all(SELECTABLE_FIELDS),
            &mut cache,
            &rpc,
        )
        .await
        .unwrap();
        assert!(!payload.contains_key("country_id"));
        assert!(!payload.contains_key("state_id"));
        assert!(payload.contains_key("street"));
    }

    #[tokio::test]
    async fn test_unselected_fields_skip_lookups() {
        let transport = scripted();
        let rpc = RpcSession::authenticate(&transport, &test_credentials()).await.unwrap();
        let mut cache = ReferenceCache::default();

        let selection: FieldSelection = ["phone"].into_iter().collect();
        let payload = to_remote(&ana(), &selection, &mut cache, &rpc).await.unwrap();
        assert_eq!(payload.len(), 5);
        assert_eq!(cache.lookups(), 0);
    }

    #[tokio::test]
    async fn test_missing_email_is_validation_error() {
        let transport = ScriptedTransport::new();
        let rpc = RpcSession::authenticate(&transport, &test_credentials()).await.unwrap();
        let mut cache = ReferenceCache::default();

        let contact = Contact {
            email: String::new(),
            ..ana()
        };
        let err = to_remote(&contact, &FieldSelection::default(), &mut cache, &rpc)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
    }

    #[tokio::test]
    async fn test_round_trip() {
        let transport = scripted();
        let rpc = RpcSession::authenticate(&transport, &test_credentials()).await.unwrap();
        let mut cache = ReferenceCache::default();

        let contact = ana();
        let mut record = to_remote(
            &contact,
            &FieldSelection::all(SELECTABLE_FIELDS),
            &mut cache,
            &rpc,
        )
        .await
        .unwrap();
        record.insert("id".into(), RemoteValue::Int(12));

        let fields = from_remote(&record).unwrap();
        assert_eq!(fields.remote_id, RemoteId::positive(12));
        assert_eq!(fields.name, contact.name);
        assert_eq!(fields.email.as_str(), "ana@example.com");
        assert_eq!(fields.phone, contact.phone);
        assert_eq!(fields.street, contact.billing_address.street);
        assert_eq!(fields.street2, contact.billing_address.street2);
        assert_eq!(fields.city, contact.billing_address.city);
        assert_eq!(fields.zip, contact.billing_address.postal);
        assert_eq!(fields.vat, "9001234567");
        assert_eq!(fields.country_id, RemoteId::positive(49));
        assert_eq!(fields.state_id, RemoteId::positive(640));
        assert_eq!(fields.identification_type_id, RemoteId::positive(6));
    }

    #[test]
    fn test_from_remote_normalizes_wire_shapes() {
        let record: RemoteStruct = [
            ("id".to_string(), RemoteValue::Int(7)),
            ("name".to_string(), RemoteValue::from("Luis Pérez")),
            ("email".to_string(), RemoteValue::from("luis@example.com")),
            ("phone".to_string(), RemoteValue::Bool(false)),
            ("mobile".to_string(), RemoteValue::from("+57 311 000 0000")),
            ("street".to_string(), RemoteValue::Bool(false)),
            (
                "country_id".to_string(),
                RemoteValue::Array(vec![RemoteValue::Int(49), "Colombia".into()]),
            ),
            ("state_id".to_string(), RemoteValue::Bool(false)),
        ]
        .into_iter()
        .collect();

        let fields = from_remote(&record).unwrap();
        assert_eq!(fields.phone, "+57 311 000 0000");
        assert_eq!(fields.street, "");
        assert_eq!(fields.country_id, RemoteId::positive(49));
        assert_eq!(fields.state_id, None);
    }

    #[test]
    fn test_from_remote_requires_email() {
        let record: RemoteStruct = [
            ("name".to_string(), RemoteValue::from("No Mail")),
            ("email".to_string(), RemoteValue::Bool(false)),
        ]
        .into_iter()
        .collect();
        assert!(matches!(from_remote(&record), Err(SyncError::Validation(_))));
    }
}
