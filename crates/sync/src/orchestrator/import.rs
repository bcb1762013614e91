//! Import of Odoo products and partners into the local store.

use std::collections::HashMap;

use tracing::{instrument, warn};

use odooflow_core::{CustomerId, EntityKind, ProductId, RemoteId, RemoteRef};

use super::{SyncSession, finish, settle};
use crate::error::SyncError;
use crate::mapper::{CustomerFields, ProductFields, customers, products};
use crate::report::{BatchReport, Direction, OutcomeStatus};
use crate::rpc::{Domain, RemoteStruct, RemoteValue, RpcTransport};
use crate::store::EntityStore;

/// Templates listed when no ids are given.
const PRODUCT_LISTING_LIMIT: i64 = 100;

/// Partners listed when no ids are given.
const CUSTOMER_LISTING_LIMIT: i64 = 500;

const IDENTIFICATION_MODEL: &str = "l10n_latam.identification.type";

fn ids_domain(remote_ids: &[RemoteId]) -> Domain {
    Domain::new().filter("id", "in", remote_ids.to_vec())
}

/// Name to report for a record that may not decode.
fn record_name(record: &RemoteStruct, fallback: &str) -> String {
    record
        .get("name")
        .and_then(RemoteValue::text)
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map_or_else(
            || {
                let id = record.get("id").and_then(RemoteValue::as_i64).unwrap_or_default();
                format!("{fallback} #{id}")
            },
            str::to_string,
        )
}

impl<T: RpcTransport, S: EntityStore> SyncSession<'_, T, S> {
    /// Import `product.template` records, matched locally by their stored
    /// remote ref first and by SKU otherwise.
    ///
    /// An empty `remote_ids` imports the first active templates.
    ///
    /// # Errors
    ///
    /// Returns batch-fatal errors and failures to read the records.
    #[instrument(skip(self, remote_ids), fields(count = remote_ids.len()))]
    pub async fn import_products(
        &mut self,
        remote_ids: &[RemoteId],
    ) -> Result<BatchReport, SyncError> {
        let fields = products::read_fields(&self.options.product_fields);
        let records = if remote_ids.is_empty() {
            self.rpc
                .search_read(
                    products::MODEL,
                    Domain::new().equals("active", true),
                    &fields,
                    Some(PRODUCT_LISTING_LIMIT),
                )
                .await?
        } else {
            self.rpc
                .search_read(products::MODEL, ids_domain(remote_ids), &fields, None)
                .await?
        };

        let mut outcomes = Vec::with_capacity(records.len());
        for record in &records {
            let name = record_name(record, "Product");
            let result = match products::from_remote(record) {
                Ok(fields) => self.import_product(&fields).await,
                Err(e) => Err(e),
            };
            outcomes.push(settle(name, result)?);
        }
        Ok(finish(EntityKind::Product, Direction::Import, &outcomes))
    }

    async fn import_product(
        &self,
        fields: &ProductFields,
    ) -> Result<(OutcomeStatus, RemoteId), SyncError> {
        let remote_id = fields
            .remote_id
            .ok_or_else(|| SyncError::Validation(format!("product {:?} has no id", fields.name)))?;

        let existing = match self.store.local_id(EntityKind::Product, remote_id).await? {
            Some(id) => Some(ProductId::new(id)),
            None => self.store.find_product_by_sku(&fields.sku).await?,
        };
        let local_id = self.store.apply_product(existing, fields).await?;
        self.remember(RemoteRef::new(EntityKind::Product, local_id.as_i64(), remote_id))
            .await;

        let status = if existing.is_some() {
            OutcomeStatus::Updated
        } else {
            OutcomeStatus::Created
        };
        Ok((status, remote_id))
    }

    /// Import `res.partner` customers, matched locally by their stored
    /// remote ref first and by email otherwise.
    ///
    /// An empty `remote_ids` imports every partner with a customer rank.
    /// The document type is stored as its DIAN code.
    ///
    /// # Errors
    ///
    /// Returns batch-fatal errors and failures to read the records.
    #[instrument(skip(self, remote_ids), fields(count = remote_ids.len()))]
    pub async fn import_customers(
        &mut self,
        remote_ids: &[RemoteId],
    ) -> Result<BatchReport, SyncError> {
        let records = if remote_ids.is_empty() {
            self.rpc
                .search_read(
                    customers::MODEL,
                    Domain::new().filter("customer_rank", ">", 0_i64),
                    customers::IMPORT_FIELDS,
                    Some(CUSTOMER_LISTING_LIMIT),
                )
                .await?
        } else {
            self.rpc
                .search_read(
                    customers::MODEL,
                    ids_domain(remote_ids),
                    customers::IMPORT_FIELDS,
                    None,
                )
                .await?
        };

        let decoded: Vec<(String, Result<CustomerFields, SyncError>)> = records
            .iter()
            .map(|record| (record_name(record, "Customer"), customers::from_remote(record)))
            .collect();
        let codes = self.identification_codes(&decoded).await?;

        let mut outcomes = Vec::with_capacity(decoded.len());
        for (name, fields) in decoded {
            let result = match fields {
                Ok(fields) => self.import_customer(&fields, &codes).await,
                Err(e) => Err(e),
            };
            outcomes.push(settle(name, result)?);
        }
        Ok(finish(EntityKind::Customer, Direction::Import, &outcomes))
    }

    async fn import_customer(
        &self,
        fields: &CustomerFields,
        codes: &HashMap<RemoteId, String>,
    ) -> Result<(OutcomeStatus, RemoteId), SyncError> {
        let remote_id = fields.remote_id.ok_or_else(|| {
            SyncError::Validation(format!("partner {} has no id", fields.email))
        })?;

        let existing = match self.store.local_id(EntityKind::Customer, remote_id).await? {
            Some(id) => Some(CustomerId::new(id)),
            None => self.store.find_customer_by_email(&fields.email).await?,
        };
        let local_id = self.store.apply_customer(existing, fields).await?;

        let code = fields
            .identification_type_id
            .and_then(|id| codes.get(&id))
            .map_or(self.options.default_identification_code.as_str(), String::as_str);
        self.store.set_tax_meta(local_id, &fields.vat, code).await?;

        self.remember(RemoteRef::new(EntityKind::Customer, local_id.as_i64(), remote_id))
            .await;

        let status = if existing.is_some() {
            OutcomeStatus::Updated
        } else {
            OutcomeStatus::Created
        };
        Ok((status, remote_id))
    }

    /// DIAN code of every identification type referenced by `decoded`.
    ///
    /// A failed read is logged and leaves the map empty, so customers fall
    /// back to the default code.
    async fn identification_codes(
        &self,
        decoded: &[(String, Result<CustomerFields, SyncError>)],
    ) -> Result<HashMap<RemoteId, String>, SyncError> {
        let mut ids: Vec<RemoteId> = decoded
            .iter()
            .filter_map(|(_, fields)| fields.as_ref().ok()?.identification_type_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        match self
            .rpc
            .read(IDENTIFICATION_MODEL, &ids, &["id", "l10n_co_document_code"])
            .await
        {
            Ok(records) => Ok(records
                .iter()
                .filter_map(|record| {
                    let id = record.get("id")?.as_remote_id()?;
                    let code = record.get("l10n_co_document_code")?.text()?.trim();
                    (!code.is_empty()).then(|| (id, code.to_string()))
                })
                .collect()),
            Err(e) if e.is_batch_fatal() => Err(e),
            Err(e) => {
                warn!(error = %e, "Failed to read identification types");
                Ok(HashMap::new())
            }
        }
    }
}
