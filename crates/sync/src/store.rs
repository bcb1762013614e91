//! Host persistence seam.
//!
//! The commerce system owns orders, customers and products. The sync core
//! reads them through [`EntityStore`] and writes back only remote ids,
//! order notes, tax-id metadata and the fields of imported records.
//!
//! [`MemoryStore`] keeps everything in memory and round-trips a
//! serializable [`Snapshot`]; the CLI uses it with a YAML or JSON file.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use odooflow_core::{
    Contact, CustomerId, Email, EntityKind, LocalCustomer, LocalOrder, LocalProduct, OrderId,
    ProductId, RemoteId, RemoteRef,
};

use crate::mapper::{CustomerFields, ProductFields};

/// Errors raised by an [`EntityStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: i64 },

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Read access to local commerce entities plus the few writes a sync makes.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn order(&self, id: OrderId) -> Result<LocalOrder, StoreError>;

    async fn customer(&self, id: CustomerId) -> Result<LocalCustomer, StoreError>;

    async fn product(&self, id: ProductId) -> Result<LocalProduct, StoreError>;

    /// Ids of every local entity of `kind`, ascending.
    async fn ids(&self, kind: EntityKind) -> Result<Vec<i64>, StoreError>;

    /// Remote id stored on a local entity, if it was synced before.
    async fn remote_id(&self, kind: EntityKind, local_id: i64)
    -> Result<Option<RemoteId>, StoreError>;

    /// Local entity of `kind` linked to `remote_id`, if it still exists.
    async fn local_id(&self, kind: EntityKind, remote_id: RemoteId)
    -> Result<Option<i64>, StoreError>;

    /// Store (or replace) the remote id of a local entity.
    async fn set_remote_ref(&self, reference: RemoteRef) -> Result<(), StoreError>;

    /// Store the tax id and document-type code of a customer.
    async fn set_tax_meta(
        &self,
        customer: CustomerId,
        tax_id: &str,
        tax_id_type: &str,
    ) -> Result<(), StoreError>;

    /// Append a private note to an order.
    async fn add_order_note(&self, order: OrderId, note: &str) -> Result<(), StoreError>;

    async fn find_product_by_sku(&self, sku: &str) -> Result<Option<ProductId>, StoreError>;

    async fn find_customer_by_email(&self, email: &Email) -> Result<Option<CustomerId>, StoreError>;

    /// Write imported product fields, creating the product when `existing`
    /// is `None`. Returns the local id.
    async fn apply_product(
        &self,
        existing: Option<ProductId>,
        fields: &ProductFields,
    ) -> Result<ProductId, StoreError>;

    /// Write imported partner fields, creating the customer when `existing`
    /// is `None`. Returns the local id.
    async fn apply_customer(
        &self,
        existing: Option<CustomerId>,
        fields: &CustomerFields,
    ) -> Result<CustomerId, StoreError>;
}

// =============================================================================
// Snapshot
// =============================================================================

/// A private note attached to an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderNote {
    pub order_id: OrderId,
    pub note: String,
}

/// Serializable content of a [`MemoryStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub orders: Vec<LocalOrder>,
    pub customers: Vec<LocalCustomer>,
    pub products: Vec<LocalProduct>,
    pub remote_refs: Vec<RemoteRef>,
    pub notes: Vec<OrderNote>,
}

// =============================================================================
// MemoryStore
// =============================================================================

#[derive(Debug, Default)]
struct State {
    orders: BTreeMap<OrderId, LocalOrder>,
    customers: BTreeMap<CustomerId, LocalCustomer>,
    products: BTreeMap<ProductId, LocalProduct>,
    refs: BTreeMap<(EntityKind, i64), RemoteId>,
    notes: Vec<OrderNote>,
    reject_ref_writes: bool,
}

/// In-memory [`EntityStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let state = State {
            orders: snapshot.orders.into_iter().map(|o| (o.id, o)).collect(),
            customers: snapshot.customers.into_iter().map(|c| (c.id, c)).collect(),
            products: snapshot.products.into_iter().map(|p| (p.id, p)).collect(),
            refs: snapshot
                .remote_refs
                .into_iter()
                .map(|r| ((r.entity_kind, r.local_id), r.remote_id))
                .collect(),
            notes: snapshot.notes,
            reject_ref_writes: false,
        };
        Self {
            state: RwLock::new(state),
        }
    }

    pub async fn snapshot(&self) -> Snapshot {
        let state = self.state.read().await;
        Snapshot {
            orders: state.orders.values().cloned().collect(),
            customers: state.customers.values().cloned().collect(),
            products: state.products.values().cloned().collect(),
            remote_refs: state
                .refs
                .iter()
                .map(|(&(kind, local_id), &remote_id)| RemoteRef::new(kind, local_id, remote_id))
                .collect(),
            notes: state.notes.clone(),
        }
    }

    pub async fn insert_order(&self, order: LocalOrder) {
        self.state.write().await.orders.insert(order.id, order);
    }

    pub async fn insert_customer(&self, customer: LocalCustomer) {
        self.state.write().await.customers.insert(customer.id, customer);
    }

    pub async fn insert_product(&self, product: LocalProduct) {
        self.state.write().await.products.insert(product.id, product);
    }

    /// Notes added to one order, oldest first.
    pub async fn notes_for(&self, order: OrderId) -> Vec<String> {
        self.state
            .read()
            .await
            .notes
            .iter()
            .filter(|n| n.order_id == order)
            .map(|n| n.note.clone())
            .collect()
    }

    /// Make every `set_remote_ref` fail.
    #[cfg(any(test, feature = "test-util"))]
    pub async fn reject_ref_writes(&self, reject: bool) {
        self.state.write().await.reject_ref_writes = reject;
    }
}

fn next_id<K: Copy + Into<i64>, V>(map: &BTreeMap<K, V>) -> i64 {
    map.keys().next_back().map_or(1, |&k| k.into() + 1)
}

fn apply_contact(contact: &mut Contact, fields: &CustomerFields) {
    contact.name = if fields.name.is_empty() {
        fields.email.local_part().to_string()
    } else {
        fields.name.clone()
    };
    contact.email = fields.email.as_str().to_string();
    contact.phone.clone_from(&fields.phone);
    contact.tax_id.clone_from(&fields.vat);

    let address = &mut contact.billing_address;
    address.street.clone_from(&fields.street);
    address.street2.clone_from(&fields.street2);
    address.city.clone_from(&fields.city);
    address.postal.clone_from(&fields.zip);
}

fn apply_product_fields(product: &mut LocalProduct, fields: &ProductFields) {
    product.name.clone_from(&fields.name);
    if !fields.sku.is_empty() {
        product.sku.clone_from(&fields.sku);
    }
    if fields.price.is_some() {
        product.price = fields.price;
    }
    if fields.stock_qty.is_some() {
        product.stock_qty = fields.stock_qty;
    }
    if fields.weight.is_some() {
        product.weight = fields.weight;
    }
    if fields.description.is_some() {
        product.description.clone_from(&fields.description);
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn order(&self, id: OrderId) -> Result<LocalOrder, StoreError> {
        self.state
            .read()
            .await
            .orders
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound {
                kind: EntityKind::Order,
                id: id.as_i64(),
            })
    }

    async fn customer(&self, id: CustomerId) -> Result<LocalCustomer, StoreError> {
        self.state
            .read()
            .await
            .customers
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound {
                kind: EntityKind::Customer,
                id: id.as_i64(),
            })
    }

    async fn product(&self, id: ProductId) -> Result<LocalProduct, StoreError> {
        self.state
            .read()
            .await
            .products
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound {
                kind: EntityKind::Product,
                id: id.as_i64(),
            })
    }

    async fn ids(&self, kind: EntityKind) -> Result<Vec<i64>, StoreError> {
        let state = self.state.read().await;
        Ok(match kind {
            EntityKind::Order => state.orders.keys().map(OrderId::as_i64).collect(),
            EntityKind::Customer => state.customers.keys().map(CustomerId::as_i64).collect(),
            EntityKind::Product => state.products.keys().map(ProductId::as_i64).collect(),
        })
    }

    async fn remote_id(
        &self,
        kind: EntityKind,
        local_id: i64,
    ) -> Result<Option<RemoteId>, StoreError> {
        Ok(self.state.read().await.refs.get(&(kind, local_id)).copied())
    }

    async fn local_id(
        &self,
        kind: EntityKind,
        remote_id: RemoteId,
    ) -> Result<Option<i64>, StoreError> {
        let state = self.state.read().await;
        let exists = |id: i64| match kind {
            EntityKind::Order => state.orders.contains_key(&OrderId::new(id)),
            EntityKind::Customer => state.customers.contains_key(&CustomerId::new(id)),
            EntityKind::Product => state.products.contains_key(&ProductId::new(id)),
        };
        Ok(state
            .refs
            .iter()
            .find(|&(&(k, id), &linked)| k == kind && linked == remote_id && exists(id))
            .map(|(&(_, id), _)| id))
    }

    async fn set_remote_ref(&self, reference: RemoteRef) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.reject_ref_writes {
            return Err(StoreError::Backend("metadata table is read-only".to_string()));
        }
        state.refs.insert(
            (reference.entity_kind, reference.local_id),
            reference.remote_id,
        );
        Ok(())
    }

    async fn set_tax_meta(
        &self,
        customer: CustomerId,
        tax_id: &str,
        tax_id_type: &str,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let record = state
            .customers
            .get_mut(&customer)
            .ok_or(StoreError::NotFound {
                kind: EntityKind::Customer,
                id: customer.as_i64(),
            })?;
        record.contact.tax_id = tax_id.to_string();
        record.contact.tax_id_type = tax_id_type.to_string();
        Ok(())
    }

    async fn add_order_note(&self, order: OrderId, note: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if !state.orders.contains_key(&order) {
            return Err(StoreError::NotFound {
                kind: EntityKind::Order,
                id: order.as_i64(),
            });
        }
        state.notes.push(OrderNote {
            order_id: order,
            note: note.to_string(),
        });
        Ok(())
    }

    async fn find_product_by_sku(&self, sku: &str) -> Result<Option<ProductId>, StoreError> {
        let sku = sku.trim();
        if sku.is_empty() {
            return Ok(None);
        }
        Ok(self
            .state
            .read()
            .await
            .products
            .values()
            .find(|p| p.sku == sku)
            .map(|p| p.id))
    }

    async fn find_customer_by_email(&self, email: &Email) -> Result<Option<CustomerId>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .customers
            .values()
            .find(|c| {
                Email::parse(&c.contact.email).is_ok_and(|stored| &stored == email)
            })
            .map(|c| c.id))
    }

    async fn apply_product(
        &self,
        existing: Option<ProductId>,
        fields: &ProductFields,
    ) -> Result<ProductId, StoreError> {
        let mut state = self.state.write().await;
        if let Some(id) = existing {
            let product = state.products.get_mut(&id).ok_or(StoreError::NotFound {
                kind: EntityKind::Product,
                id: id.as_i64(),
            })?;
            apply_product_fields(product, fields);
            return Ok(id);
        }

        let id = ProductId::new(next_id(&state.products));
        let mut product = LocalProduct {
            id,
            sku: String::new(),
            name: String::new(),
            price: None,
            stock_qty: None,
            weight: None,
            description: None,
        };
        apply_product_fields(&mut product, fields);
        state.products.insert(id, product);
        Ok(id)
    }

    async fn apply_customer(
        &self,
        existing: Option<CustomerId>,
        fields: &CustomerFields,
    ) -> Result<CustomerId, StoreError> {
        let mut state = self.state.write().await;
        if let Some(id) = existing {
            let customer = state.customers.get_mut(&id).ok_or(StoreError::NotFound {
                kind: EntityKind::Customer,
                id: id.as_i64(),
            })?;
            apply_contact(&mut customer.contact, fields);
            return Ok(id);
        }

        let id = CustomerId::new(next_id(&state.customers));
        let mut contact = Contact::default();
        apply_contact(&mut contact, fields);
        state.customers.insert(id, LocalCustomer { id, contact });
        Ok(id)
    }
}
