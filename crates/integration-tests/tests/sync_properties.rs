//! Orchestrator behavior through the scripted transport.
//!
//! These tests cover the create/update decision, failure isolation inside
//! a batch, reference caching and the mapping round trip.

#![allow(clippy::unwrap_used)]

use odooflow_core::{CustomerId, EntityKind, OrderId, OrderStatus, ProductId, RemoteId};
use odooflow_integration_tests::{customer, mug, order};
use odooflow_sync::mapper::{FieldSelection, customers, products};
use odooflow_sync::testing::{ScriptedTransport, test_config, test_credentials};
use odooflow_sync::{
    EntityStore, ErrorKind, LookupKind, MemoryStore, OdooConfig, OutcomeStatus, ReferenceCache,
    RemoteValue, RpcSession, SyncError, SyncService,
};

async fn service_with_order(status: OrderStatus) -> SyncService<ScriptedTransport, MemoryStore> {
    let store = MemoryStore::new();
    store.insert_product(mug(10)).await;
    store.insert_order(order(1001, status, 10)).await;
    SyncService::new(ScriptedTransport::new(), store, test_config())
}

// =============================================================================
// Create / Update
// =============================================================================

#[tokio::test]
async fn test_second_sync_updates_the_stored_record() {
    let service = service_with_order(OrderStatus::Completed).await;
    let ids = [OrderId::new(1001)];

    let first = service.sync_orders(&ids).await.unwrap();
    assert_eq!(first.new, 1);
    let transport = service.transport();
    assert_eq!(transport.count("sale.order", "create"), 1);

    let stored = service
        .store()
        .remote_id(EntityKind::Order, 1001)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.processed[0].remote_id, Some(stored));

    transport.clear_calls();
    let second = service.sync_orders(&ids).await.unwrap();
    assert_eq!(second.updated, 1);
    assert_eq!(transport.count("sale.order", "create"), 0);
    assert_eq!(transport.count("sale.order", "search"), 0);

    let writes = transport.calls_to("sale.order", "write");
    assert_eq!(writes.len(), 1);
    assert_eq!(
        writes[0].args().unwrap()[0],
        RemoteValue::Array(vec![RemoteValue::Int(stored.as_i64())])
    );
}

#[tokio::test]
async fn test_processing_order_is_searched_then_created_as_sale() {
    let service = service_with_order(OrderStatus::Processing).await;
    let mut session = service.connect().await.unwrap();
    let outcome = session.sync_order(OrderId::new(1001)).await.unwrap();
    drop(session);

    let transport = service.transport();
    let creates = transport.calls_to("sale.order", "create");
    assert_eq!(transport.count("sale.order", "search"), 1);
    assert_eq!(creates.len(), 1);
    assert_eq!(creates[0].values().unwrap()["state"], RemoteValue::from("sale"));

    let calls = transport.calls();
    let search_at = calls.iter().position(|c| c.is("sale.order", "search")).unwrap();
    let create_at = calls.iter().position(|c| c.is("sale.order", "create")).unwrap();
    assert!(search_at < create_at);

    assert_eq!(outcome.status, OutcomeStatus::Created);
    let remote_id = outcome.remote_id.unwrap();
    assert_eq!(
        service.store().remote_id(EntityKind::Order, 1001).await.unwrap(),
        Some(remote_id)
    );
    assert_eq!(
        service.store().notes_for(OrderId::new(1001)).await,
        vec![format!("Order successfully synced to Odoo (ID: {remote_id})")]
    );
}

#[tokio::test]
async fn test_unknown_status_is_sent_as_draft() {
    let service = service_with_order(OrderStatus::from("wc-awaiting-pickup")).await;
    let report = service.sync_orders(&[OrderId::new(1001)]).await.unwrap();
    assert_eq!(report.new, 1);

    let creates = service.transport().calls_to("sale.order", "create");
    assert_eq!(creates[0].values().unwrap()["state"], RemoteValue::from("draft"));
}

// =============================================================================
// Batch Isolation
// =============================================================================

#[tokio::test]
async fn test_remote_fault_does_not_stop_the_batch() {
    let store = MemoryStore::new();
    for (id, sku, name) in [(1, "A-1", "Apron"), (2, "B-1", "Broken"), (3, "C-1", "Candle")] {
        let mut product = mug(id);
        product.sku = sku.to_string();
        product.name = name.to_string();
        store.insert_product(product).await;
    }
    let service = SyncService::new(ScriptedTransport::new(), store, test_config());
    service.transport().on("product.template", "create", |call| {
        let name = call.values().and_then(|v| v.get("name")).and_then(RemoteValue::text);
        Ok(if name == Some("Broken") {
            RemoteValue::Fault {
                code: 2,
                message: "The product type is invalid".to_string(),
            }
        } else {
            RemoteValue::Int(500)
        })
    });

    let ids: Vec<ProductId> = [1, 2, 3].into_iter().map(ProductId::new).collect();
    let report = service.sync_products(&ids).await.unwrap();

    assert_eq!(report.new, 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].name, "Broken");
    assert_eq!(report.failed[0].kind, ErrorKind::RemoteFault);
    assert!(report.failed[0].error.contains("The product type is invalid"));
    assert_eq!(service.transport().count("product.template", "create"), 3);
    assert_eq!(report.message, "Export completed. Created: 2, Updated: 0, Failed: 1");

    assert_eq!(
        service.store().remote_id(EntityKind::Product, 2).await.unwrap(),
        None
    );
}

#[tokio::test]
async fn test_missing_database_fails_before_any_call() {
    let config = OdooConfig {
        database: None,
        ..test_config()
    };
    let store = MemoryStore::new();
    store.insert_order(order(1001, OrderStatus::Processing, 10)).await;
    let service = SyncService::new(ScriptedTransport::new(), store, config);

    let err = service.sync_orders(&[OrderId::new(1001)]).await.unwrap_err();
    assert!(matches!(err, SyncError::ConfigIncomplete(ref m) if m.contains("database")));
    assert!(service.transport().calls().is_empty());
}

#[tokio::test]
async fn test_rejected_credentials_abort_the_batch() {
    let store = MemoryStore::new();
    store.insert_product(mug(10)).await;
    let transport = ScriptedTransport::new().with_uid(RemoteValue::Bool(false));
    let service = SyncService::new(transport, store, test_config());

    let err = service.sync_products(&[ProductId::new(10)]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Auth);
    assert_eq!(service.transport().calls().len(), 1);
}

// =============================================================================
// Reference Cache
// =============================================================================

#[tokio::test]
async fn test_repeated_natural_key_is_looked_up_once() {
    let transport = ScriptedTransport::new();
    transport.on("res.country", "search", |_| Ok(vec![RemoteValue::Int(49)].into()));
    let rpc = RpcSession::authenticate(&transport, &test_credentials())
        .await
        .unwrap();
    let mut cache = ReferenceCache::new("13");

    for key in ["CO", "co", " CO "] {
        let id = cache.resolve(&rpc, LookupKind::Country, key, None).await;
        assert_eq!(id, RemoteId::positive(49));
    }
    assert_eq!(transport.count("res.country", "search"), 1);
    assert_eq!(cache.lookups(), 1);
}

#[tokio::test]
async fn test_orders_sharing_a_product_create_one_variant() {
    let store = MemoryStore::new();
    store.insert_product(mug(10)).await;
    store.insert_order(order(1001, OrderStatus::Processing, 10)).await;
    store.insert_order(order(1002, OrderStatus::Processing, 10)).await;
    let service = SyncService::new(ScriptedTransport::new(), store, test_config());

    let report = service
        .sync_orders(&[OrderId::new(1001), OrderId::new(1002)])
        .await
        .unwrap();
    assert_eq!(report.new, 2);

    let transport = service.transport();
    assert_eq!(transport.count("product.product", "search"), 1);
    assert_eq!(transport.count("product.product", "create"), 1);
}

#[tokio::test]
async fn test_customers_in_one_country_share_the_lookup() {
    let store = MemoryStore::new();
    store.insert_customer(customer(3, "ana@example.com")).await;
    store.insert_customer(customer(4, "luis@example.com")).await;
    let service = SyncService::new(ScriptedTransport::new(), store, test_config());
    service
        .transport()
        .on("res.country", "search", |_| Ok(vec![RemoteValue::Int(49)].into()));

    let report = service
        .sync_customers(&[CustomerId::new(3), CustomerId::new(4)])
        .await
        .unwrap();
    assert_eq!(report.new, 2);
    assert_eq!(service.transport().count("res.country", "search"), 1);
    assert_eq!(service.transport().count("res.country.state", "search"), 1);
}

// =============================================================================
// Mapping Round Trip
// =============================================================================

#[test]
fn test_product_round_trip() {
    let product = mug(10);
    let selection = FieldSelection::all(products::SELECTABLE_FIELDS);
    let payload = products::to_remote(&product, &selection);

    let fields = products::from_remote(&payload).unwrap();
    assert_eq!(fields.name, product.name);
    assert_eq!(fields.sku, product.sku);
    assert_eq!(fields.price, product.price);
    assert_eq!(fields.stock_qty, product.stock_qty);
    assert_eq!(fields.weight, product.weight);
    assert_eq!(fields.description, product.description);
}

#[tokio::test]
async fn test_customer_round_trip() {
    let transport = ScriptedTransport::new();
    transport.on("res.country", "search", |_| Ok(vec![RemoteValue::Int(49)].into()));
    let rpc = RpcSession::authenticate(&transport, &test_credentials())
        .await
        .unwrap();
    let mut cache = ReferenceCache::new("13");

    let local = customer(3, "Ana@Example.com");
    let selection = FieldSelection::all(&["phone", "street", "city", "zip", "country_id"]);
    let payload = customers::to_remote(&local.contact, &selection, &mut cache, &rpc)
        .await
        .unwrap();

    let fields = customers::from_remote(&payload).unwrap();
    let contact = &local.contact;
    assert_eq!(fields.name, contact.name);
    assert_eq!(fields.email.as_str(), "ana@example.com");
    assert_eq!(fields.phone, contact.phone);
    assert_eq!(fields.street, contact.billing_address.street);
    assert_eq!(fields.city, contact.billing_address.city);
    assert_eq!(fields.zip, contact.billing_address.postal);
    assert_eq!(fields.country_id, RemoteId::positive(49));
    assert_eq!(fields.state_id, None);
}
