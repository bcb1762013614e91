//! Integration tests for OdooFlow.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p odooflow-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `sync_properties` - orchestrator behavior through `ScriptedTransport`
//! - `http_transport` - the `reqwest` transport against [`MockOdoo`], a
//!   local XML-RPC server built on `axum`
//!
//! Nothing here needs a real Odoo instance or network access beyond
//! `127.0.0.1`.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use url::Url;

use odooflow_core::{
    Address, Contact, CurrencyCode, CustomerId, LineItem, LocalCustomer, LocalOrder, LocalProduct,
    OrderId, OrderStatus, ProductId,
};
use odooflow_sync::rpc::codec;
use odooflow_sync::testing::test_config;
use odooflow_sync::{OdooConfig, RemoteValue};

// =============================================================================
// Fixtures
// =============================================================================

/// A product with SKU `MUG-01`.
#[must_use]
pub fn mug(id: i64) -> LocalProduct {
    LocalProduct {
        id: ProductId::new(id),
        sku: "MUG-01".to_string(),
        name: "Coffee Mug".to_string(),
        price: Some(Decimal::new(1250, 2)),
        stock_qty: Some(8),
        weight: Some(Decimal::new(35, 2)),
        description: Some("Stoneware, 350 ml".to_string()),
    }
}

/// A Colombian customer with a full billing address.
#[must_use]
pub fn customer(id: i64, email: &str) -> LocalCustomer {
    LocalCustomer {
        id: CustomerId::new(id),
        contact: Contact {
            name: "Ana Gómez".to_string(),
            email: email.to_string(),
            phone: "+57 300 000 0000".to_string(),
            billing_address: Address {
                street: "Calle 10 # 43-12".to_string(),
                street2: String::new(),
                city: "Medellín".to_string(),
                state: "Antioquia".to_string(),
                country: "CO".to_string(),
                postal: "050021".to_string(),
            },
            tax_id: "900.123.456-7".to_string(),
            tax_id_type: "31".to_string(),
        },
    }
}

/// A guest order for two mugs of product `product_id`.
#[must_use]
pub fn order(id: i64, status: OrderStatus, product_id: i64) -> LocalOrder {
    LocalOrder {
        id: OrderId::new(id),
        number: id.to_string(),
        status,
        customer_ref: None,
        billing: Contact {
            name: "Guest Buyer".to_string(),
            email: "guest@example.com".to_string(),
            ..Contact::default()
        },
        line_items: vec![LineItem {
            product_id: Some(ProductId::new(product_id)),
            name: "Coffee Mug".to_string(),
            quantity: Decimal::from(2),
            subtotal: Decimal::from(25),
            total: Decimal::from(25),
        }],
        shipping_total: Decimal::ZERO,
        shipping_method: String::new(),
        tax_total: Decimal::ZERO,
        total: Decimal::from(25),
        currency: CurrencyCode::default(),
        note: String::new(),
        created_at: Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 0).unwrap(),
    }
}

// =============================================================================
// MockOdoo
// =============================================================================

/// What the mock answers to one call.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// A `<methodResponse>`; a `Fault` value becomes `<fault>`.
    Value(RemoteValue),
    /// A bare HTTP status with a plain-text body.
    Status(u16, String),
    /// The inner reply, sent after a pause.
    Delayed(Duration, Box<MockReply>),
}

/// One call received by [`MockOdoo`].
#[derive(Debug, Clone)]
pub struct MockCall {
    /// `common`, `object` or `db`.
    pub endpoint: String,
    pub method: String,
    pub params: Vec<RemoteValue>,
    pub content_type: Option<String>,
}

impl MockCall {
    /// Model method of an `execute_kw` call.
    #[must_use]
    pub fn model_method(&self) -> Option<&str> {
        if self.method == "execute_kw" {
            self.params.get(4).and_then(RemoteValue::text)
        } else {
            None
        }
    }

    /// Model of an `execute_kw` call.
    #[must_use]
    pub fn model(&self) -> Option<&str> {
        if self.method == "execute_kw" {
            self.params.get(3).and_then(RemoteValue::text)
        } else {
            None
        }
    }
}

type Responder = dyn Fn(&MockCall) -> MockReply + Send + Sync;

#[derive(Clone)]
struct MockState {
    responder: Arc<Responder>,
    calls: Arc<Mutex<Vec<MockCall>>>,
}

/// An XML-RPC server on `127.0.0.1` answering from a closure.
pub struct MockOdoo {
    addr: SocketAddr,
    calls: Arc<Mutex<Vec<MockCall>>>,
}

impl MockOdoo {
    /// Bind a random port and serve `/xmlrpc/2/{endpoint}` in the background.
    pub async fn start<F>(responder: F) -> Self
    where
        F: Fn(&MockCall) -> MockReply + Send + Sync + 'static,
    {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let state = MockState {
            responder: Arc::new(responder),
            calls: Arc::clone(&calls),
        };
        let app = Router::new()
            .route("/xmlrpc/2/{endpoint}", post(handle))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr, calls }
    }

    /// A mock behaving like an empty database: uid 2, searches find
    /// nothing, `create` answers `created_id`, everything else `true`.
    pub async fn empty_database(created_id: i64) -> Self {
        Self::start(move |call| {
            MockReply::Value(match (call.endpoint.as_str(), call.method.as_str()) {
                ("common", "authenticate") => RemoteValue::Int(2),
                ("common", "version") => {
                    RemoteValue::structure([("server_version", RemoteValue::from("17.0"))])
                }
                ("object", "execute_kw") => match call.model_method() {
                    Some("search" | "search_read") => RemoteValue::Array(Vec::new()),
                    Some("create") => RemoteValue::Int(created_id),
                    _ => RemoteValue::Bool(true),
                },
                _ => RemoteValue::Fault {
                    code: 1,
                    message: format!("unknown method {}", call.method),
                },
            })
        })
        .await
    }

    /// `http://127.0.0.1:{port}/`
    #[must_use]
    pub fn base_url(&self) -> Url {
        Url::parse(&format!("http://{}/", self.addr)).unwrap()
    }

    /// Complete settings pointing at this server.
    #[must_use]
    pub fn config(&self) -> OdooConfig {
        OdooConfig {
            base_url: Some(self.base_url()),
            ..test_config()
        }
    }

    /// Every call received so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

async fn handle(
    State(state): State<MockState>,
    Path(endpoint): Path<String>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let (method, params) = match codec::decode_call(&body) {
        Ok(call) => call,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };
    let call = MockCall {
        endpoint,
        method,
        params,
        content_type: headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    };
    state
        .calls
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(call.clone());

    let mut reply = (state.responder)(&call);
    while let MockReply::Delayed(pause, inner) = reply {
        tokio::time::sleep(pause).await;
        reply = *inner;
    }

    match reply {
        MockReply::Delayed(..) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        MockReply::Value(value) => (
            [(header::CONTENT_TYPE, "text/xml")],
            codec::encode_response(&value),
        )
            .into_response(),
        MockReply::Status(code, text) => (
            StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            text,
        )
            .into_response(),
    }
}
