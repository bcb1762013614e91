//! OdooFlow Sync - WooCommerce to Odoo synchronization core.
//!
//! This crate talks to an Odoo instance over XML-RPC and keeps local
//! commerce records (orders, customers, products) in step with it.
//!
//! # Components
//!
//! - [`rpc`] - wire codec, HTTP transport and authenticated sessions
//! - [`cache`] - per-session memo of country, state, document-type,
//!   currency and product-variant lookups
//! - [`mapper`] - translation between local records and Odoo models
//! - [`orchestrator`] - create-vs-update decisions and batch reports
//!
//! Supporting modules: [`config`] (connection settings), [`store`] (the
//! host persistence seam), [`report`] (batch results), [`discovery`]
//! (version, databases, modules) and [`error`].
//!
//! # Example
//!
//! ```rust,ignore
//! use odooflow_sync::{HttpTransport, MemoryStore, OdooConfig, SyncService};
//!
//! let config = OdooConfig::from_env()?;
//! let transport = HttpTransport::from_config(&config)?;
//! let service = SyncService::new(transport, MemoryStore::from_snapshot(snapshot), config);
//! let report = service.sync_orders(&order_ids).await?;
//! println!("{}", report.message);
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
pub mod config;
pub mod discovery;
pub mod error;
pub mod mapper;
pub mod orchestrator;
pub mod report;
pub mod rpc;
pub mod store;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use cache::{LookupKind, ReferenceCache};
pub use config::{ConfigError, Credentials, OdooConfig};
pub use error::{ErrorKind, SyncError};
pub use mapper::FieldSelection;
pub use orchestrator::{ManualLine, ManualOrder, SyncOptions, SyncService, SyncSession};
pub use report::{BatchReport, OutcomeStatus, SyncOutcome};
pub use rpc::{HttpTransport, RemoteValue, RpcSession, RpcTransport};
pub use store::{EntityStore, MemoryStore, Snapshot, StoreError};
