//! OdooFlow Core - Shared types library.
//!
//! This crate provides the types shared by every OdooFlow component:
//! - `sync` - XML-RPC transport, reference cache, entity mapper and orchestrator
//! - `cli` - Operator command-line tool
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no RPC, no HTTP clients.
//! The local commerce model (orders, customers, products) lives here
//! together with the enumerations both sides of a sync agree on.
//!
//! # Modules
//!
//! - [`types`] - Newtype ids, emails, currency codes, statuses and entity records

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
