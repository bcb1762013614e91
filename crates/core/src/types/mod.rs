//! Core types for OdooFlow.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod entity;
pub mod id;
pub mod money;
pub mod status;

pub use email::{Email, EmailError};
pub use entity::*;
pub use id::*;
pub use money::{CurrencyCode, CurrencyCodeError};
pub use status::*;
