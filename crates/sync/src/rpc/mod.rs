//! XML-RPC transport to the Odoo external API.
//!
//! # Layers
//!
//! - [`value`] - `RemoteValue`, the tagged wire value with tolerant accessors
//! - [`codec`] - `quick-xml` based encoder/decoder for calls and responses
//! - [`transport`] - the `RpcTransport` seam and the `reqwest` implementation
//! - [`session`] - authentication and `execute_kw` helpers over a transport
//!
//! # Example
//!
//! ```rust,ignore
//! use odooflow_sync::rpc::{Domain, HttpTransport, RpcSession};
//!
//! let transport = HttpTransport::from_config(&config)?;
//! let rpc = RpcSession::authenticate(&transport, &config.credentials()?).await?;
//! let ids = rpc.search("res.partner", Domain::new().equals("email", "ana@example.com"), Some(1)).await?;
//! ```

pub mod codec;
pub mod session;
pub mod transport;
pub mod value;

pub use session::{Domain, RpcSession};
pub use transport::{Endpoint, HttpTransport, RpcTransport};
pub use value::{RemoteStruct, RemoteValue};
