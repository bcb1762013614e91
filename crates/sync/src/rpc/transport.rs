//! Transport seam and the production HTTP transport.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument, trace};
use url::Url;

use super::codec;
use super::value::RemoteValue;
use crate::config::OdooConfig;
use crate::error::SyncError;

/// XML-RPC service endpoint below `{base_url}{rpc_prefix}/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Authentication and version queries.
    Common,
    /// Model operations through `execute_kw`.
    Object,
    /// Database management (listing).
    Db,
}

impl Endpoint {
    #[must_use]
    pub const fn path(&self) -> &'static str {
        match self {
            Self::Common => "common",
            Self::Object => "object",
            Self::Db => "db",
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

/// Issues one remote procedure call.
///
/// Implementations return a decoded `RemoteValue::Fault` as a value rather
/// than an error; [`RemoteValue::into_result`] is how callers surface it.
/// Transport failures (network, timeout, non-2xx, undecodable body) are
/// errors. Calls are never retried.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn call(
        &self,
        endpoint: Endpoint,
        method: &str,
        params: Vec<RemoteValue>,
    ) -> Result<RemoteValue, SyncError>;
}

#[async_trait]
impl<T: RpcTransport + ?Sized> RpcTransport for Arc<T> {
    async fn call(
        &self,
        endpoint: Endpoint,
        method: &str,
        params: Vec<RemoteValue>,
    ) -> Result<RemoteValue, SyncError> {
        (**self).call(endpoint, method, params).await
    }
}

// =============================================================================
// HttpTransport
// =============================================================================

/// XML-RPC over HTTPS with `reqwest`.
#[derive(Clone)]
pub struct HttpTransport {
    inner: Arc<HttpTransportInner>,
}

struct HttpTransportInner {
    client: reqwest::Client,
    /// `{base_url}{rpc_prefix}/`
    root: Url,
}

impl HttpTransport {
    /// Create a transport rooted at `{base_url}{rpc_prefix}/`.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Transport` if the HTTP client cannot be built or
    /// the endpoint URL is invalid.
    pub fn new(base_url: &Url, rpc_prefix: &str, timeout: Duration) -> Result<Self, SyncError> {
        let prefix = rpc_prefix.trim_matches('/');
        let root = base_url
            .join(&format!("{prefix}/"))
            .map_err(|e| SyncError::Transport(format!("invalid endpoint URL: {e}")))?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            inner: Arc::new(HttpTransportInner { client, root }),
        })
    }

    /// Create a transport from connection settings.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::ConfigIncomplete` if no URL is configured.
    pub fn from_config(config: &OdooConfig) -> Result<Self, SyncError> {
        let base_url = config
            .base_url
            .as_ref()
            .ok_or_else(|| SyncError::ConfigIncomplete("missing url".to_string()))?;
        Self::new(base_url, &config.rpc_prefix, config.timeout)
    }

    /// Full URL of an endpoint.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Transport` if the URL cannot be built.
    pub fn endpoint_url(&self, endpoint: Endpoint) -> Result<Url, SyncError> {
        self.inner
            .root
            .join(endpoint.path())
            .map_err(|e| SyncError::Transport(format!("invalid endpoint URL: {e}")))
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("root", &self.inner.root.as_str())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    // The request body carries the API key, so it is never logged
    #[instrument(skip(self, params))]
    async fn call(
        &self,
        endpoint: Endpoint,
        method: &str,
        params: Vec<RemoteValue>,
    ) -> Result<RemoteValue, SyncError> {
        let url = self.endpoint_url(endpoint)?;
        let body = codec::encode_call(method, &params);

        let response = self
            .inner
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "text/xml")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            debug!(
                status = %status,
                body = %response_text.chars().take(500).collect::<String>(),
                "Odoo returned non-success status"
            );
            return Err(SyncError::Transport(format!(
                "HTTP {status}: {}",
                response_text.chars().take(200).collect::<String>()
            )));
        }

        trace!(body = %response_text, "Odoo response");

        codec::decode_response(&response_text).inspect_err(|e| {
            debug!(
                error = %e,
                body = %response_text.chars().take(500).collect::<String>(),
                "Failed to decode Odoo response"
            );
        })
    }
}
