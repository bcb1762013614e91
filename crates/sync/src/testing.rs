//! Scripted transport for tests.
//!
//! [`ScriptedTransport`] behaves like an empty Odoo database: authentication
//! succeeds with uid 2, searches find nothing, `create` hands out fresh ids
//! and `write` succeeds. Tests override individual `(model, method)` pairs
//! with [`ScriptedTransport::on`] and inspect every call afterwards.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use secrecy::SecretString;
use url::Url;

use crate::config::{Credentials, OdooConfig};
use crate::error::SyncError;
use crate::rpc::{Endpoint, RemoteStruct, RemoteValue, RpcTransport};

/// API key used by [`test_credentials`] and [`test_config`].
pub const TEST_API_KEY: &str = "3f9c1a7be2d84c06a5f1e9b27d6c4a80e1f3b5d7";

/// Ids handed out by the default `create` handler start here.
pub const FIRST_CREATED_ID: i64 = 100;

type Handler = Box<dyn Fn(&RecordedCall) -> Result<RemoteValue, SyncError> + Send + Sync>;

/// One call received by a [`ScriptedTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub endpoint: Endpoint,
    pub method: String,
    pub params: Vec<RemoteValue>,
}

impl RecordedCall {
    /// Model of an `execute_kw` call.
    #[must_use]
    pub fn model(&self) -> Option<&str> {
        self.execute_kw_param(3).and_then(RemoteValue::text)
    }

    /// Model method of an `execute_kw` call (`search`, `create`, ...).
    #[must_use]
    pub fn model_method(&self) -> Option<&str> {
        self.execute_kw_param(4).and_then(RemoteValue::text)
    }

    /// Positional arguments of an `execute_kw` call.
    #[must_use]
    pub fn args(&self) -> Option<&[RemoteValue]> {
        self.execute_kw_param(5).and_then(RemoteValue::items)
    }

    /// Keyword arguments of an `execute_kw` call.
    #[must_use]
    pub fn kwargs(&self) -> Option<&RemoteStruct> {
        self.execute_kw_param(6).and_then(RemoteValue::as_struct)
    }

    /// The values struct of a `create` or `write` call.
    #[must_use]
    pub fn values(&self) -> Option<&RemoteStruct> {
        let args = self.args()?;
        match self.model_method()? {
            "create" => args.first()?.as_struct(),
            "write" => args.get(1)?.as_struct(),
            _ => None,
        }
    }

    /// Whether this is `execute_kw` on `model` / `method`.
    #[must_use]
    pub fn is(&self, model: &str, method: &str) -> bool {
        self.model() == Some(model) && self.model_method() == Some(method)
    }

    fn execute_kw_param(&self, index: usize) -> Option<&RemoteValue> {
        if self.endpoint == Endpoint::Object && self.method == "execute_kw" {
            self.params.get(index)
        } else {
            None
        }
    }
}

/// In-process [`RpcTransport`] answering from scripted handlers.
pub struct ScriptedTransport {
    uid: RemoteValue,
    handlers: Mutex<HashMap<(String, String), Handler>>,
    service_handlers: Mutex<HashMap<(Endpoint, String), Handler>>,
    calls: Mutex<Vec<RecordedCall>>,
    next_id: AtomicI64,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ScriptedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedTransport")
            .field("uid", &self.uid)
            .field("calls", &self.calls().len())
            .finish_non_exhaustive()
    }
}

impl ScriptedTransport {
    #[must_use]
    pub fn new() -> Self {
        Self {
            uid: RemoteValue::Int(2),
            handlers: Mutex::new(HashMap::new()),
            service_handlers: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(FIRST_CREATED_ID),
        }
    }

    /// Answer `authenticate` with `uid` instead of `2`.
    #[must_use]
    pub fn with_uid(mut self, uid: RemoteValue) -> Self {
        self.uid = uid;
        self
    }

    /// Answer `execute_kw(model, method, ...)` with `handler`.
    pub fn on<F>(&self, model: &str, method: &str, handler: F)
    where
        F: Fn(&RecordedCall) -> Result<RemoteValue, SyncError> + Send + Sync + 'static,
    {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((model.to_string(), method.to_string()), Box::new(handler));
    }

    /// Answer a non-`execute_kw` call (`version`, `list`, ...) with `handler`.
    pub fn on_service<F>(&self, endpoint: Endpoint, method: &str, handler: F)
    where
        F: Fn(&RecordedCall) -> Result<RemoteValue, SyncError> + Send + Sync + 'static,
    {
        self.service_handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((endpoint, method.to_string()), Box::new(handler));
    }

    /// Every call received so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// `execute_kw` calls on `model` / `method`.
    #[must_use]
    pub fn calls_to(&self, model: &str, method: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.is(model, method))
            .collect()
    }

    /// Number of `execute_kw` calls on `model` / `method`.
    #[must_use]
    pub fn count(&self, model: &str, method: &str) -> usize {
        self.calls_to(model, method).len()
    }

    /// Forget recorded calls (handlers are kept).
    pub fn clear_calls(&self) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn respond(&self, call: &RecordedCall) -> Result<RemoteValue, SyncError> {
        if let (Some(model), Some(method)) = (call.model(), call.model_method()) {
            let handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(handler) = handlers.get(&(model.to_string(), method.to_string())) {
                return handler(call);
            }
            return Ok(match method {
                "search" | "search_read" | "read" => RemoteValue::Array(Vec::new()),
                "create" => RemoteValue::Int(self.next_id.fetch_add(1, Ordering::SeqCst)),
                _ => RemoteValue::Bool(true),
            });
        }

        let handlers = self
            .service_handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(handler) = handlers.get(&(call.endpoint, call.method.clone())) {
            return handler(call);
        }
        Ok(match (call.endpoint, call.method.as_str()) {
            (Endpoint::Common, "authenticate") => self.uid.clone(),
            (Endpoint::Common, "version") => {
                RemoteValue::structure([("server_version", RemoteValue::from("17.0"))])
            }
            (Endpoint::Db, "list") => RemoteValue::Array(vec!["acme".into()]),
            _ => RemoteValue::Fault {
                code: 1,
                message: format!("unknown method {}", call.method),
            },
        })
    }
}

#[async_trait]
impl RpcTransport for ScriptedTransport {
    async fn call(
        &self,
        endpoint: Endpoint,
        method: &str,
        params: Vec<RemoteValue>,
    ) -> Result<RemoteValue, SyncError> {
        let call = RecordedCall {
            endpoint,
            method: method.to_string(),
            params,
        };
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call.clone());
        self.respond(&call)
    }
}

/// Complete credentials for `https://acme.odoo.com/`, database `acme`.
#[must_use]
pub fn test_credentials() -> Credentials {
    Credentials {
        base_url: acme_url(),
        username: "bot@acme.test".to_string(),
        api_key: SecretString::from(TEST_API_KEY.to_string()),
        database: "acme".to_string(),
    }
}

/// Complete configuration matching [`test_credentials`].
#[must_use]
pub fn test_config() -> OdooConfig {
    OdooConfig {
        base_url: Some(acme_url()),
        username: Some("bot@acme.test".to_string()),
        api_key: Some(SecretString::from(TEST_API_KEY.to_string())),
        database: Some("acme".to_string()),
        ..OdooConfig::default()
    }
}

fn acme_url() -> Url {
    Url::parse("https://acme.odoo.com/").unwrap_or_else(|_| unreachable!("static URL is valid"))
}
