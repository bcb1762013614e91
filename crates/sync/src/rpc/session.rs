//! Authenticated model access through `execute_kw`.

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument};

use odooflow_core::RemoteId;

use super::transport::{Endpoint, RpcTransport};
use super::value::{RemoteStruct, RemoteValue};
use crate::config::{Credentials, api_key_str};
use crate::error::SyncError;

// =============================================================================
// Domain
// =============================================================================

/// Search domain: a conjunction of `(field, operator, value)` leaves.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Domain(Vec<RemoteValue>);

impl Domain {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Add a `(field, operator, value)` leaf.
    #[must_use]
    pub fn filter(mut self, field: &str, operator: &str, value: impl Into<RemoteValue>) -> Self {
        self.0.push(RemoteValue::Array(vec![
            field.into(),
            operator.into(),
            value.into(),
        ]));
        self
    }

    #[must_use]
    pub fn equals(self, field: &str, value: impl Into<RemoteValue>) -> Self {
        self.filter(field, "=", value)
    }

    #[must_use]
    pub fn ilike(self, field: &str, value: impl Into<RemoteValue>) -> Self {
        self.filter(field, "ilike", value)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Domain> for RemoteValue {
    fn from(domain: Domain) -> Self {
        Self::Array(domain.0)
    }
}

// =============================================================================
// RpcSession
// =============================================================================

/// An authenticated `(database, uid, secret)` tuple bound to a transport.
pub struct RpcSession<'t, T> {
    transport: &'t T,
    database: String,
    uid: i64,
    api_key: SecretString,
}

impl<T> std::fmt::Debug for RpcSession<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcSession")
            .field("database", &self.database)
            .field("uid", &self.uid)
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl<'t, T: RpcTransport> RpcSession<'t, T> {
    /// Authenticate on the common endpoint.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Auth` if the server rejects the credentials or
    /// answers anything but a positive uid; `SyncError::Transport` on
    /// network failure.
    #[instrument(skip(transport, credentials), fields(database = %credentials.database, username = %credentials.username))]
    pub async fn authenticate(transport: &'t T, credentials: &Credentials) -> Result<Self, SyncError> {
        let response = transport
            .call(
                Endpoint::Common,
                "authenticate",
                vec![
                    credentials.database.as_str().into(),
                    credentials.username.as_str().into(),
                    api_key_str(credentials).into(),
                    RemoteValue::Struct(RemoteStruct::new()),
                ],
            )
            .await?;

        let uid = match response {
            RemoteValue::Int(uid) if uid > 0 => uid,
            RemoteValue::Fault { message, .. } => return Err(SyncError::Auth(message)),
            other => {
                return Err(SyncError::Auth(format!(
                    "invalid credentials (server returned {})",
                    other.type_name()
                )));
            }
        };

        debug!(uid, "Authenticated with Odoo");

        Ok(Self {
            transport,
            database: credentials.database.clone(),
            uid,
            api_key: credentials.api_key.clone(),
        })
    }

    #[must_use]
    pub const fn uid(&self) -> i64 {
        self.uid
    }

    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Call `model.method(*args, **kwargs)`.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::RemoteFault` if the server answers with a fault,
    /// or the transport error.
    #[instrument(skip(self, args, kwargs))]
    pub async fn execute_kw(
        &self,
        model: &str,
        method: &str,
        args: Vec<RemoteValue>,
        kwargs: RemoteStruct,
    ) -> Result<RemoteValue, SyncError> {
        self.transport
            .call(
                Endpoint::Object,
                "execute_kw",
                vec![
                    self.database.as_str().into(),
                    RemoteValue::Int(self.uid),
                    self.api_key.expose_secret().into(),
                    model.into(),
                    method.into(),
                    RemoteValue::Array(args),
                    RemoteValue::Struct(kwargs),
                ],
            )
            .await?
            .into_result()
    }

    /// Ids of the records matching `domain`.
    ///
    /// # Errors
    ///
    /// Propagates call errors; `SyncError::Parse` if the answer is not a
    /// list of ids.
    pub async fn search(
        &self,
        model: &str,
        domain: Domain,
        limit: Option<i64>,
    ) -> Result<Vec<RemoteId>, SyncError> {
        let mut kwargs = RemoteStruct::new();
        if let Some(limit) = limit {
            kwargs.insert("limit".to_string(), RemoteValue::Int(limit));
        }
        let response = self
            .execute_kw(model, "search", vec![domain.into()], kwargs)
            .await?;
        let items = response
            .items()
            .ok_or_else(|| SyncError::parse("search", format!("expected array, got {}", response.type_name())))?;
        Ok(items.iter().filter_map(RemoteValue::as_remote_id).collect())
    }

    /// First record id matching `domain`, if any.
    ///
    /// # Errors
    ///
    /// See [`RpcSession::search`].
    pub async fn search_one(&self, model: &str, domain: Domain) -> Result<Option<RemoteId>, SyncError> {
        Ok(self.search(model, domain, Some(1)).await?.into_iter().next())
    }

    /// Records matching `domain`, restricted to `fields`.
    ///
    /// # Errors
    ///
    /// Propagates call errors; `SyncError::Parse` if the answer is not a
    /// list of structs.
    pub async fn search_read(
        &self,
        model: &str,
        domain: Domain,
        fields: &[&str],
        limit: Option<i64>,
    ) -> Result<Vec<RemoteStruct>, SyncError> {
        self.search_read_ordered(model, domain, fields, None, limit).await
    }

    /// [`RpcSession::search_read`] with an explicit sort such as
    /// `"name ASC"`.
    ///
    /// # Errors
    ///
    /// See [`RpcSession::search_read`].
    pub async fn search_read_ordered(
        &self,
        model: &str,
        domain: Domain,
        fields: &[&str],
        order: Option<&str>,
        limit: Option<i64>,
    ) -> Result<Vec<RemoteStruct>, SyncError> {
        let mut kwargs = fields_kwarg(fields);
        if let Some(order) = order {
            kwargs.insert("order".to_string(), order.into());
        }
        if let Some(limit) = limit {
            kwargs.insert("limit".to_string(), RemoteValue::Int(limit));
        }
        let response = self
            .execute_kw(model, "search_read", vec![domain.into()], kwargs)
            .await?;
        records(&response, "search_read")
    }

    /// Read `fields` of the given records.
    ///
    /// # Errors
    ///
    /// Propagates call errors; `SyncError::Parse` if the answer is not a
    /// list of structs.
    pub async fn read(
        &self,
        model: &str,
        ids: &[RemoteId],
        fields: &[&str],
    ) -> Result<Vec<RemoteStruct>, SyncError> {
        let ids = ids.iter().copied().map(RemoteValue::from).collect();
        let response = self
            .execute_kw(model, "read", vec![RemoteValue::Array(ids)], fields_kwarg(fields))
            .await?;
        records(&response, "read")
    }

    /// Create one record and return its id.
    ///
    /// # Errors
    ///
    /// Propagates call errors; `SyncError::Parse` unless the server answers
    /// a positive id.
    pub async fn create(&self, model: &str, values: RemoteStruct) -> Result<RemoteId, SyncError> {
        let response = self
            .execute_kw(model, "create", vec![RemoteValue::Struct(values)], RemoteStruct::new())
            .await?;
        response.as_remote_id().ok_or_else(|| {
            SyncError::parse(
                &format!("create {model}"),
                format!("expected a record id, got {}", response.type_name()),
            )
        })
    }

    /// Write `values` onto one record.
    ///
    /// # Errors
    ///
    /// Propagates call errors; `SyncError::Parse` unless the server answers
    /// `true`.
    pub async fn write(&self, model: &str, id: RemoteId, values: RemoteStruct) -> Result<(), SyncError> {
        let response = self
            .execute_kw(
                model,
                "write",
                vec![RemoteValue::Array(vec![id.into()]), RemoteValue::Struct(values)],
                RemoteStruct::new(),
            )
            .await?;
        match response {
            RemoteValue::Bool(true) => Ok(()),
            other => Err(SyncError::parse(
                &format!("write {model}/{id}"),
                format!("server answered {}", other.type_name()),
            )),
        }
    }

    /// Call a record method such as `action_confirm` on the given ids.
    ///
    /// # Errors
    ///
    /// Propagates call errors.
    pub async fn call_method(
        &self,
        model: &str,
        method: &str,
        ids: &[RemoteId],
    ) -> Result<RemoteValue, SyncError> {
        let ids = ids.iter().copied().map(RemoteValue::from).collect();
        self.execute_kw(model, method, vec![RemoteValue::Array(ids)], RemoteStruct::new())
            .await
    }
}

fn fields_kwarg(fields: &[&str]) -> RemoteStruct {
    let mut kwargs = RemoteStruct::new();
    if !fields.is_empty() {
        kwargs.insert(
            "fields".to_string(),
            RemoteValue::Array(fields.iter().map(|f| RemoteValue::from(*f)).collect()),
        );
    }
    kwargs
}

fn records(response: &RemoteValue, context: &str) -> Result<Vec<RemoteStruct>, SyncError> {
    let items = response
        .items()
        .ok_or_else(|| SyncError::parse(context, format!("expected array, got {}", response.type_name())))?;
    items
        .iter()
        .map(|item| {
            item.as_struct()
                .cloned()
                .ok_or_else(|| SyncError::parse(context, format!("expected struct, got {}", item.type_name())))
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedTransport, test_credentials};

    #[tokio::test]
    async fn test_authenticate_returns_uid() {
        let transport = ScriptedTransport::new();
        let session = RpcSession::authenticate(&transport, &test_credentials())
            .await
            .unwrap();
        assert_eq!(session.uid(), 2);
        assert_eq!(session.database(), "acme");

        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].endpoint, Endpoint::Common);
        assert_eq!(calls[0].method, "authenticate");
        assert_eq!(calls[0].params[0], RemoteValue::from("acme"));
    }

    #[tokio::test]
    async fn test_authenticate_rejects_false_uid() {
        let transport = ScriptedTransport::new().with_uid(RemoteValue::Bool(false));
        let err = RpcSession::authenticate(&transport, &test_credentials())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Auth(_)));
    }

    #[tokio::test]
    async fn test_authenticate_rejects_non_numeric_uid() {
        let transport = ScriptedTransport::new().with_uid(RemoteValue::from("2"));
        let err = RpcSession::authenticate(&transport, &test_credentials())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Auth(_)));
    }

    #[tokio::test]
    async fn test_execute_kw_passes_credential_tuple() {
        let transport = ScriptedTransport::new();
        transport.on("res.country", "search", |_| Ok(vec![RemoteValue::Int(49)].into()));
        let session = RpcSession::authenticate(&transport, &test_credentials())
            .await
            .unwrap();

        let ids = session
            .search("res.country", Domain::new().equals("code", "CO"), Some(1))
            .await
            .unwrap();
        assert_eq!(ids, vec![RemoteId::positive(49).unwrap()]);

        let calls = transport.calls();
        let call = &calls[1];
        assert_eq!(call.endpoint, Endpoint::Object);
        assert_eq!(call.method, "execute_kw");
        assert_eq!(call.params[1], RemoteValue::Int(2));
        assert_eq!(call.params[3], RemoteValue::from("res.country"));
        assert_eq!(call.params[4], RemoteValue::from("search"));
        assert_eq!(
            call.kwargs().and_then(|k| k.get("limit").cloned()),
            Some(RemoteValue::Int(1))
        );
    }

    #[tokio::test]
    async fn test_fault_surfaces_as_remote_fault() {
        let transport = ScriptedTransport::new();
        transport.on("sale.order", "create", |_| {
            Ok(RemoteValue::Fault {
                code: 2,
                message: "Missing required field partner_id".to_string(),
            })
        });
        let session = RpcSession::authenticate(&transport, &test_credentials())
            .await
            .unwrap();
        let err = session
            .create("sale.order", RemoteStruct::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::RemoteFault { code: 2, .. }));
    }

    #[tokio::test]
    async fn test_create_requires_positive_id() {
        let transport = ScriptedTransport::new();
        transport.on("res.partner", "create", |_| Ok(RemoteValue::Bool(false)));
        let session = RpcSession::authenticate(&transport, &test_credentials())
            .await
            .unwrap();
        let err = session
            .create("res.partner", RemoteStruct::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Parse(_)));
    }

    #[tokio::test]
    async fn test_write_requires_true() {
        let transport = ScriptedTransport::new();
        transport.on("res.partner", "write", |_| Ok(RemoteValue::Bool(false)));
        let session = RpcSession::authenticate(&transport, &test_credentials())
            .await
            .unwrap();
        let id = RemoteId::positive(5).unwrap();
        assert!(matches!(
            session.write("res.partner", id, RemoteStruct::new()).await,
            Err(SyncError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_search_read_tolerates_false() {
        let transport = ScriptedTransport::new();
        transport.on("product.template", "search_read", |_| Ok(RemoteValue::Bool(false)));
        let session = RpcSession::authenticate(&transport, &test_credentials())
            .await
            .unwrap();
        let records = session
            .search_read("product.template", Domain::new(), &["name"], None)
            .await
            .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_domain_encoding() {
        let domain = Domain::new()
            .ilike("name", "antioquia")
            .equals("country_id.code", "CO");
        assert_eq!(
            RemoteValue::from(domain),
            RemoteValue::Array(vec![
                RemoteValue::Array(vec!["name".into(), "ilike".into(), "antioquia".into()]),
                RemoteValue::Array(vec![
                    "country_id.code".into(),
                    "=".into(),
                    "CO".into()
                ]),
            ])
        );
    }
}
