//! Instance discovery: server version, databases and installed modules.

use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::config::OdooConfig;
use crate::error::SyncError;
use crate::rpc::{Domain, Endpoint, RemoteStruct, RemoteValue, RpcSession, RpcTransport};

/// An installed Odoo module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledModule {
    /// Technical name (`sale_management`).
    pub name: String,
    /// Display name.
    pub title: String,
    pub state: String,
    pub version: String,
}

/// `server_version` reported by the common endpoint.
///
/// # Errors
///
/// Returns the transport error, a remote fault, or `SyncError::Parse` if
/// the answer has no version string.
#[instrument(skip(transport))]
pub async fn server_version<T: RpcTransport>(transport: &T) -> Result<String, SyncError> {
    let info = transport
        .call(Endpoint::Common, "version", Vec::new())
        .await?
        .into_result()?;
    info.get("server_version")
        .and_then(RemoteValue::text)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| SyncError::parse("version", "no server_version in answer"))
}

/// Databases an operator can choose from.
///
/// On `*.odoo.com` the database is the first label of the host. Elsewhere
/// the db endpoint is asked; if that fails the configured database is the
/// only choice.
///
/// # Errors
///
/// Returns `SyncError::ConfigIncomplete` without a URL, or the listing
/// error when no database is configured to fall back to.
#[instrument(skip(transport, config))]
pub async fn list_databases<T: RpcTransport>(
    transport: &T,
    config: &OdooConfig,
) -> Result<Vec<String>, SyncError> {
    let host = config
        .base_url
        .as_ref()
        .and_then(|url| url.host_str())
        .ok_or_else(|| SyncError::ConfigIncomplete("missing url".to_string()))?;

    if config.is_saas()
        && let Some(subdomain) = host.split('.').next().filter(|s| !s.is_empty())
    {
        debug!(database = subdomain, "Hosted instance, database from subdomain");
        return Ok(vec![subdomain.to_string()]);
    }

    let listed = transport
        .call(Endpoint::Db, "list", Vec::new())
        .await
        .and_then(RemoteValue::into_result)
        .and_then(|value| {
            value
                .items()
                .map(|items| {
                    items
                        .iter()
                        .filter_map(RemoteValue::text)
                        .filter(|name| !name.is_empty())
                        .map(str::to_string)
                        .collect::<Vec<_>>()
                })
                .ok_or_else(|| {
                    SyncError::parse("db list", format!("expected array, got {}", value.type_name()))
                })
        });

    match (listed, &config.database) {
        (Ok(names), _) if !names.is_empty() => Ok(names),
        (Ok(_), Some(database)) => Ok(vec![database.clone()]),
        (Ok(names), None) => Ok(names),
        (Err(e), Some(database)) => {
            warn!(error = %e, "Database listing failed, using the configured database");
            Ok(vec![database.clone()])
        }
        (Err(e), None) => Err(e),
    }
}

/// Installed modules, sorted by technical name.
///
/// # Errors
///
/// Returns the call error.
pub async fn installed_modules<T: RpcTransport>(
    rpc: &RpcSession<'_, T>,
) -> Result<Vec<InstalledModule>, SyncError> {
    let records = rpc
        .search_read_ordered(
            "ir.module.module",
            Domain::new().equals("state", "installed"),
            &["name", "shortdesc", "state", "installed_version"],
            Some("name ASC"),
            None,
        )
        .await?;
    Ok(records.iter().map(module).collect())
}

fn module(record: &RemoteStruct) -> InstalledModule {
    let text = |field: &str| {
        record
            .get(field)
            .and_then(RemoteValue::text)
            .unwrap_or_default()
            .to_string()
    };
    InstalledModule {
        name: text("name"),
        title: text("shortdesc"),
        state: text("state"),
        version: text("installed_version"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use url::Url;

    use super::*;
    use crate::testing::{ScriptedTransport, test_config, test_credentials};

    fn self_hosted() -> OdooConfig {
        OdooConfig {
            base_url: Some(Url::parse("https://erp.acme.test/").unwrap()),
            ..test_config()
        }
    }

    #[tokio::test]
    async fn test_server_version() {
        let transport = ScriptedTransport::new();
        assert_eq!(server_version(&transport).await.unwrap(), "17.0");
    }

    #[tokio::test]
    async fn test_saas_database_is_subdomain() {
        let transport = ScriptedTransport::new();
        let databases = list_databases(&transport, &test_config()).await.unwrap();
        assert_eq!(databases, vec!["acme"]);
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_self_hosted_lists_databases() {
        let transport = ScriptedTransport::new();
        transport.on_service(Endpoint::Db, "list", |_| {
            Ok(RemoteValue::Array(vec!["prod".into(), "staging".into()]))
        });
        let databases = list_databases(&transport, &self_hosted()).await.unwrap();
        assert_eq!(databases, vec!["prod", "staging"]);
    }

    #[tokio::test]
    async fn test_listing_denied_falls_back_to_configured_database() {
        let transport = ScriptedTransport::new();
        transport.on_service(Endpoint::Db, "list", |_| {
            Ok(RemoteValue::Fault {
                code: 3,
                message: "AccessDenied".to_string(),
            })
        });
        let databases = list_databases(&transport, &self_hosted()).await.unwrap();
        assert_eq!(databases, vec!["acme"]);

        let config = OdooConfig {
            database: None,
            ..self_hosted()
        };
        let err = list_databases(&transport, &config).await.unwrap_err();
        assert!(matches!(err, SyncError::RemoteFault { code: 3, .. }));
    }

    #[tokio::test]
    async fn test_installed_modules() {
        let transport = ScriptedTransport::new();
        transport.on("ir.module.module", "search_read", |_| {
            Ok(RemoteValue::Array(vec![RemoteValue::structure([
                ("name", RemoteValue::from("sale_management")),
                ("shortdesc", RemoteValue::from("Sales")),
                ("state", RemoteValue::from("installed")),
                ("installed_version", RemoteValue::from("17.0.1.2")),
            ])]))
        });
        let rpc = RpcSession::authenticate(&transport, &test_credentials())
            .await
            .unwrap();
        let modules = installed_modules(&rpc).await.unwrap();
        assert_eq!(modules[0].name, "sale_management");
        assert_eq!(modules[0].title, "Sales");
    }
}
