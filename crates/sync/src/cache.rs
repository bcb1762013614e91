//! Per-session memo of reference-data lookups.
//!
//! Countries, states, identification types, currencies and product variants
//! are resolved by natural key with one `search` call each. Results,
//! including misses, are kept for the lifetime of one sync session so a
//! batch never asks the same question twice. A fresh cache is created for
//! every session; nothing is persisted.

use std::collections::HashMap;

use tracing::{debug, warn};

use odooflow_core::RemoteId;

use crate::mapper::identification::{DEFAULT_IDENTIFICATION_CODE, canonical_code_or};
use crate::rpc::{Domain, RpcSession, RpcTransport};

/// Country used to disambiguate state names when the address has none.
pub const DEFAULT_STATE_COUNTRY: &str = "CO";

/// Kind of reference data looked up by natural key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LookupKind {
    /// `res.country` by ISO code.
    Country,
    /// `res.country.state` by name within a country.
    State,
    /// `l10n_latam.identification.type` by DIAN code.
    IdentificationType,
    /// `res.currency` by ISO code.
    Currency,
    /// `product.product` by internal reference (SKU).
    ProductVariant,
}

impl LookupKind {
    /// Odoo model searched for this kind.
    #[must_use]
    pub const fn model(&self) -> &'static str {
        match self {
            Self::Country => "res.country",
            Self::State => "res.country.state",
            Self::IdentificationType => "l10n_latam.identification.type",
            Self::Currency => "res.currency",
            Self::ProductVariant => "product.product",
        }
    }
}

/// Memoized natural-key lookups for one sync session.
#[derive(Debug)]
pub struct ReferenceCache {
    entries: HashMap<(LookupKind, String), Option<RemoteId>>,
    default_identification_code: String,
    lookups: usize,
}

impl Default for ReferenceCache {
    fn default() -> Self {
        Self::new(DEFAULT_IDENTIFICATION_CODE)
    }
}

impl ReferenceCache {
    /// Create an empty cache. Unrecognized document types resolve as
    /// `default_identification_code`.
    #[must_use]
    pub fn new(default_identification_code: &str) -> Self {
        Self {
            entries: HashMap::new(),
            default_identification_code: default_identification_code.to_string(),
            lookups: 0,
        }
    }

    /// Resolve a natural key to a remote id.
    ///
    /// `fallback_country` scopes [`LookupKind::State`] lookups and defaults
    /// to [`DEFAULT_STATE_COUNTRY`]; other kinds ignore it. A miss, or a
    /// failed lookup, is cached as `None` and never returned as an error.
    pub async fn resolve<T: RpcTransport>(
        &mut self,
        rpc: &RpcSession<'_, T>,
        kind: LookupKind,
        natural_key: &str,
        fallback_country: Option<&str>,
    ) -> Option<RemoteId> {
        let (cache_key, domain) = self.lookup(kind, natural_key, fallback_country)?;

        if let Some(hit) = self.entries.get(&(kind, cache_key.clone())) {
            return *hit;
        }

        self.lookups += 1;
        let resolved = match rpc.search_one(kind.model(), domain).await {
            Ok(Some(id)) => {
                debug!(?kind, key = %cache_key, %id, "Resolved reference");
                Some(id)
            }
            Ok(None) => {
                warn!(?kind, key = %cache_key, "Reference not found in Odoo");
                None
            }
            Err(e) => {
                warn!(?kind, key = %cache_key, error = %e, "Reference lookup failed");
                None
            }
        };
        self.entries.insert((kind, cache_key), resolved);
        resolved
    }

    /// Record an id learned some other way (for example, a product variant
    /// created during this session).
    pub fn insert(&mut self, kind: LookupKind, natural_key: &str, id: RemoteId) {
        if let Some((cache_key, _)) = self.lookup(kind, natural_key, None) {
            self.entries.insert((kind, cache_key), Some(id));
        }
    }

    /// Number of RPC lookups issued so far.
    #[must_use]
    pub const fn lookups(&self) -> usize {
        self.lookups
    }

    /// Number of cached keys, hits and misses alike.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Normalized cache key and search domain; `None` for a blank key.
    fn lookup(
        &self,
        kind: LookupKind,
        natural_key: &str,
        fallback_country: Option<&str>,
    ) -> Option<(String, Domain)> {
        let trimmed = natural_key.trim();
        if trimmed.is_empty() && kind != LookupKind::IdentificationType {
            return None;
        }

        Some(match kind {
            LookupKind::Country => {
                let code = trimmed.to_uppercase();
                (code.clone(), Domain::new().equals("code", code))
            }
            LookupKind::Currency => {
                let code = trimmed.to_uppercase();
                (code.clone(), Domain::new().equals("name", code))
            }
            LookupKind::State => {
                let country = fallback_country
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .unwrap_or(DEFAULT_STATE_COUNTRY)
                    .to_uppercase();
                (
                    format!("{country}|{}", trimmed.to_uppercase()),
                    Domain::new()
                        .ilike("name", trimmed)
                        .equals("country_id.code", country),
                )
            }
            LookupKind::IdentificationType => {
                let code = canonical_code_or(trimmed, &self.default_identification_code);
                (
                    code.clone(),
                    Domain::new().equals("l10n_co_document_code", code),
                )
            }
            LookupKind::ProductVariant => (
                trimmed.to_string(),
                Domain::new().equals("default_code", trimmed),
            ),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::rpc::RemoteValue;
    use crate::testing::{ScriptedTransport, test_credentials};

    async fn session(transport: &ScriptedTransport) -> RpcSession<'_, ScriptedTransport> {
        RpcSession::authenticate(transport, &test_credentials())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_repeat_lookup_is_one_call() {
        let transport = ScriptedTransport::new();
        transport.on("res.country", "search", |_| Ok(vec![RemoteValue::Int(49)].into()));
        let rpc = session(&transport).await;
        let mut cache = ReferenceCache::default();

        for key in ["CO", "co", " CO "] {
            let id = cache.resolve(&rpc, LookupKind::Country, key, None).await;
            assert_eq!(id, RemoteId::positive(49));
        }
        assert_eq!(transport.count("res.country", "search"), 1);
        assert_eq!(cache.lookups(), 1);
    }

    #[tokio::test]
    async fn test_miss_is_cached() {
        let transport = ScriptedTransport::new();
        let rpc = session(&transport).await;
        let mut cache = ReferenceCache::default();

        assert_eq!(cache.resolve(&rpc, LookupKind::Currency, "xts", None).await, None);
        assert_eq!(cache.resolve(&rpc, LookupKind::Currency, "XTS", None).await, None);
        assert_eq!(transport.count("res.currency", "search"), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_lookup_error_is_a_cached_miss() {
        let transport = ScriptedTransport::new();
        transport.on("res.country", "search", |_| {
            Err(SyncError::Transport("connection reset".to_string()))
        });
        let rpc = session(&transport).await;
        let mut cache = ReferenceCache::default();

        assert_eq!(cache.resolve(&rpc, LookupKind::Country, "CO", None).await, None);
        assert_eq!(cache.resolve(&rpc, LookupKind::Country, "CO", None).await, None);
        assert_eq!(transport.count("res.country", "search"), 1);
    }

    #[tokio::test]
    async fn test_state_uses_country_and_fallback() {
        let transport = ScriptedTransport::new();
        transport.on("res.country.state", "search", |call| {
            let domain = call.args().and_then(|a| a.first()).cloned().unwrap();
            let expected: RemoteValue = Domain::new()
                .ilike("name", "Antioquia")
                .equals("country_id.code", "CO")
                .into();
            assert_eq!(domain, expected);
            Ok(vec![RemoteValue::Int(640)].into())
        });
        let rpc = session(&transport).await;
        let mut cache = ReferenceCache::default();

        let id = cache.resolve(&rpc, LookupKind::State, "Antioquia", Some("")).await;
        assert_eq!(id, RemoteId::positive(640));
        let again = cache.resolve(&rpc, LookupKind::State, "ANTIOQUIA", None).await;
        assert_eq!(again, id);
        assert_eq!(transport.count("res.country.state", "search"), 1);
    }

    #[tokio::test]
    async fn test_identification_aliases_share_a_key() {
        let transport = ScriptedTransport::new();
        transport.on("l10n_latam.identification.type", "search", |_| {
            Ok(vec![RemoteValue::Int(6)].into())
        });
        let rpc = session(&transport).await;
        let mut cache = ReferenceCache::default();

        for alias in ["nit", "31", "RUT"] {
            cache
                .resolve(&rpc, LookupKind::IdentificationType, alias, None)
                .await;
        }
        assert_eq!(
            transport.count("l10n_latam.identification.type", "search"),
            1
        );
    }

    #[tokio::test]
    async fn test_blank_key_skips_rpc() {
        let transport = ScriptedTransport::new();
        let rpc = session(&transport).await;
        let mut cache = ReferenceCache::default();

        assert_eq!(cache.resolve(&rpc, LookupKind::Country, "  ", None).await, None);
        assert_eq!(cache.lookups(), 0);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_insert_seeds_cache() {
        let transport = ScriptedTransport::new();
        let rpc = session(&transport).await;
        let mut cache = ReferenceCache::default();

        let id = RemoteId::positive(77).unwrap();
        cache.insert(LookupKind::ProductVariant, "MUG-01", id);
        assert_eq!(
            cache
                .resolve(&rpc, LookupKind::ProductVariant, "MUG-01", None)
                .await,
            Some(id)
        );
        assert_eq!(cache.lookups(), 0);
    }
}
