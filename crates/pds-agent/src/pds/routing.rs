//! DRI routing table
//!
//! Records which backend type produced each DRI. Reads always resolve the
//! backend through this table, never through the active selection, so data
//! written before a backend switch stays readable after it.

use moka::future::Cache;
use pds_backends::BackendRegistry;
use pds_core::{Dri, PdsError, Result, RoutingEntry};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::storage::AgentStore;

/// Default lifetime of a cached route
pub const DEFAULT_ROUTE_CACHE_TTL: Duration = Duration::from_secs(600);

/// DRI to backend-type routing, backed by the agent store
///
/// A read-through cache sits in front of the store; it is updated on every
/// write and invalidated on every removal made through this table. Writes
/// by another agent instance sharing the store are not seen until the
/// cached entry expires, so instances sharing a store should run with a
/// zero TTL.
#[derive(Clone)]
pub struct RoutingTable {
    registry: Arc<BackendRegistry>,
    store: Arc<dyn AgentStore>,
    cache: Option<Cache<Dri, String>>,
}

impl RoutingTable {
    pub fn new(registry: Arc<BackendRegistry>, store: Arc<dyn AgentStore>) -> Self {
        Self::with_cache_ttl(registry, store, DEFAULT_ROUTE_CACHE_TTL)
    }

    /// Routing table whose cached entries live for `ttl`
    ///
    /// A zero `ttl` disables the cache; every lookup reads the store.
    pub fn with_cache_ttl(registry: Arc<BackendRegistry>, store: Arc<dyn AgentStore>, ttl: Duration) -> Self {
        let cache = (!ttl.is_zero()).then(|| Cache::builder().time_to_live(ttl).max_capacity(10_000).build());
        Self { registry, store, cache }
    }

    /// Record that `dri` lives in `backend_type`
    ///
    /// Recording the same pair again is a no-op. Recording a different
    /// backend for a known DRI replaces the route (last write wins).
    pub async fn record_route(&self, dri: &Dri, backend_type: &str) -> Result<()> {
        if !self.registry.contains(backend_type) {
            return Err(PdsError::configuration(format!(
                "Cannot route to unregistered backend '{}'",
                backend_type
            )));
        }

        match self.lookup(dri).await? {
            Some(existing) if existing == backend_type => {
                debug!(dri = %dri, backend_type = %backend_type, "Route already recorded");
                return Ok(());
            }
            Some(existing) => {
                info!(
                    dri = %dri,
                    from = %existing,
                    to = %backend_type,
                    "Re-routing DRI to a different backend"
                );
            }
            None => {}
        }

        self.store
            .put_route(RoutingEntry::new(dri.clone(), backend_type))
            .await?;
        if let Some(cache) = &self.cache {
            cache.insert(dri.clone(), backend_type.to_string()).await;
        }
        Ok(())
    }

    /// The backend type holding `dri`
    pub async fn resolve(&self, dri: &Dri) -> Result<String> {
        self.lookup(dri).await?.ok_or_else(|| {
            warn!(dri = %dri, "No route recorded for DRI");
            PdsError::not_found(format!("No route for DRI {}", dri))
        })
    }

    /// Remove the route for `dri`; returns whether one existed
    pub async fn remove_route(&self, dri: &Dri) -> Result<bool> {
        if let Some(cache) = &self.cache {
            cache.invalidate(dri).await;
        }
        Ok(self.store.remove_route(dri).await?)
    }

    /// Number of recorded routes
    pub async fn route_count(&self) -> Result<usize> {
        Ok(self.store.count_routes().await?)
    }

    async fn lookup(&self, dri: &Dri) -> Result<Option<String>> {
        if let Some(cached) = self.cached(dri).await {
            return Ok(Some(cached));
        }

        let entry = self.store.get_route(dri).await?;
        if let (Some(cache), Some(entry)) = (&self.cache, &entry) {
            cache.insert(dri.clone(), entry.backend_type.clone()).await;
        }
        Ok(entry.map(|e| e.backend_type))
    }

    async fn cached(&self, dri: &Dri) -> Option<String> {
        match &self.cache {
            Some(cache) => cache.get(dri).await,
            None => None,
        }
    }
}
