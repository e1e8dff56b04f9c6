//! In-memory storage backend
//!
//! Default storage implementation using in-memory hashmaps.
//! Suitable for development and single-instance deployments.
//! Data is lost on restart.

use async_trait::async_trait;
use pds_core::{Dri, ExchangeQuery, RoutingEntry};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{AgentStore, ExchangeRow, StorageError};

/// In-memory agent store implementation
#[derive(Debug, Default)]
pub struct MemoryStore {
    routes: RwLock<HashMap<Dri, RoutingEntry>>,
    active_backend: RwLock<Option<String>>,
    /// (protocol, id) -> row
    exchanges: RwLock<HashMap<(String, String), ExchangeRow>>,
}

impl MemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AgentStore for MemoryStore {
    // =========================================================================
    // DRI Routing
    // =========================================================================

    async fn put_route(&self, entry: RoutingEntry) -> Result<(), StorageError> {
        let mut routes = self.routes.write().await;
        debug!(dri = %entry.dri, backend_type = %entry.backend_type, "Storing route");
        routes.insert(entry.dri.clone(), entry);
        Ok(())
    }

    async fn get_route(&self, dri: &Dri) -> Result<Option<RoutingEntry>, StorageError> {
        Ok(self.routes.read().await.get(dri).cloned())
    }

    async fn remove_route(&self, dri: &Dri) -> Result<bool, StorageError> {
        Ok(self.routes.write().await.remove(dri).is_some())
    }

    async fn count_routes(&self) -> Result<usize, StorageError> {
        Ok(self.routes.read().await.len())
    }

    // =========================================================================
    // Active Backend Selection
    // =========================================================================

    async fn set_active_backend(&self, backend_type: &str) -> Result<(), StorageError> {
        *self.active_backend.write().await = Some(backend_type.to_string());
        info!(backend_type = %backend_type, "Stored active backend selection");
        Ok(())
    }

    async fn get_active_backend(&self) -> Result<Option<String>, StorageError> {
        Ok(self.active_backend.read().await.clone())
    }

    // =========================================================================
    // Exchange Records
    // =========================================================================

    async fn save_exchange(&self, row: ExchangeRow) -> Result<(), StorageError> {
        let mut exchanges = self.exchanges.write().await;
        exchanges.insert((row.protocol.clone(), row.id.clone()), row);
        Ok(())
    }

    async fn get_exchange(&self, protocol: &str, id: &str) -> Result<Option<ExchangeRow>, StorageError> {
        let exchanges = self.exchanges.read().await;
        Ok(exchanges.get(&(protocol.to_string(), id.to_string())).cloned())
    }

    async fn query_exchanges(
        &self,
        protocol: &str,
        query: &ExchangeQuery,
    ) -> Result<Vec<ExchangeRow>, StorageError> {
        let exchanges = self.exchanges.read().await;
        let mut rows: Vec<ExchangeRow> = exchanges
            .values()
            .filter(|row| row.protocol == protocol && row.matches(query))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(rows)
    }
}
