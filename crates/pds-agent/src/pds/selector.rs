//! Active-backend selector
//!
//! The single writer of the active backend selection. Every write goes
//! through [`BackendSelector::set_active`], which refuses unregistered
//! backend types, so the stored selection is always a registered type or
//! unset.

use pds_backends::{BackendRegistry, StorageBackend};
use pds_core::{PdsError, Result};
use std::sync::Arc;
use tracing::{info, warn};

use crate::storage::AgentStore;

/// Validating access to the active backend selection
#[derive(Clone)]
pub struct BackendSelector {
    registry: Arc<BackendRegistry>,
    store: Arc<dyn AgentStore>,
}

impl BackendSelector {
    pub fn new(registry: Arc<BackendRegistry>, store: Arc<dyn AgentStore>) -> Self {
        Self { registry, store }
    }

    /// Select the active backend
    ///
    /// Fails with `Configuration` if `backend_type` is not registered; the
    /// previous selection is left intact.
    pub async fn set_active(&self, backend_type: &str) -> Result<()> {
        if !self.registry.contains(backend_type) {
            warn!(backend_type = %backend_type, "Refusing to activate unregistered backend");
            return Err(PdsError::configuration(format!(
                "Backend type '{}' is not registered",
                backend_type
            )));
        }

        self.store.set_active_backend(backend_type).await?;
        info!(backend_type = %backend_type, "Active backend changed");
        Ok(())
    }

    /// The active backend type and its handle
    pub async fn active(&self) -> Result<(String, Arc<dyn StorageBackend>)> {
        let backend_type = self
            .active_type()
            .await?
            .ok_or_else(|| PdsError::configuration("No active backend selected"))?;

        let backend = self.registry.get(&backend_type)?;
        Ok((backend_type, backend))
    }

    /// The active backend type, if one is selected
    pub async fn active_type(&self) -> Result<Option<String>> {
        Ok(self.store.get_active_backend().await?)
    }

    pub fn registry(&self) -> &Arc<BackendRegistry> {
        &self.registry
    }
}
