//! Backend Registry - maps backend type names to backend handles

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::backend::StorageBackend;
use crate::error::{BackendError, Result};

/// Backend Registry - explicit name-to-backend mapping
///
/// Populated once at startup and then shared read-only; there is no
/// global lookup. Per-backend settings stay mutable through each backend's
/// own `configure`.
#[derive(Default)]
pub struct BackendRegistry {
    backends: HashMap<String, Arc<dyn StorageBackend>>,
}

impl BackendRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
        }
    }

    /// Register a backend under its type name
    ///
    /// Registering a second backend with the same type replaces the first.
    pub fn register<B: StorageBackend + 'static>(&mut self, backend: B) {
        self.register_shared(Arc::new(backend));
    }

    /// Register an already shared backend
    pub fn register_shared(&mut self, backend: Arc<dyn StorageBackend>) {
        let backend_type = backend.backend_type().to_string();
        info!(
            backend_type = %backend_type,
            description = backend.description(),
            "Registered storage backend"
        );
        if self.backends.insert(backend_type.clone(), backend).is_some() {
            warn!(backend_type = %backend_type, "Replaced previously registered backend");
        }
    }

    /// Get the backend registered under `backend_type`
    pub fn get(&self, backend_type: &str) -> Result<Arc<dyn StorageBackend>> {
        self.backends.get(backend_type).cloned().ok_or_else(|| {
            warn!(backend_type = %backend_type, "No backend registered for type");
            BackendError::NotRegistered(backend_type.to_string())
        })
    }

    /// Check if a backend is registered for a type
    pub fn contains(&self, backend_type: &str) -> bool {
        self.backends.contains_key(backend_type)
    }

    /// List all registered backend types, sorted
    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.backends.keys().cloned().collect();
        types.sort();
        types
    }

    /// List backend types whose settings are non-empty, sorted
    pub async fn configured_types(&self) -> Vec<String> {
        let mut configured = Vec::new();
        for (backend_type, backend) in &self.backends {
            if !backend.settings().await.is_empty() {
                configured.push(backend_type.clone());
            }
        }
        configured.sort();
        configured
    }

    /// Iterate over all registered backends
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn StorageBackend>)> {
        self.backends.iter().map(|(name, backend)| (name.as_str(), backend))
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.registered_types())
            .finish()
    }
}

/// Builder for creating a BackendRegistry with backends
#[derive(Default)]
pub struct BackendRegistryBuilder {
    registry: BackendRegistry,
}

impl BackendRegistryBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            registry: BackendRegistry::new(),
        }
    }

    /// Add a backend
    pub fn with_backend<B: StorageBackend + 'static>(mut self, backend: B) -> Self {
        self.registry.register(backend);
        self
    }

    /// Add an already shared backend
    pub fn with_shared_backend(mut self, backend: Arc<dyn StorageBackend>) -> Self {
        self.registry.register_shared(backend);
        self
    }

    /// Build the registry
    pub fn build(self) -> BackendRegistry {
        self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::LocalBackend;
    use pds_core::BackendSettings;

    #[test]
    fn test_registry_registration() {
        let mut registry = BackendRegistry::new();
        registry.register(LocalBackend::new());

        assert!(registry.contains("local"));
        assert!(!registry.contains("data_vault"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registry_missing_backend() {
        let registry = BackendRegistry::new();
        let err = registry.get("data_vault").err().unwrap();
        assert_eq!(err, BackendError::NotRegistered("data_vault".into()));
    }

    #[test]
    fn test_builder_and_sorted_types() {
        let registry = BackendRegistryBuilder::new()
            .with_backend(LocalBackend::named("zeta"))
            .with_backend(LocalBackend::named("alpha"))
            .build();

        assert_eq!(registry.registered_types(), vec!["alpha".to_string(), "zeta".to_string()]);
    }

    #[tokio::test]
    async fn test_configured_types_reflect_settings() {
        let unconfigured = LocalBackend::named("blank").with_settings(BackendSettings::new());
        let registry = BackendRegistryBuilder::new()
            .with_backend(LocalBackend::new())
            .with_backend(unconfigured)
            .build();

        assert_eq!(registry.configured_types().await, vec!["local".to_string()]);

        registry
            .get("blank")
            .unwrap()
            .configure(BackendSettings::new().with("path", "/tmp"))
            .await
            .unwrap();

        assert_eq!(
            registry.configured_types().await,
            vec!["blank".to_string(), "local".to_string()]
        );
    }
}
