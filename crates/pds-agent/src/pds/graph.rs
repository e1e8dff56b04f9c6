//! Reference graph resolution
//!
//! Stored records may embed `DRI:<dri>` strings pointing at other records.
//! Resolution replaces each such string with the referenced content,
//! recursively. Each record is loaded at most once per walk and later
//! references to it reuse that result, so shared sub-graphs cost one load.
//! A reference that would revisit one of its own ancestors, sits deeper
//! than the depth bound, or comes after the load budget is spent is left as
//! the reference string.

use futures::future::BoxFuture;
use futures::FutureExt;
use pds_core::Dri;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, warn};

use super::facade::PersonalDataStore;

/// Default nesting bound for [`PersonalDataStore::resolve_graph`]
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Default number of records one [`PersonalDataStore::resolve_graph`] loads
pub const DEFAULT_MAX_LOADS: usize = 1024;

/// Bounds on one graph resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphLimits {
    /// Longest chain of nested references followed
    pub max_depth: usize,
    /// Records loaded in total
    pub max_loads: usize,
}

impl Default for GraphLimits {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_loads: DEFAULT_MAX_LOADS,
        }
    }
}

#[derive(Debug)]
struct Walk {
    limits: GraphLimits,
    ancestors: Vec<Dri>,
    /// Result for every reference already followed, including failed ones
    resolved: HashMap<Dri, Value>,
    loads: usize,
}

impl Walk {
    fn new(limits: GraphLimits) -> Self {
        Self {
            limits,
            ancestors: Vec::new(),
            resolved: HashMap::new(),
            loads: 0,
        }
    }
}

impl PersonalDataStore {
    /// Replace every `DRI:<dri>` reference in `value` with its content
    pub async fn resolve_graph(&self, value: &Value) -> Value {
        self.resolve_graph_with(value, GraphLimits::default()).await
    }

    /// Like [`resolve_graph`](Self::resolve_graph) with explicit bounds
    pub async fn resolve_graph_with(&self, value: &Value, limits: GraphLimits) -> Value {
        let mut walk = Walk::new(limits);
        let resolved = self.walk(value, &mut walk).await;
        debug!(loads = walk.loads, records = walk.resolved.len(), "Reference graph resolved");
        resolved
    }

    fn walk<'a>(&'a self, value: &'a Value, walk: &'a mut Walk) -> BoxFuture<'a, Value> {
        async move {
            match value {
                Value::String(text) => match Dri::from_reference(text) {
                    Some(dri) => self.follow(dri, text, walk).await,
                    None => value.clone(),
                },
                Value::Array(items) => {
                    let mut resolved = Vec::with_capacity(items.len());
                    for item in items {
                        resolved.push(self.walk(item, walk).await);
                    }
                    Value::Array(resolved)
                }
                Value::Object(fields) => {
                    let mut resolved = Map::new();
                    for (key, field) in fields {
                        resolved.insert(key.clone(), self.walk(field, walk).await);
                    }
                    Value::Object(resolved)
                }
                other => other.clone(),
            }
        }
        .boxed()
    }

    async fn follow(&self, dri: Dri, reference: &str, walk: &mut Walk) -> Value {
        if walk.ancestors.contains(&dri) {
            warn!(dri = %dri, "Reference cycle detected; leaving reference in place");
            return Value::String(reference.to_string());
        }
        if let Some(resolved) = walk.resolved.get(&dri) {
            return resolved.clone();
        }
        if walk.ancestors.len() >= walk.limits.max_depth {
            warn!(dri = %dri, max_depth = walk.limits.max_depth, "Reference depth bound reached");
            return Value::String(reference.to_string());
        }
        if walk.loads >= walk.limits.max_loads {
            warn!(dri = %dri, max_loads = walk.limits.max_loads, "Reference load budget spent");
            return Value::String(reference.to_string());
        }

        walk.loads += 1;
        let resolved = match self.load(&dri).await {
            Ok(record) => {
                debug!(dri = %dri, depth = walk.ancestors.len(), "Resolved reference");
                walk.ancestors.push(dri.clone());
                let resolved = self.walk(&record.content, walk).await;
                walk.ancestors.pop();
                resolved
            }
            Err(e) => {
                warn!(dri = %dri, error = %e, "Unresolvable reference left in place");
                Value::String(reference.to_string())
            }
        };

        walk.resolved.insert(dri, resolved.clone());
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use pds_backends::backends::LocalBackend;
    use pds_backends::{BackendRegistryBuilder, StorageBackend};
    use pds_core::{BackendSettings, RawRecord, StoredRecord};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    async fn pds() -> PersonalDataStore {
        let registry = BackendRegistryBuilder::new().with_backend(LocalBackend::new()).build();
        let pds = PersonalDataStore::new(Arc::new(registry), Arc::new(MemoryStore::new()));
        pds.selector().set_active("local").await.unwrap();
        pds
    }

    #[tokio::test]
    async fn test_nested_references_resolve() {
        let pds = pds().await;
        let leaf = pds.save_value(&json!({"city": "Berlin"}), None).await.unwrap();
        let mid = pds
            .save_value(&json!({"address": leaf.to_reference()}), None)
            .await
            .unwrap();

        let resolved = pds
            .resolve_graph(&json!({"person": mid.to_reference(), "tags": [leaf.to_reference(), 1]}))
            .await;

        assert_eq!(
            resolved,
            json!({
                "person": {"address": {"city": "Berlin"}},
                "tags": [{"city": "Berlin"}, 1]
            })
        );
    }

    #[tokio::test]
    async fn test_unresolvable_reference_kept() {
        let pds = pds().await;
        let reference = Dri::encode_str("never saved").to_reference();
        let resolved = pds.resolve_graph(&json!({"x": reference.clone()})).await;
        assert_eq!(resolved, json!({"x": reference}));
    }

    /// Serves a record that points back at itself for every identifier
    struct CyclicBackend;

    #[async_trait::async_trait]
    impl StorageBackend for CyclicBackend {
        fn backend_type(&self) -> &str {
            "cyclic"
        }

        async fn settings(&self) -> BackendSettings {
            BackendSettings::new()
        }

        async fn configure(&self, _update: BackendSettings) -> pds_backends::Result<()> {
            Ok(())
        }

        async fn save(&self, _payload: &str, _metadata: Option<&str>) -> pds_backends::Result<Dri> {
            Ok(Dri::from_backend("loop"))
        }

        async fn load(&self, dri: &Dri) -> pds_backends::Result<Option<RawRecord>> {
            Ok(Some(RawRecord::new(
                json!({"name": "node", "next": dri.to_reference()}).to_string(),
            )))
        }

        async fn load_table(&self, _table: &str) -> pds_backends::Result<Vec<StoredRecord>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_cycle_terminates() {
        let registry = BackendRegistryBuilder::new().with_backend(CyclicBackend).build();
        let pds = PersonalDataStore::new(Arc::new(registry), Arc::new(MemoryStore::new()));
        pds.selector().set_active("cyclic").await.unwrap();

        let dri = pds.save("anything", None).await.unwrap();
        let resolved = pds.resolve_graph(&json!(dri.to_reference())).await;

        assert_eq!(resolved["name"], json!("node"));
        assert_eq!(resolved["next"], json!("DRI:loop"));
    }

    #[tokio::test]
    async fn test_depth_bound() {
        let pds = pds().await;
        let mut reference = pds.save("bottom", None).await.unwrap().to_reference();
        for _ in 0..5 {
            reference = pds
                .save_value(&json!({"down": reference}), None)
                .await
                .unwrap()
                .to_reference();
        }

        let limits = GraphLimits {
            max_depth: 2,
            ..Default::default()
        };
        let shallow = pds.resolve_graph_with(&json!(reference.clone()), limits).await;
        assert!(shallow["down"]["down"].is_string());
        assert!(shallow["down"]["down"].as_str().unwrap().starts_with("DRI:"));

        let deep = pds.resolve_graph(&json!(reference)).await;
        let mut cursor = &deep;
        for _ in 0..5 {
            cursor = &cursor["down"];
        }
        assert_eq!(cursor, &json!("bottom"));
    }

    /// Local backend that counts loads
    struct CountingBackend {
        inner: LocalBackend,
        loads: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl StorageBackend for CountingBackend {
        fn backend_type(&self) -> &str {
            self.inner.backend_type()
        }

        async fn settings(&self) -> BackendSettings {
            self.inner.settings().await
        }

        async fn configure(&self, update: BackendSettings) -> pds_backends::Result<()> {
            self.inner.configure(update).await
        }

        async fn save(&self, payload: &str, metadata: Option<&str>) -> pds_backends::Result<Dri> {
            self.inner.save(payload, metadata).await
        }

        async fn load(&self, dri: &Dri) -> pds_backends::Result<Option<RawRecord>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.inner.load(dri).await
        }

        async fn load_table(&self, table: &str) -> pds_backends::Result<Vec<StoredRecord>> {
            self.inner.load_table(table).await
        }
    }

    async fn counting_pds() -> (PersonalDataStore, Arc<AtomicUsize>) {
        let loads = Arc::new(AtomicUsize::new(0));
        let backend = CountingBackend {
            inner: LocalBackend::new(),
            loads: loads.clone(),
        };
        let registry = BackendRegistryBuilder::new().with_backend(backend).build();
        let pds = PersonalDataStore::new(Arc::new(registry), Arc::new(MemoryStore::new()));
        pds.selector().set_active("local").await.unwrap();
        (pds, loads)
    }

    #[tokio::test]
    async fn test_shared_references_load_once() {
        let (pds, loads) = counting_pds().await;

        // 17 records, each pointing twice at the one below
        let mut reference = pds.save("leaf", None).await.unwrap().to_reference();
        for _ in 0..16 {
            reference = pds
                .save_value(&json!({"l": reference, "r": reference}), None)
                .await
                .unwrap()
                .to_reference();
        }

        let resolved = pds.resolve_graph(&json!(reference)).await;
        assert_eq!(loads.load(Ordering::SeqCst), 17);

        let mut left = &resolved;
        let mut right = &resolved;
        for _ in 0..16 {
            left = &left["l"];
            right = &right["r"];
        }
        assert_eq!(left, &json!("leaf"));
        assert_eq!(right, &json!("leaf"));
    }

    #[tokio::test]
    async fn test_load_budget() {
        let (pds, loads) = counting_pds().await;
        let mut reference = pds.save("bottom", None).await.unwrap().to_reference();
        for _ in 0..5 {
            reference = pds
                .save_value(&json!({"down": reference}), None)
                .await
                .unwrap()
                .to_reference();
        }

        let limits = GraphLimits {
            max_loads: 2,
            ..Default::default()
        };
        let resolved = pds.resolve_graph_with(&json!(reference), limits).await;

        assert_eq!(loads.load(Ordering::SeqCst), 2);
        assert!(resolved["down"].is_object());
        assert!(resolved["down"]["down"].as_str().unwrap().starts_with("DRI:"));
    }
}
