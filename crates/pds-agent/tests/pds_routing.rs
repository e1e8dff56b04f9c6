//! PDS Routing Tests
//!
//! These tests verify the personal data store across several backends:
//! - Reads follow the route recorded at save time, not the active backend
//! - Failed lookups and refused selections leave state untouched
//! - Optional capabilities degrade per backend

use async_trait::async_trait;
use pds_agent::pds::{KeyedOutcome, MultiFilter, MultiLoad, PersonalDataStore};
use pds_agent::MemoryStore;
use pds_backends::backends::LocalBackend;
use pds_backends::{BackendRegistryBuilder, StorageBackend};
use pds_core::{BackendSettings, Dri, PdsError, RawRecord, StoredRecord};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

// =============================================================================
// Test Helpers
// =============================================================================

/// Backend offering only the required capabilities
#[derive(Default)]
struct BareBackend {
    records: RwLock<HashMap<Dri, RawRecord>>,
}

#[async_trait]
impl StorageBackend for BareBackend {
    fn backend_type(&self) -> &str {
        "bare"
    }

    async fn settings(&self) -> BackendSettings {
        BackendSettings::new()
    }

    async fn configure(&self, _update: BackendSettings) -> pds_backends::Result<()> {
        Ok(())
    }

    async fn save(&self, payload: &str, _metadata: Option<&str>) -> pds_backends::Result<Dri> {
        let dri = Dri::encode_str(payload);
        self.records.write().await.insert(dri.clone(), RawRecord::new(payload));
        Ok(dri)
    }

    async fn load(&self, dri: &Dri) -> pds_backends::Result<Option<RawRecord>> {
        Ok(self.records.read().await.get(dri).cloned())
    }

    async fn load_table(&self, _table: &str) -> pds_backends::Result<Vec<StoredRecord>> {
        Ok(Vec::new())
    }
}

async fn pds() -> PersonalDataStore {
    let registry = BackendRegistryBuilder::new()
        .with_backend(LocalBackend::new())
        .with_backend(LocalBackend::named("archive"))
        .with_backend(BareBackend::default())
        .build();
    let pds = PersonalDataStore::new(Arc::new(registry), Arc::new(MemoryStore::new()));
    pds.selector().set_active("local").await.unwrap();
    pds
}

// =============================================================================
// Routing
// =============================================================================

#[tokio::test]
async fn test_reads_follow_route_across_backend_switch() {
    let pds = pds().await;

    let first = pds.save("written to local", None).await.unwrap();
    pds.selector().set_active("archive").await.unwrap();
    let second = pds.save("written to archive", None).await.unwrap();

    assert_eq!(pds.routes().resolve(&first).await.unwrap(), "local");
    assert_eq!(pds.routes().resolve(&second).await.unwrap(), "archive");

    assert_eq!(pds.load(&first).await.unwrap().content, json!("written to local"));
    assert_eq!(pds.load(&second).await.unwrap().content, json!("written to archive"));
    assert_eq!(pds.routes().route_count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_same_payload_saved_twice_keeps_one_route() {
    let pds = pds().await;

    let a = pds.save_value(&json!({"k": 1}), None).await.unwrap();
    let b = pds.save_value(&json!({"k": 1}), None).await.unwrap();

    assert_eq!(a, b);
    assert_eq!(a, Dri::encode_str(r#"{"k":1}"#));
    assert_eq!(pds.routes().route_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_unknown_dri_leaves_routes_unchanged() {
    let pds = pds().await;
    pds.save("something", None).await.unwrap();

    let err = pds.load(&Dri::encode_str("never saved")).await.unwrap_err();
    assert!(matches!(err, PdsError::NotFound(_)));
    assert_eq!(pds.routes().route_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_unregistered_backend_selection_refused() {
    let pds = pds().await;

    let err = pds.selector().set_active("s3").await.unwrap_err();
    assert!(matches!(err, PdsError::Configuration(_)));
    assert_eq!(pds.selector().active_type().await.unwrap().as_deref(), Some("local"));

    // Saves still land in the previous selection
    let dri = pds.save("after refusal", None).await.unwrap();
    assert_eq!(pds.routes().resolve(&dri).await.unwrap(), "local");
}

#[tokio::test]
async fn test_delete_forgets_route() {
    let pds = pds().await;
    let dri = pds.save("short lived", None).await.unwrap();

    assert!(pds.delete(&dri).await.unwrap());
    assert_eq!(pds.routes().route_count().await.unwrap(), 0);
    assert!(matches!(pds.load(&dri).await, Err(PdsError::NotFound(_))));
}

// =============================================================================
// Capabilities
// =============================================================================

#[tokio::test]
async fn test_link_on_backend_without_capability() {
    let pds = pds().await;
    pds.selector().set_active("bare").await.unwrap();

    let dri = pds.save("bare record", None).await.unwrap();
    let other = pds.save("other record", None).await.unwrap();

    assert!(!pds.link(&dri, other.clone()).await);

    // The record stays readable after the refused link
    assert_eq!(pds.load(&dri).await.unwrap().content, json!("bare record"));
}

#[tokio::test]
async fn test_link_on_local_backend() {
    let pds = pds().await;
    let dri = pds.save("source", None).await.unwrap();
    let a = pds.save("a", None).await.unwrap();
    let b = pds.save("b", None).await.unwrap();

    assert!(pds.link(&dri, vec![a, b]).await);
    assert!(!pds.link(&Dri::encode_str("unrouted"), dri).await);
}

#[tokio::test]
async fn test_delete_unsupported() {
    let pds = pds().await;
    pds.selector().set_active("bare").await.unwrap();
    let dri = pds.save("kept", None).await.unwrap();

    let err = pds.delete(&dri).await.unwrap_err();
    assert!(matches!(err, PdsError::Configuration(_)));
    assert_eq!(pds.routes().route_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_load_multiple_unsupported() {
    let pds = pds().await;
    pds.selector().set_active("bare").await.unwrap();

    let err = pds.load_multiple(None, MultiFilter::None).await.unwrap_err();
    assert!(matches!(err, PdsError::Configuration(_)));
}

// =============================================================================
// Keyed saves and multi-loads
// =============================================================================

#[tokio::test]
async fn test_save_keyed_then_load_multiple() {
    let pds = pds().await;

    let mut entries = Map::new();
    entries.insert("DRI:schema-a".into(), json!({"a": 1}));
    entries.insert("DRI:schema-b".into(), json!({"b": 2}));
    entries.insert("schema-c".into(), json!({"c": 3}));
    entries.insert("DRI:".into(), json!({"d": 4}));

    let outcomes = pds.save_keyed(entries).await;
    assert_eq!(outcomes.len(), 4);
    assert!(matches!(outcomes["DRI:schema-a"], KeyedOutcome::Saved(_)));
    assert!(matches!(outcomes["DRI:schema-b"], KeyedOutcome::Saved(_)));
    assert!(matches!(outcomes["schema-c"], KeyedOutcome::Failed(_)));
    assert!(matches!(outcomes["DRI:"], KeyedOutcome::Failed(_)));

    match pds.load_multiple(None, MultiFilter::One("schema-a".into())).await.unwrap() {
        MultiLoad::Single(records) => {
            assert_eq!(records.len(), 1);
            assert_eq!(records[0].content, json!({"a": 1}));
        }
        other => panic!("expected a single list, got {:?}", other),
    }

    let many = MultiFilter::Many(vec!["schema-a".into(), "schema-b".into(), "schema-x".into()]);
    match pds.load_multiple(None, many).await.unwrap() {
        MultiLoad::Keyed(by_schema) => {
            assert_eq!(by_schema["schema-a"].len(), 1);
            assert_eq!(by_schema["schema-b"][0].content, json!({"b": 2}));
            assert!(by_schema["schema-x"].is_empty());
        }
        other => panic!("expected keyed lists, got {:?}", other),
    }
}

#[tokio::test]
async fn test_graph_resolution_across_backends() {
    let pds = pds().await;
    let address = pds.save_value(&json!({"city": "Vienna"}), None).await.unwrap();

    pds.selector().set_active("archive").await.unwrap();
    let person = pds
        .save_value(&json!({"name": "Alice", "address": address.to_reference()}), None)
        .await
        .unwrap();

    let stored: Value = pds.load(&person).await.unwrap().content;
    let resolved = pds.resolve_graph(&stored).await;
    assert_eq!(resolved, json!({"name": "Alice", "address": {"city": "Vienna"}}));
}
