//! Personal data store facade
//!
//! The only entry point the rest of the agent uses for payload storage.
//! Writes go to the active backend and record a route; reads, deletes and
//! links follow the recorded route, so a later backend switch never
//! strands data written earlier.

use futures::future::join_all;
use pds_backends::{BackendError, BackendRegistry, Capability, StorageBackend};
use pds_backends::backends::local::{SCHEMA_KEY, TABLE_KEY};
use pds_core::{
    decode_lenient, BackendSettings, Dri, LoadedRecord, PdsError, RawRecord, Result, StoredRecord,
    REFERENCE_TAG,
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::routing::{RoutingTable, DEFAULT_ROUTE_CACHE_TTL};
use super::selector::BackendSelector;
use crate::storage::AgentStore;

/// Schema filter for [`PersonalDataStore::load_multiple`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultiFilter {
    /// No schema filter
    None,
    /// A single schema base DRI
    One(String),
    /// Several schema base DRIs, loaded concurrently
    Many(Vec<String>),
}

/// Result of [`PersonalDataStore::load_multiple`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MultiLoad {
    Single(Vec<LoadedRecord>),
    /// Keyed by schema base DRI
    Keyed(BTreeMap<String, Vec<LoadedRecord>>),
}

/// Link targets: one DRI or several
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTargets {
    One(Dri),
    Many(Vec<Dri>),
}

impl LinkTargets {
    pub fn into_vec(self) -> Vec<Dri> {
        match self {
            LinkTargets::One(dri) => vec![dri],
            LinkTargets::Many(dris) => dris,
        }
    }
}

impl From<Dri> for LinkTargets {
    fn from(dri: Dri) -> Self {
        LinkTargets::One(dri)
    }
}

impl From<Vec<Dri>> for LinkTargets {
    fn from(dris: Vec<Dri>) -> Self {
        LinkTargets::Many(dris)
    }
}

/// Per-key outcome of [`PersonalDataStore::save_keyed`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyedOutcome {
    Saved(Dri),
    Failed(String),
}

/// Snapshot of the registered backends
#[derive(Debug, Clone, Serialize)]
pub struct BackendsOverview {
    pub active: Option<String>,
    pub registered: Vec<String>,
    pub configured: Vec<String>,
    /// Settings keys each backend expects, keyed by backend type
    pub previews: BTreeMap<String, BackendSettings>,
}

/// Facade over the registry, selector and routing table
#[derive(Clone)]
pub struct PersonalDataStore {
    registry: Arc<BackendRegistry>,
    selector: BackendSelector,
    routes: RoutingTable,
}

impl PersonalDataStore {
    pub fn new(registry: Arc<BackendRegistry>, store: Arc<dyn AgentStore>) -> Self {
        Self::with_route_cache_ttl(registry, store, DEFAULT_ROUTE_CACHE_TTL)
    }

    /// Facade whose routing table caches routes for `ttl`; zero disables
    /// the cache
    pub fn with_route_cache_ttl(registry: Arc<BackendRegistry>, store: Arc<dyn AgentStore>, ttl: Duration) -> Self {
        Self {
            selector: BackendSelector::new(registry.clone(), store.clone()),
            routes: RoutingTable::with_cache_ttl(registry.clone(), store, ttl),
            registry,
        }
    }

    pub fn selector(&self) -> &BackendSelector {
        &self.selector
    }

    pub fn routes(&self) -> &RoutingTable {
        &self.routes
    }

    // =========================================================================
    // Save
    // =========================================================================

    /// Save a payload to the active backend and record its route
    pub async fn save(&self, payload: &str, metadata: Option<&Value>) -> Result<Dri> {
        let (backend_type, backend) = self.selector.active().await?;
        let metadata = metadata.map(serde_json::to_string).transpose()?;

        let dri = backend.save(payload, metadata.as_deref()).await?;
        self.routes.record_route(&dri, &backend_type).await?;

        info!(dri = %dri, backend_type = %backend_type, "Saved payload");
        Ok(dri)
    }

    /// Save a JSON value as compact JSON text
    ///
    /// Object keys serialize in sorted order, so equal values mint equal
    /// identifiers on content-addressed backends. Loading the identifier
    /// returns an equal value; use [`save`](Self::save) to store raw text.
    pub async fn save_value(&self, value: &Value, metadata: Option<&Value>) -> Result<Dri> {
        self.save(&serialize_payload(value)?, metadata).await
    }

    /// Save a JSON value tagged with a table and, optionally, a schema
    pub async fn save_in_table(&self, value: &Value, table: &str, schema: Option<&str>) -> Result<Dri> {
        let mut metadata = Map::new();
        metadata.insert(TABLE_KEY.to_string(), json!(table));
        if let Some(schema) = schema {
            metadata.insert(SCHEMA_KEY.to_string(), json!(schema));
        }
        self.save_value(value, Some(&Value::Object(metadata))).await
    }

    /// Save each value under its `DRI:<schema>` key
    ///
    /// A bad key or a failed save is reported for that key only; the rest
    /// of the batch is still saved.
    pub async fn save_keyed(&self, entries: Map<String, Value>) -> BTreeMap<String, KeyedOutcome> {
        let mut outcomes = BTreeMap::new();

        for (key, value) in entries {
            let outcome = match key.strip_prefix(REFERENCE_TAG).filter(|s| !s.is_empty()) {
                None => {
                    warn!(key = %key, "Rejected keyed save: key must be DRI:<schema>");
                    KeyedOutcome::Failed(format!(
                        "Invalid key '{}': expected {}<schema>",
                        key, REFERENCE_TAG
                    ))
                }
                Some(schema) => {
                    let metadata = json!({ SCHEMA_KEY: schema });
                    match self.save_value(&value, Some(&metadata)).await {
                        Ok(dri) => KeyedOutcome::Saved(dri),
                        Err(e) => {
                            warn!(key = %key, error = %e, "Keyed save failed");
                            KeyedOutcome::Failed(e.to_string())
                        }
                    }
                }
            };
            outcomes.insert(key, outcome);
        }

        outcomes
    }

    // =========================================================================
    // Load
    // =========================================================================

    /// Load the raw stored record through its route
    pub async fn load_raw(&self, dri: &Dri) -> Result<RawRecord> {
        let backend = self.routed_backend(dri).await?;
        backend
            .load(dri)
            .await?
            .ok_or_else(|| PdsError::not_found(format!("Backend holds no payload for {}", dri)))
    }

    /// Load and decode content, dropping metadata
    pub async fn load(&self, dri: &Dri) -> Result<LoadedRecord> {
        let mut record = self.load_with_meta(dri).await?;
        record.metadata = None;
        Ok(record)
    }

    /// Load and decode content and metadata
    pub async fn load_with_meta(&self, dri: &Dri) -> Result<LoadedRecord> {
        let raw = self.load_raw(dri).await?;
        debug!(dri = %dri, "Loaded payload");
        Ok(LoadedRecord {
            dri: dri.clone(),
            content: decode_lenient(&raw.content),
            metadata: raw.metadata.as_deref().map(decode_lenient),
        })
    }

    /// Every record of `table` in the active backend
    pub async fn load_table(&self, table: &str) -> Result<Vec<LoadedRecord>> {
        let (_, backend) = self.selector.active().await?;
        let records = backend.load_table(table).await?;
        Ok(records.into_iter().map(StoredRecord::into_loaded).collect())
    }

    /// Records from the active backend filtered by table and schema
    pub async fn load_multiple(&self, table: Option<&str>, filter: MultiFilter) -> Result<MultiLoad> {
        let (backend_type, backend) = self.selector.active().await?;
        if !backend.capabilities().supports(Capability::LoadMultiple) {
            return Err(PdsError::configuration(format!(
                "Backend '{}' does not support {}",
                backend_type,
                Capability::LoadMultiple
            )));
        }

        match filter {
            MultiFilter::None => Ok(MultiLoad::Single(load_filtered(&backend, table, None).await?)),
            MultiFilter::One(schema) => Ok(MultiLoad::Single(
                load_filtered(&backend, table, Some(schema.as_str())).await?,
            )),
            MultiFilter::Many(schemas) => {
                let loads = schemas
                    .iter()
                    .map(|schema| load_filtered(&backend, table, Some(schema.as_str())));
                let results = join_all(loads).await;

                let mut keyed = BTreeMap::new();
                for (schema, result) in schemas.into_iter().zip(results) {
                    keyed.insert(schema, result?);
                }
                Ok(MultiLoad::Keyed(keyed))
            }
        }
    }

    // =========================================================================
    // Delete and Link
    // =========================================================================

    /// Delete a record through its route and forget the route
    pub async fn delete(&self, dri: &Dri) -> Result<bool> {
        let backend = self.routed_backend(dri).await?;
        if !backend.capabilities().supports(Capability::Delete) {
            return Err(BackendError::Unsupported(Capability::Delete).into());
        }

        let removed = backend.delete(dri).await?;
        self.routes.remove_route(dri).await?;
        info!(dri = %dri, removed, "Deleted payload");
        Ok(removed)
    }

    /// Link a record to one or more others
    ///
    /// Returns `false` instead of failing when the record has no route, the
    /// backend lacks the capability, or the backend call fails.
    pub async fn link(&self, dri: &Dri, targets: impl Into<LinkTargets>) -> bool {
        let targets = targets.into().into_vec();

        let backend = match self.routed_backend(dri).await {
            Ok(backend) => backend,
            Err(e) => {
                warn!(dri = %dri, error = %e, "Cannot link unrouted record");
                return false;
            }
        };

        if !backend.capabilities().supports(Capability::Link) {
            info!(dri = %dri, backend_type = %backend.backend_type(), "Backend does not support linking");
            return false;
        }

        match backend.link(dri, &targets).await {
            Ok(linked) => linked,
            Err(e) => {
                warn!(dri = %dri, error = %e, "Link failed");
                false
            }
        }
    }

    // =========================================================================
    // Usage policy and backend administration
    // =========================================================================

    /// Usage policy of the active backend, when it offers one
    pub async fn usage_policy_if_supported(&self) -> Option<String> {
        let (backend_type, backend) = match self.selector.active().await {
            Ok(active) => active,
            Err(e) => {
                warn!(error = %e, "No active backend to ask for a usage policy");
                return None;
            }
        };

        if !backend.capabilities().supports(Capability::UsagePolicy) {
            debug!(backend_type = %backend_type, "Backend has no usage policy");
            return None;
        }

        match backend.usage_policy().await {
            Ok(policy) => Some(policy),
            Err(e) => {
                warn!(backend_type = %backend_type, error = %e, "Failed to fetch usage policy");
                None
            }
        }
    }

    /// Active, registered and configured backend types with setting previews
    pub async fn describe_backends(&self) -> Result<BackendsOverview> {
        let previews = self
            .registry
            .iter()
            .map(|(name, backend)| (name.to_string(), backend.preview_settings()))
            .collect();

        Ok(BackendsOverview {
            active: self.selector.active_type().await?,
            registered: self.registry.registered_types(),
            configured: self.registry.configured_types().await,
            previews,
        })
    }

    /// Current settings of every registered backend
    pub async fn backend_settings(&self) -> BTreeMap<String, BackendSettings> {
        let mut settings = BTreeMap::new();
        for (name, backend) in self.registry.iter() {
            settings.insert(name.to_string(), backend.settings().await);
        }
        settings
    }

    /// Merge settings into each named backend
    ///
    /// Every name is checked before any settings are applied.
    pub async fn configure_backends(&self, updates: BTreeMap<String, BackendSettings>) -> Result<()> {
        if let Some(unknown) = updates.keys().find(|name| !self.registry.contains(name.as_str())) {
            return Err(PdsError::configuration(format!(
                "Cannot configure unregistered backend '{}'",
                unknown
            )));
        }

        for (name, update) in updates {
            self.registry.get(&name)?.configure(update).await?;
            info!(backend_type = %name, "Backend settings updated");
        }
        Ok(())
    }

    async fn routed_backend(&self, dri: &Dri) -> Result<Arc<dyn StorageBackend>> {
        let backend_type = self.routes.resolve(dri).await?;
        Ok(self.registry.get(&backend_type)?)
    }
}

/// Compact JSON text of `value`
///
/// Strings are quoted like any other value, so a string that happens to be
/// valid JSON text still loads back as a string.
fn serialize_payload(value: &Value) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

async fn load_filtered(
    backend: &Arc<dyn StorageBackend>,
    table: Option<&str>,
    schema: Option<&str>,
) -> Result<Vec<LoadedRecord>> {
    let records = backend.load_multiple(table, schema).await?;
    Ok(records.into_iter().map(StoredRecord::into_loaded).collect())
}
