//! Local In-Memory Backend
//!
//! Content-addressed storage in process memory. Identifiers are minted with
//! the DRI codec, so saving the same payload twice yields the same DRI.
//! Implements every optional capability except the usage policy, which is
//! only available when one is supplied at construction.

use async_trait::async_trait;
use pds_core::{BackendSettings, Dri, RawRecord, StoredRecord};
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::backend::{Capability, CapabilitySet, StorageBackend};
use crate::error::{BackendError, Result};

/// Default type name of the local backend
pub const LOCAL_BACKEND_TYPE: &str = "local";

/// Metadata key naming the table a record belongs to
pub const TABLE_KEY: &str = "table";

/// Metadata key naming the schema a record conforms to
pub const SCHEMA_KEY: &str = "oca_schema_dri";

/// In-memory storage backend
pub struct LocalBackend {
    backend_type: String,
    records: RwLock<HashMap<Dri, RawRecord>>,
    links: RwLock<HashMap<Dri, BTreeSet<Dri>>>,
    settings: RwLock<BackendSettings>,
    usage_policy: Option<String>,
}

impl LocalBackend {
    /// Create the default local backend
    pub fn new() -> Self {
        Self::named(LOCAL_BACKEND_TYPE)
    }

    /// Create a local backend registered under a different type name
    pub fn named(backend_type: impl Into<String>) -> Self {
        Self {
            backend_type: backend_type.into(),
            records: RwLock::new(HashMap::new()),
            links: RwLock::new(HashMap::new()),
            settings: RwLock::new(BackendSettings::new().with("no_configuration_needed", "yes")),
            usage_policy: None,
        }
    }

    /// Replace the initial settings
    pub fn with_settings(mut self, settings: BackendSettings) -> Self {
        self.settings = RwLock::new(settings);
        self
    }

    /// Advertise a usage policy for data held here
    pub fn with_usage_policy(mut self, policy: impl Into<String>) -> Self {
        self.usage_policy = Some(policy.into());
        self
    }

    /// Number of stored records
    pub async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }

    /// Records `dri` has been linked to
    pub async fn linked(&self, dri: &Dri) -> Vec<Dri> {
        self.links
            .read()
            .await
            .get(dri)
            .map(|targets| targets.iter().cloned().collect())
            .unwrap_or_default()
    }

    async fn scan<F>(&self, predicate: F) -> Vec<StoredRecord>
    where
        F: Fn(&StoredRecord) -> bool,
    {
        let records = self.records.read().await;
        let mut matched: Vec<StoredRecord> = records
            .iter()
            .map(|(dri, record)| StoredRecord::new(dri.clone(), record.clone()))
            .filter(|record| predicate(record))
            .collect();
        matched.sort_by(|a, b| a.dri.cmp(&b.dri));
        matched
    }
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn backend_type(&self) -> &str {
        &self.backend_type
    }

    fn description(&self) -> &str {
        "local in-memory storage"
    }

    fn capabilities(&self) -> CapabilitySet {
        let set = CapabilitySet::required()
            .with(Capability::LoadMultiple)
            .with(Capability::Link)
            .with(Capability::Delete);
        if self.usage_policy.is_some() {
            set.with(Capability::UsagePolicy)
        } else {
            set
        }
    }

    fn preview_settings(&self) -> BackendSettings {
        BackendSettings::new()
            .with("oca_schema_namespace", "pds")
            .with(SCHEMA_KEY, "3Fb68s1EPcX4HZhhT23HXrYpuMfcZdreD8xNmEMDc6nC")
    }

    async fn settings(&self) -> BackendSettings {
        self.settings.read().await.clone()
    }

    async fn configure(&self, update: BackendSettings) -> Result<()> {
        self.settings.write().await.merge(update);
        Ok(())
    }

    async fn save(&self, payload: &str, metadata: Option<&str>) -> Result<Dri> {
        let dri = Dri::encode_str(payload);
        let mut record = RawRecord::new(payload);
        record.metadata = metadata.map(str::to_string);

        self.records.write().await.insert(dri.clone(), record);
        debug!(backend_type = %self.backend_type, dri = %dri, "Saved record");
        Ok(dri)
    }

    async fn load(&self, dri: &Dri) -> Result<Option<RawRecord>> {
        Ok(self.records.read().await.get(dri).cloned())
    }

    async fn load_table(&self, table: &str) -> Result<Vec<StoredRecord>> {
        Ok(self
            .scan(|record| record.metadata_field(TABLE_KEY).as_deref() == Some(table))
            .await)
    }

    async fn load_multiple(
        &self,
        table: Option<&str>,
        oca_schema_base_dri: Option<&str>,
    ) -> Result<Vec<StoredRecord>> {
        Ok(self
            .scan(|record| {
                let table_ok = table.map_or(true, |t| record.metadata_field(TABLE_KEY).as_deref() == Some(t));
                let schema_ok = oca_schema_base_dri
                    .map_or(true, |s| record.metadata_field(SCHEMA_KEY).as_deref() == Some(s));
                table_ok && schema_ok
            })
            .await)
    }

    async fn link(&self, dri: &Dri, targets: &[Dri]) -> Result<bool> {
        if !self.records.read().await.contains_key(dri) {
            debug!(dri = %dri, "Link source not stored");
            return Ok(false);
        }

        let mut links = self.links.write().await;
        links.entry(dri.clone()).or_default().extend(targets.iter().cloned());
        info!(dri = %dri, targets = targets.len(), "Linked record");
        Ok(true)
    }

    async fn delete(&self, dri: &Dri) -> Result<bool> {
        let removed = self.records.write().await.remove(dri).is_some();
        self.links.write().await.remove(dri);
        if removed {
            info!(backend_type = %self.backend_type, dri = %dri, "Deleted record");
        }
        Ok(removed)
    }

    async fn usage_policy(&self) -> Result<String> {
        self.usage_policy
            .clone()
            .ok_or(BackendError::Unsupported(Capability::UsagePolicy))
    }
}
