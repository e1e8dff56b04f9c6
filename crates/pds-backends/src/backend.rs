//! Storage backend contract
//!
//! Every backend implements the required capabilities (`save`, `load`,
//! `load_table`). The optional ones (`load_multiple`, `link`, `delete`,
//! `usage_policy`) have default bodies that return
//! [`BackendError::Unsupported`]; a backend that implements one must also
//! advertise it through [`StorageBackend::capabilities`] so callers can
//! probe before calling.

use async_trait::async_trait;
use pds_core::{BackendSettings, Dri, RawRecord, StoredRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::{BackendError, Result};

/// One operation in the backend contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Save,
    Load,
    LoadTable,
    LoadMultiple,
    Link,
    Delete,
    UsagePolicy,
}

impl Capability {
    /// Capabilities every backend must provide
    pub const REQUIRED: [Capability; 3] = [Capability::Save, Capability::Load, Capability::LoadTable];

    pub fn is_required(&self) -> bool {
        Self::REQUIRED.contains(self)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Save => "save",
            Capability::Load => "load",
            Capability::LoadTable => "load_table",
            Capability::LoadMultiple => "load_multiple",
            Capability::Link => "link",
            Capability::Delete => "delete",
            Capability::UsagePolicy => "usage_policy",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of capabilities a backend advertises
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    /// Only the required capabilities
    pub fn required() -> Self {
        Self(Capability::REQUIRED.into_iter().collect())
    }

    /// Add an optional capability (builder pattern)
    pub fn with(mut self, capability: Capability) -> Self {
        self.0.insert(capability);
        self
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.0.iter()
    }
}

impl Default for CapabilitySet {
    fn default() -> Self {
        Self::required()
    }
}

/// Trait for storage backends
///
/// Implementations are registered once at startup and shared behind an
/// `Arc`, so all methods take `&self`; mutable state such as settings lives
/// behind interior locks.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Type name this backend is registered and routed under
    fn backend_type(&self) -> &str;

    /// Get a description of this backend (for logging)
    fn description(&self) -> &str {
        "storage backend"
    }

    /// Capabilities this backend implements
    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::required()
    }

    /// Settings keys shown to operators before configuration
    fn preview_settings(&self) -> BackendSettings {
        BackendSettings::new()
    }

    /// Current settings
    async fn settings(&self) -> BackendSettings;

    /// Merge `update` into the current settings
    async fn configure(&self, update: BackendSettings) -> Result<()>;

    /// Store a payload and return the identifier it can be loaded by
    async fn save(&self, payload: &str, metadata: Option<&str>) -> Result<Dri>;

    /// Load a payload; `Ok(None)` when the identifier is unknown
    async fn load(&self, dri: &Dri) -> Result<Option<RawRecord>>;

    /// Every record whose metadata places it in `table`
    async fn load_table(&self, table: &str) -> Result<Vec<StoredRecord>>;

    /// Records filtered by table and/or schema
    async fn load_multiple(
        &self,
        _table: Option<&str>,
        _oca_schema_base_dri: Option<&str>,
    ) -> Result<Vec<StoredRecord>> {
        Err(BackendError::Unsupported(Capability::LoadMultiple))
    }

    /// Link a record to other records
    async fn link(&self, _dri: &Dri, _targets: &[Dri]) -> Result<bool> {
        Err(BackendError::Unsupported(Capability::Link))
    }

    /// Delete a record; `Ok(false)` when nothing was stored under `dri`
    async fn delete(&self, _dri: &Dri) -> Result<bool> {
        Err(BackendError::Unsupported(Capability::Delete))
    }

    /// Usage policy document attached to data held by this backend
    async fn usage_policy(&self) -> Result<String> {
        Err(BackendError::Unsupported(Capability::UsagePolicy))
    }
}
