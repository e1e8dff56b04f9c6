//! Common types used across the personal data store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dri::Dri;

/// Maps a minted identifier to the backend type that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingEntry {
    /// Identifier returned by the backend at save time
    pub dri: Dri,

    /// Registered backend type that holds the payload
    pub backend_type: String,

    /// When the route was recorded
    pub created_at: DateTime<Utc>,
}

impl RoutingEntry {
    /// Create a routing entry stamped with the current time
    pub fn new(dri: Dri, backend_type: impl Into<String>) -> Self {
        Self {
            dri,
            backend_type: backend_type.into(),
            created_at: Utc::now(),
        }
    }
}

/// Opaque per-backend configuration
///
/// Updates are merged key by key into the existing object, never replacing it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendSettings(Map<String, Value>);

impl BackendSettings {
    /// Create empty settings
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Add a key-value pair (builder pattern)
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Merge another settings object into this one; incoming keys win
    pub fn merge(&mut self, other: BackendSettings) {
        for (key, value) in other.0 {
            self.0.insert(key, value);
        }
    }

    /// Get a value by key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Get a string value by key
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow as a JSON object
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for BackendSettings {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for BackendSettings {
    type Error = crate::PdsError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(crate::PdsError::MalformedInput(format!(
                "Backend settings must be a JSON object, got {}",
                other
            ))),
        }
    }
}

/// Raw record as returned by a backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Stored content, exactly as saved
    pub content: String,

    /// Stored metadata (usually a JSON document)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
}

impl RawRecord {
    /// Create a raw record without metadata
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: None,
        }
    }

    /// Attach metadata
    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }
}

/// A raw record together with its identifier, as returned by table scans
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub dri: Dri,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
}

impl StoredRecord {
    pub fn new(dri: Dri, record: RawRecord) -> Self {
        Self {
            dri,
            content: record.content,
            metadata: record.metadata,
        }
    }

    /// Decode content and metadata leniently
    pub fn into_loaded(self) -> LoadedRecord {
        LoadedRecord {
            content: decode_lenient(&self.content),
            metadata: self.metadata.as_deref().map(decode_lenient),
            dri: self.dri,
        }
    }

    /// Read a top-level string field from the metadata document, if any
    pub fn metadata_field(&self, key: &str) -> Option<String> {
        let metadata = self.metadata.as_deref()?;
        let parsed: Value = serde_json::from_str(metadata).ok()?;
        parsed.get(key).and_then(Value::as_str).map(str::to_string)
    }
}

/// A record after best-effort decoding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedRecord {
    /// Identifier the record was loaded by
    pub dri: Dri,

    /// Parsed content, or the raw string when it is not JSON
    pub content: Value,

    /// Parsed metadata, when requested and present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Best-effort structured decode: JSON if it parses, the raw string otherwise
///
/// A parse failure is not an error; stored content may legitimately be plain text.
pub fn decode_lenient(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
