//! Storage abstraction for the agent
//!
//! This module provides a trait-based abstraction for agent state,
//! enabling both in-memory (default) and persistent (PostgreSQL) backends.
//!
//! The agent store holds the bookkeeping that must survive independently of
//! any storage backend:
//! - DRI routing entries (which backend holds which payload)
//! - The active backend selection
//! - Exchange records of every protocol

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pds_core::{
    Dri, ExchangeQuery, ExchangeRecord, ExchangeRole, ExchangeState, PdsError, Protocol, RoutingEntry,
};
use std::fmt::Debug;

/// Error type for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<StorageError> for PdsError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => PdsError::NotFound(what),
            StorageError::Serialization(msg) => PdsError::Serialization(msg),
            other => PdsError::Storage(other.to_string()),
        }
    }
}

/// Persisted form of an exchange record
///
/// The queryable fields are kept as columns; the full typed record is kept
/// as a JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeRow {
    pub id: String,
    /// Protocol name (`Protocol::NAME`)
    pub protocol: String,
    pub connection_id: String,
    pub thread_id: String,
    pub initiator: String,
    pub role: String,
    pub state: String,
    pub body: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExchangeRow {
    /// Flatten a typed record into a row
    pub fn from_record<P: Protocol>(record: &ExchangeRecord<P>) -> Result<Self, StorageError> {
        Ok(Self {
            id: record.id.clone(),
            protocol: P::NAME.to_string(),
            connection_id: record.connection_id.clone(),
            thread_id: record.thread_id.clone(),
            initiator: record.initiator.as_str().to_string(),
            role: record.role.as_str().to_string(),
            state: record.state.as_str().to_string(),
            body: serde_json::to_value(record)?,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }

    /// Rebuild the typed record from the JSON body
    pub fn into_record<P: Protocol>(self) -> Result<ExchangeRecord<P>, StorageError> {
        if self.protocol != P::NAME {
            return Err(StorageError::Serialization(format!(
                "Exchange {} belongs to protocol '{}', not '{}'",
                self.id,
                self.protocol,
                P::NAME
            )));
        }
        Ok(serde_json::from_value(self.body)?)
    }

    /// Whether the row satisfies every set field of the query
    pub fn matches(&self, query: &ExchangeQuery) -> bool {
        fn field_ok(filter: &Option<String>, actual: &str) -> bool {
            filter.as_deref().map_or(true, |wanted| wanted == actual)
        }

        field_ok(&query.connection_id, &self.connection_id)
            && field_ok(&query.thread_id, &self.thread_id)
            && field_ok(&query.initiator, &self.initiator)
            && field_ok(&query.role, &self.role)
            && field_ok(&query.state, &self.state)
    }
}

/// Storage trait for agent state
///
/// Implementations must be thread-safe and support concurrent access.
#[async_trait]
pub trait AgentStore: Send + Sync + Debug {
    // =========================================================================
    // DRI Routing
    // =========================================================================

    /// Insert or replace the routing entry for a DRI
    async fn put_route(&self, entry: RoutingEntry) -> Result<(), StorageError>;

    /// Get the routing entry for a DRI
    async fn get_route(&self, dri: &Dri) -> Result<Option<RoutingEntry>, StorageError>;

    /// Remove the routing entry for a DRI
    async fn remove_route(&self, dri: &Dri) -> Result<bool, StorageError>;

    /// Number of routing entries
    async fn count_routes(&self) -> Result<usize, StorageError>;

    // =========================================================================
    // Active Backend Selection
    // =========================================================================

    /// Persist the active backend type
    async fn set_active_backend(&self, backend_type: &str) -> Result<(), StorageError>;

    /// Get the active backend type, if one was ever selected
    async fn get_active_backend(&self) -> Result<Option<String>, StorageError>;

    // =========================================================================
    // Exchange Records
    // =========================================================================

    /// Insert or replace an exchange row
    async fn save_exchange(&self, row: ExchangeRow) -> Result<(), StorageError>;

    /// Get an exchange row by protocol and id
    async fn get_exchange(&self, protocol: &str, id: &str) -> Result<Option<ExchangeRow>, StorageError>;

    /// All exchange rows of a protocol matching the query, oldest first
    async fn query_exchanges(
        &self,
        protocol: &str,
        query: &ExchangeQuery,
    ) -> Result<Vec<ExchangeRow>, StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pds_core::{Initiator, Issuance, IssuancePayload, IssuanceRole, IssuanceState, Presentation};

    fn issuance_record() -> ExchangeRecord<Issuance> {
        ExchangeRecord::new(
            "conn-1",
            "thread-1",
            Initiator::External,
            IssuanceRole::Issuer,
            IssuanceState::RequestSent,
            IssuancePayload::default(),
        )
    }

    #[test]
    fn test_row_roundtrip() {
        let record = issuance_record();
        let row = ExchangeRow::from_record(&record).unwrap();

        assert_eq!(row.protocol, "issue-credential");
        assert_eq!(row.role, "issuer");
        assert_eq!(row.state, "request_sent");
        assert_eq!(row.initiator, "external");

        let back: ExchangeRecord<Issuance> = row.into_record().unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_row_rejects_other_protocol() {
        let row = ExchangeRow::from_record(&issuance_record()).unwrap();
        assert!(row.into_record::<Presentation>().is_err());
    }

    #[test]
    fn test_row_matches_query() {
        let row = ExchangeRow::from_record(&issuance_record()).unwrap();
        assert!(row.matches(&ExchangeQuery::default()));
        assert!(row.matches(&ExchangeQuery { state: Some("request_sent".into()), ..Default::default() }));
        assert!(!row.matches(&ExchangeQuery { connection_id: Some("other".into()), ..Default::default() }));
    }

    #[test]
    fn test_storage_error_conversion() {
        let err: PdsError = StorageError::NotFound("exchange x".into()).into();
        assert_eq!(err, PdsError::NotFound("exchange x".into()));

        let err: PdsError = StorageError::Connection("refused".into()).into();
        assert!(matches!(err, PdsError::Storage(_)));
    }
}
