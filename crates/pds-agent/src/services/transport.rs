//! Connection lookup and outbound delivery

use async_trait::async_trait;
use pds_core::{Envelope, PdsError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// A pairwise connection with another agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub connection_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub their_did: Option<String>,
    /// Whether messages can be exchanged yet
    #[serde(default = "default_ready")]
    pub ready: bool,
}

fn default_ready() -> bool {
    true
}

impl Connection {
    /// A ready connection
    pub fn new(connection_id: impl Into<String>) -> Self {
        Self {
            connection_id: connection_id.into(),
            their_did: None,
            ready: true,
        }
    }

    pub fn with_their_did(mut self, did: impl Into<String>) -> Self {
        self.their_did = Some(did.into());
        self
    }

    pub fn not_ready(mut self) -> Self {
        self.ready = false;
        self
    }
}

/// An envelope queued for delivery
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundMessage {
    pub connection_id: String,
    pub envelope: Envelope,
}

/// Message transport between agents
#[async_trait]
pub trait Transport: Send + Sync {
    /// Look up a connection
    async fn connection(&self, connection_id: &str) -> Result<Option<Connection>>;

    /// Deliver an envelope over a connection
    async fn send(&self, connection_id: &str, envelope: Envelope) -> Result<()>;
}

/// The connection, if it exists and is ready
pub async fn require_connection(transport: &dyn Transport, connection_id: &str) -> Result<Connection> {
    let connection = transport
        .connection(connection_id)
        .await?
        .ok_or_else(|| PdsError::not_found(format!("connection {}", connection_id)))?;

    if !connection.ready {
        return Err(PdsError::configuration(format!(
            "Connection {} is not ready",
            connection_id
        )));
    }
    Ok(connection)
}

/// In-process transport
///
/// Keeps a connection table and queues outbound envelopes until they are
/// drained, either by the admin API or by a test relaying them to another
/// agent's dispatcher.
#[derive(Debug, Default)]
pub struct OutboxTransport {
    connections: RwLock<HashMap<String, Connection>>,
    outbox: Mutex<Vec<OutboundMessage>>,
}

impl OutboxTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a connection
    pub async fn add_connection(&self, connection: Connection) {
        info!(connection_id = %connection.connection_id, ready = connection.ready, "Connection added");
        self.connections
            .write()
            .await
            .insert(connection.connection_id.clone(), connection);
    }

    /// All connections, sorted by id
    pub async fn connections(&self) -> Vec<Connection> {
        let mut all: Vec<Connection> = self.connections.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.connection_id.cmp(&b.connection_id));
        all
    }

    /// Take every queued envelope, oldest first
    pub async fn drain(&self) -> Vec<OutboundMessage> {
        std::mem::take(&mut *self.outbox.lock().await)
    }

    /// Number of queued envelopes
    pub async fn pending(&self) -> usize {
        self.outbox.lock().await.len()
    }
}

#[async_trait]
impl Transport for OutboxTransport {
    async fn connection(&self, connection_id: &str) -> Result<Option<Connection>> {
        Ok(self.connections.read().await.get(connection_id).cloned())
    }

    async fn send(&self, connection_id: &str, envelope: Envelope) -> Result<()> {
        if !self.connections.read().await.contains_key(connection_id) {
            return Err(PdsError::not_found(format!("connection {}", connection_id)));
        }

        debug!(
            connection_id = %connection_id,
            message_type = envelope.message_type(),
            thread_id = %envelope.thread_id,
            "Queued outbound message"
        );
        self.outbox.lock().await.push(OutboundMessage {
            connection_id: connection_id.to_string(),
            envelope,
        });
        Ok(())
    }
}
