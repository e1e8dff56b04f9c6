//! Inbound delivery, connections and outbox
//!
//! Stand-ins for a wire transport: another agent's envelopes are posted to
//! `/inbound`, and this agent's are collected from `/outbox`.

use axum::{extract::State, Json};
use pds_core::Envelope;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use super::AppState;
use crate::api::error::ApiError;
use crate::protocols::InboundOutcome;
use crate::services::{Connection, OutboundMessage};

#[derive(Debug, Deserialize)]
pub struct InboundRequest {
    pub connection_id: String,
    pub envelope: Envelope,
}

/// POST /inbound
pub async fn deliver_inbound(
    State(state): State<Arc<AppState>>,
    Json(request): Json<InboundRequest>,
) -> Result<Json<InboundOutcome>, ApiError> {
    let outcome = state
        .dispatcher
        .handle(&request.connection_id, request.envelope)
        .await?;
    Ok(Json(outcome))
}

/// POST /connections
pub async fn add_connection(
    State(state): State<Arc<AppState>>,
    Json(connection): Json<Connection>,
) -> Json<Connection> {
    state.transport.add_connection(connection.clone()).await;
    Json(connection)
}

/// GET /connections
pub async fn list_connections(State(state): State<Arc<AppState>>) -> Json<Vec<Connection>> {
    Json(state.transport.connections().await)
}

/// GET /outbox
///
/// Returns and clears every queued outbound envelope.
pub async fn drain_outbox(State(state): State<Arc<AppState>>) -> Json<Vec<OutboundMessage>> {
    let drained = state.transport.drain().await;
    info!(count = drained.len(), "Outbox drained");
    Json(drained)
}
