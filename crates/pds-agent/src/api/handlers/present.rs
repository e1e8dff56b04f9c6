//! Proof presentation handlers

use axum::{
    extract::{Query, State},
    Json,
};
use pds_core::{Dri, ExchangeQuery, ExchangeState, PresentationRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::AppState;
use crate::api::error::ApiError;
use crate::protocols::ExchangeSummary;

/// Ask a connected prover for a presentation
#[derive(Debug, Deserialize)]
pub struct RequestPresentationRequest {
    pub connection_id: String,
    pub requested_attributes: Vec<String>,
    pub schema_base_dri: String,
    #[serde(default)]
    pub issuer_did: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RequestPresentationResponse {
    pub exchange_id: String,
    pub thread_id: String,
    pub connection_id: String,
}

/// POST /present-proof/request
pub async fn request_presentation(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RequestPresentationRequest>,
) -> Result<Json<RequestPresentationResponse>, ApiError> {
    let presentation_request = PresentationRequest {
        requested_attributes: request.requested_attributes,
        schema_base_dri: request.schema_base_dri,
        issuer_did: request.issuer_did,
    };

    let record = state
        .presentation
        .request_presentation(&request.connection_id, presentation_request)
        .await?;

    Ok(Json(RequestPresentationResponse {
        exchange_id: record.id,
        thread_id: record.thread_id,
        connection_id: record.connection_id,
    }))
}

#[derive(Debug, Deserialize)]
pub struct PresentProofRequest {
    pub exchange_record_id: String,
    /// DRI of the held credential to present
    pub credential_id: String,
}

#[derive(Debug, Serialize)]
pub struct ExchangeStepResponse {
    pub exchange_id: String,
    pub state: String,
}

/// POST /present-proof/present
pub async fn present_proof(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PresentProofRequest>,
) -> Result<Json<ExchangeStepResponse>, ApiError> {
    let record = state
        .presentation
        .present_proof(&request.exchange_record_id, &request.credential_id)
        .await?;

    Ok(Json(ExchangeStepResponse {
        exchange_id: record.id,
        state: record.state.as_str().to_string(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct AcknowledgeProofRequest {
    pub exchange_record_id: String,
    /// Whether the presentation was accepted
    pub status: bool,
}

#[derive(Debug, Serialize)]
pub struct AcknowledgeProofResponse {
    pub exchange_record_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ack_credential_dri: Option<Dri>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_policies_match: Option<bool>,
}

/// POST /present-proof/acknowledge
pub async fn acknowledge_proof(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AcknowledgeProofRequest>,
) -> Result<Json<AcknowledgeProofResponse>, ApiError> {
    let record = state
        .presentation
        .acknowledge_proof(&request.exchange_record_id, request.status)
        .await?;

    Ok(Json(AcknowledgeProofResponse {
        exchange_record_id: record.id,
        ack_credential_dri: record.payload.acknowledgment_credential_dri,
        usage_policies_match: record.payload.usage_policies_match,
    }))
}

#[derive(Debug, Serialize)]
pub struct ListExchangesResponse {
    pub result: Vec<ExchangeSummary>,
}

/// GET /present-proof/exchange/record
///
/// Query parameters filter by connection_id, thread_id, initiator, role
/// and state.
pub async fn list_exchanges(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ExchangeQuery>,
) -> Result<Json<ListExchangesResponse>, ApiError> {
    let result = state.presentation.list_exchanges(&query).await?;
    Ok(Json(ListExchangesResponse { result }))
}
