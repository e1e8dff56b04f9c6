//! Credential issuance handlers

use axum::{extract::State, Json};
use pds_core::{CredentialRequest, Dri, ExchangeState};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use super::AppState;
use crate::api::error::ApiError;

/// Request a credential from a connected issuer
#[derive(Debug, Deserialize)]
pub struct RequestCredentialRequest {
    pub connection_id: String,
    pub credential_type: String,
    #[serde(default)]
    pub credential_values: Map<String, Value>,
}

#[derive(Debug, Serialize)]
pub struct RequestCredentialResponse {
    pub credential_exchange_id: String,
    pub thread_id: String,
}

/// POST /issue-credential/request
pub async fn request_credential(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RequestCredentialRequest>,
) -> Result<Json<RequestCredentialResponse>, ApiError> {
    let credential_request = CredentialRequest {
        credential_type: request.credential_type,
        credential_values: request.credential_values,
    };

    let record = state
        .issuance
        .request_credential(&request.connection_id, credential_request)
        .await?;

    Ok(Json(RequestCredentialResponse {
        credential_exchange_id: record.id,
        thread_id: record.thread_id,
    }))
}

#[derive(Debug, Deserialize)]
pub struct IssueCredentialRequest {
    pub credential_exchange_id: String,
}

#[derive(Debug, Serialize)]
pub struct IssueCredentialResponse {
    pub credential_exchange_id: String,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_dri: Option<Dri>,
    pub credential: Value,
}

/// POST /issue-credential/send
///
/// Issue the credential for an exchange opened by a holder's request.
pub async fn issue_credential(
    State(state): State<Arc<AppState>>,
    Json(request): Json<IssueCredentialRequest>,
) -> Result<Json<IssueCredentialResponse>, ApiError> {
    let (record, credential) = state
        .issuance
        .issue_credential(&request.credential_exchange_id)
        .await?;

    Ok(Json(IssueCredentialResponse {
        credential_exchange_id: record.id,
        state: record.state.as_str().to_string(),
        credential_dri: record.payload.credential_dri,
        credential,
    }))
}
