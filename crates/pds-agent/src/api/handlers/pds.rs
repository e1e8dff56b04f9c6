//! Personal data store handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use pds_core::{BackendSettings, Dri, LoadedRecord};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::AppState;
use crate::api::error::ApiError;
use crate::pds::{BackendsOverview, KeyedOutcome, MultiFilter, MultiLoad};

/// Request to save a payload
#[derive(Debug, Deserialize)]
pub struct SavePayloadRequest {
    /// Payload; strings are stored verbatim, anything else as compact JSON
    pub payload: Value,

    /// Free-form metadata, ignored when `table` is set
    #[serde(default)]
    pub metadata: Option<Value>,

    /// Table to file the payload under
    #[serde(default)]
    pub table: Option<String>,

    /// Schema the payload conforms to (with `table`)
    #[serde(default)]
    pub oca_schema_dri: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SavePayloadResponse {
    pub dri: Dri,
}

/// POST /pds/save
pub async fn save_payload(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SavePayloadRequest>,
) -> Result<Json<SavePayloadResponse>, ApiError> {
    let dri = match &request.table {
        Some(table) => {
            state
                .pds
                .save_in_table(&request.payload, table, request.oca_schema_dri.as_deref())
                .await?
        }
        None => state.pds.save_value(&request.payload, request.metadata.as_ref()).await?,
    };
    Ok(Json(SavePayloadResponse { dri }))
}

#[derive(Debug, Default, Deserialize)]
pub struct LoadQuery {
    /// Include metadata
    #[serde(default)]
    pub meta: bool,

    /// Replace embedded `DRI:` references with their content
    #[serde(default)]
    pub resolve: bool,
}

/// GET /pds/{dri}
pub async fn load_payload(
    State(state): State<Arc<AppState>>,
    Path(dri): Path<String>,
    Query(query): Query<LoadQuery>,
) -> Result<Json<LoadedRecord>, ApiError> {
    let dri = Dri::from_backend(dri);
    let mut record = if query.meta {
        state.pds.load_with_meta(&dri).await?
    } else {
        state.pds.load(&dri).await?
    };

    if query.resolve {
        record.content = state.pds.resolve_graph(&record.content).await;
    }
    Ok(Json(record))
}

#[derive(Debug, Serialize)]
pub struct DeletePayloadResponse {
    pub deleted: bool,
}

/// DELETE /pds/{dri}
pub async fn delete_payload(
    State(state): State<Arc<AppState>>,
    Path(dri): Path<String>,
) -> Result<Json<DeletePayloadResponse>, ApiError> {
    let deleted = state.pds.delete(&Dri::from_backend(dri)).await?;
    Ok(Json(DeletePayloadResponse { deleted }))
}

#[derive(Debug, Deserialize)]
pub struct ActivateBackendRequest {
    pub backend_type: String,
}

/// POST /pds/activate
pub async fn activate_backend(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ActivateBackendRequest>,
) -> Result<Json<BackendsOverview>, ApiError> {
    state.pds.selector().set_active(&request.backend_type).await?;
    Ok(Json(state.pds.describe_backends().await?))
}

/// GET /pds
pub async fn get_backends(State(state): State<Arc<AppState>>) -> Result<Json<BackendsOverview>, ApiError> {
    Ok(Json(state.pds.describe_backends().await?))
}

/// GET /pds/settings
pub async fn get_settings(State(state): State<Arc<AppState>>) -> Json<BTreeMap<String, BackendSettings>> {
    Json(state.pds.backend_settings().await)
}

/// POST /pds/settings
///
/// Body maps backend types to settings merged into their current ones.
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    Json(updates): Json<BTreeMap<String, BackendSettings>>,
) -> Result<Json<BTreeMap<String, BackendSettings>>, ApiError> {
    state.pds.configure_backends(updates).await?;
    Ok(Json(state.pds.backend_settings().await))
}

/// POST /pds/oca_data
///
/// Body maps `DRI:<schema>` keys to payloads.
pub async fn save_keyed(
    State(state): State<Arc<AppState>>,
    Json(entries): Json<Map<String, Value>>,
) -> Json<BTreeMap<String, KeyedOutcome>> {
    Json(state.pds.save_keyed(entries).await)
}

/// One schema or several
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SchemaFilter {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
pub struct LoadMultipleRequest {
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub oca_schema_base_dri: Option<SchemaFilter>,
}

/// POST /pds/load_multiple
pub async fn load_multiple(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoadMultipleRequest>,
) -> Result<Json<MultiLoad>, ApiError> {
    let filter = match request.oca_schema_base_dri {
        None => MultiFilter::None,
        Some(SchemaFilter::One(schema)) => MultiFilter::One(schema),
        Some(SchemaFilter::Many(schemas)) => MultiFilter::Many(schemas),
    };
    Ok(Json(state.pds.load_multiple(request.table.as_deref(), filter).await?))
}

#[derive(Debug, Deserialize)]
pub struct LinkRequest {
    pub dri: Dri,
    pub targets: Vec<Dri>,
}

#[derive(Debug, Serialize)]
pub struct LinkResponse {
    pub linked: bool,
}

/// POST /pds/link
pub async fn link_payloads(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LinkRequest>,
) -> Json<LinkResponse> {
    let linked = state.pds.link(&request.dri, request.targets).await;
    Json(LinkResponse { linked })
}

#[derive(Debug, Deserialize)]
pub struct GetFromRequest {
    pub connection_id: String,
    pub payload_dri: Dri,
}

#[derive(Debug, Serialize)]
pub struct GetFromResponse {
    pub thread_id: String,
}

/// POST /pds/get_from
///
/// Ask a connected agent for the payload behind a DRI.
pub async fn get_from(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GetFromRequest>,
) -> Result<Json<GetFromResponse>, ApiError> {
    let thread_id = state
        .data
        .request_data(&request.connection_id, request.payload_dri)
        .await?;
    Ok(Json(GetFromResponse { thread_id }))
}
