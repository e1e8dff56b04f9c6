//! API module for the PDS agent

pub mod error;
pub mod handlers;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use error::ApiError;
use handlers::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Readiness check response
#[derive(Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub label: String,
    pub active_backend: Option<String>,
    pub route_count: usize,
    pub pending_outbound: usize,
}

/// Health check endpoint
///
/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

/// Readiness check endpoint
///
/// GET /ready
pub async fn ready(State(state): State<Arc<AppState>>) -> Result<Json<ReadyResponse>, ApiError> {
    let active_backend = state.pds.selector().active_type().await?;
    let route_count = state.pds.routes().route_count().await?;

    Ok(Json(ReadyResponse {
        ready: active_backend.is_some(),
        label: state.config.label.clone(),
        active_backend,
        route_count,
        pending_outbound: state.transport.pending().await,
    }))
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    // CORS configuration for browser-based clients
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health endpoints
        .route("/health", get(health))
        .route("/ready", get(ready))
        // PDS endpoints
        .route("/pds", get(handlers::get_backends))
        .route("/pds/activate", post(handlers::activate_backend))
        .route("/pds/settings", get(handlers::get_settings).post(handlers::update_settings))
        .route("/pds/save", post(handlers::save_payload))
        .route("/pds/oca_data", post(handlers::save_keyed))
        .route("/pds/load_multiple", post(handlers::load_multiple))
        .route("/pds/link", post(handlers::link_payloads))
        .route("/pds/get_from", post(handlers::get_from))
        .route("/pds/{dri}", get(handlers::load_payload).delete(handlers::delete_payload))
        // Issuance endpoints
        .route("/issue-credential/request", post(handlers::request_credential))
        .route("/issue-credential/send", post(handlers::issue_credential))
        // Presentation endpoints
        .route("/present-proof/request", post(handlers::request_presentation))
        .route("/present-proof/present", post(handlers::present_proof))
        .route("/present-proof/acknowledge", post(handlers::acknowledge_proof))
        .route("/present-proof/exchange/record", get(handlers::list_exchanges))
        // Transport endpoints
        .route("/connections", get(handlers::list_connections).post(handlers::add_connection))
        .route("/inbound", post(handlers::deliver_inbound))
        .route("/outbox", get(handlers::drain_outbox))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
