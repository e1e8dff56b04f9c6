//! API Tests
//!
//! Drive the HTTP router in-process and check status codes and bodies.

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use pds_agent::{create_router, default_registry, Agent, AgentConfig, MemoryStore};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

// =============================================================================
// Test Helpers
// =============================================================================

async fn app() -> Router {
    let config = AgentConfig::default();
    let agent = Agent::new(config.clone(), default_registry(&config), Arc::new(MemoryStore::new()))
        .await
        .expect("agent wiring");
    create_router(Arc::new(agent))
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_and_ready() {
    let app = app().await;

    let (status, body) = call(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = call(&app, Method::GET, "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ready"], true);
    assert_eq!(body["active_backend"], "local");
    assert_eq!(body["route_count"], 0);
}

// =============================================================================
// PDS
// =============================================================================

#[tokio::test]
async fn test_save_and_load() {
    let app = app().await;

    let (status, saved) = call(
        &app,
        Method::POST,
        "/pds/save",
        Some(json!({"payload": {"name": "alice"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let dri = saved["dri"].as_str().unwrap().to_string();
    assert!(dri.starts_with('z'));

    let (status, loaded) = call(&app, Method::GET, &format!("/pds/{}", dri), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(loaded["content"], json!({"name": "alice"}));
    assert!(loaded.get("metadata").is_none());
}

#[tokio::test]
async fn test_json_looking_string_loads_as_string() {
    let app = app().await;

    let (_, saved) = call(&app, Method::POST, "/pds/save", Some(json!({"payload": "42"}))).await;
    let uri = format!("/pds/{}", saved["dri"].as_str().unwrap());

    let (status, loaded) = call(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(loaded["content"], json!("42"));
}

#[tokio::test]
async fn test_save_in_table_with_metadata() {
    let app = app().await;

    let (_, saved) = call(
        &app,
        Method::POST,
        "/pds/save",
        Some(json!({"payload": {"n": 1}, "table": "notes", "oca_schema_dri": "schema-1"})),
    )
    .await;
    let dri = saved["dri"].as_str().unwrap();

    let (status, loaded) = call(&app, Method::GET, &format!("/pds/{}?meta=true", dri), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(loaded["metadata"], json!({"table": "notes", "oca_schema_dri": "schema-1"}));
}

#[tokio::test]
async fn test_load_unknown_is_not_found() {
    let app = app().await;
    let (status, body) = call(&app, Method::GET, "/pds/zUnknown", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_activate_backend() {
    let app = app().await;

    let (status, body) = call(&app, Method::POST, "/pds/activate", Some(json!({"backend_type": "s3"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");

    let (status, overview) = call(&app, Method::GET, "/pds", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(overview["active"], "local");
    assert_eq!(overview["registered"], json!(["data_vault", "local"]));
}

#[tokio::test]
async fn test_delete_payload() {
    let app = app().await;
    let (_, saved) = call(&app, Method::POST, "/pds/save", Some(json!({"payload": "gone soon"}))).await;
    let uri = format!("/pds/{}", saved["dri"].as_str().unwrap());

    let (status, body) = call(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);

    let (status, _) = call(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Exchanges
// =============================================================================

#[tokio::test]
async fn test_exchange_step_on_unknown_record() {
    let app = app().await;
    let (status, _) = call(
        &app,
        Method::POST,
        "/present-proof/present",
        Some(json!({"exchange_record_id": "missing", "credential_id": "zAbc"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_presentation_request_and_guard_rejection() {
    let app = app().await;

    let (status, _) = call(&app, Method::POST, "/connections", Some(json!({"connection_id": "peer"}))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, requested) = call(
        &app,
        Method::POST,
        "/present-proof/request",
        Some(json!({
            "connection_id": "peer",
            "requested_attributes": ["name"],
            "schema_base_dri": "schema-1"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(requested["connection_id"], "peer");
    let exchange_id = requested["exchange_id"].as_str().unwrap().to_string();

    let (status, listed) = call(
        &app,
        Method::GET,
        "/present-proof/exchange/record?state=request_sent",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["result"].as_array().unwrap().len(), 1);
    assert_eq!(listed["result"][0]["id"], json!(exchange_id));

    // Nothing has been presented yet
    let (status, rejected) = call(
        &app,
        Method::POST,
        "/present-proof/acknowledge",
        Some(json!({"exchange_record_id": exchange_id, "status": true})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(rejected["code"], "INVALID_STATE");
    assert_eq!(rejected["details"]["actual"], "request_sent");

    let (status, outbox) = call(&app, Method::GET, "/outbox", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outbox.as_array().unwrap().len(), 1);
    assert_eq!(outbox[0]["connection_id"], "peer");
    assert_eq!(
        outbox[0]["envelope"]["message"]["@type"],
        "https://didcomm.org/present-proof/1.1/request-proof"
    );
}

#[tokio::test]
async fn test_inbound_data_request_for_unknown_payload() {
    let app = app().await;
    call(&app, Method::POST, "/connections", Some(json!({"connection_id": "peer"}))).await;

    let (status, outcome) = call(
        &app,
        Method::POST,
        "/inbound",
        Some(json!({
            "connection_id": "peer",
            "envelope": {
                "id": "msg-1",
                "thread_id": "msg-1",
                "message": {
                    "@type": "https://didcomm.org/personal-data-storage/1.0/exchange-data-a",
                    "payload_dri": "zMissing"
                }
            }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["outcome"], "data_unavailable");
}
