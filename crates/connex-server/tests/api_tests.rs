//! API integration tests for the connex server
//!
//! Drives the full router in process with an in-memory blob store and a
//! scripted upstream.
//!
//! Coverage includes:
//! - Extraction (201 fresh, 200 cached, 400, 500 with `X-Error-Type`)
//! - Job status and download URLs (404, 409)
//! - Cache index listing

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use connex_server::{
    api::{create_router, AppState},
    config::Config,
    jobs::JobStore,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

mod helpers;

use helpers::{board, init_tracing, service_with, ScriptedSource};

// ============================================================================
// Helper Functions
// ============================================================================

fn create_test_app(source: ScriptedSource, max_retries: u32) -> (Router, AppState) {
    init_tracing();
    let t = service_with(source, max_retries);
    let state = AppState::new(t.service, JobStore::new());
    (create_router(state.clone(), &Config::default()), state)
}

struct TestResponse {
    status: StatusCode,
    error_type: Option<String>,
    body: Value,
}

async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();

    let status = response.status();
    let error_type = response
        .headers()
        .get("x-error-type")
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
    };

    TestResponse {
        status,
        error_type,
        body,
    }
}

async fn get_request(app: &Router, uri: &str) -> TestResponse {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

async fn post_request(app: &Router, uri: &str, body: &str) -> TestResponse {
    send(
        app,
        Request::builder()
            .uri(uri)
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

async fn extract(app: &Router, endpoint: &str) -> TestResponse {
    post_request(app, "/api/v1/data/extract", &json!({ "endpoint": endpoint }).to_string()).await
}

// ============================================================================
// Service endpoints
// ============================================================================

#[tokio::test]
async fn test_root_and_health() {
    let (app, _) = create_test_app(ScriptedSource::constant(board(&[])), 0);

    let root = get_request(&app, "/").await;
    assert_eq!(root.status, StatusCode::OK);
    assert_eq!(root.body["name"], "connex");

    let health = get_request(&app, "/health").await;
    assert_eq!(health.status, StatusCode::OK);
}

// ============================================================================
// Extraction
// ============================================================================

#[tokio::test]
async fn test_extract_then_cache_hit() {
    let (app, _) =
        create_test_app(ScriptedSource::constant(board(&["2024-12-01T00:02:00"])), 3);

    let first = extract(&app, "https://x/board").await;
    assert_eq!(first.status, StatusCode::CREATED);
    assert_eq!(first.body["status"], "completed");
    assert_eq!(first.body["cache_hit"], false);
    assert!(first.body["url"].as_str().unwrap().starts_with("memory://"));
    assert!(Uuid::parse_str(first.body["job_id"].as_str().unwrap()).is_ok());

    let second = extract(&app, "https://x/board").await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.body["cache_hit"], true);
    assert_eq!(second.body["artifact_id"], first.body["artifact_id"]);
    assert_ne!(second.body["job_id"], first.body["job_id"]);
}

#[tokio::test]
async fn test_extract_missing_endpoint_is_bad_request() {
    let (app, _) = create_test_app(ScriptedSource::constant(board(&[])), 0);

    for body in ["{}", r#"{"endpoint": ""}"#, r#"{"endpoint": "   "}"#, "not json"] {
        let response = post_request(&app, "/api/v1/data/extract", body).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "body: {}", body);
        assert_eq!(response.body["error"], "Missing endpoint parameter");
        assert!(response.body["details"].is_string());
    }
}

#[tokio::test]
async fn test_extract_max_retries_is_server_error() {
    let (app, state) =
        create_test_app(ScriptedSource::constant(board(&["2024-12-01T08:00:00"])), 1);

    let response = extract(&app, "https://x/board").await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.error_type.as_deref(), Some("MaxRetriesExceeded"));
    assert_eq!(
        response.body["error"],
        "Max retries reached while trying to extract data"
    );
    assert!(response.body["details"]
        .as_str()
        .unwrap()
        .contains("after 2 attempts"));

    let dates = state.service.cache().partition_dates().await.unwrap();
    assert!(dates.is_empty());
}

// ============================================================================
// Jobs and downloads
// ============================================================================

#[tokio::test]
async fn test_job_status_and_download() {
    let (app, _) =
        create_test_app(ScriptedSource::constant(board(&["2024-12-01T00:02:00"])), 3);

    let created = extract(&app, "https://x/board").await;
    let job_id = created.body["job_id"].as_str().unwrap().to_string();

    let job = get_request(&app, &format!("/api/v1/jobs/{}", job_id)).await;
    assert_eq!(job.status, StatusCode::OK);
    assert_eq!(job.body["status"], "completed");
    assert_eq!(job.body["endpoint"], "https://x/board");
    assert_eq!(job.body["artifact_id"], created.body["artifact_id"]);

    let download = get_request(&app, &format!("/api/v1/data/{}/download", job_id)).await;
    assert_eq!(download.status, StatusCode::OK);
    assert_eq!(download.body["url"], created.body["url"]);
    assert_eq!(download.body["expires_in"], 3600);
}

#[tokio::test]
async fn test_failed_job_is_recorded() {
    let (app, state) =
        create_test_app(ScriptedSource::constant(board(&["2024-12-01T08:00:00"])), 0);

    let response = extract(&app, "https://x/board").await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);

    let failed = get_request(&app, "/api/v1/jobs?status=failed").await;
    assert_eq!(failed.status, StatusCode::OK);
    assert_eq!(failed.body["total"], 1);
    let job = &failed.body["jobs"][0];
    assert_eq!(job["endpoint"], "https://x/board");
    assert!(job["artifact_id"].is_null());
    assert!(job["error"].as_str().unwrap().contains("Max retries exceeded"));

    assert_eq!(state.jobs.list(None).await.len(), 1);
}

#[tokio::test]
async fn test_unknown_job() {
    let (app, _) = create_test_app(ScriptedSource::constant(board(&[])), 0);
    let id = Uuid::new_v4();

    let job = get_request(&app, &format!("/api/v1/jobs/{}", id)).await;
    assert_eq!(job.status, StatusCode::NOT_FOUND);
    assert_eq!(job.error_type.as_deref(), Some("NotFound"));

    let download = get_request(&app, &format!("/api/v1/data/{}/download", id)).await;
    assert_eq!(download.status, StatusCode::NOT_FOUND);

    let invalid = get_request(&app, "/api/v1/jobs/not-a-uuid").await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_download_of_unfinished_job_is_conflict() {
    let (app, state) = create_test_app(ScriptedSource::constant(board(&[])), 0);

    let job = state.jobs.create("https://x/board").await;
    let response = get_request(&app, &format!("/api/v1/data/{}/download", job.id)).await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.error_type.as_deref(), Some("Conflict"));

    state.jobs.fail(&job, "upstream down").await.unwrap();
    let response = get_request(&app, &format!("/api/v1/data/{}/download", job.id)).await;
    assert_eq!(response.status, StatusCode::CONFLICT);
}

// ============================================================================
// Cache index
// ============================================================================

#[tokio::test]
async fn test_cache_listing() {
    let (app, _) =
        create_test_app(ScriptedSource::constant(board(&["2024-12-01T00:02:00"])), 3);

    extract(&app, "https://x/a").await;
    extract(&app, "https://x/b").await;

    let dates = get_request(&app, "/api/v1/cache").await;
    assert_eq!(dates.status, StatusCode::OK);
    let dates = dates.body["dates"].as_array().unwrap().clone();
    assert_eq!(dates.len(), 1);

    let date = dates[0].as_str().unwrap();
    let partition = get_request(&app, &format!("/api/v1/cache/{}", date)).await;
    assert_eq!(partition.status, StatusCode::OK);
    let endpoints: Vec<_> = partition.body["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["endpoint"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(endpoints, vec!["https://x/a", "https://x/b"]);

    let empty = get_request(&app, "/api/v1/cache/1999-01-01").await;
    assert_eq!(empty.status, StatusCode::OK);
    assert!(empty.body["entries"].as_array().unwrap().is_empty());

    let bad = get_request(&app, "/api/v1/cache/yesterday").await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);
}
