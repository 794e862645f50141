//! HTTP API tests driven through the router without a socket.

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use jobpulse::analysis::{AnalysisConfig, HealthEngine};
use jobpulse::api::{router, state::AppState};
use jobpulse::config::ExportConfig;
use jobpulse::storage::{ingest_documents, open_pool, Pool, SqliteSource};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn app() -> (tempfile::TempDir, Pool, Router) {
    let dir = tempfile::tempdir().unwrap();
    let pool = open_pool(dir.path().join("jobs.db").to_str().unwrap()).unwrap();
    let docs = vec![
        json!({ "_id": "a", "status": "completed", "createdAt": "2026-03-02T10:00:00Z",
                "completedAt": "2026-03-02T10:01:00Z" }),
        json!({ "_id": "b", "status": "failed", "createdAt": "2026-03-02T10:10:00Z",
                "error": { "name": "ActivityFailure", "rootCauseMessage": "timeout" } }),
        json!({ "_id": "c", "status": "failed", "createdAt": "2026-03-02T10:20:00Z",
                "error": { "name": "ChildWorkflowFailure", "rootCauseMessage": "child failed" } }),
    ];
    ingest_documents(&pool, &docs).unwrap();

    let state = AppState {
        engine: Arc::new(HealthEngine::new(AnalysisConfig::default())),
        source: SqliteSource::new(pool.clone()),
        export: ExportConfig::default(),
    };
    (dir, pool, router(state))
}

async fn get(app: Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, body.to_vec())
}

const DAY: &str = "start=2026-03-02&end=2026-03-02";

#[tokio::test]
async fn test_health_endpoint() {
    let (_dir, _pool, app) = app();
    let (status, _, body) = get(app, "/api/v1/health").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["data"]["status"], "ok");
    assert_eq!(json["data"]["documents"], 3);
    assert_eq!(json["data"]["statuses"]["succeeded"], 1);
    assert_eq!(json["data"]["statuses"]["failed"], 2);
}

#[tokio::test]
async fn test_report_endpoint() {
    let (_dir, _pool, app) = app();
    let (status, _, body) = get(app, &format!("/api/v1/report?{}", DAY)).await;
    assert_eq!(status, StatusCode::OK);

    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["metrics"]["total"], 3);
    assert_eq!(json["metrics"]["failed"], 2);
    assert_eq!(json["metrics"]["health_status"], "critical");
    assert_eq!(json["errors"]["root_failures"], 1);
    assert_eq!(json["errors"]["cascading_failures"], 1);
    assert_eq!(json["timeline"]["buckets"].as_array().unwrap().len(), 96);
}

#[tokio::test]
async fn test_report_over_centuries_stays_bounded() {
    let (_dir, _pool, app) = app();
    let (status, _, body) = get(app, "/api/v1/report?start=0001-01-01&end=9999-12-31").await;
    assert_eq!(status, StatusCode::OK);

    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["metrics"]["total"], 3);
    let buckets = json["timeline"]["buckets"].as_array().unwrap();
    assert!(!buckets.is_empty() && buckets.len() <= 200);
}

#[tokio::test]
async fn test_report_rejects_bad_windows() {
    let (_dir, _pool, app) = app();

    let (status, _, body) = get(app.clone(), "/api/v1/report?start=2026-03-05&end=2026-03-01").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"]["kind"], "invalid_range");
    assert_eq!(json["error"]["retryable"], false);

    let (status, _, body) = get(app.clone(), "/api/v1/report?range=forever").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"]["kind"], "bad_request");

    let (status, _, _) = get(app, "/api/v1/report?start=2026-03-01").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_export_endpoints() {
    let (_dir, _pool, app) = app();

    let (status, headers, body) = get(app.clone(), &format!("/api/v1/export/failed?{}", DAY)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "application/json");
    let disposition = headers[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.starts_with("attachment; filename=\"failed_jobs_"));
    let rows: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(rows.as_array().unwrap().len(), 1);
    assert_eq!(rows[0]["id"], "b");

    let uri = format!("/api/v1/export/failed?{}&include_cascading=true", DAY);
    let (_, _, body) = get(app.clone(), &uri).await;
    let rows: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(rows.as_array().unwrap().len(), 2);

    let (status, headers, body) = get(app, &format!("/api/v1/export/jobs?{}", DAY)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/csv"));
    let text = String::from_utf8(body).unwrap();
    assert_eq!(text.lines().count(), 4);
    assert!(text.starts_with("id,status,createdAt"));
}

#[tokio::test]
async fn test_store_failure_is_retryable() {
    let (_dir, pool, app) = app();
    pool.get().unwrap().execute_batch("DROP TABLE job_documents").unwrap();

    let (status, _, body) = get(app, &format!("/api/v1/report?{}", DAY)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"]["kind"], "data_unavailable");
    assert_eq!(json["error"]["retryable"], true);
}

#[tokio::test]
async fn test_unknown_route() {
    let (_dir, _pool, app) = app();
    let (status, _, _) = get(app, "/api/v2/nothing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
