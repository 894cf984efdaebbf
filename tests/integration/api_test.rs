//! Integration tests for the HTTP API.

mod helpers;

use axum::http::StatusCode;
use serde_json::json;

use fileflow_core::types::id::JobId;

#[tokio::test]
async fn test_accept_upload_returns_job_id() {
    let app = helpers::TestApp::new().await;

    let response = app
        .request(
            "POST",
            "/api/uploads",
            Some(json!({
                "original_filename": "a.png",
                "size_bytes": 100,
                "mime_type": "image/png",
            })),
        )
        .await;

    assert_eq!(response.status, StatusCode::ACCEPTED);
    assert_eq!(response.body["success"], true);
    assert_eq!(response.body["data"]["state"], "pending");

    let job_id = response.body["data"]["job_id"].as_str().expect("job_id");
    let status = app.request("GET", &format!("/api/jobs/{job_id}"), None).await;
    assert_eq!(status.status, StatusCode::OK);
    assert_eq!(status.body["data"]["state"], "pending");
    assert_eq!(status.body["data"]["attempts"], 0);
    assert_eq!(status.body["data"]["max_attempts"], 3);
}

#[tokio::test]
async fn test_accept_upload_rejects_invalid_descriptor() {
    let app = helpers::TestApp::new().await;

    let response = app.request("POST", "/api/uploads", Some(json!({}))).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "VALIDATION_ERROR");

    let response = app
        .request(
            "POST",
            "/api/uploads",
            Some(json!({
                "original_filename": "script.sh",
                "size_bytes": 100,
                "mime_type": "application/x-sh",
            })),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_unknown_job_is_not_found() {
    let app = helpers::TestApp::new().await;

    let response = app
        .request("GET", &format!("/api/jobs/{}", JobId::new()), None)
        .await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body["error"], "NOT_FOUND");
}

#[tokio::test]
async fn test_cancel_pending_job() {
    let app = helpers::TestApp::new().await;

    let accepted = app
        .request(
            "POST",
            "/api/uploads",
            Some(json!({"original_filename": "a.png", "size_bytes": 100})),
        )
        .await;
    let job_id = accepted.body["data"]["job_id"].as_str().expect("job_id").to_string();

    let response = app
        .request(
            "POST",
            &format!("/api/jobs/{job_id}/cancel"),
            Some(json!({"reason": "user deleted upload"})),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["outcome"], "cancelled");
    assert_eq!(response.body["data"]["state"], "failed");

    let status = app.request("GET", &format!("/api/jobs/{job_id}"), None).await;
    assert_eq!(status.body["data"]["error"], "user deleted upload");

    // Terminal jobs cannot be cancelled again.
    let again = app
        .request("POST", &format!("/api/jobs/{job_id}/cancel"), None)
        .await;
    assert_eq!(again.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_queue_stats_counts_pending_jobs() {
    let app = helpers::TestApp::new().await;

    for name in ["a.png", "b.png"] {
        let response = app
            .request(
                "POST",
                "/api/uploads",
                Some(json!({"original_filename": name, "size_bytes": 10})),
            )
            .await;
        assert_eq!(response.status, StatusCode::ACCEPTED);
    }

    let response = app.request("GET", "/api/queues/stats", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["stats"]["queue"], helpers::QUEUE);
    assert_eq!(response.body["data"]["stats"]["pending"], 2);
    assert_eq!(response.body["data"]["stats"]["completed"], 0);
    assert_eq!(response.body["data"]["metrics"]["completed"], 0);
}

#[tokio::test]
async fn test_health_reports_store() {
    let app = helpers::TestApp::new().await;

    let response = app.request("GET", "/api/health", None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["status"], "ok");
    assert_eq!(response.body["data"]["store"], "connected");
}
