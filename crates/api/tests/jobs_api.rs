//! Integration tests for the `/api/v1/jobs` control surface.

mod common;

use axum::http::StatusCode;
use common::{body_json, get_auth, post_auth, post_json};
use serde_json::json;
use sqlx::PgPool;

fn start_body(document_ref: &str) -> serde_json::Value {
    json!({
        "document_ref": document_ref,
        "text": "The quick brown fox jumps over the lazy dog.",
        "duration_minutes": 30,
        "typing_profile": "steady",
    })
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn start_requires_authentication(pool: PgPool) {
    let app = common::build_test_app(pool);

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/api/v1/jobs")
        .header("content-type", "application/json")
        .body(axum::body::Body::from(start_body("doc-1").to_string()))
        .unwrap();
    let response = tower::ServiceExt::oneshot(app, request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn start_rejects_unknown_profile(pool: PgPool) {
    let app = common::build_test_app(pool);

    let mut body = start_body("doc-1");
    body["typing_profile"] = json!("turbo");
    let response = post_json(app, "/api/v1/jobs", 1, &body).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"]
        .as_str()
        .unwrap()
        .contains("Invalid typing profile"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn start_rejects_out_of_band_duration(pool: PgPool) {
    let app = common::build_test_app(pool);

    let mut body = start_body("doc-1");
    body["duration_minutes"] = json!(5);
    let response = post_json(app, "/api/v1/jobs", 1, &body).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn typing_test_requires_wpm(pool: PgPool) {
    let app = common::build_test_app(pool);

    let mut body = start_body("doc-1");
    body["typing_profile"] = json!("typing-test");
    let response = post_json(app, "/api/v1/jobs", 1, &body).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("testWPM is required"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn typing_test_rejects_wpm_out_of_range(pool: PgPool) {
    let app = common::build_test_app(pool);

    let mut body = start_body("doc-1");
    body["typing_profile"] = json!("typing-test");
    body["test_wpm"] = json!(301);
    let response = post_json(app, "/api/v1/jobs", 1, &body).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("between 1 and 300"));
}

// ---------------------------------------------------------------------------
// Start + progress
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn start_creates_a_pending_job_with_progress(pool: PgPool) {
    let app = common::build_test_app(pool);

    let response = post_json(app.clone(), "/api/v1/jobs", 1, &start_body("doc-1")).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    let job_id = json["data"]["id"].as_i64().unwrap();
    assert_eq!(json["data"]["typing_profile"], "steady");
    // The payload text is never echoed back through the API.
    assert!(json["data"].get("full_text").is_none());

    let response = get_auth(app, &format!("/api/v1/jobs/{job_id}/progress"), 1).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "pending");
    assert_eq!(json["data"]["current_index"], 0);
    assert_eq!(json["data"]["total_chars"], 44);
    assert_eq!(json["data"]["duration_minutes"], 30);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn starting_twice_on_one_document_conflicts(pool: PgPool) {
    let app = common::build_test_app(pool);

    let first = post_json(app.clone(), "/api/v1/jobs", 1, &start_body("doc-1")).await;
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = post_json(app, "/api/v1/jobs", 1, &start_body("doc-1")).await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    let json = body_json(second).await;
    assert_eq!(json["code"], "CONFLICT");
}

// ---------------------------------------------------------------------------
// Pause / stop
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn pausing_a_job_that_is_not_running_conflicts(pool: PgPool) {
    let app = common::build_test_app(pool);

    let response = post_json(app.clone(), "/api/v1/jobs", 1, &start_body("doc-1")).await;
    let job_id = body_json(response).await["data"]["id"].as_i64().unwrap();

    // Still pending: the scheduler has not promoted it yet.
    let response = post_auth(app, &format!("/api/v1/jobs/{job_id}/pause"), 1).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("not running"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn stop_is_terminal_via_the_api(pool: PgPool) {
    let app = common::build_test_app(pool);

    let response = post_json(app.clone(), "/api/v1/jobs", 1, &start_body("doc-1")).await;
    let job_id = body_json(response).await["data"]["id"].as_i64().unwrap();

    let response = post_auth(app.clone(), &format!("/api/v1/jobs/{job_id}/stop"), 1).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status_id"], 5);

    // Stopping again conflicts; resuming a stopped job conflicts.
    let response = post_auth(app.clone(), &format!("/api/v1/jobs/{job_id}/stop"), 1).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = post_auth(app, &format!("/api/v1/jobs/{job_id}/resume"), 1).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

// ---------------------------------------------------------------------------
// Ownership
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn other_owners_cannot_see_or_control_a_job(pool: PgPool) {
    let app = common::build_test_app(pool);

    let response = post_json(app.clone(), "/api/v1/jobs", 1, &start_body("doc-1")).await;
    let job_id = body_json(response).await["data"]["id"].as_i64().unwrap();

    let response = get_auth(app.clone(), &format!("/api/v1/jobs/{job_id}/progress"), 2).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = post_auth(app, &format!("/api/v1/jobs/{job_id}/stop"), 2).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn listing_only_returns_the_callers_jobs(pool: PgPool) {
    let app = common::build_test_app(pool);

    post_json(app.clone(), "/api/v1/jobs", 1, &start_body("doc-1")).await;

    let response = get_auth(app.clone(), "/api/v1/jobs", 1).await;
    let json = body_json(response).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 1);

    let response = get_auth(app, "/api/v1/jobs", 2).await;
    let json = body_json(response).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 0);
}
