//! Shared helpers for API integration tests.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

use ghosttype_api::auth::jwt::{generate_access_token, JwtConfig};
use ghosttype_api::config::ServerConfig;
use ghosttype_api::router::build_app_router;
use ghosttype_api::state::AppState;
use ghosttype_core::limits::PlanLimits;
use ghosttype_core::types::DbId;
use ghosttype_engine::tiers::StaticLimitsProvider;

/// Build a test `ServerConfig` with safe defaults and a fixed JWT secret.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        jwt: JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            access_token_expiry_mins: 60,
        },
    }
}

/// Build the full application router with all middleware layers, using the
/// given database pool.
///
/// This goes through [`build_app_router`] so integration tests exercise the
/// same middleware stack (CORS, request ID, timeout, tracing, panic
/// recovery) that production uses.
pub fn build_test_app(pool: PgPool) -> Router {
    let config = test_config();
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        limits: Arc::new(StaticLimitsProvider::new(PlanLimits::default())),
    };
    build_app_router(state, &config)
}

/// A `Bearer ...` header value for the given owner.
pub fn bearer(owner_id: DbId) -> String {
    let token = generate_access_token(owner_id, &test_config().jwt).unwrap();
    format!("Bearer {token}")
}

/// Send an unauthenticated GET request.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

/// Send an authenticated GET request.
pub async fn get_auth(app: Router, uri: &str, owner_id: DbId) -> Response<Body> {
    let request = Request::builder()
        .uri(uri)
        .header("authorization", bearer(owner_id))
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Send an authenticated POST request with a JSON body.
pub async fn post_json(
    app: Router,
    uri: &str,
    owner_id: DbId,
    body: &serde_json::Value,
) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("authorization", bearer(owner_id))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Send an authenticated POST request with an empty body.
pub async fn post_auth(app: Router, uri: &str, owner_id: DbId) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("authorization", bearer(owner_id))
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Collect a response body into parsed JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
