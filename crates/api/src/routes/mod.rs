pub mod health;
pub mod jobs;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /jobs                    list, start
/// /jobs/{id}/progress      progress snapshot
/// /jobs/{id}/pause         pause
/// /jobs/{id}/resume        resume
/// /jobs/{id}/stop          stop
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/jobs", jobs::router())
}
