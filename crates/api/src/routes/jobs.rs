//! Route definitions for the `/jobs` resource (PRD-07).
//!
//! All endpoints require authentication.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Routes mounted at `/jobs`.
///
/// ```text
/// GET    /                 -> list_jobs
/// POST   /                 -> start_job
/// GET    /{id}/progress    -> job_progress
/// POST   /{id}/pause       -> pause_job
/// POST   /{id}/resume      -> resume_job
/// POST   /{id}/stop        -> stop_job
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(jobs::list_jobs).post(jobs::start_job))
        .route("/{id}/progress", get(jobs::job_progress))
        .route("/{id}/pause", post(jobs::pause_job))
        .route("/{id}/resume", post(jobs::resume_job))
        .route("/{id}/stop", post(jobs::stop_job))
}
