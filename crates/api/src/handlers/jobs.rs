//! Handlers for the `/jobs` resource (PRD-07).
//!
//! All endpoints require authentication via [`AuthOwner`]; owners only ever
//! see and control their own jobs. Dispatch-level failures (rate limits,
//! writer faults) never surface here -- they arrive asynchronously through
//! the progress endpoint as job state.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use validator::Validate;

use ghosttype_core::types::DbId;
use ghosttype_db::models::job::JobListQuery;
use ghosttype_db::repositories::JobRepo;
use ghosttype_engine::control::{self, StartJobInput};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthOwner;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Start
// ---------------------------------------------------------------------------

/// Request body for `POST /api/v1/jobs`.
#[derive(Debug, Deserialize, Validate)]
pub struct StartJobRequest {
    #[validate(length(min = 1, message = "documentRef must not be empty"))]
    pub document_ref: String,
    #[validate(length(min = 1, message = "text must not be empty"))]
    pub text: String,
    #[validate(range(min = 10, max = 360, message = "durationMinutes must be between 10 and 360"))]
    pub duration_minutes: u32,
    pub typing_profile: String,
    /// Required iff `typing_profile` is `typing-test`.
    pub test_wpm: Option<i32>,
}

/// POST /api/v1/jobs
///
/// Validate the request, create the job inside the lock-acquiring
/// transaction, and hand it to the scheduling loop. Returns 201 with the
/// created job.
pub async fn start_job(
    owner: AuthOwner,
    State(state): State<AppState>,
    Json(input): Json<StartJobRequest>,
) -> AppResult<impl IntoResponse> {
    input
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let limits = state.limits.limits_for(owner.owner_id).await?;

    let job = control::start_job(
        &state.pool,
        owner.owner_id,
        &StartJobInput {
            document_ref: input.document_ref,
            full_text: input.text,
            duration_minutes: input.duration_minutes,
            typing_profile: input.typing_profile,
            test_wpm: input.test_wpm,
        },
        &limits,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(DataResponse { data: job })))
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs
///
/// List the caller's jobs, newest first. Supports optional `status_id`,
/// `limit`, and `offset` query parameters.
pub async fn list_jobs(
    owner: AuthOwner,
    State(state): State<AppState>,
    Query(params): Query<JobListQuery>,
) -> AppResult<impl IntoResponse> {
    let jobs = JobRepo::list_owned(&state.pool, owner.owner_id, &params).await?;
    Ok(Json(DataResponse { data: jobs }))
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs/{id}/progress
///
/// Progress snapshot: status, index, totals. Fatal and reaped outcomes show
/// up here as `status` + `error_code` rather than as request errors.
pub async fn job_progress(
    owner: AuthOwner,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let progress = control::job_progress(&state.pool, owner.owner_id, job_id).await?;
    Ok(Json(DataResponse { data: progress }))
}

// ---------------------------------------------------------------------------
// Pause / resume / stop
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs/{id}/pause
///
/// Pause a running job. The document stays reserved for this owner.
pub async fn pause_job(
    owner: AuthOwner,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = control::pause_job(&state.pool, owner.owner_id, job_id).await?;
    Ok(Json(DataResponse { data: job }))
}

/// POST /api/v1/jobs/{id}/resume
///
/// Resume a paused job. Rejected with 409 if the owner already has another
/// active job.
pub async fn resume_job(
    owner: AuthOwner,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = control::resume_job(&state.pool, owner.owner_id, job_id).await?;
    Ok(Json(DataResponse { data: job }))
}

/// POST /api/v1/jobs/{id}/stop
///
/// Stop a job for good and release its document. Terminal: a stopped job
/// cannot be resumed.
pub async fn stop_job(
    owner: AuthOwner,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = control::stop_job(&state.pool, owner.owner_id, job_id).await?;
    Ok(Json(DataResponse { data: job }))
}
