//! Lifecycle control operations: start, pause, resume, stop, progress (PRD-07).
//!
//! Everything that must hold under concurrent requests happens inside one
//! transaction per operation: the document lock row is read with
//! `SELECT ... FOR UPDATE` and mutated in the same transaction, and the
//! one-active-job-per-owner count runs in the same window. Validation and
//! conflict errors surface synchronously; dispatch failures never do (they
//! are reported through the progress endpoint).

use chrono::{Duration, Utc};
use ghosttype_core::codes::ERR_STUCK_RECLAIMED;
use ghosttype_core::error::CoreError;
use ghosttype_core::events::{
    EVENT_FAILED, EVENT_PAUSED, EVENT_RESUMED, EVENT_STARTED, EVENT_STOPPED,
};
use ghosttype_core::lifecycle::{state_machine, JobStatus};
use ghosttype_core::limits::{validate_duration, validate_profile_allowed, PlanLimits};
use ghosttype_core::profile::{compute_delay_params, TypingProfile};
use ghosttype_core::types::DbId;
use ghosttype_db::models::continuation::ContinuationKind;
use ghosttype_db::models::job::{CreateJob, Job, JobProgress};
use ghosttype_db::repositories::{ContinuationRepo, DocumentLockRepo, JobEventRepo, JobRepo};
use ghosttype_db::DbPool;
use serde_json::json;

use crate::error::{EngineError, EngineResult};

/// A lock-holding job that has gone this long without a row update is
/// considered stuck and eligible for forced reclamation.
const STUCK_THRESHOLD_MINS: i64 = 60;

/// Rolling window for the per-owner job quota.
const QUOTA_WINDOW_HOURS: i64 = 24;

/// Upper bound on payload size, in characters.
const MAX_TEXT_CHARS: usize = 100_000;

/// Validated input for [`start_job`]. Field names mirror the public API.
#[derive(Debug, Clone)]
pub struct StartJobInput {
    pub document_ref: String,
    pub full_text: String,
    pub duration_minutes: u32,
    pub typing_profile: String,
    pub test_wpm: Option<i32>,
}

// ---------------------------------------------------------------------------
// start
// ---------------------------------------------------------------------------

/// Create a job, acquire its document lock, and hand it to the scheduler.
///
/// The job row, the lock acquisition, the `started` audit event, and the
/// first continuation commit atomically; there is no window in which two
/// jobs both believe they hold the same document.
pub async fn start_job(
    pool: &DbPool,
    owner_id: DbId,
    input: &StartJobInput,
    limits: &PlanLimits,
) -> EngineResult<Job> {
    // --- Synchronous validation, before anything is written ---
    let profile = TypingProfile::from_str(&input.typing_profile)?;
    let target_wpm = match profile {
        // The calculator re-validates range and presence.
        TypingProfile::TypingTest => {
            compute_delay_params(profile, input.test_wpm)?;
            input.test_wpm
        }
        // Normalized away for every other profile.
        _ => None,
    };
    validate_duration(input.duration_minutes, limits)?;
    validate_profile_allowed(profile, limits)?;

    let total_chars = input.full_text.chars().count();
    if total_chars == 0 {
        return Err(CoreError::Validation("text must not be empty".to_string()).into());
    }
    if total_chars > MAX_TEXT_CHARS {
        return Err(CoreError::Validation(format!(
            "text exceeds the maximum of {MAX_TEXT_CHARS} characters"
        ))
        .into());
    }

    let mut tx = pool.begin().await.map_err(EngineError::Database)?;

    // --- Document lock: serialize against concurrent start/resume ---
    // Runs before the active-job count so a stuck job gets reclaimed
    // instead of counting against its owner forever.
    let lock = DocumentLockRepo::find_for_update(&mut *tx, owner_id, &input.document_ref).await?;
    if let Some(lock) = lock {
        if lock.is_running() {
            match lock.current_job_id {
                Some(holder_id) => {
                    reclaim_or_reject(&mut *tx, holder_id).await?;
                }
                // state says running but no job recorded: stale row,
                // safe to take over.
                None => {}
            }
        }
    }

    // --- One active job per owner ---
    let active = JobRepo::count_active_for_owner(&mut *tx, owner_id).await?;
    if active > 0 {
        return Err(CoreError::Conflict(
            "You already have an active typing job".to_string(),
        )
        .into());
    }

    // --- Daily quota (rolling 24h window) ---
    let since = Utc::now() - Duration::hours(QUOTA_WINDOW_HOURS);
    let started_today = JobRepo::count_started_since(&mut *tx, owner_id, since).await?;
    if started_today >= limits.max_jobs_per_day as i64 {
        return Err(CoreError::Conflict(format!(
            "Daily limit of {} jobs reached",
            limits.max_jobs_per_day
        ))
        .into());
    }

    // --- Create the job and point the lock at it ---
    let job = JobRepo::create(
        &mut *tx,
        &CreateJob {
            owner_id,
            document_ref: input.document_ref.clone(),
            full_text: input.full_text.clone(),
            total_chars: total_chars as i32,
            duration_minutes: input.duration_minutes as i32,
            typing_profile: profile.as_str().to_string(),
            target_wpm,
        },
    )
    .await?;

    DocumentLockRepo::acquire(&mut *tx, owner_id, &input.document_ref, job.id).await?;

    JobEventRepo::append_tx(
        &mut *tx,
        job.id,
        EVENT_STARTED,
        &json!({
            "total_chars": job.total_chars,
            "duration_minutes": job.duration_minutes,
            "typing_profile": job.typing_profile,
        }),
    )
    .await?;

    ContinuationRepo::schedule_tx(&mut *tx, job.id, ContinuationKind::Start, Utc::now()).await?;

    tx.commit().await.map_err(EngineError::Database)?;

    tracing::info!(
        job_id = job.id,
        owner_id,
        document_ref = %job.document_ref,
        total_chars = job.total_chars,
        profile = %job.typing_profile,
        "Typing job started",
    );

    Ok(job)
}

/// Decide what to do about the job currently holding a lock: reclaim it if
/// stuck, otherwise reject the new start with a conflict.
async fn reclaim_or_reject(
    tx: &mut sqlx::PgConnection,
    holder_id: DbId,
) -> EngineResult<()> {
    let holder = JobRepo::find_for_update(tx, holder_id).await?;

    let Some(holder) = holder else {
        // Lock points at a deleted job; take over.
        return Ok(());
    };

    if holder.is_terminal() {
        // Lock out of sync with a finished job; take over.
        return Ok(());
    }

    let stale_cutoff = Utc::now() - Duration::minutes(STUCK_THRESHOLD_MINS);
    if holder.updated_at >= stale_cutoff {
        return Err(CoreError::Conflict(
            "Document already has an active typing job".to_string(),
        )
        .into());
    }

    // Stuck: no progress for over the threshold. Force-fail it and free the
    // document, all inside the caller's transaction.
    tracing::warn!(
        job_id = holder.id,
        last_update = %holder.updated_at,
        "Reclaiming document lock from stuck job",
    );
    JobRepo::fail_tx(tx, holder.id, ERR_STUCK_RECLAIMED).await?;
    JobEventRepo::append_tx(
        tx,
        holder.id,
        EVENT_FAILED,
        &json!({ "error": ERR_STUCK_RECLAIMED }),
    )
    .await?;
    DocumentLockRepo::release_if_held_tx(tx, holder.id).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// pause
// ---------------------------------------------------------------------------

/// Pause a running job. The document lock stays held so the owner can
/// resume without losing the document.
pub async fn pause_job(pool: &DbPool, owner_id: DbId, job_id: DbId) -> EngineResult<Job> {
    let job = find_owned(pool, owner_id, job_id, "pause").await?;

    if job.status() != JobStatus::Running {
        return Err(CoreError::Conflict("Job is not running".to_string()).into());
    }

    if !JobRepo::pause(pool, job_id).await? {
        // Lost a race with completion/failure between read and update.
        return Err(CoreError::Conflict("Job is not running".to_string()).into());
    }

    let job = reload(pool, job_id).await?;
    JobEventRepo::append(
        pool,
        job_id,
        EVENT_PAUSED,
        &json!({ "current_index": job.current_index }),
    )
    .await?;

    tracing::info!(job_id, current_index = job.current_index, "Typing job paused");
    Ok(job)
}

// ---------------------------------------------------------------------------
// resume
// ---------------------------------------------------------------------------

/// Resume a paused job and restart its scheduling loop.
pub async fn resume_job(pool: &DbPool, owner_id: DbId, job_id: DbId) -> EngineResult<Job> {
    let mut tx = pool.begin().await.map_err(EngineError::Database)?;

    let job = JobRepo::find_for_update(&mut *tx, job_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "Job",
            id: job_id,
        })?;
    if job.owner_id != owner_id {
        return Err(CoreError::Forbidden("Cannot resume another user's job".to_string()).into());
    }

    if job.status() != JobStatus::Paused {
        return Err(CoreError::Conflict("Job is not paused".to_string()).into());
    }

    // One active job per owner, re-checked in the same transaction window.
    let active = JobRepo::count_active_for_owner(&mut *tx, owner_id).await?;
    if active > 0 {
        return Err(CoreError::Conflict(
            "You already have an active typing job".to_string(),
        )
        .into());
    }

    if !JobRepo::resume(&mut *tx, job_id).await? {
        return Err(CoreError::Conflict("Job is not paused".to_string()).into());
    }

    JobEventRepo::append_tx(
        &mut *tx,
        job_id,
        EVENT_RESUMED,
        &json!({ "current_index": job.current_index }),
    )
    .await?;

    ContinuationRepo::schedule_if_absent_tx(
        &mut *tx,
        job_id,
        ContinuationKind::Batch,
        Utc::now(),
        None,
    )
    .await?;

    tx.commit().await.map_err(EngineError::Database)?;

    tracing::info!(job_id, current_index = job.current_index, "Typing job resumed");
    reload(pool, job_id).await
}

// ---------------------------------------------------------------------------
// stop
// ---------------------------------------------------------------------------

/// Stop a job for good. Terminal, non-resumable, and the only user action
/// that releases the document lock unconditionally.
pub async fn stop_job(pool: &DbPool, owner_id: DbId, job_id: DbId) -> EngineResult<Job> {
    let job = find_owned(pool, owner_id, job_id, "stop").await?;

    if state_machine::is_terminal(job.status_id) {
        return Err(CoreError::Conflict(
            "Job is already in a terminal state".to_string(),
        )
        .into());
    }

    if !JobRepo::stop(pool, job_id).await? {
        return Err(CoreError::Conflict(
            "Job is already in a terminal state".to_string(),
        )
        .into());
    }

    DocumentLockRepo::release_if_held(pool, job_id).await?;

    let job = reload(pool, job_id).await?;
    JobEventRepo::append(
        pool,
        job_id,
        EVENT_STOPPED,
        &json!({ "current_index": job.current_index }),
    )
    .await?;

    tracing::info!(job_id, current_index = job.current_index, "Typing job stopped");
    Ok(job)
}

// ---------------------------------------------------------------------------
// progress
// ---------------------------------------------------------------------------

/// Snapshot a job's progress for its owner.
pub async fn job_progress(pool: &DbPool, owner_id: DbId, job_id: DbId) -> EngineResult<JobProgress> {
    let job = find_owned(pool, owner_id, job_id, "view").await?;
    Ok(JobProgress::from(&job))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Fetch a job and verify the caller owns it. `action` lands in the error
/// message (e.g. "pause", "stop", "view").
async fn find_owned(
    pool: &DbPool,
    owner_id: DbId,
    job_id: DbId,
    action: &str,
) -> EngineResult<Job> {
    let job = JobRepo::find_by_id(pool, job_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "Job",
            id: job_id,
        })?;

    if job.owner_id != owner_id {
        return Err(CoreError::Forbidden(format!("Cannot {action} another user's job")).into());
    }

    Ok(job)
}

async fn reload(pool: &DbPool, job_id: DbId) -> EngineResult<Job> {
    JobRepo::find_by_id(pool, job_id)
        .await?
        .ok_or_else(|| {
            EngineError::Core(CoreError::NotFound {
                entity: "Job",
                id: job_id,
            })
        })
}
