//! Batch dispatcher: one cooperative step of a typing job (PRD-04).
//!
//! [`process_batch`] is the only place where text actually moves toward the
//! document. It is idempotent with respect to job status: re-invoking it on
//! a paused or terminal job is a no-op, which is what makes continuation
//! redelivery after a crash safe. Progress advances only after a confirmed
//! write, so a redelivered step can never double-apply a batch.

use ghosttype_core::codes::{ERR_AUTH_REVOKED, ERR_RATE_LIMIT, ERR_WRITER_FAILED};
use ghosttype_core::events::{EVENT_DISPATCH_FAILED, EVENT_FAILED};
use ghosttype_core::lifecycle::JobStatus;
use ghosttype_core::planner::{build_batch_plan, MistakePlan};
use ghosttype_core::profile::TypingProfile;
use ghosttype_core::types::DbId;
use ghosttype_db::models::job::Job;
use ghosttype_db::repositories::{DocumentLockRepo, JobEventRepo, JobRepo};
use ghosttype_db::DbPool;
use serde_json::json;

use crate::error::EngineResult;
use crate::writer::{DocumentWriter, WriteOutcome};

/// Backoff applied when the writer rate-limits without a suggestion.
pub const DEFAULT_THROTTLE_MS: u64 = 30_000;

/// Floor for writer-suggested backoff values.
const MIN_THROTTLE_MS: u64 = 1_000;

/// Result of one dispatch step, consumed by the scheduling loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// True if a batch was written and progress recorded.
    pub success: bool,
    /// True if the loop should schedule another step for this job.
    pub should_continue: bool,
    /// Classification of a non-success outcome (`RATE_LIMIT`, fatal codes).
    pub error_code: Option<&'static str>,
    /// How long the loop should wait before the next step, when one exists.
    pub next_delay_ms: Option<u64>,
}

impl DispatchOutcome {
    /// Terminal outcome: nothing further to schedule.
    fn halt(success: bool, error_code: Option<&'static str>) -> Self {
        Self {
            success,
            should_continue: false,
            error_code,
            next_delay_ms: None,
        }
    }
}

/// Dispatch one batch of the job's text to the document writer.
///
/// The status check at the top is the cooperative checkpoint where pause and
/// stop take effect; nothing preempts a batch mid-write.
pub async fn process_batch(
    pool: &DbPool,
    writer: &dyn DocumentWriter,
    job_id: DbId,
) -> EngineResult<DispatchOutcome> {
    let Some(job) = JobRepo::find_by_id(pool, job_id).await? else {
        tracing::warn!(job_id, "Dispatch for missing job; dropping");
        return Ok(DispatchOutcome::halt(false, None));
    };

    if job.status() != JobStatus::Running {
        tracing::debug!(
            job_id,
            status = job.status().name(),
            "Job is not running; dispatch is a no-op",
        );
        return Ok(DispatchOutcome::halt(false, None));
    }

    // A crash between progress update and completion leaves a running job
    // with nothing left to type; finish it here.
    if job.current_index >= job.total_chars {
        finish_job(pool, &job).await?;
        return Ok(DispatchOutcome::halt(true, None));
    }

    let profile = TypingProfile::from_str(&job.typing_profile).map_err(|e| {
        tracing::error!(job_id, profile = %job.typing_profile, "Stored profile failed to parse");
        e
    })?;

    let plan = build_batch_plan(
        &job.full_text,
        job.current_index as u32,
        job.total_chars as u32,
        job.duration_minutes as u32,
        profile,
        job.target_wpm,
    )?;

    if let MistakePlan::Mistake {
        insert_position,
        wrong_char,
        correction_delay_ms,
    } = plan.mistake_plan
    {
        tracing::debug!(
            job_id,
            insert_position,
            %wrong_char,
            correction_delay_ms,
            "Simulating a typo-and-correction in this batch",
        );
    }

    let outcome = writer
        .write(&job.document_ref, &plan.batch_text, job.current_index)
        .await?;

    match outcome {
        WriteOutcome::Ok => {
            let written = plan.batch_text.chars().count() as i32;
            let Some(updated) = JobRepo::advance_progress(pool, job.id, written).await? else {
                // Bound guard refused the advance: the stored index moved
                // underneath us. Halt and let the next delivery re-plan.
                tracing::warn!(job_id, written, "Progress advance rejected; halting step");
                return Ok(DispatchOutcome::halt(false, None));
            };

            if updated.current_index >= updated.total_chars {
                finish_job(pool, &updated).await?;
                return Ok(DispatchOutcome::halt(true, None));
            }

            Ok(DispatchOutcome {
                success: true,
                should_continue: true,
                error_code: None,
                next_delay_ms: Some(plan.total_delay_ms() + plan.batch_pause_ms),
            })
        }

        WriteOutcome::RateLimited { retry_after_ms } => {
            let throttle = if retry_after_ms == 0 {
                DEFAULT_THROTTLE_MS
            } else {
                retry_after_ms.max(MIN_THROTTLE_MS)
            };
            JobRepo::set_throttle(pool, job.id, throttle as i32).await?;
            JobEventRepo::append(
                pool,
                job.id,
                EVENT_DISPATCH_FAILED,
                &json!({ "error": ERR_RATE_LIMIT, "retry_after_ms": throttle }),
            )
            .await?;
            tracing::info!(job_id, throttle_ms = throttle, "Writer rate-limited; backing off");

            // Index untouched: the same batch span is retried verbatim.
            Ok(DispatchOutcome {
                success: false,
                should_continue: true,
                error_code: Some(ERR_RATE_LIMIT),
                next_delay_ms: Some(throttle),
            })
        }

        WriteOutcome::AuthRevoked => {
            fail_job(pool, &job, ERR_AUTH_REVOKED, json!({ "error": ERR_AUTH_REVOKED })).await?;
            Ok(DispatchOutcome::halt(false, Some(ERR_AUTH_REVOKED)))
        }

        WriteOutcome::Fatal { message } => {
            tracing::error!(job_id, error = %message, "Writer reported a fatal error");
            fail_job(
                pool,
                &job,
                ERR_WRITER_FAILED,
                json!({ "error": ERR_WRITER_FAILED, "message": message }),
            )
            .await?;
            Ok(DispatchOutcome::halt(false, Some(ERR_WRITER_FAILED)))
        }
    }
}

/// Transition a fully-typed job to completed and free its document.
async fn finish_job(pool: &DbPool, job: &Job) -> EngineResult<()> {
    if JobRepo::complete(pool, job.id).await? {
        DocumentLockRepo::release_if_held(pool, job.id).await?;
        tracing::info!(
            job_id = job.id,
            total_chars = job.total_chars,
            "Typing job completed",
        );
    }
    Ok(())
}

/// Force a job into failed, audit it, and free its document.
async fn fail_job(
    pool: &DbPool,
    job: &Job,
    error_code: &str,
    details: serde_json::Value,
) -> EngineResult<()> {
    if JobRepo::fail(pool, job.id, error_code).await? {
        JobEventRepo::append(pool, job.id, EVENT_FAILED, &details).await?;
        DocumentLockRepo::release_if_held(pool, job.id).await?;
        tracing::warn!(job_id = job.id, error_code, "Typing job failed");
    }
    Ok(())
}
