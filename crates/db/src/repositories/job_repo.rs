//! Repository for the `jobs` table (PRD-03).
//!
//! Every status transition is guarded by a `WHERE status_id = ...` clause
//! matching the state machine in `ghosttype_core::lifecycle`, so a lost race
//! shows up as `rows_affected == 0` instead of a corrupt row. Methods that
//! must run inside a caller-owned transaction take `&mut PgConnection`.

use ghosttype_core::lifecycle::{JobStatus, ACTIVE_STATUSES};
use ghosttype_core::types::{DbId, Timestamp};
use sqlx::{PgConnection, PgPool};

use crate::models::job::{CreateJob, Job, JobListQuery};

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, owner_id, document_ref, full_text, total_chars, current_index, \
    duration_minutes, typing_profile, target_wpm, status_id, \
    throttle_delay_ms, error_code, completed_at, expires_at, \
    created_at, updated_at";

/// Maximum page size for job listing.
const MAX_LIMIT: i64 = 100;

/// Default page size for job listing.
const DEFAULT_LIMIT: i64 = 50;

/// TTL stamped on every new job: expired by the sweep once passed.
const EXPIRY_DAYS: i32 = 7;

/// Provides CRUD operations and guarded status transitions for jobs.
pub struct JobRepo;

impl JobRepo {
    /// Insert a new pending job. Runs on a caller-owned transaction so the
    /// insert commits atomically with the document lock acquisition.
    pub async fn create(conn: &mut PgConnection, input: &CreateJob) -> Result<Job, sqlx::Error> {
        let query = format!(
            "INSERT INTO jobs \
                 (owner_id, document_ref, full_text, total_chars, duration_minutes, \
                  typing_profile, target_wpm, status_id, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW() + make_interval(days => $9)) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(input.owner_id)
            .bind(&input.document_ref)
            .bind(&input.full_text)
            .bind(input.total_chars)
            .bind(input.duration_minutes)
            .bind(&input.typing_profile)
            .bind(input.target_wpm)
            .bind(JobStatus::Pending.id())
            .bind(EXPIRY_DAYS)
            .fetch_one(&mut *conn)
            .await
    }

    /// Find a job by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a job by ID with its row locked for the rest of the transaction.
    pub async fn find_for_update(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
    }

    /// List one owner's jobs, newest first, with optional status filter.
    pub async fn list_owned(
        pool: &PgPool,
        owner_id: DbId,
        params: &JobListQuery,
    ) -> Result<Vec<Job>, sqlx::Error> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
        let offset = params.offset.unwrap_or(0);

        let query = if params.status_id.is_some() {
            format!(
                "SELECT {COLUMNS} FROM jobs \
                 WHERE owner_id = $1 AND status_id = $2 \
                 ORDER BY created_at DESC LIMIT $3 OFFSET $4"
            )
        } else {
            format!(
                "SELECT {COLUMNS} FROM jobs \
                 WHERE owner_id = $1 \
                 ORDER BY created_at DESC LIMIT $2 OFFSET $3"
            )
        };

        let mut q = sqlx::query_as::<_, Job>(&query).bind(owner_id);
        if let Some(status_id) = params.status_id {
            q = q.bind(status_id);
        }
        q.bind(limit).bind(offset).fetch_all(pool).await
    }

    // -----------------------------------------------------------------------
    // Guarded transitions
    // -----------------------------------------------------------------------

    /// Promote pending -> running. Returns `false` if the job is no longer
    /// pending (e.g. stopped before the first dispatch).
    pub async fn mark_running(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE jobs SET status_id = $2 WHERE id = $1 AND status_id = $3")
            .bind(id)
            .bind(JobStatus::Running.id())
            .bind(JobStatus::Pending.id())
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Advance `current_index` after a confirmed write.
    ///
    /// Applies while the job is running, or paused (a pause that landed
    /// while the write was in flight must still record the confirmed
    /// characters, or resume would re-type them). The bound guard keeps
    /// progress monotonic and within `total_chars`. Returns the updated
    /// row, or `None` if the guard did not match.
    pub async fn advance_progress(
        pool: &PgPool,
        id: DbId,
        chars_written: i32,
    ) -> Result<Option<Job>, sqlx::Error> {
        let query = format!(
            "UPDATE jobs \
             SET current_index = current_index + $2 \
             WHERE id = $1 AND status_id IN ($3, $4) \
               AND current_index + $2 <= total_chars \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .bind(chars_written)
            .bind(JobStatus::Running.id())
            .bind(JobStatus::Paused.id())
            .fetch_optional(pool)
            .await
    }

    /// Store the writer-suggested backoff after a rate-limit signal.
    pub async fn set_throttle(
        pool: &PgPool,
        id: DbId,
        throttle_delay_ms: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE jobs SET throttle_delay_ms = $2 WHERE id = $1")
            .bind(id)
            .bind(throttle_delay_ms)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Running -> completed once every character is written.
    pub async fn complete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs SET status_id = $2, completed_at = NOW() \
             WHERE id = $1 AND status_id = $3",
        )
        .bind(id)
        .bind(JobStatus::Completed.id())
        .bind(JobStatus::Running.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Pending|running -> failed with an error code.
    pub async fn fail(pool: &PgPool, id: DbId, error_code: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs SET status_id = $2, error_code = $3 \
             WHERE id = $1 AND status_id IN ($4, $5)",
        )
        .bind(id)
        .bind(JobStatus::Failed.id())
        .bind(error_code)
        .bind(JobStatus::Pending.id())
        .bind(JobStatus::Running.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Same as [`JobRepo::fail`], on a caller-owned transaction (used by the
    /// stuck-job reclamation inside the start transaction).
    pub async fn fail_tx(
        conn: &mut PgConnection,
        id: DbId,
        error_code: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs SET status_id = $2, error_code = $3 \
             WHERE id = $1 AND status_id IN ($4, $5)",
        )
        .bind(id)
        .bind(JobStatus::Failed.id())
        .bind(error_code)
        .bind(JobStatus::Pending.id())
        .bind(JobStatus::Running.id())
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Running -> paused. The document lock is intentionally left held.
    pub async fn pause(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE jobs SET status_id = $2 WHERE id = $1 AND status_id = $3")
            .bind(id)
            .bind(JobStatus::Paused.id())
            .bind(JobStatus::Running.id())
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Paused -> running, on a caller-owned transaction (the resume path
    /// re-checks the one-active-job-per-owner invariant in the same window).
    pub async fn resume(conn: &mut PgConnection, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE jobs SET status_id = $2 WHERE id = $1 AND status_id = $3")
            .bind(id)
            .bind(JobStatus::Running.id())
            .bind(JobStatus::Paused.id())
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Any non-terminal status -> stopped. Terminal, non-resumable.
    pub async fn stop(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs SET status_id = $2 \
             WHERE id = $1 AND status_id IN ($3, $4, $5)",
        )
        .bind(id)
        .bind(JobStatus::Stopped.id())
        .bind(JobStatus::Pending.id())
        .bind(JobStatus::Running.id())
        .bind(JobStatus::Paused.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // -----------------------------------------------------------------------
    // Owner invariants
    // -----------------------------------------------------------------------

    /// Count the owner's pending/running jobs inside the current transaction
    /// window. Best-effort invariant: re-checked on each transition, not
    /// continuously enforced.
    pub async fn count_active_for_owner(
        conn: &mut PgConnection,
        owner_id: DbId,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM jobs WHERE owner_id = $1 AND status_id = ANY($2)",
        )
        .bind(owner_id)
        .bind(&ACTIVE_STATUSES[..])
        .fetch_one(&mut *conn)
        .await
    }

    /// Count jobs the owner created at or after `since` (daily quota check).
    pub async fn count_started_since(
        conn: &mut PgConnection,
        owner_id: DbId,
        since: Timestamp,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE owner_id = $1 AND created_at >= $2")
            .bind(owner_id)
            .bind(since)
            .fetch_one(&mut *conn)
            .await
    }

    // -----------------------------------------------------------------------
    // Sweep operations
    // -----------------------------------------------------------------------

    /// Force pending/running jobs created before `cutoff` into `failed`.
    /// Returns the affected job IDs so the sweep can release their locks
    /// and append audit events.
    pub async fn fail_overruns(
        pool: &PgPool,
        cutoff: Timestamp,
        error_code: &str,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "UPDATE jobs SET status_id = $2, error_code = $3 \
             WHERE status_id IN ($4, $5) AND created_at < $1 \
             RETURNING id",
        )
        .bind(cutoff)
        .bind(JobStatus::Failed.id())
        .bind(error_code)
        .bind(JobStatus::Pending.id())
        .bind(JobStatus::Running.id())
        .fetch_all(pool)
        .await
    }

    /// Force non-terminal jobs past their `expires_at` into `expired`.
    pub async fn expire_overdue(pool: &PgPool) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "UPDATE jobs SET status_id = $1 \
             WHERE status_id IN ($2, $3, $4) AND expires_at < NOW() \
             RETURNING id",
        )
        .bind(JobStatus::Expired.id())
        .bind(JobStatus::Pending.id())
        .bind(JobStatus::Running.id())
        .bind(JobStatus::Paused.id())
        .fetch_all(pool)
        .await
    }

    /// Privacy scrub: clear the stored text of jobs created before `cutoff`,
    /// keeping all other metadata. Idempotent (already-empty rows no longer
    /// match the filter).
    pub async fn scrub_text_older_than(
        pool: &PgPool,
        cutoff: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs SET full_text = '' WHERE created_at < $1 AND full_text <> ''",
        )
        .bind(cutoff)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete jobs created before `cutoff` outright (audit events cascade).
    pub async fn delete_older_than(pool: &PgPool, cutoff: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM jobs WHERE created_at < $1")
            .bind(cutoff)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
