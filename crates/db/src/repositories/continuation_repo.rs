//! Repository for the `job_continuations` delay queue (PRD-05).
//!
//! Claiming uses `FOR UPDATE SKIP LOCKED` so multiple runner instances never
//! double-claim a step. A claim is a lease, not a consume: the row is deleted
//! only after the step finishes, and a lease left behind by a crashed worker
//! becomes claimable again once stale (at-least-once delivery).

use ghosttype_core::types::{DbId, Timestamp};
use sqlx::{PgConnection, PgPool};

use crate::models::continuation::{Continuation, ContinuationKind};

/// Column list for `job_continuations` queries.
const COLUMNS: &str = "id, job_id, kind, not_before, claimed_at, created_at";

/// A claim older than this is considered abandoned and re-claimable.
pub const CLAIM_STALE_SECS: f64 = 300.0;

/// Scheduling and claiming operations for the durable timer queue.
pub struct ContinuationRepo;

impl ContinuationRepo {
    /// Schedule a step for `job_id` to run at or after `not_before`.
    pub async fn schedule(
        pool: &PgPool,
        job_id: DbId,
        kind: ContinuationKind,
        not_before: Timestamp,
    ) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO job_continuations (job_id, kind, not_before) \
             VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(job_id)
        .bind(kind.as_str())
        .bind(not_before)
        .fetch_one(pool)
        .await
    }

    /// Schedule a step on a caller-owned transaction (job creation path).
    pub async fn schedule_tx(
        conn: &mut PgConnection,
        job_id: DbId,
        kind: ContinuationKind,
        not_before: Timestamp,
    ) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO job_continuations (job_id, kind, not_before) \
             VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(job_id)
        .bind(kind.as_str())
        .bind(not_before)
        .fetch_one(&mut *conn)
        .await
    }

    /// Claim up to `limit` due steps: due rows that are unclaimed, or whose
    /// previous claim went stale (crashed worker). Claimed rows get a fresh
    /// `claimed_at` lease and are returned oldest-deadline-first.
    pub async fn claim_due(pool: &PgPool, limit: i64) -> Result<Vec<Continuation>, sqlx::Error> {
        let query = format!(
            "UPDATE job_continuations SET claimed_at = NOW() \
             WHERE id IN ( \
                 SELECT id FROM job_continuations \
                 WHERE not_before <= NOW() \
                   AND (claimed_at IS NULL \
                        OR claimed_at < NOW() - make_interval(secs => $2)) \
                 ORDER BY not_before ASC \
                 LIMIT $1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Continuation>(&query)
            .bind(limit)
            .bind(CLAIM_STALE_SECS)
            .fetch_all(pool)
            .await
    }

    /// Schedule a step only if the job has no other pending continuation.
    ///
    /// `ignoring` is the row the caller is currently processing (still
    /// present until the step completes); pass `None` when there is none.
    /// Keeps a redelivered step from forking a second continuation chain
    /// for the same job. Returns the new ID, or `None` if skipped.
    pub async fn schedule_if_absent(
        pool: &PgPool,
        job_id: DbId,
        kind: ContinuationKind,
        not_before: Timestamp,
        ignoring: Option<DbId>,
    ) -> Result<Option<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO job_continuations (job_id, kind, not_before) \
             SELECT $1, $2, $3 \
             WHERE NOT EXISTS ( \
                 SELECT 1 FROM job_continuations \
                 WHERE job_id = $1 AND ($4::BIGINT IS NULL OR id <> $4) \
             ) \
             RETURNING id",
        )
        .bind(job_id)
        .bind(kind.as_str())
        .bind(not_before)
        .bind(ignoring)
        .fetch_optional(pool)
        .await
    }

    /// Same as [`ContinuationRepo::schedule_if_absent`], on a caller-owned
    /// transaction (resume path).
    pub async fn schedule_if_absent_tx(
        conn: &mut PgConnection,
        job_id: DbId,
        kind: ContinuationKind,
        not_before: Timestamp,
        ignoring: Option<DbId>,
    ) -> Result<Option<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO job_continuations (job_id, kind, not_before) \
             SELECT $1, $2, $3 \
             WHERE NOT EXISTS ( \
                 SELECT 1 FROM job_continuations \
                 WHERE job_id = $1 AND ($4::BIGINT IS NULL OR id <> $4) \
             ) \
             RETURNING id",
        )
        .bind(job_id)
        .bind(kind.as_str())
        .bind(not_before)
        .bind(ignoring)
        .fetch_optional(&mut *conn)
        .await
    }

    /// Delete a continuation once its step has been fully processed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM job_continuations WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Drop every continuation whose job has reached a terminal status.
    /// Reconciliation for orphaned work; idempotent.
    pub async fn purge_terminal(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM job_continuations c USING jobs j \
             WHERE c.job_id = j.id AND j.status_id IN (4, 5, 6, 7)",
        )
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Count pending continuations for a job (used by tests).
    pub async fn count_for_job(pool: &PgPool, job_id: DbId) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM job_continuations WHERE job_id = $1")
            .bind(job_id)
            .fetch_one(pool)
            .await
    }
}
