//! Repository for the append-only `job_events` table (PRD-03).

use ghosttype_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::job_event::JobEvent;

/// Column list for `job_events` queries.
const COLUMNS: &str = "id, job_id, event_type, details, created_at";

/// Append and read operations for job audit events. No update or delete:
/// rows only leave the table through the sweep's job deletion cascade.
pub struct JobEventRepo;

impl JobEventRepo {
    /// Append an audit event, returning the generated ID.
    pub async fn append(
        pool: &PgPool,
        job_id: DbId,
        event_type: &str,
        details: &serde_json::Value,
    ) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO job_events (job_id, event_type, details) \
             VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(job_id)
        .bind(event_type)
        .bind(details)
        .fetch_one(pool)
        .await
    }

    /// Append an audit event on a caller-owned transaction.
    pub async fn append_tx(
        conn: &mut PgConnection,
        job_id: DbId,
        event_type: &str,
        details: &serde_json::Value,
    ) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO job_events (job_id, event_type, details) \
             VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(job_id)
        .bind(event_type)
        .bind(details)
        .fetch_one(&mut *conn)
        .await
    }

    /// List a job's events oldest-first.
    pub async fn list_for_job(pool: &PgPool, job_id: DbId) -> Result<Vec<JobEvent>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM job_events WHERE job_id = $1 ORDER BY created_at ASC");
        sqlx::query_as::<_, JobEvent>(&query)
            .bind(job_id)
            .fetch_all(pool)
            .await
    }

    /// Count a job's events of one type (used by tests and the progress UI).
    pub async fn count_for_job_by_type(
        pool: &PgPool,
        job_id: DbId,
        event_type: &str,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM job_events WHERE job_id = $1 AND event_type = $2")
            .bind(job_id)
            .bind(event_type)
            .fetch_one(pool)
            .await
    }
}
