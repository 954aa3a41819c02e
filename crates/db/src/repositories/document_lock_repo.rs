//! Repository for the `document_locks` table (PRD-03).
//!
//! The lock row is the serialization point for "start" and "resume": both
//! paths read it with `SELECT ... FOR UPDATE` and mutate it in the same
//! transaction, never as separate read-then-write calls.

use ghosttype_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::document_lock::{DocumentLock, LockState};

/// Column list for `document_locks` queries.
const COLUMNS: &str =
    "id, owner_id, document_ref, state_id, current_job_id, created_at, updated_at";

/// Provides guarded acquire/release operations for document locks.
pub struct DocumentLockRepo;

impl DocumentLockRepo {
    /// Find the lock row for an (owner, document) pair.
    pub async fn find(
        pool: &PgPool,
        owner_id: DbId,
        document_ref: &str,
    ) -> Result<Option<DocumentLock>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM document_locks \
             WHERE owner_id = $1 AND document_ref = $2"
        );
        sqlx::query_as::<_, DocumentLock>(&query)
            .bind(owner_id)
            .bind(document_ref)
            .fetch_optional(pool)
            .await
    }

    /// Find the lock row and hold a row lock on it for the rest of the
    /// transaction. Concurrent start/resume requests for the same document
    /// serialize here.
    pub async fn find_for_update(
        conn: &mut PgConnection,
        owner_id: DbId,
        document_ref: &str,
    ) -> Result<Option<DocumentLock>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM document_locks \
             WHERE owner_id = $1 AND document_ref = $2 \
             FOR UPDATE"
        );
        sqlx::query_as::<_, DocumentLock>(&query)
            .bind(owner_id)
            .bind(document_ref)
            .fetch_optional(&mut *conn)
            .await
    }

    /// Point the lock at a job and mark it running. The caller must have
    /// verified under `find_for_update` that the lock is free (or reclaimed).
    pub async fn acquire(
        conn: &mut PgConnection,
        owner_id: DbId,
        document_ref: &str,
        job_id: DbId,
    ) -> Result<DocumentLock, sqlx::Error> {
        let query = format!(
            "INSERT INTO document_locks (owner_id, document_ref, state_id, current_job_id) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT ON CONSTRAINT uq_document_locks_owner_document \
             DO UPDATE SET state_id = $3, current_job_id = $4 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DocumentLock>(&query)
            .bind(owner_id)
            .bind(document_ref)
            .bind(LockState::Running.id())
            .bind(job_id)
            .fetch_one(&mut *conn)
            .await
    }

    /// Release the lock, but only if `job_id` still holds it. The guard
    /// keeps a finished job from releasing a lock a newer job re-acquired
    /// after a race. Returns `true` if a row was released.
    pub async fn release_if_held(pool: &PgPool, job_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE document_locks SET state_id = $2, current_job_id = NULL \
             WHERE current_job_id = $1",
        )
        .bind(job_id)
        .bind(LockState::Idle.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Same as [`DocumentLockRepo::release_if_held`], on a caller-owned
    /// transaction.
    pub async fn release_if_held_tx(
        conn: &mut PgConnection,
        job_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE document_locks SET state_id = $2, current_job_id = NULL \
             WHERE current_job_id = $1",
        )
        .bind(job_id)
        .bind(LockState::Idle.id())
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
