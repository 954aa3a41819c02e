//! Cleanup sweep tests: overrun failure, TTL expiry, privacy scrub,
//! retention deletion, and idempotency.

mod common;

use chrono::Utc;
use common::{start_input, test_limits};
use ghosttype_core::codes::ERR_MAX_RUNTIME_EXCEEDED;
use ghosttype_core::events::EVENT_FAILED;
use ghosttype_core::lifecycle::JobStatus;
use ghosttype_db::models::continuation::ContinuationKind;
use ghosttype_db::models::document_lock::LockState;
use ghosttype_db::repositories::{ContinuationRepo, DocumentLockRepo, JobEventRepo, JobRepo};
use ghosttype_engine::control;
use ghosttype_engine::sweep;
use sqlx::PgPool;

const OWNER: i64 = 1;

async fn backdate_created(pool: &PgPool, job_id: i64, interval: &str) {
    sqlx::query(&format!(
        "UPDATE jobs SET created_at = NOW() - INTERVAL '{interval}' WHERE id = $1"
    ))
    .bind(job_id)
    .execute(pool)
    .await
    .unwrap();
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn overrunning_jobs_are_failed_and_unlocked(pool: PgPool) {
    let job = control::start_job(&pool, OWNER, &start_input("doc-1", "hello world"), &test_limits())
        .await
        .unwrap();
    JobRepo::mark_running(&pool, job.id).await.unwrap();
    backdate_created(&pool, job.id, "9 hours").await;

    let report = sweep::run_pass(&pool).await.unwrap();
    assert_eq!(report.overruns_failed, 1);

    let failed = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(failed.status(), JobStatus::Failed);
    assert_eq!(failed.error_code.as_deref(), Some(ERR_MAX_RUNTIME_EXCEEDED));

    let lock = DocumentLockRepo::find(&pool, OWNER, "doc-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(lock.state_id, LockState::Idle.id());

    assert_eq!(
        JobEventRepo::count_for_job_by_type(&pool, job.id, EVENT_FAILED)
            .await
            .unwrap(),
        1
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn jobs_past_their_ttl_are_expired(pool: PgPool) {
    let job = control::start_job(&pool, OWNER, &start_input("doc-1", "hello world"), &test_limits())
        .await
        .unwrap();
    JobRepo::mark_running(&pool, job.id).await.unwrap();
    JobRepo::pause(&pool, job.id).await.unwrap();

    // Paused forever: past the TTL but not past the 8h overrun window
    // (overruns only target pending/running).
    sqlx::query("UPDATE jobs SET expires_at = NOW() - INTERVAL '1 hour' WHERE id = $1")
        .bind(job.id)
        .execute(&pool)
        .await
        .unwrap();

    let report = sweep::run_pass(&pool).await.unwrap();
    assert_eq!(report.expired, 1);

    let expired = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(expired.status(), JobStatus::Expired);

    let lock = DocumentLockRepo::find(&pool, OWNER, "doc-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(lock.state_id, LockState::Idle.id());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn old_text_is_scrubbed_but_metadata_survives(pool: PgPool) {
    let job = control::start_job(&pool, OWNER, &start_input("doc-1", "hello world"), &test_limits())
        .await
        .unwrap();
    control::stop_job(&pool, OWNER, job.id).await.unwrap();
    backdate_created(&pool, job.id, "31 days").await;

    let report = sweep::run_pass(&pool).await.unwrap();
    assert_eq!(report.text_scrubbed, 1);

    let scrubbed = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(scrubbed.full_text, "");
    assert_eq!(scrubbed.total_chars, 11);
    assert_eq!(scrubbed.document_ref, "doc-1");
    assert_eq!(scrubbed.status(), JobStatus::Stopped);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn ancient_jobs_are_deleted_outright(pool: PgPool) {
    let job = control::start_job(&pool, OWNER, &start_input("doc-1", "hello world"), &test_limits())
        .await
        .unwrap();
    control::stop_job(&pool, OWNER, job.id).await.unwrap();
    backdate_created(&pool, job.id, "91 days").await;

    let report = sweep::run_pass(&pool).await.unwrap();
    assert_eq!(report.rows_deleted, 1);

    assert!(JobRepo::find_by_id(&pool, job.id).await.unwrap().is_none());

    // Audit events went with the job.
    let events: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM job_events WHERE job_id = $1")
        .bind(job.id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(events, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn orphaned_continuations_are_purged(pool: PgPool) {
    let job = control::start_job(&pool, OWNER, &start_input("doc-1", "hello world"), &test_limits())
        .await
        .unwrap();
    control::stop_job(&pool, OWNER, job.id).await.unwrap();

    // The start continuation from job creation is still in the queue.
    ContinuationRepo::schedule(&pool, job.id, ContinuationKind::Batch, Utc::now())
        .await
        .unwrap();

    let report = sweep::run_pass(&pool).await.unwrap();
    assert!(report.continuations_purged >= 1);
    assert_eq!(ContinuationRepo::count_for_job(&pool, job.id).await.unwrap(), 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn sweep_pass_is_idempotent(pool: PgPool) {
    let job = control::start_job(&pool, OWNER, &start_input("doc-1", "hello world"), &test_limits())
        .await
        .unwrap();
    JobRepo::mark_running(&pool, job.id).await.unwrap();
    backdate_created(&pool, job.id, "31 days").await;

    let first = sweep::run_pass(&pool).await.unwrap();
    assert_eq!(first.overruns_failed, 1);
    assert_eq!(first.text_scrubbed, 1);

    // Already-reaped rows no longer match any filter.
    let second = sweep::run_pass(&pool).await.unwrap();
    assert_eq!(second.overruns_failed, 0);
    assert_eq!(second.expired, 0);
    assert_eq!(second.text_scrubbed, 0);
    assert_eq!(second.rows_deleted, 0);
}
