//! Lifecycle cleanup sweep (PRD-06).
//!
//! A periodic reconciliation pass, independent of any single job's loop:
//! fails jobs that silently stopped progressing, expires jobs past their
//! TTL, scrubs old text for privacy, deletes ancient rows, and purges
//! continuations whose jobs already terminated. Each step is idempotent and
//! order-insensitive; running the pass twice in a row is safe.

use std::time::Duration;

use chrono::Utc;
use ghosttype_core::codes::ERR_MAX_RUNTIME_EXCEEDED;
use ghosttype_core::events::EVENT_FAILED;
use ghosttype_db::repositories::{ContinuationRepo, DocumentLockRepo, JobEventRepo, JobRepo};
use ghosttype_db::DbPool;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::error::EngineResult;

/// Jobs still pending/running after this long are considered wedged.
pub const MAX_RUNTIME_HOURS: i64 = 8;

/// Text payloads older than this are scrubbed (metadata retained).
pub const SCRUB_AFTER_DAYS: i64 = 30;

/// Rows older than this are deleted outright.
pub const DELETE_AFTER_DAYS: i64 = 90;

/// How often the sweep runs by default: once a day.
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 86_400;

/// Counters from one sweep pass, for logging and tests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub overruns_failed: usize,
    pub expired: usize,
    pub text_scrubbed: u64,
    pub rows_deleted: u64,
    pub continuations_purged: u64,
}

/// Run the sweep loop until `cancel` is triggered.
///
/// The interval is overridable via `SWEEP_INTERVAL_SECS` (handy in staging;
/// production uses the daily default).
pub async fn run(pool: DbPool, cancel: CancellationToken) {
    let interval_secs: u64 = std::env::var("SWEEP_INTERVAL_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS);

    tracing::info!(interval_secs, "Cleanup sweep started");

    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Cleanup sweep stopping");
                break;
            }
            _ = interval.tick() => {
                match run_pass(&pool).await {
                    Ok(report) => {
                        tracing::info!(
                            overruns_failed = report.overruns_failed,
                            expired = report.expired,
                            text_scrubbed = report.text_scrubbed,
                            rows_deleted = report.rows_deleted,
                            continuations_purged = report.continuations_purged,
                            "Cleanup sweep pass finished",
                        );
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Cleanup sweep pass failed");
                    }
                }
            }
        }
    }
}

/// One reconciliation pass.
pub async fn run_pass(pool: &DbPool) -> EngineResult<SweepReport> {
    let now = Utc::now();
    let mut report = SweepReport::default();

    // 1. Pending/running jobs past the max runtime: force-fail, free their
    //    documents, and audit the failure.
    let overrun_cutoff = now - chrono::Duration::hours(MAX_RUNTIME_HOURS);
    let overrun_ids = JobRepo::fail_overruns(pool, overrun_cutoff, ERR_MAX_RUNTIME_EXCEEDED).await?;
    for &job_id in &overrun_ids {
        DocumentLockRepo::release_if_held(pool, job_id).await?;
        JobEventRepo::append(
            pool,
            job_id,
            EVENT_FAILED,
            &json!({ "error": ERR_MAX_RUNTIME_EXCEEDED }),
        )
        .await?;
        tracing::warn!(job_id, "Sweep failed an overrunning job");
    }
    report.overruns_failed = overrun_ids.len();

    // 2. Non-terminal jobs past their TTL: expire and free their documents.
    let expired_ids = JobRepo::expire_overdue(pool).await?;
    for &job_id in &expired_ids {
        DocumentLockRepo::release_if_held(pool, job_id).await?;
    }
    report.expired = expired_ids.len();

    // 3. Privacy scrub: old payload text goes away, metadata stays.
    let scrub_cutoff = now - chrono::Duration::days(SCRUB_AFTER_DAYS);
    report.text_scrubbed = JobRepo::scrub_text_older_than(pool, scrub_cutoff).await?;

    // 4. Retention: very old rows are deleted (audit events cascade).
    let delete_cutoff = now - chrono::Duration::days(DELETE_AFTER_DAYS);
    report.rows_deleted = JobRepo::delete_older_than(pool, delete_cutoff).await?;

    // 5. Orphaned timers: continuations for terminal jobs.
    report.continuations_purged = ContinuationRepo::purge_terminal(pool).await?;

    Ok(report)
}
