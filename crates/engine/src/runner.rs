//! Durable scheduling loop (PRD-05).
//!
//! A single long-lived Tokio task polls the `job_continuations` delay queue
//! and runs due steps through the batch dispatcher. Pacing sleeps are rows
//! with a future `not_before`, not blocked threads, so any number of jobs
//! can be "sleeping" at once. Steps are at-least-once: a claimed row is
//! deleted only after its step finishes, and a step that errors keeps its
//! claim until it goes stale and is redelivered.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use ghosttype_db::models::continuation::{Continuation, ContinuationKind};
use ghosttype_db::repositories::{ContinuationRepo, JobRepo};
use ghosttype_db::DbPool;
use tokio_util::sync::CancellationToken;

use crate::dispatcher::process_batch;
use crate::error::EngineResult;
use crate::writer::DocumentWriter;

/// Default polling interval for the runner loop.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Maximum steps claimed per tick.
const CLAIM_BATCH_LIMIT: i64 = 16;

/// Fallback inter-step delay if a dispatch outcome carries none.
const DEFAULT_STEP_DELAY_MS: u64 = 1_000;

/// Background runner that drives typing jobs through their batches.
pub struct TypingRunner {
    pool: DbPool,
    writer: Arc<dyn DocumentWriter>,
    poll_interval: Duration,
}

impl TypingRunner {
    /// Create a runner with the default 1-second poll interval.
    pub fn new(pool: DbPool, writer: Arc<dyn DocumentWriter>) -> Self {
        Self {
            pool,
            writer,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Run the loop until the cancellation token is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Typing runner started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Typing runner shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        tracing::error!(error = %e, "Runner tick failed");
                    }
                }
            }
        }
    }

    /// One tick: claim due continuations and process each in turn.
    ///
    /// Returns the number of steps claimed. Public so tests (and the worker
    /// binary's drain-on-shutdown) can drive the loop deterministically.
    pub async fn run_once(&self) -> EngineResult<usize> {
        let due = ContinuationRepo::claim_due(&self.pool, CLAIM_BATCH_LIMIT).await?;
        let claimed = due.len();

        for continuation in due {
            match self.handle(&continuation).await {
                Ok(()) => {
                    ContinuationRepo::delete(&self.pool, continuation.id).await?;
                }
                Err(e) => {
                    // Keep the claim: it goes stale and is redelivered.
                    // The dispatcher's status/progress guards make the
                    // redelivered step safe.
                    tracing::error!(
                        job_id = continuation.job_id,
                        continuation_id = continuation.id,
                        error = %e,
                        "Step failed; leaving claim for redelivery",
                    );
                }
            }
        }

        Ok(claimed)
    }

    /// Process one claimed continuation.
    async fn handle(&self, continuation: &Continuation) -> EngineResult<()> {
        if ContinuationKind::from_str(&continuation.kind)? == ContinuationKind::Start {
            let promoted = JobRepo::mark_running(&self.pool, continuation.job_id).await?;
            if !promoted {
                // Stopped or reaped before the first dispatch; nothing to do.
                tracing::debug!(
                    job_id = continuation.job_id,
                    "Start step found a non-pending job; dropping",
                );
                return Ok(());
            }
            tracing::info!(job_id = continuation.job_id, "Typing job running");
        }

        let outcome = process_batch(&self.pool, self.writer.as_ref(), continuation.job_id).await?;

        if outcome.should_continue {
            let delay_ms = outcome.next_delay_ms.unwrap_or(DEFAULT_STEP_DELAY_MS);
            let not_before = Utc::now() + chrono::Duration::milliseconds(delay_ms as i64);
            ContinuationRepo::schedule_if_absent(
                &self.pool,
                continuation.job_id,
                ContinuationKind::Batch,
                not_before,
                Some(continuation.id),
            )
            .await?;
        }

        Ok(())
    }
}
