//! Job entity model and DTOs (PRD-03).

use ghosttype_core::lifecycle::{state_machine, JobStatus, StatusId};
use ghosttype_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Job {
    pub id: DbId,
    pub owner_id: DbId,
    pub document_ref: String,
    /// Payload text. Never serialized into API responses; scrubbed by the
    /// cleanup sweep after the retention window.
    #[serde(skip_serializing)]
    pub full_text: String,
    pub total_chars: i32,
    pub current_index: i32,
    pub duration_minutes: i32,
    pub typing_profile: String,
    pub target_wpm: Option<i32>,
    pub status_id: StatusId,
    pub throttle_delay_ms: i32,
    pub error_code: Option<String>,
    pub completed_at: Option<Timestamp>,
    pub expires_at: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Job {
    /// Parse the stored status id back into the enum.
    pub fn status(&self) -> JobStatus {
        // The status column references the seeded lookup table, so an
        // unknown id here means the seed data and enum have diverged.
        JobStatus::from_id(self.status_id).expect("jobs.status_id outside seeded range")
    }

    /// True once the job can no longer transition anywhere.
    pub fn is_terminal(&self) -> bool {
        state_machine::is_terminal(self.status_id)
    }
}

/// Insert payload for a new job. Validation happens in the engine before
/// this struct is built; the repository trusts it.
#[derive(Debug, Clone)]
pub struct CreateJob {
    pub owner_id: DbId,
    pub document_ref: String,
    pub full_text: String,
    pub total_chars: i32,
    pub duration_minutes: i32,
    pub typing_profile: String,
    pub target_wpm: Option<i32>,
}

/// Progress snapshot returned by `GET /jobs/{id}/progress`.
#[derive(Debug, Clone, Serialize)]
pub struct JobProgress {
    pub status: &'static str,
    pub current_index: i32,
    pub total_chars: i32,
    pub duration_minutes: i32,
    pub error_code: Option<String>,
}

impl From<&Job> for JobProgress {
    fn from(job: &Job) -> Self {
        Self {
            status: job.status().name(),
            current_index: job.current_index,
            total_chars: job.total_chars,
            duration_minutes: job.duration_minutes,
            error_code: job.error_code.clone(),
        }
    }
}

/// Query parameters for `GET /api/v1/jobs`.
#[derive(Debug, Deserialize)]
pub struct JobListQuery {
    /// Filter by status ID (e.g. 2 = running, 6 = failed).
    pub status_id: Option<StatusId>,
    /// Maximum number of results. Defaults to 50, capped at 100.
    pub limit: Option<i64>,
    /// Number of results to skip. Defaults to 0.
    pub offset: Option<i64>,
}
