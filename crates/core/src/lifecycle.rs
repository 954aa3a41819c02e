//! Job lifecycle constants and state machine (PRD-03).
//!
//! This module lives in `core` (zero internal deps) so it can be used by the
//! repository layer, the engine, and the API without pulling in sqlx.

use crate::error::CoreError;

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

/// Job status IDs matching `job_statuses` seed data (1-based SMALLSERIAL).
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending = 1,
    Running = 2,
    Paused = 3,
    Completed = 4,
    Stopped = 5,
    Failed = 6,
    Expired = 7,
}

impl JobStatus {
    /// Return the database status ID.
    pub fn id(self) -> StatusId {
        self as StatusId
    }

    /// Parse a status ID back into the enum.
    pub fn from_id(id: StatusId) -> Result<Self, CoreError> {
        match id {
            1 => Ok(Self::Pending),
            2 => Ok(Self::Running),
            3 => Ok(Self::Paused),
            4 => Ok(Self::Completed),
            5 => Ok(Self::Stopped),
            6 => Ok(Self::Failed),
            7 => Ok(Self::Expired),
            other => Err(CoreError::Internal(format!("Unknown job status id {other}"))),
        }
    }

    /// Human-readable name, matching the `job_statuses.name` seed column.
    pub fn name(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
            Self::Expired => "expired",
        }
    }
}

impl From<JobStatus> for StatusId {
    fn from(value: JobStatus) -> Self {
        value as StatusId
    }
}

/// Statuses that count as "active" for the one-job-per-owner and
/// one-job-per-document invariants.
pub const ACTIVE_STATUSES: [StatusId; 2] =
    [JobStatus::Pending as StatusId, JobStatus::Running as StatusId];

pub mod state_machine {
    use super::StatusId;

    /// Returns the set of valid target status IDs reachable from `from_status`.
    ///
    /// Terminal states (Completed=4, Stopped=5, Failed=6, Expired=7) return
    /// an empty slice because no further transitions are allowed.
    pub fn valid_transitions(from_status: StatusId) -> &'static [StatusId] {
        match from_status {
            // Pending -> Running, Stopped, Failed, Expired
            1 => &[2, 5, 6, 7],
            // Running -> Paused, Completed, Stopped, Failed, Expired
            2 => &[3, 4, 5, 6, 7],
            // Paused -> Running, Stopped, Expired
            3 => &[2, 5, 7],
            // Terminal states: Completed, Stopped, Failed, Expired
            4 | 5 | 6 | 7 => &[],
            // Unknown status: no transitions allowed
            _ => &[],
        }
    }

    /// Check whether a transition from `from` to `to` is valid.
    pub fn can_transition(from: StatusId, to: StatusId) -> bool {
        valid_transitions(from).contains(&to)
    }

    /// A status with no outgoing transitions is terminal.
    pub fn is_terminal(status: StatusId) -> bool {
        matches!(status, 4 | 5 | 6 | 7)
    }

    /// Validate a state transition, returning an error message for invalid ones.
    pub fn validate_transition(from: StatusId, to: StatusId) -> Result<(), String> {
        if can_transition(from, to) {
            Ok(())
        } else {
            let from_name = status_name(from);
            let to_name = status_name(to);
            Err(format!(
                "Invalid transition: {from_name} ({from}) -> {to_name} ({to})"
            ))
        }
    }

    /// Human-readable name for a status ID (for error messages).
    fn status_name(id: StatusId) -> &'static str {
        match id {
            1 => "Pending",
            2 => "Running",
            3 => "Paused",
            4 => "Completed",
            5 => "Stopped",
            6 => "Failed",
            7 => "Expired",
            _ => "Unknown",
        }
    }
}
