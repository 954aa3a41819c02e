//! Audit event type constants for the `job_events` table (PRD-03).
//!
//! Only lifecycle transitions are audited; per-batch progress updates are
//! not. The set is closed: parsing an unknown type is a validation error.

use crate::error::CoreError;

/// Job was created and its document lock acquired.
pub const EVENT_STARTED: &str = "started";
/// Job was paused by its owner.
pub const EVENT_PAUSED: &str = "paused";
/// Job was resumed from pause.
pub const EVENT_RESUMED: &str = "resumed";
/// Job was stopped by its owner (terminal).
pub const EVENT_STOPPED: &str = "stopped";
/// Job failed (fatal writer error, overrun, or stuck-lock reclamation).
pub const EVENT_FAILED: &str = "failed";
/// A single dispatch attempt failed but the job continues (rate limit).
pub const EVENT_DISPATCH_FAILED: &str = "dispatch_failed";

/// All valid event types.
pub const VALID_EVENT_TYPES: &[&str] = &[
    EVENT_STARTED,
    EVENT_PAUSED,
    EVENT_RESUMED,
    EVENT_STOPPED,
    EVENT_FAILED,
    EVENT_DISPATCH_FAILED,
];

/// Audit event type enum with string conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobEventType {
    Started,
    Paused,
    Resumed,
    Stopped,
    Failed,
    DispatchFailed,
}

impl JobEventType {
    /// Return the database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => EVENT_STARTED,
            Self::Paused => EVENT_PAUSED,
            Self::Resumed => EVENT_RESUMED,
            Self::Stopped => EVENT_STOPPED,
            Self::Failed => EVENT_FAILED,
            Self::DispatchFailed => EVENT_DISPATCH_FAILED,
        }
    }

    /// Parse from a string, returning an error for unknown types.
    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            EVENT_STARTED => Ok(Self::Started),
            EVENT_PAUSED => Ok(Self::Paused),
            EVENT_RESUMED => Ok(Self::Resumed),
            EVENT_STOPPED => Ok(Self::Stopped),
            EVENT_FAILED => Ok(Self::Failed),
            EVENT_DISPATCH_FAILED => Ok(Self::DispatchFailed),
            other => Err(CoreError::Validation(format!(
                "Unknown job event type: '{other}'. Valid types: {}",
                VALID_EVENT_TYPES.join(", ")
            ))),
        }
    }
}
