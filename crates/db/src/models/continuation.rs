//! Durable timer records for the scheduling loop (PRD-05).

use ghosttype_core::error::CoreError;
use ghosttype_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// First step after job creation: promotes pending -> running.
pub const KIND_START: &str = "start";
/// Every subsequent step: dispatch one batch.
pub const KIND_BATCH: &str = "batch";

/// Continuation kind enum with string conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinuationKind {
    Start,
    Batch,
}

impl ContinuationKind {
    /// Return the database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => KIND_START,
            Self::Batch => KIND_BATCH,
        }
    }

    /// Parse from a string, returning an error for unknown kinds.
    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            KIND_START => Ok(Self::Start),
            KIND_BATCH => Ok(Self::Batch),
            other => Err(CoreError::Internal(format!(
                "Unknown continuation kind: '{other}'"
            ))),
        }
    }
}

/// A row from the `job_continuations` table: one pending engine step.
#[derive(Debug, Clone, FromRow)]
pub struct Continuation {
    pub id: DbId,
    pub job_id: DbId,
    pub kind: String,
    pub not_before: Timestamp,
    pub claimed_at: Option<Timestamp>,
    pub created_at: Timestamp,
}
