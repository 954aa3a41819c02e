//! Document lock entity model (PRD-03).

use ghosttype_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// Lock state IDs matching `lock_states` seed data (1-based SMALLSERIAL).
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Idle = 1,
    Running = 2,
}

impl LockState {
    /// Return the database state ID.
    pub fn id(self) -> i16 {
        self as i16
    }
}

/// A row from the `document_locks` table: one per (owner, document) pair.
///
/// `state == running` iff `current_job_id` references a job in `pending` or
/// `running` status. The row is the serialization point that keeps two jobs
/// off the same document.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DocumentLock {
    pub id: DbId,
    pub owner_id: DbId,
    pub document_ref: String,
    pub state_id: i16,
    pub current_job_id: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl DocumentLock {
    /// True while a job holds this lock.
    pub fn is_running(&self) -> bool {
        self.state_id == LockState::Running.id()
    }
}
