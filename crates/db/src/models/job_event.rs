//! Job audit event entity model (PRD-03).

use ghosttype_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the append-only `job_events` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct JobEvent {
    pub id: DbId,
    pub job_id: DbId,
    pub event_type: String,
    pub details: serde_json::Value,
    pub created_at: Timestamp,
}
