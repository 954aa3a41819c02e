//! Error code constants stored on failed jobs (PRD-04).
//!
//! These are persisted in `jobs.error_code` and surfaced to clients via the
//! progress endpoint, so they form a stable contract. Add new codes here
//! rather than inlining string literals at the failure site.

/// Transient dispatch signal for writer backpressure. Returned from the
/// dispatcher so the scheduler backs off; never stored on the job row.
pub const ERR_RATE_LIMIT: &str = "RATE_LIMIT";

/// The remote document integration rejected our credentials.
pub const ERR_AUTH_REVOKED: &str = "AUTH_REVOKED";

/// The document writer reported an unrecoverable error.
pub const ERR_WRITER_FAILED: &str = "WRITER_FAILED";

/// The job exceeded the maximum allowed wall-clock runtime.
pub const ERR_MAX_RUNTIME_EXCEEDED: &str = "MAX_RUNTIME_EXCEEDED";

/// The job held its document lock past the staleness threshold and was
/// force-failed so a newer job could take over the document.
pub const ERR_STUCK_RECLAIMED: &str = "STUCK_RECLAIMED";
