use ghosttype_core::error::CoreError;

/// Error type for engine operations.
///
/// Validation/conflict/ownership problems surface as [`CoreError`];
/// everything else is infrastructure. The API layer maps these onto HTTP
/// statuses; the runner logs them and relies on continuation redelivery.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A domain-level error (validation, conflict, not found, forbidden).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The document writer failed at the transport level (as opposed to
    /// returning a classified outcome).
    #[error(transparent)]
    Writer(#[from] anyhow::Error),
}

/// Convenience type alias for engine results.
pub type EngineResult<T> = Result<T, EngineError>;
