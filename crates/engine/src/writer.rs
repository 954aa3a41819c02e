//! Document writer collaborator boundary (PRD-04).
//!
//! The engine only ever *writes* to the remote document; it never reads
//! content back. The concrete network client is wired in by the deployment;
//! this module defines the contract and a no-op implementation for local
//! development.

use async_trait::async_trait;

/// Classified result of one write call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The batch was committed to the document.
    Ok,
    /// Backpressure: retry the same batch after the suggested delay.
    /// `retry_after_ms == 0` means the collaborator had no suggestion.
    RateLimited { retry_after_ms: u64 },
    /// The integration's credentials were revoked. Fatal.
    AuthRevoked,
    /// Any other unrecoverable writer error. Fatal.
    Fatal { message: String },
}

/// External collaborator that inserts text into a remote document.
#[async_trait]
pub trait DocumentWriter: Send + Sync {
    /// Insert `text` into the document at character offset `at_char_index`.
    ///
    /// Classified failures (rate limit, revoked auth) are values, not
    /// errors; `Err` is reserved for transport-level problems, which the
    /// runner treats as retryable via continuation redelivery.
    async fn write(
        &self,
        document_ref: &str,
        text: &str,
        at_char_index: i32,
    ) -> anyhow::Result<WriteOutcome>;
}

/// Writer that logs instead of writing. Default for local development and
/// the worker binary until a real client is configured.
pub struct NoopWriter;

#[async_trait]
impl DocumentWriter for NoopWriter {
    async fn write(
        &self,
        document_ref: &str,
        text: &str,
        at_char_index: i32,
    ) -> anyhow::Result<WriteOutcome> {
        tracing::debug!(
            document_ref,
            at_char_index,
            chars = text.chars().count(),
            "NoopWriter: dropping batch",
        );
        Ok(WriteOutcome::Ok)
    }
}
