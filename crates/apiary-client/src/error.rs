//! Error taxonomy for the client reconciliation layer.
//!
//! The split matters to callers: [`ClientError::NetworkUnavailable`]
//! means the server was never reached and a local fallback may apply,
//! while [`ClientError::UnknownOutcome`] means the request may or may
//! not have landed and only the next resync can tell. Everything else
//! is a definitive answer.

/// Errors surfaced by the game client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The server could not be reached at all. The request was never
    /// sent, so a local fallback is safe for cosmetic operations.
    #[error("server unreachable: {0}")]
    NetworkUnavailable(String),

    /// The request timed out in flight. The server may have applied it;
    /// the client must not re-apply locally and should wait for the
    /// next resync to settle the question.
    #[error("request outcome unknown: {0}")]
    UnknownOutcome(String),

    /// The server (or the local precondition check standing in for it)
    /// definitively rejected the request.
    #[error("rejected ({status}): {message}")]
    Rejected {
        /// HTTP status the server answered with, or would answer with.
        status: u16,
        /// Human-readable rejection reason.
        message: String,
    },

    /// The operation needs the authoritative server and cannot be
    /// simulated locally, such as a prize draw or an escrow.
    #[error("{operation} requires the authoritative server")]
    LocalFallbackImpossible {
        /// Name of the operation that was refused.
        operation: &'static str,
    },

    /// Writing or reading the on-disk cache failed.
    #[error("cache persistence failed: {0}")]
    Persistence(#[from] std::io::Error),

    /// A payload could not be encoded or decoded.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
