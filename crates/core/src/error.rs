//! Error types for the promptloom domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Provider failures have their own bounded-context enum so the context
//! pipeline can log and absorb them without matching on strings.

use thiserror::Error;

/// The top-level error type for all promptloom operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Source error: {0}")]
    Source(#[from] SourceError),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures reported by an external context source (messages, episodes,
/// preferences, cache).
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("Source unavailable: {0}")]
    Unavailable(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Source timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Payload could not be encoded or decoded: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
