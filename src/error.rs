//! Crate-level error type.

use crate::aggregator::ConsistencyError;
use crate::storage::StorageError;

/// Result type for timeline operations.
pub type Result<T> = std::result::Result<T, TimelineError>;

/// Errors surfaced by the raw and aggregate timeline stores.
#[derive(Debug, thiserror::Error)]
pub enum TimelineError {
    /// The store failed; propagated unchanged, never retried here.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Bookkeeping is inconsistent. Fatal.
    #[error(transparent)]
    Consistency(#[from] ConsistencyError),

    #[error("Invalid continuation token: {0}")]
    InvalidToken(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl TimelineError {
    /// True when the caller sent something unusable.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            TimelineError::InvalidToken(_) | TimelineError::InvalidRequest(_)
        )
    }
}
