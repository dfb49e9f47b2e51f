//! Error types for replication

use thiserror::Error;

use crate::error::TallyError;

/// Result type for replication operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while replicating
#[derive(Error, Debug)]
pub enum SyncError {
    /// The remote could not be reached or refused the request
    #[error("transport error: {message}")]
    Transport {
        message: String,
        /// Whether the next cycle may succeed
        retryable: bool,
    },

    /// The remote sent something we can't read
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The sync token doesn't name a usable remote
    #[error("invalid sync address '{0}'")]
    InvalidAddress(String),

    /// Local store failure while applying or reading changes
    #[error("local store error: {0}")]
    Store(#[from] TallyError),
}

impl SyncError {
    /// Creates a retryable transport error
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Store(err) => err.is_storage(),
            _ => false,
        }
    }
}

impl From<SyncError> for TallyError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Store(inner) => inner,
            other => TallyError::Replication(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(SyncError::transport_retryable("remote offline").is_retryable());
        assert!(!SyncError::transport_fatal("remote gone").is_retryable());
        assert!(!SyncError::Protocol("bad document".into()).is_retryable());
        assert!(SyncError::Store(TallyError::Storage("lock".into())).is_retryable());
    }

    #[test]
    fn test_converts_into_tally_error() {
        let err: TallyError = SyncError::InvalidAddress(String::new()).into();
        assert!(err.is_replication());

        let err: TallyError = SyncError::Store(TallyError::budget_not_found("b1")).into();
        assert!(err.is_not_found());
    }
}
