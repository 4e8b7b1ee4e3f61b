//! Error types for opening replicas.

use std::time::Duration;
use thiserror::Error;

/// Result type for open operations.
pub type OpenResult<T> = Result<T, OpenError>;

/// Result type for sync session operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Result type for local store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors reported by an open call.
#[derive(Error, Debug)]
pub enum OpenError {
    /// A waiting synchronous open was attempted on a non-blockable thread.
    #[error("synchronous open with wait_for_server_changes is not allowed on a non-blockable thread")]
    MainThreadBlockingDisallowed,

    /// The initial download did not finish within the configured bound.
    ///
    /// The local store is intact and can be reopened without waiting.
    #[error("timed out after {timeout:?} waiting for server changes")]
    TimedOut {
        /// The configured bound.
        timeout: Duration,
    },

    /// The sync session failed while downloading.
    #[error("sync failed: {0}")]
    Failed(#[from] SyncError),

    /// The local store could not be opened.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Invalid open state transition.
    #[error("invalid open state transition from {from} to {to}")]
    InvalidStateTransition {
        /// Current state.
        from: String,
        /// Attempted target state.
        to: String,
    },

    /// A worker thread could not be started or went away without a result.
    #[error("open worker error: {0}")]
    Worker(String),
}

impl OpenError {
    /// Returns true if waiting was merely cut short by the timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, OpenError::TimedOut { .. })
    }

    /// Returns true if retrying the open may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            OpenError::TimedOut { .. } => true,
            OpenError::Failed(e) => e.is_retryable(),
            OpenError::Store(StoreError::Locked(_)) => true,
            _ => false,
        }
    }
}

/// Errors reported by the sync session collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// Authentication failed.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The authority was logged out or revoked while downloading.
    #[error("authority {0} is no longer valid")]
    AuthorityRevoked(String),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Server rejected the request.
    #[error("server error: {0}")]
    ServerError(String),
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::ServerError(_) => true,
            _ => false,
        }
    }
}

/// Errors reported by the store engine collaborator.
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Another process holds the store exclusively.
    #[error("store is locked: {0}")]
    Locked(String),

    /// The store exists but cannot be used.
    #[error("store is corrupt: {0}")]
    Corrupt(String),
}
