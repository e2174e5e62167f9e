//! Error types for transaction coordination
//!
//! Two layers:
//! - [`DriverError`]: a failure reported by the underlying resource. Passed
//!   through unchanged by the resource manager.
//! - [`Error`]: everything the coordination layer itself can report.
//!
//! Errors produced by user work are never converted into either type; they
//! travel verbatim inside [`crate::signal::Cause::Error`].

use crate::types::{HandleId, TxId, TxState};
use thiserror::Error;

/// Failure reported by an underlying transactional resource
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation} failed: {message}")]
pub struct DriverError {
    /// Operation that failed (`open`, `begin`, `commit`, `rollback`, ...)
    pub operation: &'static str,
    /// Driver-provided message
    pub message: String,
}

impl DriverError {
    /// Create a driver error
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        DriverError {
            operation,
            message: message.into(),
        }
    }
}

/// Coordination-layer errors
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// An accessor ran outside any transactional scope
    #[error("no active transaction in context")]
    NoActiveTransaction,

    /// No resource could be acquired within the configured bound
    #[error("resource exhausted: no handle available within {timeout_ms}ms")]
    ResourceExhausted {
        /// Configured acquire bound
        timeout_ms: u64,
    },

    /// The underlying begin failed; no transaction was created
    #[error("begin failed for {tx_id}: {source}")]
    BeginFailure {
        /// Transaction that failed to start
        tx_id: TxId,
        /// Driver failure
        source: DriverError,
    },

    /// The underlying commit failed; the handle was still released
    #[error("commit failed for {tx_id}: {source}")]
    CommitFailure {
        /// Transaction that failed to commit
        tx_id: TxId,
        /// Driver failure
        source: DriverError,
        /// Failure of the fallback rollback attempted after the commit failure
        fallback_rollback: Option<DriverError>,
    },

    /// The underlying rollback failed while handling a prior cause
    #[error("rollback failed for {tx_id}: {source}")]
    RollbackFailure {
        /// Transaction that failed to roll back
        tx_id: TxId,
        /// Driver failure
        source: DriverError,
    },

    /// A resolution call arrived for a coordinator that cannot take it
    #[error("illegal transition for {tx_id}: {from} -> {to}")]
    IllegalStateTransition {
        /// Coordinator the call targeted
        tx_id: TxId,
        /// State observed
        from: TxState,
        /// State requested
        to: TxState,
    },

    /// A handle was released twice
    #[error("handle {handle} released twice")]
    DoubleRelease {
        /// The handle
        handle: HandleId,
    },

    /// A handle was used after release
    #[error("handle {handle} already released")]
    HandleReleased {
        /// The handle
        handle: HandleId,
    },

    /// An accessor asked for a resource type the handle does not carry
    #[error("resource mismatch: expected {expected}, handle carries {actual}")]
    ResourceMismatch {
        /// Requested resource type
        expected: &'static str,
        /// Resource kind carried by the handle
        actual: &'static str,
    },

    /// Driver failure outside of begin/commit/rollback
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// Configuration rejected
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Whether this error came from resolving a transaction
    pub fn is_resolution_failure(&self) -> bool {
        matches!(
            self,
            Error::CommitFailure { .. } | Error::RollbackFailure { .. }
        )
    }

    /// Whether this is a rejected state transition
    pub fn is_illegal_transition(&self) -> bool {
        matches!(self, Error::IllegalStateTransition { .. })
    }

    /// Whether retrying later may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::ResourceExhausted { .. })
    }
}

// Compared by rendered message; sources are plain data.
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

/// Result type for coordination operations
pub type Result<T> = std::result::Result<T, Error>;
