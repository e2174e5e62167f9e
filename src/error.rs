//! Unified error type for txscope.
//!
//! Wraps the layered internal errors in a small, stable set of categories.

use std::fmt;
use thiserror::Error;
use txscope_core::{Cause, ScopeError};

/// All txscope errors.
///
/// This is the canonical error type for facade users. Internal errors are
/// flattened into categories; their rendered message is kept.
#[derive(Debug, Error)]
pub enum Error {
    /// No transaction is active in the given context
    #[error("no active transaction")]
    NoTransaction,

    /// No resource became free within the configured wait
    #[error("resources exhausted: {0}")]
    Exhausted(String),

    /// Begin, commit or rollback failed in the driver
    #[error("transaction failed: {0}")]
    TransactionFailed(String),

    /// Operation not valid in the current state (resolved transaction,
    /// released handle, double release)
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Resource of an unexpected type
    #[error("wrong resource type: expected {expected}, got {actual}")]
    WrongType {
        /// Requested type
        expected: String,
        /// Driver kind found
        actual: String,
    },

    /// Driver error outside begin/commit/rollback
    #[error("driver error: {0}")]
    Driver(String),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// The scope was cancelled and rolled back
    #[error("cancelled")]
    Cancelled,

    /// The scope's work failed and was rolled back
    #[error("aborted: {0}")]
    Aborted(String),
}

/// Result type for txscope operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is retryable.
    ///
    /// Only resource exhaustion may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Exhausted(_))
    }

    /// Check if this error reports cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Check if resolution itself failed.
    pub fn is_serious(&self) -> bool {
        matches!(self, Error::TransactionFailed(_))
    }
}

// Convert from internal core errors
impl From<txscope_core::Error> for Error {
    fn from(e: txscope_core::Error) -> Self {
        use txscope_core::Error as CoreError;
        match e {
            CoreError::NoActiveTransaction => Error::NoTransaction,
            CoreError::ResourceExhausted { .. } => Error::Exhausted(e.to_string()),
            CoreError::BeginFailure { .. }
            | CoreError::CommitFailure { .. }
            | CoreError::RollbackFailure { .. } => Error::TransactionFailed(e.to_string()),
            CoreError::IllegalStateTransition { .. }
            | CoreError::DoubleRelease { .. }
            | CoreError::HandleReleased { .. } => Error::InvalidState(e.to_string()),
            CoreError::ResourceMismatch { expected, actual } => Error::WrongType {
                expected: expected.to_string(),
                actual: actual.to_string(),
            },
            CoreError::Driver(driver) => Error::Driver(driver.to_string()),
            CoreError::InvalidConfig(msg) => Error::Config(msg),
        }
    }
}

// Convert a failed scope; the work error is rendered, coordination errors map as above
impl<E: fmt::Display> From<ScopeError<E>> for Error {
    fn from(e: ScopeError<E>) -> Self {
        if let Some(secondary) = &e.secondary {
            tracing::debug!(error = %secondary, "secondary failure dropped by conversion");
        }
        match e.cause {
            Cause::Error(work) => Error::Aborted(work.to_string()),
            Cause::Cancelled => Error::Cancelled,
            Cause::Coordination(err) => Error::from(err),
        }
    }
}
