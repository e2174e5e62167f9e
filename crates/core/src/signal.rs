//! Terminal signals and resolution outcomes
//!
//! A scope's work ends with exactly one [`TerminalSignal`]. The scope that
//! created the transaction turns it into an [`Outcome`]:
//!
//! | Signal | Resolution | Outcome |
//! |--------|------------|---------|
//! | `Success(v)` | commit | `Committed(v)` or `Failed { Coordination(CommitFailure), .. }` |
//! | `Failure(e)` | rollback | `RolledBack(Error(e))` or `Failed { Error(e), Some(RollbackFailure) }` |
//! | `Cancelled` | rollback | `RolledBack(Cancelled)` or `Failed { Cancelled, Some(RollbackFailure) }` |
//!
//! A scope that joined an ambient transaction resolves nothing and reports
//! `Joined(signal)`.

use crate::error::Error;
use std::fmt;

/// How a unit of work ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalSignal<T, E> {
    /// Work completed with a value
    Success(T),
    /// Work failed with an error
    Failure(E),
    /// Work was cancelled before completing
    Cancelled,
}

impl<T, E> TerminalSignal<T, E> {
    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            TerminalSignal::Success(_) => "success",
            TerminalSignal::Failure(_) => "failure",
            TerminalSignal::Cancelled => "cancelled",
        }
    }
}

impl<T, E> From<Result<T, E>> for TerminalSignal<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(v) => TerminalSignal::Success(v),
            Err(e) => TerminalSignal::Failure(e),
        }
    }
}

/// Why a scope did not produce a committed value
#[derive(Debug, Clone, PartialEq)]
pub enum Cause<E> {
    /// The work's own error, unchanged
    Error(E),
    /// The scope was cancelled
    Cancelled,
    /// The coordination layer failed (begin or commit)
    Coordination(Error),
}

impl<E> Cause<E> {
    /// Whether this is a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Cause::Cancelled)
    }

    /// The work's error, if that is the cause
    pub fn work_error(&self) -> Option<&E> {
        match self {
            Cause::Error(e) => Some(e),
            _ => None,
        }
    }

    /// The coordination error, if that is the cause
    pub fn coordination_error(&self) -> Option<&Error> {
        match self {
            Cause::Coordination(e) => Some(e),
            _ => None,
        }
    }
}

impl<E: fmt::Display> fmt::Display for Cause<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cause::Error(e) => write!(f, "{}", e),
            Cause::Cancelled => f.write_str("cancelled"),
            Cause::Coordination(e) => write!(f, "{}", e),
        }
    }
}

/// Resolution outcome surfaced to callers
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T, E> {
    /// The transaction committed; the work's value
    Committed(T),
    /// The transaction rolled back cleanly
    RolledBack(Cause<E>),
    /// Resolution itself failed
    Failed {
        /// The original cause (work error, cancellation, or commit failure)
        primary: Cause<E>,
        /// Secondary failure attached to the primary (failed rollback)
        secondary: Option<Error>,
    },
    /// The scope joined an ambient transaction and resolved nothing
    Joined(TerminalSignal<T, E>),
}

impl<T, E> Outcome<T, E> {
    /// Whether the work's effects were committed by this scope
    pub fn is_committed(&self) -> bool {
        matches!(self, Outcome::Committed(_))
    }

    /// Whether this scope rolled back cleanly
    pub fn is_rolled_back(&self) -> bool {
        matches!(self, Outcome::RolledBack(_))
    }

    /// Whether the outcome reports cancellation
    pub fn is_cancelled(&self) -> bool {
        match self {
            Outcome::RolledBack(cause) => cause.is_cancelled(),
            Outcome::Failed { primary, .. } => primary.is_cancelled(),
            Outcome::Joined(signal) => matches!(signal, TerminalSignal::Cancelled),
            Outcome::Committed(_) => false,
        }
    }

    /// Collapse into a `Result`
    ///
    /// `Committed(v)` and `Joined(Success(v))` are `Ok(v)`; everything else
    /// is a [`ScopeError`] carrying the primary cause unchanged.
    pub fn into_result(self) -> Result<T, ScopeError<E>> {
        match self {
            Outcome::Committed(v) => Ok(v),
            Outcome::RolledBack(cause) => Err(ScopeError {
                cause,
                secondary: None,
            }),
            Outcome::Failed { primary, secondary } => Err(ScopeError {
                cause: primary,
                secondary,
            }),
            Outcome::Joined(TerminalSignal::Success(v)) => Ok(v),
            Outcome::Joined(TerminalSignal::Failure(e)) => Err(ScopeError {
                cause: Cause::Error(e),
                secondary: None,
            }),
            Outcome::Joined(TerminalSignal::Cancelled) => Err(ScopeError {
                cause: Cause::Cancelled,
                secondary: None,
            }),
        }
    }
}

/// Error returned by [`Outcome::into_result`]
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeError<E> {
    /// Primary cause
    pub cause: Cause<E>,
    /// Secondary failure raised while handling the primary cause
    pub secondary: Option<Error>,
}

impl<E> ScopeError<E> {
    /// Whether the scope was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cause.is_cancelled()
    }

    /// The work's error, if that is the cause
    pub fn work_error(&self) -> Option<&E> {
        self.cause.work_error()
    }

    /// Take the work's error, if that is the cause
    pub fn into_work_error(self) -> Option<E> {
        match self.cause {
            Cause::Error(e) => Some(e),
            _ => None,
        }
    }
}

impl<E: fmt::Display> fmt::Display for ScopeError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cause)?;
        if let Some(secondary) = &self.secondary {
            write!(f, " (while handling: {})", secondary)?;
        }
        Ok(())
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for ScopeError<E> {}
