//! Core types for txscope
//!
//! This crate defines the vocabulary shared by every layer:
//! - [`ContextCarrier`]: immutable context threaded through async work
//! - [`TxId`], [`HandleId`], [`Propagation`], [`TxState`]
//! - [`TerminalSignal`], [`Outcome`], [`Cause`], [`ScopeError`]
//! - [`Error`] and [`DriverError`]
//! - [`TransactionalResource`] and [`ResourceFactory`] driver contracts

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod carrier;
pub mod error;
pub mod signal;
pub mod traits;
pub mod types;

pub use carrier::{ContextCarrier, ContextKey};
pub use error::{DriverError, Error, Result};
pub use signal::{Cause, Outcome, ScopeError, TerminalSignal};
pub use traits::{ResourceFactory, TransactionalResource};
pub use types::{HandleId, Propagation, TxId, TxState};
