//! Transaction coordination for txscope
//!
//! This crate implements the transaction side of a scope:
//! - TransactionCoordinator: state machine owning one resource handle
//! - TransactionManager: REQUIRED / REQUIRES_NEW begin decisions
//! - TransactionMetrics: outcome counters and the active registry

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod coordinator;
pub mod manager;
pub mod metrics;

pub use coordinator::{RollbackReason, TransactionCoordinator, TransactionInfo, TX_KEY};
pub use manager::{Begun, TransactionManager};
pub use metrics::TransactionMetrics;
