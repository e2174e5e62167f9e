//! Scope engine for txscope
//!
//! This crate ties the lower layers into transaction scopes:
//! - `run_in_transaction`: the propagation operator (REQUIRED / REQUIRES_NEW)
//! - `current_resource` / `KvAccessor`: context-aware resource access
//! - `begin_scope` / `ManualScope`: manual scopes for top-level callers
//! - `TxRuntime`: builder-configured runtime owning the managers
//!
//! # Architecture
//!
//! ```text
//! TxRuntime
//!   └── TransactionManager ── TransactionCoordinator (state machine)
//!         └── ResourceManager ── ResourceHandle ── TransactionalResource
//!
//! ContextCarrier ──[TX_KEY]──────▶ Arc<TransactionCoordinator>
//!                ──[CANCEL_KEY]──▶ CancellationToken
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod accessor;
pub mod config;
pub mod propagation;
pub mod runtime;
pub mod scope;

pub use accessor::{current_resource, current_transaction, CurrentResource, KvAccessor};
pub use config::EngineConfig;
pub use propagation::{run_in_transaction, CANCEL_KEY};
pub use runtime::{TxRuntime, TxRuntimeBuilder};
pub use scope::{begin_scope, end_scope, ManualScope};

// Re-export so callers can build cancellable root carriers
pub use tokio_util::sync::CancellationToken;
