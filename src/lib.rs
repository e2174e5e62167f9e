//! # txscope
//!
//! Transaction scopes that follow the logical call chain across async
//! suspension points.
//!
//! The active transaction is carried in an immutable [`ContextCarrier`]
//! handed to each unit of work, not in thread-local state. Work may suspend,
//! resume on another worker, or spawn tasks; every accessor that reads the
//! carrier sees the same transaction and the same resource handle.
//!
//! ## Quick Start
//!
//! ```ignore
//! use txscope::prelude::*;
//!
//! let rt = TxRuntime::in_memory()?;
//! let nested = rt.clone();
//!
//! let outcome = rt
//!     .run(|cx| async move {
//!         KvAccessor::put(&cx, "user:1", json!({"name": "ada"}))?;
//!
//!         // REQUIRED joins the scope above; REQUIRES_NEW would suspend it
//!         let audit = nested
//!             .run_in_transaction(&cx, Propagation::Required, |cx| async move {
//!                 KvAccessor::put(&cx, "audit:1", json!("created user:1"))
//!             })
//!             .await;
//!         audit.into_result().map_err(Error::from)
//!     })
//!     .await;
//!
//! assert!(outcome.is_committed());
//! ```
//!
//! ## Resolution
//!
//! - Success commits, failure rolls back and returns the work's own error
//! - Cancellation (token or dropped future) rolls back
//! - A failed commit or rollback is reported alongside the original cause
//!
//! ## Crates
//!
//! - `txscope-core`: carrier, ids, signals, errors, driver traits
//! - `txscope-resource`: bounded resource pool and handles
//! - `txscope-storage`: in-memory transactional driver
//! - `txscope-concurrency`: coordinator state machine and manager
//! - `txscope-engine`: propagation operator, accessors, runtime

#![warn(missing_docs)]

mod error;
mod types;

pub mod prelude;

// Re-export main entry points
pub use txscope_engine::{
    begin_scope, current_resource, current_transaction, end_scope, run_in_transaction,
    CancellationToken, CurrentResource, EngineConfig, KvAccessor, ManualScope, TxRuntime,
    TxRuntimeBuilder, CANCEL_KEY,
};

pub use error::{Error, Result};

// Re-export types
pub use types::*;
