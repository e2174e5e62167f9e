//! Convenient imports for txscope.
//!
//! This module re-exports the most commonly used types so you can get started
//! with a single import:
//!
//! ```ignore
//! use txscope::prelude::*;
//!
//! let rt = TxRuntime::in_memory()?;
//! let scope = rt.begin_scope(Propagation::Required).await?;
//! KvAccessor::put(scope.carrier(), "k", json!(1))?;
//! let outcome: Outcome<(), CoreError> = scope.end(TerminalSignal::Success(()));
//! ```

// Main entry point
pub use crate::{TxRuntime, TxRuntimeBuilder};

// Error handling
pub use crate::error::{Error, Result};
pub use crate::types::CoreError;

// Scopes and access
pub use crate::{current_resource, current_transaction, run_in_transaction, KvAccessor};
pub use crate::{begin_scope, end_scope, CancellationToken, ManualScope, CANCEL_KEY};

// Core types
pub use crate::types::{ContextCarrier, Outcome, Propagation, TerminalSignal};

// Re-export serde_json for convenience
pub use serde_json::json;
