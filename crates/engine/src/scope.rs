//! Manual scopes
//!
//! For top-level callers that cannot hand their work to
//! [`run_in_transaction`](crate::run_in_transaction) as a closure.
//! [`begin_scope`] returns a [`ManualScope`]: the caller threads its carrier
//! through the work and ends the scope with the terminal signal.
//!
//! Resolution belongs to the `ManualScope` alone. It is not `Clone`, and
//! ending it consumes it, so code that only sees the carrier (including work
//! nested under it) cannot commit or roll back the transaction.
//!
//! A scope dropped without being ended rolls back and cancels its token.

use crate::propagation::{ResolutionGuard, CANCEL_KEY};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use txscope_concurrency::{TransactionCoordinator, TransactionManager, TX_KEY};
use txscope_core::{ContextCarrier, Outcome, Propagation, Result, TerminalSignal};

/// A transaction started by [`begin_scope`], owned by the caller
pub struct ManualScope {
    carrier: ContextCarrier,
    guard: ResolutionGuard,
}

impl ManualScope {
    /// Root carrier publishing the transaction and the scope token
    pub fn carrier(&self) -> &ContextCarrier {
        &self.carrier
    }

    /// The owned coordinator
    pub fn coordinator(&self) -> &Arc<TransactionCoordinator> {
        self.guard.coordinator()
    }

    /// Resolve the transaction according to `signal`
    pub fn end<T, E: fmt::Display>(self, signal: TerminalSignal<T, E>) -> Outcome<T, E> {
        self.guard.resolve(signal)
    }
}

impl fmt::Debug for ManualScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualScope")
            .field("tx", self.coordinator())
            .finish()
    }
}

/// Start a transaction and return the scope that owns it
///
/// The scope's carrier also holds a fresh cancellation token; cancelling it
/// makes nested scopes observe cancellation.
pub async fn begin_scope(
    manager: &TransactionManager,
    policy: Propagation,
) -> Result<ManualScope> {
    let tx = manager.begin(policy, None).await?.into_coordinator();
    let token = CancellationToken::new();
    let carrier = ContextCarrier::empty()
        .with(&TX_KEY, Arc::clone(&tx))
        .with(&CANCEL_KEY, token.clone());
    Ok(ManualScope {
        carrier,
        guard: ResolutionGuard::new(tx, token),
    })
}

/// Resolve `scope` according to `signal`; see [`ManualScope::end`]
pub fn end_scope<T, E: fmt::Display>(
    scope: ManualScope,
    signal: TerminalSignal<T, E>,
) -> Outcome<T, E> {
    scope.end(signal)
}
