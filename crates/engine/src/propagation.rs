//! Propagation operator
//!
//! [`run_in_transaction`] wraps a unit of async work in a transaction scope.
//! The active coordinator travels in the [`ContextCarrier`] handed to the
//! work, never in thread-local state, so the work may suspend, resume on a
//! different worker, or spawn tasks and still see the same transaction.
//!
//! ## Scope Lifecycle
//!
//! ```text
//! 1. ambient = carrier[TX_KEY]
//! 2. manager.begin(policy, ambient)
//!      Err     → Outcome::Failed(Coordination), work never runs
//!      Joined  → run work on the caller's carrier, resolve nothing
//!      Created → carrier' = carrier + TX_KEY + CANCEL_KEY (child token)
//! 3. race work(carrier') against the scope token (cancellation wins ties)
//! 4. Success → commit | Failure → rollback | Cancelled → rollback
//! 5. cancel the scope token so detached children stop
//! ```
//!
//! If the returned future is dropped between steps 2 and 4 (caller timeout,
//! `select!` loser, panic in the work) the created coordinator is rolled back
//! with reason `Cancelled` by the scope's resolution guard.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use txscope_concurrency::{Begun, RollbackReason, TransactionCoordinator, TransactionManager, TX_KEY};
use txscope_core::{Cause, ContextCarrier, ContextKey, Outcome, Propagation, TerminalSignal};

/// Carrier key for the scope's cancellation token
pub const CANCEL_KEY: ContextKey<CancellationToken> = ContextKey::new("txscope.cancel");

/// Run `work` inside a transaction scope governed by `policy`
///
/// `work` receives the carrier it must thread through its own async calls.
/// Its error type `E` is never converted; it comes back inside
/// [`Cause::Error`] exactly as returned.
///
/// # Example
///
/// ```ignore
/// let outcome = run_in_transaction(&manager, &carrier, Propagation::Required, |cx| async move {
///     KvAccessor::put(&cx, "user:1", json!({"name": "ada"}))?;
///     Ok::<_, Error>(())
/// })
/// .await;
/// assert!(outcome.is_committed());
/// ```
pub async fn run_in_transaction<T, E, F, Fut>(
    manager: &TransactionManager,
    carrier: &ContextCarrier,
    policy: Propagation,
    work: F,
) -> Outcome<T, E>
where
    F: FnOnce(ContextCarrier) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let ambient = carrier.get(&TX_KEY);
    let begun = match manager.begin(policy, ambient).await {
        Ok(begun) => begun,
        Err(err) => {
            warn!(policy = policy.as_str(), error = %err, "transaction scope could not start");
            return Outcome::Failed {
                primary: Cause::Coordination(err),
                secondary: None,
            };
        }
    };

    match begun {
        Begun::Joined(_) => {
            let token = carrier.get(&CANCEL_KEY).cloned();
            Outcome::Joined(race(token, work(carrier.clone())).await)
        }
        Begun::Created(tx) => {
            let token = carrier
                .get(&CANCEL_KEY)
                .map(CancellationToken::child_token)
                .unwrap_or_else(CancellationToken::new);
            let scoped = carrier
                .with(&TX_KEY, Arc::clone(&tx))
                .with(&CANCEL_KEY, token.clone());

            let guard = ResolutionGuard::new(tx, token.clone());
            let signal = race(Some(token), work(scoped)).await;
            guard.resolve(signal)
        }
    }
}

/// Await `work`, unless `token` fires first
async fn race<T, E, Fut>(token: Option<CancellationToken>, work: Fut) -> TerminalSignal<T, E>
where
    Fut: Future<Output = Result<T, E>>,
{
    match token {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => TerminalSignal::Cancelled,
            result = work => result.into(),
        },
        None => work.await.into(),
    }
}

/// Map a terminal signal onto commit or rollback of `tx`
fn resolve<T, E: fmt::Display>(
    tx: &TransactionCoordinator,
    signal: TerminalSignal<T, E>,
) -> Outcome<T, E> {
    debug!(tx_id = %tx.id(), signal = signal.kind(), "resolving transaction scope");
    match signal {
        TerminalSignal::Success(value) => match tx.commit() {
            Ok(()) => Outcome::Committed(value),
            Err(err) => Outcome::Failed {
                primary: Cause::Coordination(err),
                secondary: None,
            },
        },
        TerminalSignal::Failure(e) => match tx.rollback(RollbackReason::Error(e.to_string())) {
            Ok(()) => Outcome::RolledBack(Cause::Error(e)),
            Err(err) => Outcome::Failed {
                primary: Cause::Error(e),
                secondary: Some(err),
            },
        },
        TerminalSignal::Cancelled => match tx.rollback(RollbackReason::Cancelled) {
            Ok(()) => Outcome::RolledBack(Cause::Cancelled),
            Err(err) => Outcome::Failed {
                primary: Cause::Cancelled,
                secondary: Some(err),
            },
        },
    }
}

/// Resolution rights over a created coordinator
///
/// Held only by the scope that created the coordinator. Resolving consumes
/// the guard; dropping it unresolved rolls the coordinator back with reason
/// `Cancelled`. Either way the scope token is cancelled afterwards.
pub(crate) struct ResolutionGuard {
    tx: Arc<TransactionCoordinator>,
    token: CancellationToken,
    armed: bool,
}

impl ResolutionGuard {
    pub(crate) fn new(tx: Arc<TransactionCoordinator>, token: CancellationToken) -> Self {
        ResolutionGuard {
            tx,
            token,
            armed: true,
        }
    }

    pub(crate) fn coordinator(&self) -> &Arc<TransactionCoordinator> {
        &self.tx
    }

    /// Disarm and resolve according to `signal`
    pub(crate) fn resolve<T, E: fmt::Display>(
        mut self,
        signal: TerminalSignal<T, E>,
    ) -> Outcome<T, E> {
        self.armed = false;
        let outcome = resolve(&self.tx, signal);
        self.token.cancel();
        outcome
    }
}

impl Drop for ResolutionGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.token.cancel();
        if !self.tx.is_active() {
            return;
        }
        warn!(tx_id = %self.tx.id(), "transaction scope dropped before resolution; rolling back");
        if let Err(e) = self.tx.rollback(RollbackReason::Cancelled) {
            warn!(tx_id = %self.tx.id(), error = %e, "rollback of dropped scope failed");
        }
    }
}
