//! Transaction coordinator
//!
//! A [`TransactionCoordinator`] owns the lifecycle of one logical transaction
//! and the single [`ResourceHandle`] it runs on.
//!
//! ## Resolution
//!
//! ```text
//! commit():   Active → Committing → commit_underlying
//!               ok  → Committed
//!               err → RollingBack → rollback_underlying (best effort) → Failed
//! rollback(): Active → RollingBack → rollback_underlying
//!               ok  → RolledBack
//!               err → Failed
//! ```
//!
//! Every path that reaches a terminal state releases the handle, and only
//! those paths do, so the handle is released exactly once.
//!
//! ## Races
//!
//! The first caller to move the coordinator out of `Active` wins. A later
//! commit or rollback observes a non-`Active` state and gets
//! [`Error::IllegalStateTransition`] without touching the resource. The
//! recorded outcome is never overwritten.

use crate::metrics::Registry;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, error, warn};
use txscope_core::{ContextKey, Error, HandleId, Propagation, Result, TxId, TxState};
use txscope_resource::{ResourceHandle, ResourceManager};

/// Carrier key under which the active coordinator is published
pub const TX_KEY: ContextKey<Arc<TransactionCoordinator>> = ContextKey::new("txscope.transaction");

/// Why a coordinator is being rolled back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackReason {
    /// The scope's work failed; rendered error message
    Error(String),
    /// The scope was cancelled
    Cancelled,
    /// The last reference was dropped while still active
    Abandoned,
}

impl fmt::Display for RollbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RollbackReason::Error(msg) => write!(f, "error: {}", msg),
            RollbackReason::Cancelled => f.write_str("cancelled"),
            RollbackReason::Abandoned => f.write_str("abandoned"),
        }
    }
}

/// Serializable snapshot of a coordinator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionInfo {
    /// Transaction id
    pub tx_id: TxId,
    /// Manager-local sequence number
    pub seq: u64,
    /// Policy the transaction was created under
    pub policy: Propagation,
    /// State at snapshot time
    pub state: TxState,
    /// Handle the transaction runs on
    pub handle: HandleId,
    /// Outer transaction suspended by this one, if any
    pub suspended: Option<TxId>,
    /// Creation time
    pub started_at: DateTime<Utc>,
}

/// Lifecycle owner of one logical transaction
pub struct TransactionCoordinator {
    id: TxId,
    seq: u64,
    policy: Propagation,
    state: Mutex<TxState>,
    handle: ResourceHandle,
    resources: ResourceManager,
    suspended: Option<(TxId, Weak<TransactionCoordinator>)>,
    started_at: DateTime<Utc>,
    registry: Arc<Registry>,
}

impl TransactionCoordinator {
    pub(crate) fn new(
        seq: u64,
        policy: Propagation,
        handle: ResourceHandle,
        resources: ResourceManager,
        suspended: Option<&Arc<TransactionCoordinator>>,
        registry: Arc<Registry>,
    ) -> Self {
        TransactionCoordinator {
            id: TxId::new(),
            seq,
            policy,
            state: Mutex::new(TxState::New),
            handle,
            resources,
            suspended: suspended.map(|outer| (outer.id(), Arc::downgrade(outer))),
            started_at: Utc::now(),
            registry,
        }
    }

    /// Transaction id
    pub fn id(&self) -> TxId {
        self.id
    }

    /// Manager-local sequence number
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Policy this coordinator was created under
    pub fn policy(&self) -> Propagation {
        self.policy
    }

    /// Current state
    pub fn state(&self) -> TxState {
        *self.state.lock()
    }

    /// Whether the transaction accepts work
    pub fn is_active(&self) -> bool {
        self.state() == TxState::Active
    }

    /// The owned resource handle
    pub fn handle(&self) -> &ResourceHandle {
        &self.handle
    }

    /// Id of the outer transaction suspended by this one
    pub fn suspended_id(&self) -> Option<TxId> {
        self.suspended.as_ref().map(|(id, _)| *id)
    }

    /// The outer transaction suspended by this one, if still alive
    pub fn suspended(&self) -> Option<Arc<TransactionCoordinator>> {
        self.suspended.as_ref().and_then(|(_, outer)| outer.upgrade())
    }

    /// Creation time
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Snapshot for diagnostics
    pub fn info(&self) -> TransactionInfo {
        TransactionInfo {
            tx_id: self.id,
            seq: self.seq,
            policy: self.policy,
            state: self.state(),
            handle: self.handle.id(),
            suspended: self.suspended_id(),
            started_at: self.started_at,
        }
    }

    /// Commit the transaction
    ///
    /// Only valid from `Active`. On driver failure a fallback rollback is
    /// attempted, the coordinator ends `Failed`, and the error carries both
    /// the commit failure and the fallback's failure, if any.
    pub fn commit(&self) -> Result<()> {
        self.leave_active(TxState::Committing)?;

        match self.resources.commit_underlying(&self.handle) {
            Ok(()) => {
                self.finish(TxState::Committed);
                debug!(tx_id = %self.id, seq = self.seq, "transaction committed");
                Ok(())
            }
            Err(source) => {
                error!(tx_id = %self.id, seq = self.seq, error = %source, "commit failed");
                self.handle.mark_broken();
                self.advance(TxState::RollingBack);
                let fallback_rollback = self.resources.rollback_underlying(&self.handle).err();
                if let Some(e) = &fallback_rollback {
                    error!(tx_id = %self.id, error = %e, "fallback rollback after failed commit also failed");
                }
                self.finish(TxState::Failed);
                Err(Error::CommitFailure {
                    tx_id: self.id,
                    source,
                    fallback_rollback,
                })
            }
        }
    }

    /// Roll the transaction back
    ///
    /// Only valid from `Active`. A driver failure ends the coordinator in
    /// `Failed` and is reported as [`Error::RollbackFailure`]; callers attach
    /// it to their original cause.
    pub fn rollback(&self, reason: RollbackReason) -> Result<()> {
        self.leave_active(TxState::RollingBack)?;

        match self.resources.rollback_underlying(&self.handle) {
            Ok(()) => {
                self.finish(TxState::RolledBack);
                debug!(tx_id = %self.id, seq = self.seq, %reason, "transaction rolled back");
                Ok(())
            }
            Err(source) => {
                error!(tx_id = %self.id, seq = self.seq, %reason, error = %source, "rollback failed");
                self.handle.mark_broken();
                self.finish(TxState::Failed);
                Err(Error::RollbackFailure {
                    tx_id: self.id,
                    source,
                })
            }
        }
    }

    /// `New → Active` after the underlying begin succeeded
    pub(crate) fn activate(&self) {
        self.advance(TxState::Active);
    }

    /// `New → Failed` after the underlying begin failed
    pub(crate) fn fail_begin(&self) {
        self.handle.mark_broken();
        self.finish(TxState::Failed);
    }

    /// Claim the transition out of `Active`; the only contended step
    fn leave_active(&self, to: TxState) -> Result<()> {
        let mut state = self.state.lock();
        if *state == TxState::Active {
            *state = to;
            return Ok(());
        }
        let from = *state;
        drop(state);

        self.registry.record_illegal();
        if from == TxState::New {
            warn!(tx_id = %self.id, %from, %to, "resolution requested before transaction started");
        } else {
            debug!(tx_id = %self.id, %from, %to, "resolution rejected: already resolving or resolved");
        }
        Err(Error::IllegalStateTransition {
            tx_id: self.id,
            from,
            to,
        })
    }

    /// Uncontended transition owned by the caller that left `Active`
    fn advance(&self, to: TxState) {
        let mut state = self.state.lock();
        debug_assert!(state.can_transition_to(to), "{} -> {}", *state, to);
        *state = to;
    }

    /// Record `terminal`, release the handle and count the outcome
    fn finish(&self, terminal: TxState) {
        self.advance(terminal);
        self.release();
        self.registry.record_terminal(self.id, terminal);
    }

    fn release(&self) {
        if let Err(e) = self.resources.release(&self.handle) {
            warn!(tx_id = %self.id, error = %e, "releasing transaction handle failed");
        }
    }
}

impl fmt::Debug for TransactionCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionCoordinator")
            .field("id", &self.id)
            .field("seq", &self.seq)
            .field("policy", &self.policy)
            .field("state", &self.state())
            .field("handle", &self.handle.id())
            .finish()
    }
}

impl Drop for TransactionCoordinator {
    fn drop(&mut self) {
        if self.is_active() {
            warn!(tx_id = %self.id, seq = self.seq, "active transaction dropped; rolling back");
            let _ = self.rollback(RollbackReason::Abandoned);
        }
    }
}
