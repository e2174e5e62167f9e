//! Transaction metrics and the active-transaction registry

use crate::coordinator::{TransactionCoordinator, TransactionInfo};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use txscope_core::{TxId, TxState};

/// Point-in-time transaction counters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransactionMetrics {
    /// Coordinators that started and were registered
    pub total_begun: u64,
    /// Scopes that joined an ambient coordinator
    pub total_joined: u64,
    /// Coordinators that committed
    pub total_committed: u64,
    /// Coordinators that rolled back cleanly
    pub total_rolled_back: u64,
    /// Coordinators that ended in `Failed` (begin, commit or rollback failure)
    pub total_failed: u64,
    /// Resolution calls rejected by the state machine
    pub illegal_transitions: u64,
    /// Coordinators not yet resolved
    pub active_count: u64,
    /// committed / resolved (0.0 when nothing resolved yet)
    pub commit_rate: f64,
}

#[derive(Default)]
pub(crate) struct Registry {
    begun: AtomicU64,
    joined: AtomicU64,
    committed: AtomicU64,
    rolled_back: AtomicU64,
    failed: AtomicU64,
    illegal_transitions: AtomicU64,
    active: DashMap<TxId, Weak<TransactionCoordinator>>,
}

impl Registry {
    pub(crate) fn register(&self, tx: &Arc<TransactionCoordinator>) {
        self.begun.fetch_add(1, Ordering::Relaxed);
        self.active.insert(tx.id(), Arc::downgrade(tx));
    }

    pub(crate) fn record_join(&self) {
        self.joined.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_terminal(&self, tx_id: TxId, state: TxState) {
        match state {
            TxState::Committed => self.committed.fetch_add(1, Ordering::Relaxed),
            TxState::RolledBack => self.rolled_back.fetch_add(1, Ordering::Relaxed),
            _ => self.failed.fetch_add(1, Ordering::Relaxed),
        };
        self.active.remove(&tx_id);
    }

    pub(crate) fn record_illegal(&self) {
        self.illegal_transitions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn active(&self) -> Vec<TransactionInfo> {
        // Any upgraded Arc may turn out to be the last reference, and its Drop
        // removes from `active`, so none may be dropped under a shard guard.
        let live: Vec<Arc<TransactionCoordinator>> = self
            .active
            .iter()
            .filter_map(|entry| entry.value().upgrade())
            .collect();
        let mut infos: Vec<_> = live.iter().map(|tx| tx.info()).collect();
        drop(live);
        infos.sort_by_key(|info| info.seq);
        infos
    }

    pub(crate) fn snapshot(&self) -> TransactionMetrics {
        let committed = self.committed.load(Ordering::Relaxed);
        let rolled_back = self.rolled_back.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let resolved = committed + rolled_back + failed;
        TransactionMetrics {
            total_begun: self.begun.load(Ordering::Relaxed),
            total_joined: self.joined.load(Ordering::Relaxed),
            total_committed: committed,
            total_rolled_back: rolled_back,
            total_failed: failed,
            illegal_transitions: self.illegal_transitions.load(Ordering::Relaxed),
            active_count: self.active.len() as u64,
            commit_rate: if resolved == 0 {
                0.0
            } else {
                committed as f64 / resolved as f64
            },
        }
    }
}
