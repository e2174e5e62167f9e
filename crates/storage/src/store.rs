//! In-memory committed state
//!
//! DashMap-backed key/value store holding only committed data. Connections
//! buffer their writes and apply them here in one batch at commit.
//!
//! # Design
//!
//! - DashMap: sharded, lock-free reads
//! - Global version: incremented once per committed batch
//! - Commit lock: batches are applied one at a time

use crate::connection::MemoryConnection;
use crate::fault::FaultInjector;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use txscope_core::{DriverError, ResourceFactory, TransactionalResource};

/// A committed value with its commit version
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionedValue {
    /// Stored value
    pub value: Value,
    /// Version of the batch that wrote it
    pub version: u64,
    /// Commit time (microseconds since epoch)
    pub timestamp: i64,
}

/// Store-level counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Connections opened
    pub connections: u64,
    /// Underlying transactions started
    pub begins: u64,
    /// Underlying transactions committed
    pub commits: u64,
    /// Underlying transactions rolled back
    pub rollbacks: u64,
}

#[derive(Default)]
pub(crate) struct StoreCounters {
    pub(crate) connections: AtomicU64,
    pub(crate) begins: AtomicU64,
    pub(crate) commits: AtomicU64,
    pub(crate) rollbacks: AtomicU64,
}

/// Shared committed state for [`MemoryConnection`]s
pub struct MemoryStore {
    data: DashMap<String, VersionedValue>,
    version: AtomicU64,
    commit_lock: Mutex<()>,
    faults: FaultInjector,
    pub(crate) counters: StoreCounters,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Arc<Self> {
        Arc::new(MemoryStore {
            data: DashMap::new(),
            version: AtomicU64::new(0),
            commit_lock: Mutex::new(()),
            faults: FaultInjector::new(),
            counters: StoreCounters::default(),
        })
    }

    /// Current committed version
    #[inline]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Committed value for `key`
    #[inline]
    pub fn get(&self, key: &str) -> Option<VersionedValue> {
        self.data.get(key).map(|entry| entry.value().clone())
    }

    /// Whether `key` has a committed value
    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Number of committed keys
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether nothing is committed
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Committed entries whose key starts with `prefix`, sorted by key
    pub fn list_by_prefix(&self, prefix: &str) -> Vec<(String, VersionedValue)> {
        let mut results: Vec<_> = self
            .data
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        results.sort_by(|(a, _), (b, _)| a.cmp(b));
        results
    }

    /// Apply a batch of writes (`None` = delete) under one new version
    ///
    /// Batches are serialized against each other. Returns the batch version.
    pub fn apply_batch(&self, batch: impl IntoIterator<Item = (String, Option<Value>)>) -> u64 {
        let _guard = self.commit_lock.lock();
        let version = self.version.load(Ordering::Acquire) + 1;
        let timestamp = Utc::now().timestamp_micros();
        for (key, value) in batch {
            match value {
                Some(value) => {
                    self.data.insert(
                        key,
                        VersionedValue {
                            value,
                            version,
                            timestamp,
                        },
                    );
                }
                None => {
                    self.data.remove(&key);
                }
            }
        }
        self.version.store(version, Ordering::Release);
        version
    }

    /// Fault injection switchboard
    pub fn faults(&self) -> &FaultInjector {
        &self.faults
    }

    /// Open a connection directly, bypassing any pool
    pub fn connect(self: &Arc<Self>) -> Result<MemoryConnection, DriverError> {
        self.faults.check(crate::fault::FaultPoint::Open)?;
        let id = self.counters.connections.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(MemoryConnection::new(id, Arc::clone(self)))
    }

    /// Factory suitable for a resource pool
    pub fn factory(self: &Arc<Self>) -> Arc<dyn ResourceFactory> {
        Arc::new(MemoryConnectionFactory {
            store: Arc::clone(self),
        })
    }

    /// Snapshot of store counters
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            connections: self.counters.connections.load(Ordering::Relaxed),
            begins: self.counters.begins.load(Ordering::Relaxed),
            commits: self.counters.commits.load(Ordering::Relaxed),
            rollbacks: self.counters.rollbacks.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("version", &self.version())
            .field("entries", &self.len())
            .finish()
    }
}

/// Opens [`MemoryConnection`]s over a shared [`MemoryStore`]
pub struct MemoryConnectionFactory {
    store: Arc<MemoryStore>,
}

impl ResourceFactory for MemoryConnectionFactory {
    fn open(&self) -> Result<Box<dyn TransactionalResource>, DriverError> {
        Ok(Box::new(self.store.connect()?))
    }
}
