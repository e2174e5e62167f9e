//! In-memory transactional connection
//!
//! A [`MemoryConnection`] buffers writes between `begin` and `commit` and
//! applies them to its [`MemoryStore`] as one versioned batch. Reads see the
//! connection's own pending writes first, then committed data.

use crate::fault::FaultPoint;
use crate::store::MemoryStore;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::any::Any;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use txscope_core::{DriverError, TransactionalResource};

/// One connection to a [`MemoryStore`]
pub struct MemoryConnection {
    id: u64,
    store: Arc<MemoryStore>,
    in_txn: bool,
    poisoned: bool,
    writes: FxHashMap<String, Option<Value>>,
}

impl MemoryConnection {
    pub(crate) fn new(id: u64, store: Arc<MemoryStore>) -> Self {
        MemoryConnection {
            id,
            store,
            in_txn: false,
            poisoned: false,
            writes: FxHashMap::default(),
        }
    }

    /// Connection number, unique per store
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether a transaction is open
    pub fn in_transaction(&self) -> bool {
        self.in_txn
    }

    /// Number of buffered writes and deletes
    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }

    /// Read `key`, seeing this connection's pending writes
    pub fn get(&self, key: &str) -> Result<Option<Value>, DriverError> {
        if let Some(pending) = self.writes.get(key) {
            return Ok(pending.clone());
        }
        Ok(self.store.get(key).map(|v| v.value))
    }

    /// Buffer a write
    pub fn put(&mut self, key: impl Into<String>, value: Value) -> Result<(), DriverError> {
        self.require_txn("write")?;
        self.store.faults().check(FaultPoint::Write)?;
        self.writes.insert(key.into(), Some(value));
        Ok(())
    }

    /// Buffer a delete
    pub fn delete(&mut self, key: impl Into<String>) -> Result<(), DriverError> {
        self.require_txn("write")?;
        self.store.faults().check(FaultPoint::Write)?;
        self.writes.insert(key.into(), None);
        Ok(())
    }

    /// Entries under `prefix`, merging pending writes over committed data
    pub fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Value)>, DriverError> {
        let mut merged: std::collections::BTreeMap<String, Option<Value>> = self
            .store
            .list_by_prefix(prefix)
            .into_iter()
            .map(|(k, v)| (k, Some(v.value)))
            .collect();
        for (k, v) in self.writes.iter().filter(|(k, _)| k.starts_with(prefix)) {
            merged.insert(k.clone(), v.clone());
        }
        Ok(merged
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k, v)))
            .collect())
    }

    fn require_txn(&self, operation: &'static str) -> Result<(), DriverError> {
        if self.in_txn {
            Ok(())
        } else {
            Err(DriverError::new(operation, "no transaction open on connection"))
        }
    }
}

impl TransactionalResource for MemoryConnection {
    fn kind(&self) -> &'static str {
        "memory"
    }

    fn begin(&mut self) -> Result<(), DriverError> {
        if self.in_txn {
            return Err(DriverError::new("begin", "transaction already open"));
        }
        self.store.faults().check(FaultPoint::Begin)?;
        self.in_txn = true;
        self.writes.clear();
        self.store.counters.begins.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DriverError> {
        self.require_txn("commit")?;
        if let Err(e) = self.store.faults().check(FaultPoint::Commit) {
            self.poisoned = true;
            return Err(e);
        }
        let batch = std::mem::take(&mut self.writes);
        let version = self.store.apply_batch(batch);
        self.in_txn = false;
        self.store.counters.commits.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(connection = self.id, version, "memory commit applied");
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DriverError> {
        self.require_txn("rollback")?;
        if let Err(e) = self.store.faults().check(FaultPoint::Rollback) {
            self.poisoned = true;
            return Err(e);
        }
        self.writes.clear();
        self.in_txn = false;
        self.store.counters.rollbacks.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn is_reusable(&self) -> bool {
        !self.poisoned && !self.in_txn
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
