//! Context-aware accessors
//!
//! Resolve "the resource of the current transaction" from a
//! [`ContextCarrier`]. Any task holding a clone of the scope's carrier
//! resolves the same handle, whichever worker it runs on.

use serde_json::Value;
use std::sync::Arc;
use txscope_concurrency::{TransactionCoordinator, TX_KEY};
use txscope_core::{ContextCarrier, Error, HandleId, Result, TransactionalResource, TxId};
use txscope_storage::MemoryConnection;

/// The coordinator published in `carrier`, if any
pub fn current_transaction(carrier: &ContextCarrier) -> Option<&Arc<TransactionCoordinator>> {
    carrier.get(&TX_KEY)
}

/// The resource of the active transaction in `carrier`
///
/// Fails with [`Error::NoActiveTransaction`] if no coordinator is published
/// or the published one is no longer active.
pub fn current_resource(carrier: &ContextCarrier) -> Result<CurrentResource> {
    match current_transaction(carrier) {
        Some(tx) if tx.is_active() => Ok(CurrentResource {
            tx: Arc::clone(tx),
        }),
        _ => Err(Error::NoActiveTransaction),
    }
}

/// Borrowed view of the current transaction's resource
#[derive(Debug, Clone)]
pub struct CurrentResource {
    tx: Arc<TransactionCoordinator>,
}

impl CurrentResource {
    /// Owning transaction
    pub fn tx_id(&self) -> TxId {
        self.tx.id()
    }

    /// Handle id; equal across every accessor of the same transaction
    pub fn handle_id(&self) -> HandleId {
        self.tx.handle().id()
    }

    /// Driver kind of the underlying resource
    pub fn kind(&self) -> &'static str {
        self.tx.handle().kind()
    }

    /// Owning coordinator
    pub fn coordinator(&self) -> &Arc<TransactionCoordinator> {
        &self.tx
    }

    /// Run `f` with exclusive, typed access to the resource
    ///
    /// Fails with [`Error::ResourceMismatch`] if the resource is not an `R`,
    /// or [`Error::HandleReleased`] if the transaction resolved meanwhile.
    pub fn with<R, T>(&self, f: impl FnOnce(&mut R) -> T) -> Result<T>
    where
        R: TransactionalResource,
    {
        self.tx.handle().with_resource(f)
    }
}

/// Key-value accessor over [`MemoryConnection`]
///
/// Each call resolves the current resource from the carrier it is given.
#[derive(Debug, Clone, Copy, Default)]
pub struct KvAccessor;

impl KvAccessor {
    /// Read `key` as seen by the current transaction
    pub fn get(carrier: &ContextCarrier, key: &str) -> Result<Option<Value>> {
        Ok(Self::connection(carrier, |conn| conn.get(key))??)
    }

    /// Write `key` in the current transaction
    pub fn put(carrier: &ContextCarrier, key: impl Into<String>, value: Value) -> Result<()> {
        let key = key.into();
        Ok(Self::connection(carrier, |conn| conn.put(key, value))??)
    }

    /// Delete `key` in the current transaction
    pub fn delete(carrier: &ContextCarrier, key: impl Into<String>) -> Result<()> {
        let key = key.into();
        Ok(Self::connection(carrier, |conn| conn.delete(key))??)
    }

    /// Entries under `prefix` as seen by the current transaction, key order
    pub fn scan_prefix(carrier: &ContextCarrier, prefix: &str) -> Result<Vec<(String, Value)>> {
        Ok(Self::connection(carrier, |conn| conn.scan_prefix(prefix))??)
    }

    fn connection<T>(
        carrier: &ContextCarrier,
        f: impl FnOnce(&mut MemoryConnection) -> T,
    ) -> Result<T> {
        current_resource(carrier)?.with(f)
    }
}
