//! Resource manager
//!
//! Acquires and releases the single underlying resource used by one
//! transaction. The manager knows nothing about transaction semantics; it
//! only delegates begin/commit/rollback to the resource it handed out.
//!
//! ## Acquire
//!
//! ```text
//! 1. Wait for a pool permit (bounded by acquire_timeout)
//! 2. Reuse an idle resource, or open a new one via the factory
//! 3. Wrap resource + permit in a ResourceHandle
//! ```
//!
//! ## Release
//!
//! ```text
//! 1. Flip the handle's released flag (second flip = double release)
//! 2. Return the resource to the idle list, or discard it if broken
//! 3. Drop the permit, waking one waiter
//! ```

use crate::config::{DoubleReleasePolicy, PoolConfig};
use crate::handle::ResourceHandle;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};
use txscope_core::{DriverError, Error, HandleId, ResourceFactory, Result, TransactionalResource};

/// Point-in-time pool counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Resources opened through the factory
    pub opened: u64,
    /// Handles issued
    pub acquired: u64,
    /// Handles released (first release only)
    pub released: u64,
    /// Resources dropped instead of returned to the idle list
    pub discarded: u64,
    /// Release calls on an already released handle
    pub double_releases: u64,
    /// Resources waiting in the idle list
    pub idle: usize,
    /// Handles currently outstanding
    pub in_use: usize,
}

#[derive(Default)]
struct Counters {
    opened: AtomicU64,
    acquired: AtomicU64,
    released: AtomicU64,
    discarded: AtomicU64,
    double_releases: AtomicU64,
}

pub(crate) struct PoolShared {
    factory: Arc<dyn ResourceFactory>,
    config: PoolConfig,
    idle: Mutex<Vec<Box<dyn TransactionalResource>>>,
    permits: Arc<Semaphore>,
    next_handle: AtomicU64,
    counters: Counters,
}

impl PoolShared {
    /// Release `handle`; `leaked` is set when called from the handle's drop
    pub(crate) fn release(&self, handle: &ResourceHandle, leaked: bool) -> Result<()> {
        if handle.mark_released() {
            self.counters.double_releases.fetch_add(1, Ordering::Relaxed);
            return match self.config.double_release {
                DoubleReleasePolicy::Fail => {
                    error!(handle = %handle.id(), "double release of resource handle");
                    Err(Error::DoubleRelease { handle: handle.id() })
                }
                DoubleReleasePolicy::Warn => {
                    warn!(handle = %handle.id(), "ignoring double release of resource handle");
                    Ok(())
                }
            };
        }

        if let Some(resource) = handle.take_resource() {
            if handle.is_broken() || !resource.is_reusable() {
                self.counters.discarded.fetch_add(1, Ordering::Relaxed);
                debug!(handle = %handle.id(), "discarding resource");
            } else {
                self.idle.lock().push(resource);
            }
        }
        // Permit goes back last so a woken waiter finds the idle resource.
        drop(handle.take_permit());
        self.counters.released.fetch_add(1, Ordering::Relaxed);
        debug!(handle = %handle.id(), leaked, "released resource");
        Ok(())
    }
}

/// Pool of exclusive transactional resources
///
/// # Thread Safety
///
/// `acquire` may be awaited from any task; the bounded wait is a semaphore
/// permit, so waiters are woken in FIFO order as handles are released.
/// `release` is synchronous and safe to call from `Drop`.
#[derive(Clone)]
pub struct ResourceManager {
    shared: Arc<PoolShared>,
}

impl ResourceManager {
    /// Create a manager over `factory`
    pub fn new(factory: Arc<dyn ResourceFactory>, config: PoolConfig) -> Result<Self> {
        config.validate()?;
        Ok(ResourceManager {
            shared: Arc::new(PoolShared {
                permits: Arc::new(Semaphore::new(config.max_size)),
                factory,
                config,
                idle: Mutex::new(Vec::new()),
                next_handle: AtomicU64::new(1),
                counters: Counters::default(),
            }),
        })
    }

    /// Pool configuration
    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// Obtain an exclusive resource handle
    ///
    /// Fails with [`Error::ResourceExhausted`] if no resource frees up within
    /// the configured bound, or with [`Error::Driver`] if opening a new
    /// resource fails.
    pub async fn acquire(&self) -> Result<ResourceHandle> {
        let shared = &self.shared;
        let timeout_ms = shared.config.acquire_timeout_ms;
        let permit = match tokio::time::timeout(
            shared.config.acquire_timeout(),
            Arc::clone(&shared.permits).acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            // The semaphore is never closed; treat it like exhaustion.
            Ok(Err(_)) | Err(_) => {
                warn!(timeout_ms, max_size = shared.config.max_size, "resource pool exhausted");
                return Err(Error::ResourceExhausted { timeout_ms });
            }
        };

        let reused = shared.idle.lock().pop();
        let resource = match reused {
            Some(resource) => resource,
            None => {
                let resource = shared.factory.open()?;
                shared.counters.opened.fetch_add(1, Ordering::Relaxed);
                resource
            }
        };

        let id = HandleId::new(shared.next_handle.fetch_add(1, Ordering::Relaxed));
        shared.counters.acquired.fetch_add(1, Ordering::Relaxed);
        debug!(handle = %id, kind = resource.kind(), "acquired resource");
        Ok(ResourceHandle::new(
            id,
            resource,
            permit,
            Arc::downgrade(&self.shared),
        ))
    }

    /// Return `handle`'s resource to the pool
    ///
    /// A second release of the same handle is governed by
    /// [`DoubleReleasePolicy`].
    pub fn release(&self, handle: &ResourceHandle) -> Result<()> {
        self.shared.release(handle, false)
    }

    /// Start the underlying transaction on `handle`'s resource
    pub fn begin_underlying(&self, handle: &ResourceHandle) -> std::result::Result<(), DriverError> {
        delegate(handle, "begin", |r| r.begin())
    }

    /// Commit the underlying transaction on `handle`'s resource
    pub fn commit_underlying(&self, handle: &ResourceHandle) -> std::result::Result<(), DriverError> {
        delegate(handle, "commit", |r| r.commit())
    }

    /// Roll back the underlying transaction on `handle`'s resource
    pub fn rollback_underlying(
        &self,
        handle: &ResourceHandle,
    ) -> std::result::Result<(), DriverError> {
        delegate(handle, "rollback", |r| r.rollback())
    }

    /// Snapshot of pool counters
    pub fn stats(&self) -> PoolStats {
        let shared = &self.shared;
        PoolStats {
            opened: shared.counters.opened.load(Ordering::Relaxed),
            acquired: shared.counters.acquired.load(Ordering::Relaxed),
            released: shared.counters.released.load(Ordering::Relaxed),
            discarded: shared.counters.discarded.load(Ordering::Relaxed),
            double_releases: shared.counters.double_releases.load(Ordering::Relaxed),
            idle: shared.idle.lock().len(),
            in_use: shared.config.max_size - shared.permits.available_permits(),
        }
    }
}

fn delegate(
    handle: &ResourceHandle,
    operation: &'static str,
    call: impl FnOnce(&mut dyn TransactionalResource) -> std::result::Result<(), DriverError>,
) -> std::result::Result<(), DriverError> {
    match handle.with_dyn(call) {
        Ok(result) => result,
        Err(e) => Err(DriverError::new(operation, e.to_string())),
    }
}
