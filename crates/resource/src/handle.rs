//! Resource handles
//!
//! A [`ResourceHandle`] is the exclusive, transaction-scoped reference to one
//! pooled resource. It is owned by exactly one coordinator and released
//! exactly once, back to the [`ResourceManager`](crate::ResourceManager)
//! that issued it.
//!
//! All access to the underlying resource goes through the handle's mutex, so
//! concurrent branches of one scope that share a joined transaction are
//! serialized. The mutex is only held for the duration of a synchronous
//! driver call.

use crate::manager::PoolShared;
use parking_lot::Mutex;
use std::any::type_name;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Weak;
use tokio::sync::OwnedSemaphorePermit;
use txscope_core::{Error, HandleId, Result, TransactionalResource};

/// Exclusive handle on a pooled transactional resource
pub struct ResourceHandle {
    id: HandleId,
    kind: &'static str,
    exclusive: bool,
    slot: Mutex<Option<Box<dyn TransactionalResource>>>,
    permit: Mutex<Option<OwnedSemaphorePermit>>,
    released: AtomicBool,
    broken: AtomicBool,
    pool: Weak<PoolShared>,
}

impl ResourceHandle {
    pub(crate) fn new(
        id: HandleId,
        resource: Box<dyn TransactionalResource>,
        permit: OwnedSemaphorePermit,
        pool: Weak<PoolShared>,
    ) -> Self {
        ResourceHandle {
            id,
            kind: resource.kind(),
            exclusive: true,
            slot: Mutex::new(Some(resource)),
            permit: Mutex::new(Some(permit)),
            released: AtomicBool::new(false),
            broken: AtomicBool::new(false),
            pool,
        }
    }

    /// Handle identifier
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Kind of the underlying resource
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Whether the handle grants exclusive use of its resource
    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }

    /// Whether the handle has been released
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Mark the resource as unfit for reuse; it is discarded on release
    pub fn mark_broken(&self) {
        self.broken.store(true, Ordering::Release);
    }

    /// Whether the resource was marked broken
    pub fn is_broken(&self) -> bool {
        self.broken.load(Ordering::Acquire)
    }

    /// Run `f` with typed, exclusive access to the resource
    ///
    /// This is the single place where the resource's concrete type is
    /// checked. Fails with [`Error::ResourceMismatch`] if the handle carries
    /// another type and [`Error::HandleReleased`] after release.
    pub fn with_resource<R, T>(&self, f: impl FnOnce(&mut R) -> T) -> Result<T>
    where
        R: TransactionalResource,
    {
        let mut slot = self.slot.lock();
        let resource = slot
            .as_mut()
            .ok_or(Error::HandleReleased { handle: self.id })?;
        let actual = resource.kind();
        match resource.as_any_mut().downcast_mut::<R>() {
            Some(typed) => Ok(f(typed)),
            None => Err(Error::ResourceMismatch {
                expected: type_name::<R>(),
                actual,
            }),
        }
    }

    /// Run `f` with untyped, exclusive access to the resource
    pub fn with_dyn<T>(&self, f: impl FnOnce(&mut dyn TransactionalResource) -> T) -> Result<T> {
        let mut slot = self.slot.lock();
        match slot.as_mut() {
            Some(resource) => Ok(f(&mut **resource)),
            None => Err(Error::HandleReleased { handle: self.id }),
        }
    }

    /// Flip the released flag; returns whether it was already set
    pub(crate) fn mark_released(&self) -> bool {
        self.released.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn take_resource(&self) -> Option<Box<dyn TransactionalResource>> {
        self.slot.lock().take()
    }

    pub(crate) fn take_permit(&self) -> Option<OwnedSemaphorePermit> {
        self.permit.lock().take()
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("exclusive", &self.exclusive)
            .field("released", &self.is_released())
            .field("broken", &self.is_broken())
            .finish()
    }
}

impl Drop for ResourceHandle {
    fn drop(&mut self) {
        if self.is_released() {
            return;
        }
        tracing::warn!(handle = %self.id, kind = self.kind, "resource handle dropped without release");
        if let Some(pool) = self.pool.upgrade() {
            if let Err(e) = pool.release(self, true) {
                tracing::warn!(handle = %self.id, error = %e, "releasing dropped handle failed");
            }
        }
    }
}
