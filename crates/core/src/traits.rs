//! Driver-facing traits
//!
//! These are the only contracts the coordination layer consumes from a
//! storage or connection driver:
//!
//! - [`TransactionalResource`]: one exclusive connection-like resource that
//!   can start, commit and roll back a transaction
//! - [`ResourceFactory`]: opens new resources for a pool
//!
//! Calls are synchronous and short; the resource manager serializes them
//! behind the handle's mutex and never holds that mutex across an `.await`.

use crate::error::DriverError;
use std::any::Any;

/// A single transactional resource (e.g. a connection)
pub trait TransactionalResource: Any + Send {
    /// Resource kind, used in diagnostics and mismatch errors
    fn kind(&self) -> &'static str;

    /// Start an underlying transaction
    fn begin(&mut self) -> Result<(), DriverError>;

    /// Commit the underlying transaction
    fn commit(&mut self) -> Result<(), DriverError>;

    /// Roll back the underlying transaction
    fn rollback(&mut self) -> Result<(), DriverError>;

    /// Whether the resource can be handed to another transaction
    ///
    /// Pools discard resources that report `false` on release.
    fn is_reusable(&self) -> bool {
        true
    }

    /// Upcast for typed access at accessor boundaries
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Opens resources on demand
pub trait ResourceFactory: Send + Sync {
    /// Open a new resource
    fn open(&self) -> Result<Box<dyn TransactionalResource>, DriverError>;
}

impl<F> ResourceFactory for F
where
    F: Fn() -> Result<Box<dyn TransactionalResource>, DriverError> + Send + Sync,
{
    fn open(&self) -> Result<Box<dyn TransactionalResource>, DriverError> {
        self()
    }
}
