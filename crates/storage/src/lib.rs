//! In-memory storage driver for txscope
//!
//! This crate provides a reference transactional resource:
//! - MemoryStore: DashMap-backed committed state with a global version
//! - MemoryConnection: write-buffering connection implementing TransactionalResource
//! - FaultInjector: one-shot failures at open/begin/write/commit/rollback

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod connection;
pub mod fault;
pub mod store;

pub use connection::MemoryConnection;
pub use fault::{FaultInjector, FaultPoint};
pub use store::{MemoryConnectionFactory, MemoryStore, StoreStats, VersionedValue};
