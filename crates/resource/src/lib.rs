//! Resource management for txscope
//!
//! This crate owns the lifecycle of the underlying transactional resources:
//! - ResourceManager: bounded pool, acquire/release, begin/commit/rollback delegation
//! - ResourceHandle: exclusive, serialized access to one resource
//! - PoolConfig: size, acquire bound, double release policy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod handle;
pub mod manager;

pub use config::{DoubleReleasePolicy, PoolConfig};
pub use handle::ResourceHandle;
pub use manager::{PoolStats, ResourceManager};
