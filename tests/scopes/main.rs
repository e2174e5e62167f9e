//! Transaction Scope Test Suite
//!
//! End-to-end tests through the `txscope` facade: scopes run on a tokio
//! runtime over the in-memory driver.
//!
//! ## Key Verification Points
//!
//! 1. Every accessor in a scope sees the scope's handle, on any worker
//! 2. Success commits, failure rolls back with the work's own error
//! 3. Cancellation between operations rolls back, never commits
//! 4. REQUIRED joins, REQUIRES_NEW resolves independently
//! 5. Each handle is released exactly once
//!
//! ## Running Tests
//!
//! ```bash
//! # Run all scope tests
//! cargo test --test scopes
//!
//! # Run cancellation tests only
//! cargo test --test scopes cancellation::
//! ```

use std::sync::Arc;
use std::time::Duration;

use txscope::{MemoryStore, PoolStats, TxRuntime};

pub mod config;
pub mod migration;
pub mod nesting;
pub mod resolution;
pub mod scopes;

// =============================================================================
// SHARED TEST UTILITIES
// =============================================================================

/// Install a test-writer subscriber once per test binary
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// In-memory runtime with a small pool and a short acquire timeout
pub fn create_runtime() -> TxRuntime {
    init_tracing();
    TxRuntime::builder()
        .max_connections(4)
        .acquire_timeout(Duration::from_millis(200))
        .build()
        .expect("Failed to build runtime")
}

/// The runtime's own store
pub fn store_of(rt: &TxRuntime) -> Arc<MemoryStore> {
    Arc::clone(rt.store().expect("runtime owns an in-memory store"))
}

/// Assert every handle handed out has been released exactly once
pub fn assert_all_released(stats: PoolStats) {
    assert_eq!(stats.in_use, 0, "handles still outstanding: {stats:?}");
    assert_eq!(stats.released, stats.acquired, "release count mismatch: {stats:?}");
    assert_eq!(stats.double_releases, 0, "double release: {stats:?}");
}
