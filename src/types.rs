//! Public types for the txscope API.
//!
//! This module re-exports types from internal crates with a clean public interface.

// Context
pub use txscope_core::{ContextCarrier, ContextKey};

// Ids, policy and lifecycle
pub use txscope_core::{HandleId, Propagation, TxId, TxState};

// Resolution
pub use txscope_core::{Cause, Outcome, ScopeError, TerminalSignal};

// Layer errors
pub use txscope_core::{DriverError, Error as CoreError};

// Driver contracts
pub use txscope_core::{ResourceFactory, TransactionalResource};

// Resource pool
pub use txscope_resource::{DoubleReleasePolicy, PoolConfig, PoolStats, ResourceHandle, ResourceManager};

// In-memory driver
pub use txscope_storage::{FaultInjector, FaultPoint, MemoryConnection, MemoryStore, StoreStats};

// Coordination
pub use txscope_concurrency::{
    Begun, RollbackReason, TransactionCoordinator, TransactionInfo, TransactionManager,
    TransactionMetrics, TX_KEY,
};
