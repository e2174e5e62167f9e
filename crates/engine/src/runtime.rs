//! Transaction runtime
//!
//! [`TxRuntime`] bundles a [`TransactionManager`], its [`ResourceManager`]
//! and the [`EngineConfig`] they were built from. It is cheap to clone and
//! safe to share across tasks.
//!
//! # Example
//!
//! ```ignore
//! let rt = TxRuntime::builder()
//!     .max_connections(8)
//!     .acquire_timeout(Duration::from_millis(500))
//!     .build()?;
//!
//! let outcome = rt
//!     .run(|cx| async move {
//!         KvAccessor::put(&cx, "greeting", json!("hello"))?;
//!         Ok::<_, Error>(())
//!     })
//!     .await;
//! ```

use crate::config::EngineConfig;
use crate::propagation;
use crate::scope::{self, ManualScope};
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use txscope_concurrency::{TransactionInfo, TransactionManager, TransactionMetrics};
use txscope_core::{ContextCarrier, Outcome, Propagation, ResourceFactory, Result, TerminalSignal};
use txscope_resource::{DoubleReleasePolicy, PoolStats, ResourceManager};
use txscope_storage::MemoryStore;

struct RuntimeInner {
    config: EngineConfig,
    transactions: TransactionManager,
    /// Present when the runtime created its own in-memory store
    store: Option<Arc<MemoryStore>>,
}

/// Entry point for transaction scopes
#[derive(Clone)]
pub struct TxRuntime {
    inner: Arc<RuntimeInner>,
}

impl TxRuntime {
    /// Builder with default settings
    pub fn builder() -> TxRuntimeBuilder {
        TxRuntimeBuilder::new()
    }

    /// Runtime over a fresh [`MemoryStore`] with default settings
    pub fn in_memory() -> Result<Self> {
        Self::builder().build()
    }

    /// Runtime over a fresh [`MemoryStore`], configured from a TOML file
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::builder().config(EngineConfig::from_file(path)?).build()
    }

    /// Effective configuration
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// The transaction manager
    pub fn transactions(&self) -> &TransactionManager {
        &self.inner.transactions
    }

    /// The resource manager
    pub fn resources(&self) -> &ResourceManager {
        self.inner.transactions.resources()
    }

    /// The in-memory store, when the runtime owns one
    pub fn store(&self) -> Option<&Arc<MemoryStore>> {
        self.inner.store.as_ref()
    }

    /// Run `work` in a scope nested under `carrier`
    ///
    /// See [`run_in_transaction`](crate::run_in_transaction).
    pub async fn run_in_transaction<T, E, F, Fut>(
        &self,
        carrier: &ContextCarrier,
        policy: Propagation,
        work: F,
    ) -> Outcome<T, E>
    where
        F: FnOnce(ContextCarrier) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: fmt::Display,
    {
        propagation::run_in_transaction(&self.inner.transactions, carrier, policy, work).await
    }

    /// Run `work` in a top-level scope under the default policy
    pub async fn run<T, E, F, Fut>(&self, work: F) -> Outcome<T, E>
    where
        F: FnOnce(ContextCarrier) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: fmt::Display,
    {
        let root = ContextCarrier::empty();
        self.run_in_transaction(&root, self.inner.config.default_policy, work)
            .await
    }

    /// Start a manual scope; see [`begin_scope`](crate::begin_scope)
    pub async fn begin_scope(&self, policy: Propagation) -> Result<ManualScope> {
        scope::begin_scope(&self.inner.transactions, policy).await
    }

    /// Resolve a manual scope; see [`end_scope`](crate::end_scope)
    pub fn end_scope<T, E: fmt::Display>(
        &self,
        scope: ManualScope,
        signal: TerminalSignal<T, E>,
    ) -> Outcome<T, E> {
        scope.end(signal)
    }

    /// Transaction counters
    pub fn metrics(&self) -> TransactionMetrics {
        self.inner.transactions.metrics()
    }

    /// Unresolved transactions, oldest first
    pub fn active_transactions(&self) -> Vec<TransactionInfo> {
        self.inner.transactions.active_transactions()
    }

    /// Pool counters
    pub fn pool_stats(&self) -> PoolStats {
        self.resources().stats()
    }
}

impl fmt::Debug for TxRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxRuntime")
            .field("config", &self.inner.config)
            .field("in_memory", &self.inner.store.is_some())
            .finish()
    }
}

/// Builder for [`TxRuntime`]
///
/// # Example
///
/// ```ignore
/// // Tests: small pool, fail fast
/// let rt = TxRuntime::builder()
///     .max_connections(2)
///     .acquire_timeout(Duration::from_millis(50))
///     .build()?;
///
/// // Custom driver
/// let rt = TxRuntime::builder()
///     .factory(my_factory)
///     .default_policy(Propagation::RequiresNew)
///     .build()?;
/// ```
pub struct TxRuntimeBuilder {
    config: EngineConfig,
    factory: Option<Arc<dyn ResourceFactory>>,
}

impl TxRuntimeBuilder {
    /// Builder with default settings over an in-memory store
    pub fn new() -> Self {
        TxRuntimeBuilder {
            config: EngineConfig::default(),
            factory: None,
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Pool size
    pub fn max_connections(mut self, max: usize) -> Self {
        self.config.pool.max_size = max;
        self
    }

    /// Bounded wait for a free connection
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.config.pool = self.config.pool.with_acquire_timeout(timeout);
        self
    }

    /// Double release handling
    pub fn double_release(mut self, policy: DoubleReleasePolicy) -> Self {
        self.config.pool.double_release = policy;
        self
    }

    /// Policy for [`TxRuntime::run`]
    pub fn default_policy(mut self, policy: Propagation) -> Self {
        self.config.default_policy = policy;
        self
    }

    /// Use `factory` instead of a fresh in-memory store
    pub fn factory(mut self, factory: Arc<dyn ResourceFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Validate the configuration and build the runtime
    pub fn build(self) -> Result<TxRuntime> {
        self.config.validate()?;
        let (factory, store) = match self.factory {
            Some(factory) => (factory, None),
            None => {
                let store = MemoryStore::new();
                (store.factory(), Some(store))
            }
        };
        let resources = ResourceManager::new(factory, self.config.pool.clone())?;
        info!(
            max_size = self.config.pool.max_size,
            acquire_timeout_ms = self.config.pool.acquire_timeout_ms,
            default_policy = self.config.default_policy.as_str(),
            in_memory = store.is_some(),
            "transaction runtime ready"
        );
        Ok(TxRuntime {
            inner: Arc::new(RuntimeInner {
                config: self.config,
                transactions: TransactionManager::new(resources),
                store,
            }),
        })
    }
}

impl Default for TxRuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
