//! Transaction manager
//!
//! Creates coordinators and decides, per propagation policy, whether a scope
//! joins the ambient transaction or gets its own.
//!
//! ## Begin Sequence
//!
//! ```text
//! REQUIRED     + active ambient  → Joined(ambient)          no resource touched
//! REQUIRED     + no/inactive     ┐
//! REQUIRES_NEW + anything        ┘→ acquire handle (bounded wait)
//!                                   create coordinator (New)
//!                                   begin_underlying
//!                                     ok  → Active, registered → Created
//!                                     err → Failed, handle released → BeginFailure
//! ```
//!
//! A coordinator created under REQUIRES_NEW while another is active records
//! the outer one as suspended. The outer coordinator is untouched and resumes
//! when the inner scope finishes.

use crate::coordinator::{TransactionCoordinator, TransactionInfo};
use crate::metrics::{Registry, TransactionMetrics};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error};
use txscope_core::{Error, Propagation, Result};
use txscope_resource::ResourceManager;

/// Result of [`TransactionManager::begin`]
#[derive(Debug, Clone)]
pub enum Begun {
    /// The scope participates in an existing transaction and must not resolve it
    Joined(Arc<TransactionCoordinator>),
    /// The scope owns a freshly started transaction and must resolve it
    Created(Arc<TransactionCoordinator>),
}

impl Begun {
    /// The coordinator, joined or created
    pub fn coordinator(&self) -> &Arc<TransactionCoordinator> {
        match self {
            Begun::Joined(tx) | Begun::Created(tx) => tx,
        }
    }

    /// Whether the caller owns resolution
    pub fn is_created(&self) -> bool {
        matches!(self, Begun::Created(_))
    }

    /// Take the coordinator
    pub fn into_coordinator(self) -> Arc<TransactionCoordinator> {
        match self {
            Begun::Joined(tx) | Begun::Created(tx) => tx,
        }
    }
}

/// Creates and tracks transaction coordinators
///
/// # Thread Safety
///
/// `begin` may be called from any task. Sequence numbers come from an
/// atomic counter; the only await point is the bounded handle acquire.
pub struct TransactionManager {
    resources: ResourceManager,

    /// Next coordinator sequence number
    next_seq: AtomicU64,

    registry: Arc<Registry>,
}

impl TransactionManager {
    /// Create a manager drawing handles from `resources`
    pub fn new(resources: ResourceManager) -> Self {
        TransactionManager {
            resources,
            next_seq: AtomicU64::new(1),
            registry: Arc::new(Registry::default()),
        }
    }

    /// The resource manager handles are drawn from
    pub fn resources(&self) -> &ResourceManager {
        &self.resources
    }

    /// Allocate the next sequence number
    pub fn next_seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Start or join a transaction according to `policy`
    ///
    /// # Errors
    ///
    /// - [`Error::ResourceExhausted`] if no handle frees up within the pool's
    ///   acquire timeout
    /// - [`Error::Driver`] if opening a new resource fails
    /// - [`Error::BeginFailure`] if the underlying begin fails; the handle is
    ///   already released and the coordinator is `Failed`
    pub async fn begin(
        &self,
        policy: Propagation,
        ambient: Option<&Arc<TransactionCoordinator>>,
    ) -> Result<Begun> {
        if policy == Propagation::Required {
            if let Some(outer) = ambient.filter(|tx| tx.is_active()) {
                self.registry.record_join();
                debug!(tx_id = %outer.id(), "joining ambient transaction");
                return Ok(Begun::Joined(Arc::clone(outer)));
            }
        }

        let suspended = ambient.filter(|tx| tx.is_active());
        let handle = self.resources.acquire().await?;
        let seq = self.next_seq();
        let tx = Arc::new(TransactionCoordinator::new(
            seq,
            policy,
            handle,
            self.resources.clone(),
            suspended,
            Arc::clone(&self.registry),
        ));

        if let Err(source) = self.resources.begin_underlying(tx.handle()) {
            error!(tx_id = %tx.id(), seq, error = %source, "begin failed");
            tx.fail_begin();
            return Err(Error::BeginFailure {
                tx_id: tx.id(),
                source,
            });
        }

        tx.activate();
        self.registry.register(&tx);
        debug!(
            tx_id = %tx.id(),
            seq,
            policy = policy.as_str(),
            handle = %tx.handle().id(),
            suspended = ?tx.suspended_id(),
            "transaction started"
        );
        Ok(Begun::Created(tx))
    }

    /// Counter snapshot
    pub fn metrics(&self) -> TransactionMetrics {
        self.registry.snapshot()
    }

    /// Unresolved coordinators, oldest first
    pub fn active_transactions(&self) -> Vec<TransactionInfo> {
        self.registry.active()
    }
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("next_seq", &self.next_seq.load(Ordering::Relaxed))
            .field("metrics", &self.metrics())
            .finish()
    }
}
