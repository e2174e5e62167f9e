//! Core types shared by every layer
//!
//! This module defines the identifiers and enums used throughout the system:
//! - [`TxId`]: Unique identifier for one logical transaction
//! - [`HandleId`]: Identifier of a resource handle issued by a pool
//! - [`Propagation`]: Join-or-create policy for a scope
//! - [`TxState`]: Lifecycle state of a transaction coordinator

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a logical transaction
///
/// TxId is used to:
/// - Correlate log lines across workers
/// - Key the active-transaction registry
/// - Compare coordinators observed by different steps of one chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxId(Uuid);

impl TxId {
    /// Create a new random TxId using UUID v4
    ///
    /// # Examples
    ///
    /// ```
    /// use txscope_core::types::TxId;
    ///
    /// let a = TxId::new();
    /// let b = TxId::new();
    /// assert_ne!(a, b);
    /// ```
    pub fn new() -> Self {
        TxId(Uuid::new_v4())
    }

    /// Create TxId from raw bytes
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        TxId(Uuid::from_bytes(bytes))
    }

    /// Get raw bytes representation
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for TxId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a resource handle
///
/// Allocated by the pool that issued the handle; unique within that pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandleId(u64);

impl HandleId {
    /// Wrap a raw handle number
    pub const fn new(raw: u64) -> Self {
        HandleId(raw)
    }

    /// Raw handle number
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h{}", self.0)
    }
}

/// Propagation policy for a transactional scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Propagation {
    /// Join the ambient transaction if it is active, otherwise create one
    #[default]
    Required,
    /// Always create an independent transaction, suspending any ambient one
    RequiresNew,
}

impl Propagation {
    /// Canonical lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Propagation::Required => "required",
            Propagation::RequiresNew => "requires_new",
        }
    }
}

impl fmt::Display for Propagation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a transaction coordinator
///
/// ```text
/// New ──► Active ──► Committing ──► Committed
///  │        │            │   └────► Failed
///  │        │            └──► RollingBack (fallback after failed commit)
///  │        └──► RollingBack ──► RolledBack
///  │                     └─────► Failed
///  └──► Failed (begin failed)
/// ```
///
/// Transitions are monotonic: no state is ever revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxState {
    /// Created, underlying transaction not yet started
    New,
    /// Underlying transaction started; accessors may use the handle
    Active,
    /// Commit in flight
    Committing,
    /// Rollback in flight
    RollingBack,
    /// Committed (terminal)
    Committed,
    /// Rolled back (terminal)
    RolledBack,
    /// Begin, commit or rollback failed (terminal)
    Failed,
}

impl TxState {
    /// Whether this state is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, TxState::Committed | TxState::RolledBack | TxState::Failed)
    }

    /// Whether the state machine admits `self -> next`
    pub fn can_transition_to(&self, next: TxState) -> bool {
        use TxState::*;
        matches!(
            (self, next),
            (New, Active)
                | (New, Failed)
                | (Active, Committing)
                | (Active, RollingBack)
                | (Committing, Committed)
                | (Committing, Failed)
                | (Committing, RollingBack)
                | (RollingBack, RolledBack)
                | (RollingBack, Failed)
        )
    }

    /// Canonical lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            TxState::New => "new",
            TxState::Active => "active",
            TxState::Committing => "committing",
            TxState::RollingBack => "rolling_back",
            TxState::Committed => "committed",
            TxState::RolledBack => "rolled_back",
            TxState::Failed => "failed",
        }
    }
}

impl fmt::Display for TxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
