//! Fault injection for the in-memory driver
//!
//! Arms one-shot failures at named points so tests can drive the
//! coordinator's failure paths (begin, commit and rollback failures).

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use txscope_core::DriverError;

/// Where a fault can be injected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    /// Opening a connection
    Open,
    /// Starting a transaction
    Begin,
    /// Buffering a write
    Write,
    /// Committing
    Commit,
    /// Rolling back
    Rollback,
}

impl FaultPoint {
    /// Driver operation name reported in the error
    pub fn operation(&self) -> &'static str {
        match self {
            FaultPoint::Open => "open",
            FaultPoint::Begin => "begin",
            FaultPoint::Write => "write",
            FaultPoint::Commit => "commit",
            FaultPoint::Rollback => "rollback",
        }
    }
}

/// Armed failures, consumed one per check
#[derive(Debug, Default)]
pub struct FaultInjector {
    armed: Mutex<FxHashMap<FaultPoint, u32>>,
}

impl FaultInjector {
    /// No faults armed
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next check at `point`
    pub fn fail_next(&self, point: FaultPoint) {
        self.fail_times(point, 1);
    }

    /// Fail the next `times` checks at `point`
    pub fn fail_times(&self, point: FaultPoint, times: u32) {
        *self.armed.lock().entry(point).or_insert(0) += times;
    }

    /// Disarm everything
    pub fn clear(&self) {
        self.armed.lock().clear();
    }

    /// Remaining armed failures at `point`
    pub fn remaining(&self, point: FaultPoint) -> u32 {
        self.armed.lock().get(&point).copied().unwrap_or(0)
    }

    /// Consume one armed failure at `point`, if any
    pub fn check(&self, point: FaultPoint) -> Result<(), DriverError> {
        let mut armed = self.armed.lock();
        match armed.get_mut(&point) {
            Some(n) if *n > 0 => {
                *n -= 1;
                Err(DriverError::new(point.operation(), "injected fault"))
            }
            _ => Ok(()),
        }
    }
}
