//! Core traits defining Ephemera interfaces

use crate::types::EpochSeconds;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Result type for Ephemera operations
pub type EphemeraResult<T> = Result<T, crate::error::EphemeraError>;

/// Source of wall-clock time for expiry decisions
pub trait Clock: Send + Sync {
    /// Current time in whole seconds
    fn now(&self) -> EpochSeconds;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> EpochSeconds {
        (**self).now()
    }
}

/// Clock backed by the system wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> EpochSeconds {
        EpochSeconds::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    secs: AtomicI64,
}

impl ManualClock {
    pub fn new(start: EpochSeconds) -> Self {
        Self {
            secs: AtomicI64::new(start.as_secs()),
        }
    }

    pub fn set(&self, at: EpochSeconds) {
        self.secs.store(at.as_secs(), Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.secs.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> EpochSeconds {
        EpochSeconds(self.secs.load(Ordering::SeqCst))
    }
}
