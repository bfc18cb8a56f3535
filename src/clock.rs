//! Millisecond wall clocks for the id generator.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of wall-clock time in Unix milliseconds.
pub trait Clock {
    fn now_millis(&self) -> u64;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    #[inline]
    fn now_millis(&self) -> u64 {
        (**self).now_millis()
    }
}

/// The system wall clock.
///
/// Unlike a monotonic clock this one can step backwards (NTP corrections,
/// manual changes), which is what the generator's skew tolerance absorbs.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now_millis(&self) -> u64 {
        // Pre-1970 readings clamp to zero; the generator then reports them
        // as a backward step relative to its epoch.
        u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
    }
}

/// A hand-driven clock for tests and simulations.
///
/// Every read returns the current value and then moves it forward by the
/// configured step, so spin-waits make progress without real time passing.
/// A step of 0 freezes the clock between explicit `set`/`advance` calls.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
    step: AtomicU64,
}

impl ManualClock {
    /// A frozen clock reading `start_millis`.
    pub fn new(start_millis: u64) -> Self {
        Self {
            now: AtomicU64::new(start_millis),
            step: AtomicU64::new(0),
        }
    }

    /// Builder method: advance by `step_millis` after every read.
    pub fn with_auto_advance(self, step_millis: u64) -> Self {
        self.step.store(step_millis, Ordering::SeqCst);
        self
    }

    /// Jump to an absolute reading (may go backwards).
    pub fn set(&self, millis: u64) {
        self.now.store(millis, Ordering::SeqCst);
    }

    /// Move forward by `millis`.
    pub fn advance(&self, millis: u64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }

    /// Change the per-read step.
    pub fn set_auto_advance(&self, step_millis: u64) {
        self.step.store(step_millis, Ordering::SeqCst);
    }

    /// Current reading without advancing.
    pub fn peek(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        let step = self.step.load(Ordering::SeqCst);
        self.now.fetch_add(step, Ordering::SeqCst)
    }
}
