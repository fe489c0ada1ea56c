//! Wall-clock abstraction.
//!
//! Every time-derived decision in the runtime (cooldown expiry, elapsed
//! ticks, context TTLs, session age) reads milliseconds from a [`Clock`], so
//! tests can drive time explicitly with [`ManualClock`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Source of wall-clock milliseconds.
///
/// Implementations must never return 0; the runtime uses 0 as the
/// "state is off" sentinel for start timestamps.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

/// Shared clock handle passed to every component.
pub type SharedClock = Arc<dyn Clock>;

/// Milliseconds since the Unix epoch.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(1)
            .max(1)
    }
}

/// Manually advanced clock for tests and deterministic replays.
#[derive(Debug)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Starts at `start_millis` (raised to 1 if 0).
    pub fn new(start_millis: u64) -> Self {
        Self {
            now: AtomicU64::new(start_millis.max(1)),
        }
    }

    pub fn shared(start_millis: u64) -> Arc<Self> {
        Arc::new(Self::new(start_millis))
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn advance_millis(&self, millis: u64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }

    pub fn set(&self, millis: u64) {
        self.now.store(millis.max(1), Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(1_000)
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_never_reports_zero() {
        let clock = ManualClock::new(0);
        assert_eq!(clock.now_millis(), 1);
        clock.set(0);
        assert_eq!(clock.now_millis(), 1);
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(1_000);
        clock.advance(Duration::from_millis(250));
        clock.advance_millis(50);
        assert_eq!(clock.now_millis(), 1_300);
    }

    #[test]
    fn system_clock_is_monotonic_enough() {
        let a = SystemClock.now_millis();
        let b = SystemClock.now_millis();
        assert!(a > 0 && b >= a);
    }
}
