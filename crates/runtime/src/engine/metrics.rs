//! Rule engine counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Monotonic pipeline counters, lock-free across callers.
#[derive(Debug, Default)]
pub(crate) struct EngineMetrics {
    fires: AtomicU64,
    successes: AtomicU64,
    cooldown_blocked: AtomicU64,
    target_misses: AtomicU64,
    effect_failures: AtomicU64,
    condition_failures: AtomicU64,
    metadata_filtered: AtomicU64,
    suppressed: AtomicU64,
    panics: AtomicU64,
}

impl EngineMetrics {
    pub(crate) fn record_fire(&self) {
        self.fires.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cooldown_blocked(&self) {
        self.cooldown_blocked.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_target_miss(&self) {
        self.target_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_effect_failure(&self) {
        self.effect_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_condition_failure(&self) {
        self.condition_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_metadata_filtered(&self) {
        self.metadata_filtered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_suppressed(&self) {
        self.suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_panic(&self) {
        self.panics.fetch_add(1, Ordering::Relaxed);
    }

    /// Creates a snapshot of all counters.
    ///
    /// Fields are loaded independently, so a snapshot taken under load may
    /// mix values from slightly different instants.
    pub(crate) fn snapshot(&self) -> EngineStats {
        EngineStats {
            fires: self.fires.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            cooldown_blocked: self.cooldown_blocked.load(Ordering::Relaxed),
            target_misses: self.target_misses.load(Ordering::Relaxed),
            effect_failures: self.effect_failures.load(Ordering::Relaxed),
            condition_failures: self.condition_failures.load(Ordering::Relaxed),
            metadata_filtered: self.metadata_filtered.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            panics: self.panics.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn reset(&self) {
        for counter in [
            &self.fires,
            &self.successes,
            &self.cooldown_blocked,
            &self.target_misses,
            &self.effect_failures,
            &self.condition_failures,
            &self.metadata_filtered,
            &self.suppressed,
            &self.panics,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Snapshot of [`RuleEngine`](super::RuleEngine) counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    /// Rules that entered the gate pipeline.
    pub fires: u64,
    pub successes: u64,
    pub cooldown_blocked: u64,
    /// Rules whose selector resolved to nothing (invocation still attempted).
    pub target_misses: u64,
    pub effect_failures: u64,
    pub condition_failures: u64,
    pub metadata_filtered: u64,
    /// Events the engine asked the host to suppress.
    pub suppressed: u64,
    /// Rules whose evaluation panicked inside a host collaborator.
    pub panics: u64,
}

impl EngineStats {
    /// Successful invocations as a percentage of attempted ones (100 when idle).
    pub fn success_rate(&self) -> f64 {
        let attempted = self.successes + self.effect_failures;
        if attempted == 0 {
            100.0
        } else {
            self.successes as f64 / attempted as f64 * 100.0
        }
    }
}
