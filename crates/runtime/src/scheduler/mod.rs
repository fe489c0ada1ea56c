//! Periodic evaluation of active sessions.
//!
//! Each [`TickScheduler::pass`] takes the active-session snapshot once and
//! processes a bounded window of it, starting at a rolling cursor. For every
//! session in the window it runs hover detection, then DURATION checks, then
//! TICK checks for each state that is on.
//!
//! Elapsed ticks are always `(now - started_at) / tick_millis`, never a
//! per-pass counter, so skipped or late passes cannot make them drift.
mod hover;

pub use hover::HoverTransition;

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{error, trace};

use reflex_core::StateKind;

use crate::clock::SharedClock;
use crate::config::{HoverConfig, RuntimeConfig};
use crate::engine::RuleEngine;
use crate::session::{StateSession, StateSessionManager};
use crate::sync::{lock, panic_message};

/// Drives hover detection and time-derived rule checks.
pub struct TickScheduler {
    engine: Arc<RuleEngine>,
    sessions: Arc<StateSessionManager>,
    clock: SharedClock,
    tick_millis: u64,
    max_per_pass: usize,
    hover: HoverConfig,
    cursor: Mutex<usize>,
    metrics: SchedulerMetrics,
}

impl TickScheduler {
    pub fn new(engine: Arc<RuleEngine>, clock: SharedClock, config: &RuntimeConfig) -> Self {
        let config = config.clone().normalized();
        Self {
            sessions: engine.sessions().clone(),
            engine,
            clock,
            tick_millis: config.tick_millis(),
            max_per_pass: config.scheduler.max_entities_per_pass,
            hover: config.hover,
            cursor: Mutex::new(0),
            metrics: SchedulerMetrics::default(),
        }
    }

    /// Runs one scheduler pass over the next batch window.
    ///
    /// Concurrent calls are serialized; a panic while processing one entity is
    /// logged and the rest of the batch still runs.
    pub fn pass(&self) -> PassReport {
        self.metrics.passes.fetch_add(1, Ordering::Relaxed);

        let snapshot = self.sessions.snapshot();
        let mut cursor = lock(&self.cursor);
        let mut report = PassReport {
            active: snapshot.len(),
            ..PassReport::default()
        };
        self.metrics.last_active.store(snapshot.len(), Ordering::Relaxed);
        if snapshot.is_empty() {
            return report;
        }

        if *cursor >= snapshot.len() {
            *cursor = 0;
        }
        let start = *cursor;
        let end = (start + self.max_per_pass).min(snapshot.len());
        report.start = start;

        for session in &snapshot[start..end] {
            let entity = session.entity();
            match catch_unwind(AssertUnwindSafe(|| self.process(session))) {
                Ok(Some(outcome)) => {
                    report.processed += 1;
                    report.fired += outcome.fired;
                    report.transitions += usize::from(outcome.transition.is_some());
                }
                Ok(None) => report.skipped += 1,
                Err(panic) => {
                    report.failed += 1;
                    error!(
                        target: "runtime::scheduler",
                        entity = %entity,
                        panic = panic_message(&*panic),
                        "entity processing panicked; continuing batch"
                    );
                }
            }
        }

        *cursor = if end >= snapshot.len() { 0 } else { end };
        self.metrics.cursor.store(*cursor, Ordering::Relaxed);
        self.metrics
            .entities_processed
            .fetch_add(report.processed as u64, Ordering::Relaxed);
        self.metrics
            .transitions
            .fetch_add(report.transitions as u64, Ordering::Relaxed);
        self.metrics
            .rules_fired
            .fetch_add(report.fired as u64, Ordering::Relaxed);

        trace!(
            target: "runtime::scheduler",
            active = report.active,
            start,
            end,
            fired = report.fired,
            "pass complete"
        );
        report
    }

    /// Processes one session. `None` when the entity is offline.
    fn process(&self, session: &Arc<StateSession>) -> Option<EntityOutcome> {
        let entity = session.entity();
        let entities = self.engine.host().entities();
        if !entities.is_online(entity) {
            return None;
        }

        self.metrics.hover_checks.fetch_add(1, Ordering::Relaxed);
        let motion = entities.motion(entity);
        if let Some(sample) = motion {
            session.update_velocity(sample.velocity);
        }
        let detected = motion.is_some_and(|sample| hover::detect(&self.hover, session, &sample));
        let min_stable = self
            .engine
            .hover_min_stable_for(entity, self.hover.min_stable_passes);
        let transition = hover::step(session, detected, min_stable);

        let mut fired = 0;
        if let Some(transition) = transition {
            fired += self
                .engine
                .fire(entity, StateKind::Hovering.action(), transition.timing());
            self.sessions.update_active_status(session);
        }

        let now = self.clock.now_millis();
        let elapsed: Vec<(StateKind, u64)> = session
            .active_states()
            .into_iter()
            .map(|(kind, started_at)| {
                session.record_tick(kind);
                (kind, now.saturating_sub(started_at) / self.tick_millis)
            })
            .filter(|&(_, ticks)| ticks > 0)
            .collect();

        for &(kind, ticks) in &elapsed {
            fired += self.engine.check_duration_rules(entity, kind.action(), ticks);
        }
        for &(kind, ticks) in &elapsed {
            fired += self.engine.check_tick_rules(entity, kind.action(), ticks);
        }

        Some(EntityOutcome { fired, transition })
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            passes: self.metrics.passes.load(Ordering::Relaxed),
            entities_processed: self.metrics.entities_processed.load(Ordering::Relaxed),
            hover_checks: self.metrics.hover_checks.load(Ordering::Relaxed),
            transitions: self.metrics.transitions.load(Ordering::Relaxed),
            rules_fired: self.metrics.rules_fired.load(Ordering::Relaxed),
            cursor: self.metrics.cursor.load(Ordering::Relaxed),
            last_active: self.metrics.last_active.load(Ordering::Relaxed),
            batch_size: self.max_per_pass,
        }
    }

    /// Zeroes the counters and rewinds the cursor.
    pub fn reset_stats(&self) {
        *lock(&self.cursor) = 0;
        for counter in [
            &self.metrics.passes,
            &self.metrics.entities_processed,
            &self.metrics.hover_checks,
            &self.metrics.transitions,
            &self.metrics.rules_fired,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.metrics.cursor.store(0, Ordering::Relaxed);
    }
}

struct EntityOutcome {
    fired: usize,
    transition: Option<HoverTransition>,
}

#[derive(Debug, Default)]
struct SchedulerMetrics {
    passes: AtomicU64,
    entities_processed: AtomicU64,
    hover_checks: AtomicU64,
    transitions: AtomicU64,
    rules_fired: AtomicU64,
    cursor: AtomicUsize,
    last_active: AtomicUsize,
}

/// What one [`TickScheduler::pass`] did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    /// Size of the snapshot the pass worked on.
    pub active: usize,
    /// Cursor position the batch window started at.
    pub start: usize,
    pub processed: usize,
    /// Sessions whose entity was offline.
    pub skipped: usize,
    pub failed: usize,
    pub transitions: usize,
    /// Successful effect invocations.
    pub fired: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub passes: u64,
    pub entities_processed: u64,
    pub hover_checks: u64,
    pub transitions: u64,
    pub rules_fired: u64,
    pub cursor: usize,
    pub last_active: usize,
    pub batch_size: usize,
}
