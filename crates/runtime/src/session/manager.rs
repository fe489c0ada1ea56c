//! Session registry and incrementally maintained active index.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use serde::Serialize;
use tracing::{debug, info, warn};

use reflex_core::{EntityId, StateKind};

use super::StateSession;
use crate::clock::SharedClock;
use crate::config::SessionConfig;
use crate::host::PresenceOracle;
use crate::sync::{lock, read, write};

/// Snapshot of active sessions handed to the scheduler.
pub type SessionSnapshot = Arc<[Arc<StateSession>]>;

/// Owns one [`StateSession`] per known entity.
///
/// Active membership is updated only through
/// [`update_active_status`](Self::update_active_status), and the published
/// snapshot is rebuilt only when membership actually changes.
pub struct StateSessionManager {
    sessions: RwLock<HashMap<EntityId, Arc<StateSession>>>,
    active: Mutex<BTreeMap<EntityId, Arc<StateSession>>>,
    snapshot: RwLock<SessionSnapshot>,
    clock: SharedClock,
    config: SessionConfig,
    metrics: SessionMetrics,
}

impl StateSessionManager {
    pub fn new(clock: SharedClock, config: SessionConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            active: Mutex::new(BTreeMap::new()),
            snapshot: RwLock::new(SessionSnapshot::from(Vec::new())),
            clock,
            config,
            metrics: SessionMetrics::default(),
        }
    }

    /// Returns the entity's session, creating it on first reference.
    pub fn get_or_create(&self, entity: EntityId) -> Arc<StateSession> {
        if let Some(session) = self.get(entity) {
            return session;
        }
        let mut sessions = write(&self.sessions);
        sessions
            .entry(entity)
            .or_insert_with(|| {
                self.metrics.created.fetch_add(1, Ordering::Relaxed);
                Arc::new(StateSession::new(entity, self.clock.clone()))
            })
            .clone()
    }

    pub fn get(&self, entity: EntityId) -> Option<Arc<StateSession>> {
        read(&self.sessions).get(&entity).cloned()
    }

    /// Re-derives active membership for `session` after state changes.
    ///
    /// Returns `true` if membership changed (and the snapshot was rebuilt).
    ///
    /// The session's states are read under the index lock, so the last caller
    /// to take it always sees every state change made before its call.
    pub fn update_active_status(&self, session: &Arc<StateSession>) -> bool {
        let entity = session.entity();
        let mut active = lock(&self.active);
        let is_active = session.has_active_state();

        let changed = if is_active {
            active.insert(entity, session.clone()).is_none()
        } else {
            active.remove(&entity).is_some()
        };
        if changed {
            self.publish(&active);
            debug!(
                target: "runtime::sessions",
                entity = %entity,
                active = is_active,
                active_count = active.len(),
                "active membership changed"
            );
        }
        changed
    }

    /// Active sessions as of the last membership change, ordered by entity id.
    pub fn snapshot(&self) -> SessionSnapshot {
        read(&self.snapshot).clone()
    }

    pub fn is_active(&self, entity: EntityId) -> bool {
        lock(&self.active).contains_key(&entity)
    }

    /// Drops the session and its active membership.
    pub fn remove_session(&self, entity: EntityId) -> Option<Arc<StateSession>> {
        let removed = write(&self.sessions).remove(&entity);
        self.drop_active(entity);
        if removed.is_some() {
            self.metrics.removed.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    /// Clears the session's states and context but keeps it registered.
    pub fn reset_session(&self, entity: EntityId) {
        if let Some(session) = self.get(entity) {
            session.reset();
            self.update_active_status(&session);
        }
    }

    pub fn clear_all(&self) {
        write(&self.sessions).clear();
        let mut active = lock(&self.active);
        active.clear();
        self.publish(&active);
        info!(target: "runtime::sessions", "all sessions cleared");
    }

    /// Expires stale context references on every session.
    pub fn expire_context(&self) -> usize {
        let now = self.clock.now_millis();
        let ttl = self.config.context_ttl.as_millis() as u64;
        let sessions: Vec<_> = read(&self.sessions).values().cloned().collect();
        sessions
            .iter()
            .map(|session| session.expire_context(now, ttl))
            .sum()
    }

    /// One background sweep cycle.
    ///
    /// Context expiry always runs. Eviction candidates (older than the maximum
    /// age and without active states) are confirmed absent through a single
    /// bounded host call; if that call times out the eviction half is skipped.
    pub async fn sweep(&self, presence: &dyn PresenceOracle) -> SweepReport {
        let contexts_expired = self.expire_context();

        let now = self.clock.now_millis();
        let max_age = self.config.max_session_age.as_millis() as u64;
        let candidates: Vec<EntityId> = read(&self.sessions)
            .values()
            .filter(|s| now.saturating_sub(s.created_at()) > max_age && !s.has_active_state())
            .map(|s| s.entity())
            .collect();

        let mut report = SweepReport {
            contexts_expired,
            candidates: candidates.len(),
            ..SweepReport::default()
        };
        if candidates.is_empty() {
            return report;
        }

        let absent = match tokio::time::timeout(
            self.config.presence_timeout,
            presence.absent_among(candidates),
        )
        .await
        {
            Ok(absent) => absent,
            Err(_) => {
                warn!(
                    target: "runtime::sessions",
                    timeout_ms = self.config.presence_timeout.as_millis() as u64,
                    candidates = report.candidates,
                    "presence check timed out; skipping eviction this cycle"
                );
                report.skipped = true;
                return report;
            }
        };

        for entity in absent {
            let mut sessions = write(&self.sessions);
            // Re-check under the lock: the entity may have come back meanwhile.
            let evict = sessions
                .get(&entity)
                .is_some_and(|s| !s.has_active_state() && now.saturating_sub(s.created_at()) > max_age);
            if evict {
                sessions.remove(&entity);
                drop(sessions);
                self.drop_active(entity);
                report.evicted += 1;
            }
        }
        self.metrics
            .evicted
            .fetch_add(report.evicted as u64, Ordering::Relaxed);

        if report.evicted > 0 || report.contexts_expired > 0 {
            debug!(
                target: "runtime::sessions",
                evicted = report.evicted,
                contexts_expired = report.contexts_expired,
                "session sweep finished"
            );
        }
        report
    }

    pub fn stats(&self) -> SessionStats {
        let snapshot = self.snapshot();
        let mut states = BTreeMap::new();
        for session in snapshot.iter() {
            for kind in session.flags().kinds() {
                *states.entry(kind).or_insert(0) += 1;
            }
        }
        SessionStats {
            sessions: read(&self.sessions).len(),
            active: snapshot.len(),
            created: self.metrics.created.load(Ordering::Relaxed),
            removed: self.metrics.removed.load(Ordering::Relaxed),
            evicted: self.metrics.evicted.load(Ordering::Relaxed),
            states,
        }
    }

    pub fn reset_stats(&self) {
        self.metrics.created.store(0, Ordering::Relaxed);
        self.metrics.removed.store(0, Ordering::Relaxed);
        self.metrics.evicted.store(0, Ordering::Relaxed);
    }

    fn drop_active(&self, entity: EntityId) {
        let mut active = lock(&self.active);
        if active.remove(&entity).is_some() {
            self.publish(&active);
        }
    }

    fn publish(&self, active: &BTreeMap<EntityId, Arc<StateSession>>) {
        *write(&self.snapshot) = active.values().cloned().collect();
    }
}

#[derive(Debug, Default)]
struct SessionMetrics {
    created: AtomicU64,
    removed: AtomicU64,
    evicted: AtomicU64,
}

/// Outcome of one [`StateSessionManager::sweep`] cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub contexts_expired: usize,
    pub candidates: usize,
    pub evicted: usize,
    /// The presence check timed out and nothing was evicted.
    pub skipped: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub sessions: usize,
    pub active: usize,
    pub created: u64,
    pub removed: u64,
    pub evicted: u64,
    /// Active sessions per named state.
    pub states: BTreeMap<StateKind, usize>,
}
