//! Per-entity, per-rule cooldown ledger.
//!
//! Entries map `(entity, scope:id)` to an absolute expiry in wall-clock
//! milliseconds. A missing entry means "not on cooldown". Expired entries are
//! removed lazily on read and proactively by [`CooldownLedger::sweep_expired`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use serde::Serialize;
use tracing::{debug, trace};

use reflex_core::{EntityId, RuleKey};

use crate::clock::SharedClock;
use crate::sync::{lock, read, write};

type EntityLedger = Arc<Mutex<HashMap<RuleKey, u64>>>;

/// Concurrent cooldown store.
///
/// The outer map is only write-locked to add or drop an entity; all per-rule
/// work happens under that entity's own mutex.
pub struct CooldownLedger {
    entities: RwLock<HashMap<EntityId, EntityLedger>>,
    clock: SharedClock,
    tick_millis: u64,
    metrics: CooldownMetrics,
}

impl CooldownLedger {
    pub fn new(clock: SharedClock, tick_millis: u64) -> Self {
        Self {
            entities: RwLock::new(HashMap::new()),
            clock,
            tick_millis: tick_millis.max(1),
            metrics: CooldownMetrics::default(),
        }
    }

    /// Starts a cooldown of `ticks` for this entity and rule. 0 is a no-op.
    pub fn set(&self, entity: EntityId, key: &RuleKey, ticks: u32) {
        if ticks == 0 {
            return;
        }
        let expires_at = self
            .clock
            .now_millis()
            .saturating_add(u64::from(ticks) * self.tick_millis);

        // The outer guard stays held across the insert so a concurrent
        // `drop_if_empty` or sweep cannot orphan the entity map.
        let inserted = read(&self.entities)
            .get(&entity)
            .map(|ledger| lock(ledger).insert(key.clone(), expires_at))
            .is_some();
        if !inserted {
            let mut entities = write(&self.entities);
            lock(entities.entry(entity).or_default()).insert(key.clone(), expires_at);
        }
        self.metrics.set.fetch_add(1, Ordering::Relaxed);

        trace!(
            target: "runtime::cooldown",
            entity = %entity,
            rule = %key,
            ticks,
            expires_at,
            "cooldown set"
        );
    }

    /// True while the cooldown has not expired. Expired entries are removed.
    pub fn is_active(&self, entity: EntityId, key: &RuleKey) -> bool {
        self.metrics.checked.fetch_add(1, Ordering::Relaxed);

        let Some(ledger) = self.ledger(entity) else {
            return false;
        };
        let now = self.clock.now_millis();

        let (active, now_empty) = {
            let mut entries = lock(&ledger);
            match entries.get(key) {
                None => (false, false),
                Some(&expires_at) if now < expires_at => (true, false),
                Some(_) => {
                    entries.remove(key);
                    (false, entries.is_empty())
                }
            }
        };

        if now_empty {
            self.drop_if_empty(entity);
        }
        if active {
            self.metrics.blocked.fetch_add(1, Ordering::Relaxed);
        }
        active
    }

    /// Remaining ticks, rounded up. 0 when not on cooldown.
    pub fn remaining(&self, entity: EntityId, key: &RuleKey) -> u64 {
        let Some(ledger) = self.ledger(entity) else {
            return 0;
        };
        let now = self.clock.now_millis();
        lock(&ledger)
            .get(key)
            .map(|&expires_at| expires_at.saturating_sub(now).div_ceil(self.tick_millis))
            .unwrap_or(0)
    }

    pub fn clear(&self, entity: EntityId, key: &RuleKey) {
        let Some(ledger) = self.ledger(entity) else {
            return;
        };
        let now_empty = {
            let mut entries = lock(&ledger);
            entries.remove(key);
            entries.is_empty()
        };
        if now_empty {
            self.drop_if_empty(entity);
        }
    }

    /// Drops every cooldown of one entity.
    pub fn clear_entity(&self, entity: EntityId) {
        write(&self.entities).remove(&entity);
    }

    pub fn clear_all(&self) {
        write(&self.entities).clear();
    }

    /// Removes every expired entry and every entity left without entries.
    /// Returns the number of entries removed.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let mut removed = 0;

        let mut entities = write(&self.entities);
        entities.retain(|_, ledger| {
            let mut entries = lock(ledger);
            let before = entries.len();
            entries.retain(|_, expires_at| now < *expires_at);
            removed += before - entries.len();
            !entries.is_empty()
        });
        let remaining_entities = entities.len();
        drop(entities);

        if removed > 0 {
            debug!(
                target: "runtime::cooldown",
                removed,
                entities = remaining_entities,
                "expired cooldowns swept"
            );
        }
        removed
    }

    pub fn stats(&self) -> CooldownStats {
        let entities = read(&self.entities);
        let entries = entities.values().map(|ledger| lock(ledger).len()).sum();
        CooldownStats {
            set: self.metrics.set.load(Ordering::Relaxed),
            checked: self.metrics.checked.load(Ordering::Relaxed),
            blocked: self.metrics.blocked.load(Ordering::Relaxed),
            entities: entities.len(),
            entries,
        }
    }

    pub fn reset_stats(&self) {
        self.metrics.set.store(0, Ordering::Relaxed);
        self.metrics.checked.store(0, Ordering::Relaxed);
        self.metrics.blocked.store(0, Ordering::Relaxed);
    }

    fn ledger(&self, entity: EntityId) -> Option<EntityLedger> {
        read(&self.entities).get(&entity).cloned()
    }

    fn drop_if_empty(&self, entity: EntityId) {
        let mut entities = write(&self.entities);
        if entities
            .get(&entity)
            .is_some_and(|ledger| lock(ledger).is_empty())
        {
            entities.remove(&entity);
        }
    }
}

#[derive(Debug, Default)]
struct CooldownMetrics {
    set: AtomicU64,
    checked: AtomicU64,
    blocked: AtomicU64,
}

/// Point-in-time view of the ledger counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CooldownStats {
    pub set: u64,
    pub checked: u64,
    pub blocked: u64,
    pub entities: usize,
    pub entries: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn ledger() -> (Arc<ManualClock>, CooldownLedger) {
        let clock = ManualClock::shared(10_000);
        let ledger = CooldownLedger::new(clock.clone(), 50);
        (clock, ledger)
    }

    #[test]
    fn expires_after_tick_duration() {
        let (clock, ledger) = ledger();
        let e = EntityId(1);
        let key = RuleKey::from("S:r1");

        ledger.set(e, &key, 100);
        assert!(ledger.is_active(e, &key));
        assert_eq!(ledger.remaining(e, &key), 100);

        clock.advance_millis(100 * 50 - 1);
        assert!(ledger.is_active(e, &key));
        assert_eq!(ledger.remaining(e, &key), 1);

        clock.advance_millis(1);
        assert!(!ledger.is_active(e, &key));
        // Lazy removal drops the entry and the now-empty entity map.
        assert_eq!(ledger.stats().entries, 0);
        assert_eq!(ledger.stats().entities, 0);
    }

    #[test]
    fn zero_ticks_is_a_no_op() {
        let (_, ledger) = ledger();
        let key = RuleKey::from("S:r1");
        ledger.set(EntityId(1), &key, 0);
        assert!(!ledger.is_active(EntityId(1), &key));
        assert_eq!(ledger.stats().set, 0);
    }

    #[test]
    fn remaining_rounds_up() {
        let (clock, ledger) = ledger();
        let key = RuleKey::from("S:r1");
        ledger.set(EntityId(1), &key, 2);
        clock.advance_millis(49);
        assert_eq!(ledger.remaining(EntityId(1), &key), 2);
        clock.advance_millis(1);
        assert_eq!(ledger.remaining(EntityId(1), &key), 1);
    }

    #[test]
    fn clears_are_scoped() {
        let (_, ledger) = ledger();
        let a = RuleKey::from("S:a");
        let b = RuleKey::from("S:b");
        ledger.set(EntityId(1), &a, 10);
        ledger.set(EntityId(1), &b, 10);
        ledger.set(EntityId(2), &a, 10);

        ledger.clear(EntityId(1), &a);
        assert!(!ledger.is_active(EntityId(1), &a));
        assert!(ledger.is_active(EntityId(1), &b));

        ledger.clear_entity(EntityId(1));
        assert!(!ledger.is_active(EntityId(1), &b));
        assert!(ledger.is_active(EntityId(2), &a));

        ledger.clear_all();
        assert_eq!(ledger.stats().entities, 0);
    }

    #[test]
    fn sweep_removes_only_expired_entries() {
        let (clock, ledger) = ledger();
        let short = RuleKey::from("S:short");
        let long = RuleKey::from("S:long");
        ledger.set(EntityId(1), &short, 1);
        ledger.set(EntityId(1), &long, 100);
        ledger.set(EntityId(2), &short, 1);

        clock.advance_millis(60);
        assert_eq!(ledger.sweep_expired(), 2);

        let stats = ledger.stats();
        assert_eq!(stats.entities, 1);
        assert_eq!(stats.entries, 1);
        assert!(ledger.is_active(EntityId(1), &long));
    }

    #[test]
    fn counters_track_checks_and_blocks() {
        let (_, ledger) = ledger();
        let key = RuleKey::from("S:r1");
        ledger.is_active(EntityId(1), &key);
        ledger.set(EntityId(1), &key, 5);
        ledger.is_active(EntityId(1), &key);

        let stats = ledger.stats();
        assert_eq!((stats.set, stats.checked, stats.blocked), (1, 2, 1));

        ledger.reset_stats();
        assert_eq!(ledger.stats().checked, 0);
        assert_eq!(ledger.stats().entries, 1);
    }

    #[test]
    fn set_survives_concurrent_expiry_of_sibling_entry() {
        use std::sync::Barrier;
        use std::thread;

        let (clock, ledger) = ledger();
        let ledger = Arc::new(ledger);
        let e = EntityId(1);
        let old = RuleKey::from("S:old");
        let new = RuleKey::from("S:new");

        for _ in 0..2_000 {
            ledger.clear_all();
            ledger.set(e, &old, 1);
            clock.advance_millis(50);

            let barrier = Arc::new(Barrier::new(2));
            let checker = {
                let (ledger, barrier, old) = (ledger.clone(), barrier.clone(), old.clone());
                thread::spawn(move || {
                    barrier.wait();
                    ledger.is_active(e, &old)
                })
            };
            let setter = {
                let (ledger, barrier, new) = (ledger.clone(), barrier.clone(), new.clone());
                thread::spawn(move || {
                    barrier.wait();
                    ledger.set(e, &new, 1_000);
                })
            };
            assert!(!checker.join().unwrap());
            setter.join().unwrap();
            assert!(ledger.is_active(e, &new));
        }
    }
}
