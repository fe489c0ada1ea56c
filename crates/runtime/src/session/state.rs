//! Per-entity state session.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use reflex_core::{EntityId, StateFlags, StateKind};

use crate::clock::SharedClock;
use crate::host::Vec3;
use crate::sync::lock;

type ScratchValue = Arc<dyn Any + Send + Sync>;

/// Named-state table of one entity.
///
/// `started_at[k] != 0` exactly when `flags` contains `k`.
#[derive(Debug, Default)]
struct StateTable {
    flags: StateFlags,
    started_at: [u64; StateKind::COUNT],
    ticks: [u64; StateKind::COUNT],
    hover_stable: u32,
}

#[derive(Clone, Copy, Debug)]
struct Stamped {
    entity: EntityId,
    at: u64,
}

#[derive(Debug, Default)]
struct ContextRefs {
    attacker: Option<Stamped>,
    victim: Option<Stamped>,
    vehicle: Option<EntityId>,
    mount: Option<EntityId>,
}

/// Mutable tracking state for one entity.
///
/// Each part sits behind its own mutex so event handlers touching context refs
/// never contend with the scheduler reading the state table. Mutating a named
/// state does not update the manager's active index; call
/// [`StateSessionManager::update_active_status`](super::StateSessionManager::update_active_status)
/// after a batch of changes.
pub struct StateSession {
    entity: EntityId,
    created_at: u64,
    clock: SharedClock,
    states: Mutex<StateTable>,
    velocity: Mutex<Vec3>,
    context: Mutex<ContextRefs>,
    scratch: Mutex<HashMap<String, ScratchValue>>,
}

impl StateSession {
    pub(crate) fn new(entity: EntityId, clock: SharedClock) -> Self {
        let created_at = clock.now_millis();
        Self {
            entity,
            created_at,
            clock,
            states: Mutex::new(StateTable::default()),
            velocity: Mutex::new(Vec3::ZERO),
            context: Mutex::new(ContextRefs::default()),
            scratch: Mutex::new(HashMap::new()),
        }
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// Wall-clock millis at which this session was created.
    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn is_on(&self, kind: StateKind) -> bool {
        lock(&self.states).flags.contains(kind.flag())
    }

    pub fn flags(&self) -> StateFlags {
        lock(&self.states).flags
    }

    pub fn has_active_state(&self) -> bool {
        !lock(&self.states).flags.is_empty()
    }

    /// Turns a named state on or off. Returns `true` if it changed.
    ///
    /// Turning a state on stamps its start time and zeroes its tick counter;
    /// turning it off clears both.
    pub fn set_state(&self, kind: StateKind, on: bool) -> bool {
        let now = self.clock.now_millis().max(1);
        let mut table = lock(&self.states);
        let i = kind.index();
        if table.flags.contains(kind.flag()) == on {
            return false;
        }
        table.flags.set(kind.flag(), on);
        table.started_at[i] = if on { now } else { 0 };
        table.ticks[i] = 0;
        if kind == StateKind::Hovering {
            table.hover_stable = 0;
        }
        true
    }

    /// Start timestamp of a state, `None` while it is off.
    pub fn started_at(&self, kind: StateKind) -> Option<u64> {
        let table = lock(&self.states);
        let at = table.started_at[kind.index()];
        (at != 0).then_some(at)
    }

    /// Every active state with its start timestamp, in [`StateKind::ALL`] order.
    pub fn active_states(&self) -> Vec<(StateKind, u64)> {
        let table = lock(&self.states);
        table
            .flags
            .kinds()
            .map(|kind| (kind, table.started_at[kind.index()]))
            .collect()
    }

    /// Counts one scheduler evaluation of an active state.
    pub fn record_tick(&self, kind: StateKind) -> u64 {
        let mut table = lock(&self.states);
        if !table.flags.contains(kind.flag()) {
            return 0;
        }
        let i = kind.index();
        table.ticks[i] += 1;
        table.ticks[i]
    }

    /// Scheduler evaluations of a state since it last turned on.
    pub fn tick_count(&self, kind: StateKind) -> u64 {
        lock(&self.states).ticks[kind.index()]
    }

    pub fn hover_stable_passes(&self) -> u32 {
        lock(&self.states).hover_stable
    }

    pub(crate) fn bump_hover_stable(&self) -> u32 {
        let mut table = lock(&self.states);
        table.hover_stable = table.hover_stable.saturating_add(1);
        table.hover_stable
    }

    pub(crate) fn reset_hover_stable(&self) {
        lock(&self.states).hover_stable = 0;
    }

    pub fn velocity(&self) -> Vec3 {
        *lock(&self.velocity)
    }

    pub fn update_velocity(&self, velocity: Vec3) {
        *lock(&self.velocity) = velocity;
    }

    pub fn record_attacker(&self, attacker: EntityId) {
        let at = self.clock.now_millis();
        lock(&self.context).attacker = Some(Stamped {
            entity: attacker,
            at,
        });
    }

    pub fn record_victim(&self, victim: EntityId) {
        let at = self.clock.now_millis();
        lock(&self.context).victim = Some(Stamped { entity: victim, at });
    }

    pub fn set_vehicle(&self, vehicle: Option<EntityId>) {
        lock(&self.context).vehicle = vehicle;
    }

    pub fn set_mount(&self, mount: Option<EntityId>) {
        lock(&self.context).mount = mount;
    }

    pub fn last_attacker(&self) -> Option<EntityId> {
        lock(&self.context).attacker.map(|s| s.entity)
    }

    pub fn last_victim(&self) -> Option<EntityId> {
        lock(&self.context).victim.map(|s| s.entity)
    }

    pub fn vehicle(&self) -> Option<EntityId> {
        lock(&self.context).vehicle
    }

    pub fn mount(&self) -> Option<EntityId> {
        lock(&self.context).mount
    }

    /// Forgets attacker/victim references older than `ttl_millis`.
    /// Vehicle and mount follow the host's own enter/leave events instead.
    pub fn expire_context(&self, now: u64, ttl_millis: u64) -> usize {
        let mut guard = lock(&self.context);
        let context = &mut *guard;
        let mut expired = 0;
        for slot in [&mut context.attacker, &mut context.victim] {
            if slot.is_some_and(|s| now.saturating_sub(s.at) > ttl_millis) {
                *slot = None;
                expired += 1;
            }
        }
        expired
    }

    /// Binds a transient payload under `key`, replacing any previous value.
    pub fn put<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) {
        lock(&self.scratch).insert(key.into(), Arc::new(value));
    }

    /// Removes and returns the payload if it has type `T`.
    ///
    /// A payload of another type is left in place.
    pub fn take<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        let mut scratch = lock(&self.scratch);
        if !scratch.get(key)?.is::<T>() {
            return None;
        }
        scratch.remove(key)?.downcast::<T>().ok()
    }

    pub fn peek<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        lock(&self.scratch).get(key)?.clone().downcast::<T>().ok()
    }

    /// Clears every state, counter, context reference and scratch value.
    pub fn reset(&self) {
        *lock(&self.states) = StateTable::default();
        *lock(&self.velocity) = Vec3::ZERO;
        *lock(&self.context) = ContextRefs::default();
        lock(&self.scratch).clear();
    }
}

impl std::fmt::Debug for StateSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateSession")
            .field("entity", &self.entity)
            .field("flags", &self.flags())
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}
