//! In-memory host driving the demo.
//!
//! Entities follow a scripted timeline instead of real physics: each step
//! toggles states, moves velocities and emits discrete actions so every rule
//! timing gets exercised.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use reflex_core::{ActionKind, EntityId, ScopeId, StateKind, TriggerTiming};
use reflex_runtime::{
    ActionEnvelope, ConditionError, ConditionEvaluator, EffectInvoker, EntityOracle,
    MotionSample, PresenceOracle, RuntimeHandle, ScopeClassifier, Vec3, sync::lock,
};

pub const KNIGHT: EntityId = EntityId(1);
pub const HARPY: EntityId = EntityId(2);
pub const SAILOR: EntityId = EntityId(3);
pub const WOLF: EntityId = EntityId(10);
pub const HORSE: EntityId = EntityId(11);
pub const BOAT: EntityId = EntityId(12);

#[derive(Debug)]
struct Body {
    scope: Option<ScopeId>,
    kind: &'static str,
    online: bool,
    motion: MotionSample,
}

/// Demo world; the step counter drives the script.
#[derive(Debug)]
pub struct World {
    bodies: Mutex<BTreeMap<EntityId, Body>>,
    effects: Mutex<BTreeMap<String, u64>>,
    departed: Mutex<HashSet<EntityId>>,
}

/// Effect invocation counts, keyed by effect name.
#[derive(Debug, Serialize)]
pub struct EffectTally(pub BTreeMap<String, u64>);

impl World {
    pub fn new() -> Self {
        let mut bodies = BTreeMap::new();
        let mut add = |id, scope: Option<&str>, kind| {
            bodies.insert(
                id,
                Body {
                    scope: scope.map(ScopeId::new),
                    kind,
                    online: true,
                    motion: MotionSample {
                        position: Vec3::ZERO,
                        velocity: Vec3::ZERO,
                        on_ground: true,
                    },
                },
            );
        };
        add(KNIGHT, Some("knight"), "player");
        add(HARPY, Some("harpy"), "harpy");
        add(SAILOR, Some("sailor"), "player");
        add(WOLF, None, "wolf");
        add(HORSE, None, "horse");
        add(BOAT, None, "boat");

        Self {
            bodies: Mutex::new(bodies),
            effects: Mutex::default(),
            departed: Mutex::default(),
        }
    }

    pub fn tally(&self) -> EffectTally {
        EffectTally(lock(&self.effects).clone())
    }

    fn set_motion(&self, entity: EntityId, velocity: Vec3, on_ground: bool) {
        if let Some(body) = lock(&self.bodies).get_mut(&entity) {
            body.motion.position = Vec3::new(
                body.motion.position.x + velocity.x,
                body.motion.position.y + velocity.y,
                body.motion.position.z + velocity.z,
            );
            body.motion.velocity = velocity;
            body.motion.on_ground = on_ground;
        }
    }

    /// Advances the script by one step, reporting observations to `handle`.
    pub fn step(&self, step: u64, handle: &RuntimeHandle) {
        match step % 200 {
            0 => {
                let session = handle.session(KNIGHT);
                session.set_mount(Some(HORSE));
                session.set_vehicle(Some(HORSE));
                handle.apply_state(KNIGHT, StateKind::Riding, true);
                handle.apply_state(HARPY, StateKind::Flying, true);
                self.set_motion(HARPY, Vec3::new(0.2, 0.3, 0.0), false);
            }
            20 => {
                // Harpy stalls in mid-air long enough to count as hovering.
                self.set_motion(HARPY, Vec3::new(0.01, 0.0, 0.02), false);
                handle.session(SAILOR).set_vehicle(Some(BOAT));
                handle.apply_state(SAILOR, StateKind::InBoat, true);
            }
            60 => self.set_motion(HARPY, Vec3::new(0.3, -0.2, 0.0), false),
            120 => {
                handle.apply_state(KNIGHT, StateKind::Riding, false);
                handle.apply_state(HARPY, StateKind::Flying, false);
                self.set_motion(HARPY, Vec3::ZERO, true);
            }
            180 => {
                handle.apply_state(SAILOR, StateKind::InBoat, false);
                handle.session(SAILOR).set_vehicle(None);
            }
            _ => {}
        }

        if step % 15 == 0 {
            handle.session(KNIGHT).record_victim(WOLF);
            let envelope = ActionEnvelope::new(KNIGHT, ActionKind::Attack, TriggerTiming::Instant);
            if let Err(e) = handle.try_submit(envelope) {
                warn!(target: "sim::world", step, error = %e, "attack envelope dropped");
            }
        }
        if step % 25 == 0 {
            let suppressed =
                handle.should_suppress_event(HARPY, ActionKind::Swing, TriggerTiming::Instant);
            if !suppressed {
                handle.fire(HARPY, ActionKind::Swing, TriggerTiming::Instant);
            }
        }
    }

    /// Marks the entity as gone from the host and resets its session.
    pub fn depart(&self, entity: EntityId, handle: &RuntimeHandle) {
        if let Some(body) = lock(&self.bodies).get_mut(&entity) {
            body.online = false;
        }
        lock(&self.departed).insert(entity);
        handle.entity_left(entity);
    }
}

impl ScopeClassifier for World {
    fn classify(&self, entity: EntityId) -> Option<ScopeId> {
        lock(&self.bodies).get(&entity).and_then(|b| b.scope.clone())
    }
}

impl ConditionEvaluator for World {
    fn evaluate(&self, entity: EntityId, expression: &str) -> Result<bool, ConditionError> {
        match expression.trim() {
            "airborne" => lock(&self.bodies)
                .get(&entity)
                .map(|b| !b.motion.on_ground)
                .ok_or(ConditionError::EntityUnavailable(entity)),
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(ConditionError::UnknownPlaceholder(other.to_owned())),
        }
    }
}

impl EffectInvoker for World {
    fn invoke(&self, entity: EntityId, effect: &str, targets: &[EntityId]) -> bool {
        *lock(&self.effects).entry(effect.to_owned()).or_insert(0) += 1;
        info!(
            target: "sim::effects",
            entity = %entity,
            effect,
            targets = ?targets,
            "effect cast"
        );
        true
    }
}

impl EntityOracle for World {
    fn is_valid(&self, entity: EntityId) -> bool {
        lock(&self.bodies).get(&entity).is_some_and(|b| b.online)
    }

    fn is_online(&self, entity: EntityId) -> bool {
        self.is_valid(entity)
    }

    fn motion(&self, entity: EntityId) -> Option<MotionSample> {
        lock(&self.bodies).get(&entity).map(|b| b.motion)
    }

    fn kind_of(&self, entity: EntityId) -> Option<String> {
        lock(&self.bodies).get(&entity).map(|b| b.kind.to_owned())
    }
}

#[async_trait]
impl PresenceOracle for World {
    async fn absent_among(&self, candidates: Vec<EntityId>) -> Vec<EntityId> {
        let departed = lock(&self.departed);
        candidates
            .into_iter()
            .filter(|e| departed.contains(e))
            .collect()
    }
}
