//! Shared in-memory host for integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use reflex_core::{EntityId, Rule, ScopeId};
use reflex_runtime::{
    ConditionError, ConditionEvaluator, EffectInvoker, EntityOracle, HostBundle, ManualClock,
    MotionSample, PresenceOracle, Runtime, ScopeClassifier,
};

pub type Invocation = (EntityId, String, Vec<EntityId>);

#[derive(Default)]
pub struct World {
    scopes: Mutex<HashMap<EntityId, ScopeId>>,
    valid: Mutex<HashSet<EntityId>>,
    offline: Mutex<HashSet<EntityId>>,
    motion: Mutex<HashMap<EntityId, MotionSample>>,
    invocations: Mutex<Vec<Invocation>>,
}

impl World {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn spawn(&self, entity: EntityId, scope: &str) {
        self.scopes.lock().unwrap().insert(entity, ScopeId::new(scope));
        self.valid.lock().unwrap().insert(entity);
    }

    pub fn set_offline(&self, entity: EntityId) {
        self.offline.lock().unwrap().insert(entity);
    }

    pub fn set_motion(&self, entity: EntityId, sample: MotionSample) {
        self.motion.lock().unwrap().insert(entity, sample);
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    pub fn effects(&self) -> Vec<String> {
        self.invocations().into_iter().map(|(_, fx, _)| fx).collect()
    }
}

impl ScopeClassifier for World {
    fn classify(&self, entity: EntityId) -> Option<ScopeId> {
        self.scopes.lock().unwrap().get(&entity).cloned()
    }
}

impl ConditionEvaluator for World {
    fn evaluate(&self, _: EntityId, expression: &str) -> Result<bool, ConditionError> {
        match expression {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(ConditionError::Malformed {
                expression: other.to_owned(),
                reason: "unsupported".to_owned(),
            }),
        }
    }
}

impl EffectInvoker for World {
    fn invoke(&self, entity: EntityId, effect: &str, targets: &[EntityId]) -> bool {
        self.invocations
            .lock()
            .unwrap()
            .push((entity, effect.to_owned(), targets.to_vec()));
        true
    }
}

impl EntityOracle for World {
    fn is_valid(&self, entity: EntityId) -> bool {
        self.valid.lock().unwrap().contains(&entity)
    }

    fn is_online(&self, entity: EntityId) -> bool {
        !self.offline.lock().unwrap().contains(&entity)
    }

    fn motion(&self, entity: EntityId) -> Option<MotionSample> {
        self.motion.lock().unwrap().get(&entity).copied()
    }

    fn kind_of(&self, _: EntityId) -> Option<String> {
        None
    }
}

#[async_trait]
impl PresenceOracle for World {
    async fn absent_among(&self, candidates: Vec<EntityId>) -> Vec<EntityId> {
        let offline = self.offline.lock().unwrap();
        candidates.into_iter().filter(|e| offline.contains(e)).collect()
    }
}

/// Runtime over `world` with a manual clock starting at one second.
pub fn runtime(world: &Arc<World>, rules: Vec<Rule>) -> (Runtime, Arc<ManualClock>) {
    let clock = ManualClock::shared(1_000);
    let runtime = Runtime::builder()
        .clock(clock.clone())
        .host(HostBundle::from_host(world.clone()))
        .rules(rules)
        .build()
        .unwrap();
    (runtime, clock)
}
