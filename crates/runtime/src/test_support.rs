//! Recording fakes for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use reflex_core::{EntityId, Rule, ScopeId};

use crate::clock::ManualClock;
use crate::config::RuntimeConfig;
use crate::cooldown::CooldownLedger;
use crate::engine::RuleEngine;
use crate::error::ConditionError;
use crate::host::{
    ConditionEvaluator, EffectInvoker, EntityOracle, HostBundle, MotionSample, PresenceOracle,
    ScopeClassifier,
};
use crate::session::StateSessionManager;
use crate::store::RuleStore;
use crate::sync::lock;
use crate::targeting::TargetResolverRegistry;

pub(crate) type Invocation = (EntityId, String, Vec<EntityId>);

/// In-memory host that records every effect invocation.
pub(crate) struct FakeHost {
    scopes: Mutex<HashMap<EntityId, ScopeId>>,
    conditions: Mutex<HashMap<String, Result<bool, ConditionError>>>,
    invocations: Mutex<Vec<Invocation>>,
    effect_result: AtomicBool,
    valid: Mutex<HashSet<EntityId>>,
    offline: Mutex<HashSet<EntityId>>,
    motion: Mutex<HashMap<EntityId, MotionSample>>,
    kinds: Mutex<HashMap<EntityId, String>>,
    panicking: Mutex<HashSet<EntityId>>,
}

impl FakeHost {
    pub(crate) fn new() -> Self {
        Self {
            scopes: Mutex::default(),
            conditions: Mutex::default(),
            invocations: Mutex::default(),
            effect_result: AtomicBool::new(true),
            valid: Mutex::default(),
            offline: Mutex::default(),
            motion: Mutex::default(),
            kinds: Mutex::default(),
            panicking: Mutex::default(),
        }
    }

    pub(crate) fn classify(&self, entity: EntityId, scope: &str) {
        lock(&self.scopes).insert(entity, ScopeId::new(scope));
    }

    pub(crate) fn condition(&self, expression: &str, result: Result<bool, ConditionError>) {
        lock(&self.conditions).insert(expression.to_owned(), result);
    }

    pub(crate) fn set_effect_result(&self, success: bool) {
        self.effect_result.store(success, Ordering::SeqCst);
    }

    pub(crate) fn add_valid(&self, entity: EntityId) {
        lock(&self.valid).insert(entity);
    }

    pub(crate) fn set_offline(&self, entity: EntityId, offline: bool) {
        let mut set = lock(&self.offline);
        if offline {
            set.insert(entity);
        } else {
            set.remove(&entity);
        }
    }

    pub(crate) fn set_motion(&self, entity: EntityId, sample: MotionSample) {
        lock(&self.motion).insert(entity, sample);
    }

    pub(crate) fn set_kind(&self, entity: EntityId, kind: &str) {
        lock(&self.kinds).insert(entity, kind.to_owned());
    }

    /// Makes effect invocation and motion sampling panic for `entity`.
    pub(crate) fn panic_for(&self, entity: EntityId) {
        lock(&self.panicking).insert(entity);
    }

    fn check_panic(&self, entity: EntityId) {
        if lock(&self.panicking).contains(&entity) {
            panic!("host failure for {entity}");
        }
    }

    pub(crate) fn invocations(&self) -> Vec<Invocation> {
        lock(&self.invocations).clone()
    }
}

impl ScopeClassifier for FakeHost {
    fn classify(&self, entity: EntityId) -> Option<ScopeId> {
        lock(&self.scopes).get(&entity).cloned()
    }
}

impl ConditionEvaluator for FakeHost {
    fn evaluate(&self, _: EntityId, expression: &str) -> Result<bool, ConditionError> {
        lock(&self.conditions)
            .get(expression)
            .cloned()
            .unwrap_or(Ok(true))
    }
}

impl EffectInvoker for FakeHost {
    fn invoke(&self, entity: EntityId, effect: &str, targets: &[EntityId]) -> bool {
        self.check_panic(entity);
        lock(&self.invocations).push((entity, effect.to_owned(), targets.to_vec()));
        self.effect_result.load(Ordering::SeqCst)
    }
}

impl EntityOracle for FakeHost {
    fn is_valid(&self, entity: EntityId) -> bool {
        lock(&self.valid).contains(&entity)
    }

    fn is_online(&self, entity: EntityId) -> bool {
        !lock(&self.offline).contains(&entity)
    }

    fn motion(&self, entity: EntityId) -> Option<MotionSample> {
        self.check_panic(entity);
        lock(&self.motion).get(&entity).copied()
    }

    fn kind_of(&self, entity: EntityId) -> Option<String> {
        lock(&self.kinds).get(&entity).cloned()
    }
}

#[async_trait]
impl PresenceOracle for FakeHost {
    async fn absent_among(&self, candidates: Vec<EntityId>) -> Vec<EntityId> {
        let offline = lock(&self.offline).clone();
        candidates
            .into_iter()
            .filter(|e| offline.contains(e))
            .collect()
    }
}

/// Fully wired engine over a [`FakeHost`] and a [`ManualClock`].
pub(crate) struct Harness {
    pub(crate) clock: Arc<ManualClock>,
    pub(crate) host: Arc<FakeHost>,
    pub(crate) sessions: Arc<StateSessionManager>,
    pub(crate) engine: Arc<RuleEngine>,
    pub(crate) config: RuntimeConfig,
}

impl Harness {
    pub(crate) fn new(rules: Vec<Rule>) -> Self {
        let config = RuntimeConfig::default();
        let clock = ManualClock::shared(1_000_000);
        let host = Arc::new(FakeHost::new());

        let store = Arc::new(RuleStore::with_rules(rules).expect("test rules are unique"));
        let cooldowns = Arc::new(CooldownLedger::new(clock.clone(), config.tick_millis()));
        let sessions = Arc::new(StateSessionManager::new(clock.clone(), config.sessions.clone()));
        let resolvers = Arc::new(TargetResolverRegistry::with_builtin());
        let engine = Arc::new(RuleEngine::new(
            store,
            cooldowns,
            resolvers,
            sessions.clone(),
            HostBundle::from_host(host.clone()),
        ));

        Self {
            clock,
            host,
            sessions,
            engine,
            config,
        }
    }
}
