//! High-level runtime orchestrator.
//!
//! The runtime owns the shared components and the background workers, and
//! exposes a builder-based API for hosts to wire in their collaborators.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::info;

use reflex_core::Rule;

use crate::clock::{SharedClock, SystemClock};
use crate::config::RuntimeConfig;
use crate::cooldown::{CooldownLedger, CooldownStats};
use crate::engine::{EngineStats, RuleEngine};
use crate::error::{Result, RuntimeError};
use crate::handle::{ActionEnvelope, RuntimeHandle};
use crate::host::HostBundle;
use crate::scheduler::{SchedulerStats, TickScheduler};
use crate::session::{SessionStats, StateSessionManager};
use crate::store::RuleStore;
use crate::targeting::{ResolverHealth, ResolverStats, TargetResolver, TargetResolverRegistry};
use crate::workers::{DispatchWorker, PeriodicWorker};

/// Main runtime that owns components and background workers.
///
/// [`RuntimeHandle`] provides a cloneable façade for event sources.
pub struct Runtime {
    config: RuntimeConfig,
    engine: Arc<RuleEngine>,
    scheduler: Arc<TickScheduler>,
    handle: RuntimeHandle,

    envelope_rx: Option<mpsc::Receiver<ActionEnvelope>>,
    shutdown: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl Runtime {
    /// Create a new runtime builder
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Get a cloneable handle to this runtime
    pub fn handle(&self) -> RuntimeHandle {
        self.handle.clone()
    }

    pub fn engine(&self) -> &Arc<RuleEngine> {
        &self.engine
    }

    pub fn scheduler(&self) -> &Arc<TickScheduler> {
        &self.scheduler
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Publishes a new rule set; the previous one stays on rejection.
    pub fn reload_rules(&self, rules: impl IntoIterator<Item = Rule>) -> Result<()> {
        self.engine.store().replace(rules)?;
        Ok(())
    }

    /// Spawns the tick driver, both sweeps and the dispatch worker.
    ///
    /// Must be called inside a tokio runtime. A runtime starts at most once.
    pub fn start(&mut self) -> Result<()> {
        let envelopes = self
            .envelope_rx
            .take()
            .ok_or(RuntimeError::AlreadyStarted)?;

        let scheduler = self.scheduler.clone();
        let tick_driver = PeriodicWorker::new(
            "tick-driver",
            self.config.scheduler.pass_interval,
            self.shutdown.subscribe(),
            move || {
                let scheduler = scheduler.clone();
                async move {
                    scheduler.pass();
                }
            },
        );

        let cooldowns = self.engine.cooldowns().clone();
        let cooldown_sweep = PeriodicWorker::new(
            "cooldown-sweep",
            self.config.cooldowns.sweep_interval,
            self.shutdown.subscribe(),
            move || {
                let cooldowns = cooldowns.clone();
                async move {
                    cooldowns.sweep_expired();
                }
            },
        );

        let sessions = self.engine.sessions().clone();
        let presence = self.engine.host().presence().clone();
        let session_sweep = PeriodicWorker::new(
            "session-sweep",
            self.config.sessions.sweep_interval,
            self.shutdown.subscribe(),
            move || {
                let sessions = sessions.clone();
                let presence = presence.clone();
                async move {
                    sessions.sweep(presence.as_ref()).await;
                }
            },
        );

        let dispatch = DispatchWorker::new(self.engine.clone(), envelopes, self.shutdown.subscribe());

        self.workers = vec![
            tokio::spawn(tick_driver.run()),
            tokio::spawn(cooldown_sweep.run()),
            tokio::spawn(session_sweep.run()),
            tokio::spawn(dispatch.run()),
        ];

        info!(
            target: "runtime::workers",
            rules = self.engine.store().rule_count(),
            pass_interval_ms = self.config.scheduler.pass_interval.as_millis() as u64,
            "runtime started"
        );
        Ok(())
    }

    /// Signals every worker to stop. Safe to call any number of times.
    pub fn stop(&self) {
        let was_stopped = self.shutdown.send_replace(true);
        if !was_stopped {
            info!(target: "runtime::workers", "runtime stop requested");
        }
    }

    pub fn is_running(&self) -> bool {
        !self.workers.is_empty() && !*self.shutdown.borrow()
    }

    /// Stops the runtime and waits for every worker to finish.
    pub async fn shutdown(mut self) -> Result<()> {
        self.stop();
        for worker in self.workers.drain(..) {
            worker.await.map_err(RuntimeError::WorkerJoin)?;
        }
        info!(target: "runtime::workers", "runtime shut down");
        Ok(())
    }

    pub fn stats(&self) -> RuntimeStats {
        RuntimeStats {
            rules: self.engine.store().rule_count(),
            rule_generation: self.engine.store().generation(),
            engine: self.engine.stats(),
            cooldowns: self.engine.cooldowns().stats(),
            resolvers: self.engine.resolvers().stats(),
            resolver_health: self.engine.resolvers().health(),
            sessions: self.engine.sessions().stats(),
            scheduler: self.scheduler.stats(),
        }
    }

    pub fn reset_stats(&self) {
        self.engine.reset_stats();
        self.engine.cooldowns().reset_stats();
        self.engine.resolvers().reset_stats();
        self.engine.sessions().reset_stats();
        self.scheduler.reset_stats();
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Every component's statistics in one serializable value.
#[derive(Clone, Debug, Serialize)]
pub struct RuntimeStats {
    pub rules: usize,
    pub rule_generation: u64,
    pub engine: EngineStats,
    pub cooldowns: CooldownStats,
    pub resolvers: ResolverStats,
    pub resolver_health: Vec<ResolverHealth>,
    pub sessions: SessionStats,
    pub scheduler: SchedulerStats,
}

/// Builder for [`Runtime`] with flexible configuration.
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    clock: Option<SharedClock>,
    host: Option<HostBundle>,
    rules: Vec<Rule>,
    resolvers: Vec<Arc<dyn TargetResolver>>,
    builtin_resolver: bool,
}

impl RuntimeBuilder {
    fn new() -> Self {
        Self {
            config: RuntimeConfig::default(),
            clock: None,
            host: None,
            rules: Vec::new(),
            resolvers: Vec::new(),
            builtin_resolver: true,
        }
    }

    /// Override runtime configuration
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the wall clock (defaults to [`SystemClock`]).
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Set the required host collaborators
    pub fn host(mut self, host: HostBundle) -> Self {
        self.host = Some(host);
        self
    }

    /// Initial rule set
    pub fn rules(mut self, rules: impl IntoIterator<Item = Rule>) -> Self {
        self.rules.extend(rules);
        self
    }

    /// Registers an additional target resolver
    pub fn resolver(mut self, resolver: Arc<dyn TargetResolver>) -> Self {
        self.resolvers.push(resolver);
        self
    }

    /// Skip registering the builtin `@` resolver
    pub fn without_builtin_resolver(mut self) -> Self {
        self.builtin_resolver = false;
        self
    }

    /// Build the runtime. Workers are not spawned until [`Runtime::start`].
    pub fn build(self) -> Result<Runtime> {
        let host = self
            .host
            .ok_or(RuntimeError::MissingCollaborator("host bundle"))?;
        let config = self.config.normalized();
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let store = Arc::new(RuleStore::with_rules(self.rules)?);
        let cooldowns = Arc::new(CooldownLedger::new(clock.clone(), config.tick_millis()));
        let sessions = Arc::new(StateSessionManager::new(
            clock.clone(),
            config.sessions.clone(),
        ));

        let resolvers = Arc::new(if self.builtin_resolver {
            TargetResolverRegistry::with_builtin()
        } else {
            TargetResolverRegistry::new()
        });
        for resolver in self.resolvers {
            resolvers.register(resolver);
        }

        let engine = Arc::new(RuleEngine::new(store, cooldowns, resolvers, sessions, host));
        let scheduler = Arc::new(TickScheduler::new(engine.clone(), clock, &config));

        let (envelope_tx, envelope_rx) = mpsc::channel(config.envelope_buffer);
        let (shutdown, _) = watch::channel(false);
        let handle = RuntimeHandle::new(engine.clone(), envelope_tx);

        Ok(Runtime {
            config,
            engine,
            scheduler,
            handle,
            envelope_rx: Some(envelope_rx),
            shutdown,
            workers: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use reflex_core::{ActionKind, EntityId, StateKind, TriggerTiming};

    use super::*;
    use crate::clock::ManualClock;
    use crate::handle::ActionEnvelope;
    use crate::test_support::FakeHost;

    fn attack_rule() -> Rule {
        Rule::builder("S", "hit", ActionKind::Attack, TriggerTiming::Instant, "spark")
            .build()
            .unwrap()
    }

    fn runtime_with(host: Arc<FakeHost>, rules: Vec<Rule>) -> Runtime {
        Runtime::builder()
            .clock(ManualClock::shared(1_000_000))
            .host(HostBundle::from_host(host))
            .rules(rules)
            .build()
            .unwrap()
    }

    #[test]
    fn build_requires_a_host() {
        let err = Runtime::builder().build().err().unwrap();
        assert!(matches!(err, RuntimeError::MissingCollaborator("host bundle")));
    }

    #[test]
    fn build_rejects_duplicate_rules() {
        let host = Arc::new(FakeHost::new());
        let err = Runtime::builder()
            .host(HostBundle::from_host(host))
            .rules(vec![attack_rule(), attack_rule()])
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, RuntimeError::RuleStore(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn submitted_envelopes_are_dispatched() {
        let host = Arc::new(FakeHost::new());
        host.classify(EntityId(7), "S");
        let mut runtime = runtime_with(host.clone(), vec![attack_rule()]);
        runtime.start().unwrap();
        assert!(runtime.is_running());

        runtime
            .handle()
            .submit(ActionEnvelope::new(
                EntityId(7),
                ActionKind::Attack,
                TriggerTiming::Instant,
            ))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(host.invocations().len(), 1);
        assert_eq!(runtime.stats().engine.successes, 1);
        runtime.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_effect_does_not_stop_dispatch() {
        let host = Arc::new(FakeHost::new());
        host.classify(EntityId(1), "S");
        host.classify(EntityId(2), "S");
        host.panic_for(EntityId(1));
        let mut runtime = runtime_with(host.clone(), vec![attack_rule()]);
        runtime.start().unwrap();
        let handle = runtime.handle();

        for id in [1, 2] {
            handle
                .submit(ActionEnvelope::new(
                    EntityId(id),
                    ActionKind::Attack,
                    TriggerTiming::Instant,
                ))
                .await
                .unwrap();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(host.invocations(), vec![(EntityId(2), "spark".to_owned(), Vec::new())]);
        assert_eq!(runtime.stats().engine.panics, 1);
        runtime.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn start_twice_is_rejected_and_stop_is_idempotent() {
        let host = Arc::new(FakeHost::new());
        let mut runtime = runtime_with(host, Vec::new());
        runtime.start().unwrap();
        assert!(matches!(runtime.start(), Err(RuntimeError::AlreadyStarted)));

        runtime.stop();
        runtime.stop();
        assert!(!runtime.is_running());
        runtime.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn tick_driver_runs_scheduler_passes() {
        let host = Arc::new(FakeHost::new());
        let mut runtime = runtime_with(host, Vec::new());
        let handle = runtime.handle();
        handle.apply_state(EntityId(1), StateKind::Flying, true);

        runtime.start().unwrap();
        tokio::time::sleep(Duration::from_millis(175)).await;

        let stats = runtime.stats();
        assert_eq!(stats.scheduler.passes, 3);
        assert_eq!(stats.sessions.active, 1);
        runtime.shutdown().await.unwrap();
    }

    #[test]
    fn reload_keeps_previous_rules_on_rejection() {
        let host = Arc::new(FakeHost::new());
        let runtime = runtime_with(host, vec![attack_rule()]);

        assert!(runtime.reload_rules(vec![attack_rule(), attack_rule()]).is_err());
        assert_eq!(runtime.stats().rules, 1);

        runtime.reload_rules(Vec::new()).unwrap();
        assert_eq!(runtime.stats().rules, 0);
    }
}
