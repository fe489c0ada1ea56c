//! Rule evaluation.
//!
//! [`RuleEngine`] is the one place where rules, cooldowns, sessions, target
//! resolution and host collaborators meet. Discrete events arrive through
//! [`RuleEngine::fire`]; the scheduler drives the time-derived timings through
//! [`RuleEngine::check_duration_rules`] and [`RuleEngine::check_tick_rules`].
//!
//! Each matching rule runs the same gate pipeline, in index order:
//!
//! 1. metadata (mount filter, vehicle-only)
//! 2. cooldown
//! 3. condition (errors count as "failed")
//! 4. target resolution (an empty result is logged, not fatal)
//! 5. effect invocation, then cooldown on success only
//!
//! A rule failing any gate stops only that rule.
mod metrics;

pub use metrics::EngineStats;

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tracing::{debug, error, trace};

use reflex_core::{
    ActionKind, CancelPolicy, EntityId, Rule, RuleList, ScopeId, TriggerTiming,
};

use crate::cooldown::CooldownLedger;
use crate::host::HostBundle;
use crate::session::{StateSession, StateSessionManager};
use crate::store::RuleStore;
use crate::sync::panic_message;
use crate::targeting::{TargetContext, TargetResolverRegistry};
use metrics::EngineMetrics;

/// What happened to one rule in the pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RuleOutcome {
    Filtered,
    CooldownBlocked,
    ConditionFailed,
    Invoked { success: bool, targets: Vec<EntityId> },
}

/// Orchestrates rule matching and effect invocation.
pub struct RuleEngine {
    store: Arc<RuleStore>,
    cooldowns: Arc<CooldownLedger>,
    resolvers: Arc<TargetResolverRegistry>,
    sessions: Arc<StateSessionManager>,
    host: HostBundle,
    metrics: EngineMetrics,
}

impl RuleEngine {
    pub fn new(
        store: Arc<RuleStore>,
        cooldowns: Arc<CooldownLedger>,
        resolvers: Arc<TargetResolverRegistry>,
        sessions: Arc<StateSessionManager>,
        host: HostBundle,
    ) -> Self {
        Self {
            store,
            cooldowns,
            resolvers,
            sessions,
            host,
            metrics: EngineMetrics::default(),
        }
    }

    /// Discrete-event entry point.
    ///
    /// Unclassified entities are skipped silently. Returns the number of
    /// successful effect invocations.
    pub fn fire(&self, entity: EntityId, action: ActionKind, timing: TriggerTiming) -> usize {
        let Some((scope, rules)) = self.matching(entity, action, timing) else {
            return 0;
        };
        trace!(
            target: "runtime::engine",
            entity = %entity,
            scope = %scope,
            %action,
            %timing,
            rules = rules.len(),
            "fire"
        );
        self.run_all(entity, rules.iter())
    }

    /// Fires every DURATION rule whose threshold `elapsed_ticks` has reached.
    ///
    /// Nothing here prevents a rule from firing again on the next pass; only
    /// its cooldown throttles it.
    pub fn check_duration_rules(
        &self,
        entity: EntityId,
        action: ActionKind,
        elapsed_ticks: u64,
    ) -> usize {
        let Some((_, rules)) = self.matching(entity, action, TriggerTiming::Duration) else {
            return 0;
        };
        self.run_all(
            entity,
            rules
                .iter()
                .filter(|rule| elapsed_ticks >= u64::from(rule.after_ticks())),
        )
    }

    /// Fires every TICK rule whose period divides `elapsed_ticks`.
    pub fn check_tick_rules(&self, entity: EntityId, action: ActionKind, elapsed_ticks: u64) -> usize {
        let Some((_, rules)) = self.matching(entity, action, TriggerTiming::Tick) else {
            return 0;
        };
        self.run_all(
            entity,
            rules
                .iter()
                .filter(|rule| elapsed_ticks % u64::from(rule.period().max(1)) == 0),
        )
    }

    /// True if any matching rule asks for the triggering host event to be
    /// cancelled.
    ///
    /// Conditional cancellation fails closed: an evaluation error means "do
    /// not cancel".
    pub fn should_suppress_event(
        &self,
        entity: EntityId,
        action: ActionKind,
        timing: TriggerTiming,
    ) -> bool {
        let Some((_, rules)) = self.matching(entity, action, timing) else {
            return false;
        };
        let suppress = rules.iter().any(|rule| match &rule.meta().cancel {
            CancelPolicy::Never => false,
            CancelPolicy::Always => true,
            CancelPolicy::WhenCondition(expression) => {
                self.evaluate_condition(entity, rule, expression)
            }
        });
        if suppress {
            self.metrics.record_suppressed();
        }
        suppress
    }

    /// Stable passes required before `entity` counts as hovering.
    ///
    /// The smallest `min_stable_ticks` override among the entity's HOVER rules
    /// wins; without one, `default` applies.
    pub fn hover_min_stable_for(&self, entity: EntityId, default: u32) -> u32 {
        let Some(scope) = self.host.classifier.classify(entity) else {
            return default;
        };
        self.store
            .snapshot()
            .scope_rules(&scope)
            .into_iter()
            .filter(|rule| rule.action() == ActionKind::Hover)
            .filter_map(|rule| rule.meta().min_stable_ticks)
            .min()
            .map_or(default, |ticks| ticks.max(1))
    }

    /// Runs one rule through the full pipeline, ignoring its action/timing.
    pub fn evaluate_rule(&self, entity: EntityId, rule: &Rule) -> RuleOutcome {
        self.metrics.record_fire();
        let session = self.sessions.get(entity);

        if !self.metadata_allows(rule, session.as_deref()) {
            self.metrics.record_metadata_filtered();
            debug!(target: "runtime::engine", entity = %entity, rule = %rule.key(), "filtered by metadata");
            return RuleOutcome::Filtered;
        }

        if self.cooldowns.is_active(entity, rule.key()) {
            self.metrics.record_cooldown_blocked();
            debug!(
                target: "runtime::engine",
                entity = %entity,
                rule = %rule.key(),
                remaining = self.cooldowns.remaining(entity, rule.key()),
                "blocked by cooldown"
            );
            return RuleOutcome::CooldownBlocked;
        }

        if let Some(expression) = rule.condition() {
            if !self.evaluate_condition(entity, rule, expression) {
                self.metrics.record_condition_failure();
                debug!(target: "runtime::engine", entity = %entity, rule = %rule.key(), "condition failed");
                return RuleOutcome::ConditionFailed;
            }
        }

        let targets = match rule.target() {
            Some(selector) => {
                let entities = self.host.entities.as_ref();
                let ctx = match session.as_deref() {
                    Some(session) => TargetContext::from_session(session, entities),
                    None => TargetContext::bare(entity, entities),
                };
                let targets = self.resolvers.resolve(selector, &ctx);
                if targets.is_empty() {
                    self.metrics.record_target_miss();
                    debug!(
                        target: "runtime::engine",
                        entity = %entity,
                        rule = %rule.key(),
                        selector,
                        "selector resolved to no targets; invoking without"
                    );
                }
                targets
            }
            None => Vec::new(),
        };

        let success = self.host.effects.invoke(entity, rule.effect(), &targets);
        if success {
            self.metrics.record_success();
            self.cooldowns.set(entity, rule.key(), rule.cooldown_ticks());
        } else {
            self.metrics.record_effect_failure();
        }
        debug!(
            target: "runtime::engine",
            entity = %entity,
            rule = %rule.key(),
            effect = rule.effect(),
            targets = targets.len(),
            success,
            "effect invoked"
        );
        RuleOutcome::Invoked { success, targets }
    }

    pub fn stats(&self) -> EngineStats {
        self.metrics.snapshot()
    }

    pub fn reset_stats(&self) {
        self.metrics.reset();
    }

    pub fn store(&self) -> &Arc<RuleStore> {
        &self.store
    }

    pub fn cooldowns(&self) -> &Arc<CooldownLedger> {
        &self.cooldowns
    }

    pub fn resolvers(&self) -> &Arc<TargetResolverRegistry> {
        &self.resolvers
    }

    pub fn sessions(&self) -> &Arc<StateSessionManager> {
        &self.sessions
    }

    pub fn host(&self) -> &HostBundle {
        &self.host
    }

    fn matching(
        &self,
        entity: EntityId,
        action: ActionKind,
        timing: TriggerTiming,
    ) -> Option<(ScopeId, RuleList)> {
        let scope = self.host.classifier.classify(entity)?;
        let rules = self.store.lookup(&scope, action, timing);
        (!rules.is_empty()).then_some((scope, rules))
    }

    fn run_all<'a>(&self, entity: EntityId, rules: impl Iterator<Item = &'a Arc<Rule>>) -> usize {
        rules
            .filter_map(|rule| self.evaluate_contained(entity, rule))
            .filter(|outcome| matches!(outcome, RuleOutcome::Invoked { success: true, .. }))
            .count()
    }

    /// Runs one rule, catching a panic from any host collaborator so the
    /// remaining rules and the calling worker keep going.
    fn evaluate_contained(&self, entity: EntityId, rule: &Rule) -> Option<RuleOutcome> {
        match catch_unwind(AssertUnwindSafe(|| self.evaluate_rule(entity, rule))) {
            Ok(outcome) => Some(outcome),
            Err(panic) => {
                self.metrics.record_panic();
                error!(
                    target: "runtime::engine",
                    entity = %entity,
                    rule = %rule.key(),
                    panic = panic_message(&*panic),
                    "rule evaluation panicked; continuing with next rule"
                );
                None
            }
        }
    }

    fn evaluate_condition(&self, entity: EntityId, rule: &Rule, expression: &str) -> bool {
        match self.host.conditions.evaluate(entity, expression) {
            Ok(passed) => passed,
            Err(e) => {
                error!(
                    target: "runtime::engine",
                    entity = %entity,
                    rule = %rule.key(),
                    expression,
                    error = %e,
                    "condition evaluation failed; treating as false"
                );
                false
            }
        }
    }

    fn metadata_allows(&self, rule: &Rule, session: Option<&StateSession>) -> bool {
        let meta = rule.meta();
        if meta.vehicle_only && session.and_then(StateSession::vehicle).is_none() {
            return false;
        }
        if let Some(filter) = &meta.mount_filter {
            let kind = session
                .and_then(StateSession::mount)
                .and_then(|mount| self.host.entities.kind_of(mount));
            return kind.is_some_and(|kind| kind.eq_ignore_ascii_case(filter));
        }
        true
    }
}
