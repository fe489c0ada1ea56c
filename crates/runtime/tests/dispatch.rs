mod common;

use std::sync::Arc;
use std::time::Duration;

use reflex_core::{ActionKind, EntityId, Rule, TriggerTiming};
use reflex_runtime::{ResolveError, TargetContext, TargetResolver};

use common::{World, runtime};

const PLAYER: EntityId = EntityId(1);

#[test]
fn ride_start_respects_cooldown_window() {
    let world = World::new();
    world.spawn(PLAYER, "knight");
    let rule = Rule::builder("knight", "r1", ActionKind::Ride, TriggerTiming::Start, "skillA")
        .cooldown(40)
        .build()
        .unwrap();
    let (runtime, clock) = runtime(&world, vec![rule]);
    let handle = runtime.handle();

    assert_eq!(handle.fire(PLAYER, ActionKind::Ride, TriggerTiming::Start), 1);

    // 20 ticks later the 40-tick cooldown still holds.
    clock.advance(Duration::from_millis(1_000));
    assert_eq!(handle.fire(PLAYER, ActionKind::Ride, TriggerTiming::Start), 0);

    clock.advance(Duration::from_millis(1_000));
    assert_eq!(handle.fire(PLAYER, ActionKind::Ride, TriggerTiming::Start), 1);

    assert_eq!(world.effects(), vec!["skillA", "skillA"]);
    assert_eq!(runtime.stats().engine.cooldown_blocked, 1);
}

#[test]
fn victim_selector_without_victim_still_invokes() {
    let world = World::new();
    world.spawn(PLAYER, "knight");
    let rule = Rule::builder("knight", "v", ActionKind::Attack, TriggerTiming::Instant, "smite")
        .target("@victim")
        .build()
        .unwrap();
    let (runtime, _) = runtime(&world, vec![rule]);

    assert_eq!(runtime.handle().fire(PLAYER, ActionKind::Attack, TriggerTiming::Instant), 1);
    assert_eq!(world.invocations(), vec![(PLAYER, "smite".to_owned(), Vec::new())]);
    assert_eq!(runtime.stats().engine.target_misses, 1);
}

#[test]
fn recorded_victim_is_targeted() {
    let world = World::new();
    world.spawn(PLAYER, "knight");
    world.spawn(EntityId(9), "wolf");
    let rule = Rule::builder("knight", "v", ActionKind::Attack, TriggerTiming::Instant, "smite")
        .target("@VICTIM")
        .build()
        .unwrap();
    let (runtime, _) = runtime(&world, vec![rule]);
    let handle = runtime.handle();
    handle.session(PLAYER).record_victim(EntityId(9));

    handle.fire(PLAYER, ActionKind::Attack, TriggerTiming::Instant);
    assert_eq!(world.invocations()[0].2, vec![EntityId(9)]);
}

struct FixedResolver {
    name: &'static str,
    priority: i32,
    answer: EntityId,
}

impl TargetResolver for FixedResolver {
    fn name(&self) -> &str {
        self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn supports(&self, selector: &str) -> bool {
        selector == "nearest"
    }

    fn resolve(&self, _: &str, _: &TargetContext<'_>) -> Result<Vec<EntityId>, ResolveError> {
        Ok(vec![self.answer])
    }
}

#[test]
fn lower_priority_value_resolves_first() {
    let world = World::new();
    world.spawn(PLAYER, "knight");
    let rule = Rule::builder("knight", "n", ActionKind::Attack, TriggerTiming::Instant, "bolt")
        .target("nearest")
        .build()
        .unwrap();
    let (runtime, _) = runtime(&world, vec![rule]);
    let resolvers = runtime.engine().resolvers();
    resolvers.register(Arc::new(FixedResolver {
        name: "slow",
        priority: 100,
        answer: EntityId(100),
    }));
    resolvers.register(Arc::new(FixedResolver {
        name: "fast",
        priority: 10,
        answer: EntityId(10),
    }));

    runtime.handle().fire(PLAYER, ActionKind::Attack, TriggerTiming::Instant);
    assert_eq!(world.invocations()[0].2, vec![EntityId(10)]);
    assert_eq!(resolvers.stats().usage.get("fast"), Some(&1));
}

#[test]
fn empty_reload_disables_every_rule() {
    let world = World::new();
    world.spawn(PLAYER, "knight");
    let rule = Rule::builder("knight", "r", ActionKind::Swing, TriggerTiming::Instant, "leap")
        .build()
        .unwrap();
    let (runtime, _) = runtime(&world, vec![rule]);

    runtime.reload_rules(Vec::new()).unwrap();
    assert_eq!(runtime.handle().fire(PLAYER, ActionKind::Swing, TriggerTiming::Instant), 0);
    assert!(world.invocations().is_empty());
    assert_eq!(runtime.stats().rule_generation, 2);
}

#[test]
fn false_condition_blocks_and_does_not_start_cooldown() {
    let world = World::new();
    world.spawn(PLAYER, "knight");
    let gated = Rule::builder("knight", "g", ActionKind::Attack, TriggerTiming::Instant, "fx")
        .condition("false")
        .cooldown(10)
        .build()
        .unwrap();
    let (runtime, _) = runtime(&world, vec![gated]);

    assert_eq!(runtime.handle().fire(PLAYER, ActionKind::Attack, TriggerTiming::Instant), 0);
    assert_eq!(runtime.stats().cooldowns.set, 0);
}
