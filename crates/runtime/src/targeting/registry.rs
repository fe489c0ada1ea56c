//! Priority-ordered resolver chain.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use reflex_core::EntityId;

use super::{BuiltinResolver, TargetContext, TargetResolver};
use crate::sync::{lock, read, write};

type ResolverList = Arc<[Arc<dyn TargetResolver>]>;

/// Registry that consults resolvers in ascending priority order.
///
/// The list is copy-on-write: registration rebuilds and republishes it, while
/// [`resolve`](Self::resolve) iterates whichever list was current when it
/// started. Ties keep registration order.
pub struct TargetResolverRegistry {
    resolvers: RwLock<ResolverList>,
    usage: Mutex<BTreeMap<String, u64>>,
    metrics: ResolverMetrics,
}

impl TargetResolverRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            resolvers: RwLock::new(ResolverList::from(Vec::new())),
            usage: Mutex::new(BTreeMap::new()),
            metrics: ResolverMetrics::default(),
        }
    }

    /// Creates a registry holding the [`BuiltinResolver`].
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        registry.register(Arc::new(BuiltinResolver));
        registry
    }

    /// Adds a resolver, replacing any resolver registered under the same name.
    ///
    /// Returns the replaced resolver, if any.
    pub fn register(&self, resolver: Arc<dyn TargetResolver>) -> Option<Arc<dyn TargetResolver>> {
        let mut resolvers = write(&self.resolvers);
        let mut list: Vec<_> = resolvers.iter().cloned().collect();

        let replaced = list
            .iter()
            .position(|r| r.name() == resolver.name())
            .map(|pos| list.remove(pos));
        if let Some(old) = &replaced {
            warn!(
                target: "runtime::targeting",
                name = resolver.name(),
                old_priority = old.priority(),
                new_priority = resolver.priority(),
                "resolver name collision; replacing previous resolver"
            );
        }

        info!(
            target: "runtime::targeting",
            name = resolver.name(),
            priority = resolver.priority(),
            "resolver registered"
        );
        list.push(resolver);
        list.sort_by_key(|r| r.priority());
        *resolvers = list.into();
        replaced
    }

    /// Removes the resolver named `name`. Returns whether one was removed.
    pub fn unregister(&self, name: &str) -> bool {
        let mut resolvers = write(&self.resolvers);
        if !resolvers.iter().any(|r| r.name() == name) {
            return false;
        }
        *resolvers = resolvers
            .iter()
            .filter(|r| r.name() != name)
            .cloned()
            .collect();
        info!(target: "runtime::targeting", name, "resolver unregistered");
        true
    }

    /// Resolves `selector` through the chain.
    ///
    /// Blank or unsupported selectors, and chains where every supporting
    /// resolver returns nothing or fails, yield an empty vector.
    pub fn resolve(&self, selector: &str, ctx: &TargetContext<'_>) -> Vec<EntityId> {
        let selector = selector.trim();
        if selector.is_empty() {
            return Vec::new();
        }
        self.metrics.attempts.fetch_add(1, Ordering::Relaxed);

        let resolvers = read(&self.resolvers).clone();
        for resolver in resolvers.iter().filter(|r| r.supports(selector)) {
            match resolver.resolve(selector, ctx) {
                Ok(targets) if !targets.is_empty() => {
                    self.metrics.hits.fetch_add(1, Ordering::Relaxed);
                    *lock(&self.usage)
                        .entry(resolver.name().to_owned())
                        .or_insert(0) += 1;
                    debug!(
                        target: "runtime::targeting",
                        selector,
                        resolver = resolver.name(),
                        count = targets.len(),
                        "selector resolved"
                    );
                    return targets;
                }
                Ok(_) => {}
                Err(e) => {
                    self.metrics.errors.fetch_add(1, Ordering::Relaxed);
                    error!(
                        target: "runtime::targeting",
                        selector,
                        resolver = resolver.name(),
                        error = %e,
                        "resolver failed; trying next"
                    );
                }
            }
        }

        self.metrics.misses.fetch_add(1, Ordering::Relaxed);
        Vec::new()
    }

    /// Registered resolvers as `(name, priority)` in consultation order.
    pub fn resolvers(&self) -> Vec<(String, i32)> {
        read(&self.resolvers)
            .iter()
            .map(|r| (r.name().to_owned(), r.priority()))
            .collect()
    }

    pub fn len(&self) -> usize {
        read(&self.resolvers).len()
    }

    pub fn is_empty(&self) -> bool {
        read(&self.resolvers).is_empty()
    }

    /// Health of every registered resolver, in consultation order.
    pub fn health(&self) -> Vec<ResolverHealth> {
        read(&self.resolvers)
            .iter()
            .map(|r| ResolverHealth {
                name: r.name().to_owned(),
                priority: r.priority(),
                healthy: r.is_healthy(),
            })
            .collect()
    }

    pub fn stats(&self) -> ResolverStats {
        ResolverStats {
            attempts: self.metrics.attempts.load(Ordering::Relaxed),
            hits: self.metrics.hits.load(Ordering::Relaxed),
            misses: self.metrics.misses.load(Ordering::Relaxed),
            errors: self.metrics.errors.load(Ordering::Relaxed),
            usage: lock(&self.usage).clone(),
        }
    }

    pub fn reset_stats(&self) {
        self.metrics.attempts.store(0, Ordering::Relaxed);
        self.metrics.hits.store(0, Ordering::Relaxed);
        self.metrics.misses.store(0, Ordering::Relaxed);
        self.metrics.errors.store(0, Ordering::Relaxed);
        lock(&self.usage).clear();
    }
}

impl Default for TargetResolverRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

#[derive(Debug, Default)]
struct ResolverMetrics {
    attempts: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ResolverStats {
    pub attempts: u64,
    pub hits: u64,
    pub misses: u64,
    pub errors: u64,
    /// Successful resolutions per resolver name.
    pub usage: BTreeMap<String, u64>,
}

impl ResolverStats {
    /// Percentage of attempts that produced targets (100 when idle).
    pub fn hit_rate(&self) -> f64 {
        if self.attempts == 0 {
            100.0
        } else {
            self.hits as f64 / self.attempts as f64 * 100.0
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResolverHealth {
    pub name: String,
    pub priority: i32,
    pub healthy: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResolveError;
    use crate::host::{EntityOracle, MotionSample};

    struct AllValid;

    impl EntityOracle for AllValid {
        fn is_valid(&self, _: EntityId) -> bool {
            true
        }
        fn is_online(&self, _: EntityId) -> bool {
            true
        }
        fn motion(&self, _: EntityId) -> Option<MotionSample> {
            None
        }
        fn kind_of(&self, _: EntityId) -> Option<String> {
            None
        }
    }

    struct Fixed {
        name: &'static str,
        priority: i32,
        result: Result<Vec<EntityId>, ResolveError>,
    }

    impl TargetResolver for Fixed {
        fn name(&self) -> &str {
            self.name
        }
        fn priority(&self) -> i32 {
            self.priority
        }
        fn supports(&self, selector: &str) -> bool {
            selector.starts_with('@')
        }
        fn resolve(&self, _: &str, _: &TargetContext<'_>) -> Result<Vec<EntityId>, ResolveError> {
            self.result.clone()
        }
        fn is_healthy(&self) -> bool {
            self.result.is_ok()
        }
    }

    fn fixed(name: &'static str, priority: i32, result: Result<Vec<EntityId>, ResolveError>) -> Arc<dyn TargetResolver> {
        Arc::new(Fixed {
            name,
            priority,
            result,
        })
    }

    #[test]
    fn lower_priority_wins() {
        let registry = TargetResolverRegistry::new();
        registry.register(fixed("wide", 100, Ok(vec![EntityId(5), EntityId(6)])));
        registry.register(fixed("narrow", 10, Ok(vec![EntityId(5)])));

        let ctx = TargetContext::bare(EntityId(1), &AllValid);
        assert_eq!(registry.resolve("@self", &ctx), vec![EntityId(5)]);
        assert_eq!(registry.stats().usage.get("narrow"), Some(&1));
        assert_eq!(
            registry.resolvers(),
            vec![("narrow".to_owned(), 10), ("wide".to_owned(), 100)]
        );
    }

    #[test]
    fn failing_resolver_does_not_block_chain() {
        let registry = TargetResolverRegistry::new();
        registry.register(fixed("broken", 1, Err(ResolveError::Unavailable("down".into()))));
        registry.register(fixed("empty", 2, Ok(Vec::new())));
        registry.register(fixed("good", 3, Ok(vec![EntityId(9)])));

        let ctx = TargetContext::bare(EntityId(1), &AllValid);
        assert_eq!(registry.resolve("@x", &ctx), vec![EntityId(9)]);

        let stats = registry.stats();
        assert_eq!((stats.attempts, stats.hits, stats.errors), (1, 1, 1));
        assert!(!registry.health()[0].healthy);
    }

    #[test]
    fn name_collision_replaces() {
        let registry = TargetResolverRegistry::new();
        registry.register(fixed("r", 50, Ok(vec![EntityId(1)])));
        let replaced = registry.register(fixed("r", 5, Ok(vec![EntityId(2)])));

        assert!(replaced.is_some());
        assert_eq!(registry.len(), 1);
        let ctx = TargetContext::bare(EntityId(1), &AllValid);
        assert_eq!(registry.resolve("@a", &ctx), vec![EntityId(2)]);
        assert!(registry.unregister("r"));
        assert!(!registry.unregister("r"));
        assert!(registry.is_empty());
    }

    #[test]
    fn blank_and_unmatched_selectors_are_empty() {
        let registry = TargetResolverRegistry::with_builtin();
        let ctx = TargetContext::bare(EntityId(1), &AllValid);
        assert!(registry.resolve("   ", &ctx).is_empty());
        assert!(registry.resolve("nearest", &ctx).is_empty());
        assert!(registry.resolve("@victim", &ctx).is_empty());
        assert_eq!(registry.resolve(" @self ", &ctx), vec![EntityId(1)]);
        assert_eq!(registry.stats().misses, 2);
    }
}
