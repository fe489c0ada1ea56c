//! Atomically swappable rule index.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tracing::info;

use reflex_core::{ActionKind, Rule, RuleIndex, RuleList, ScopeId, TriggerTiming};

use crate::error::RuleStoreError;
use crate::sync::{read, write};

/// Holds the published [`RuleIndex`].
///
/// Readers clone the inner `Arc` and keep using that index for the rest of
/// their call, so a concurrent [`replace`](Self::replace) never shows them a
/// half-built set.
#[derive(Debug, Default)]
pub struct RuleStore {
    index: RwLock<Arc<RuleIndex>>,
    generation: AtomicU64,
}

impl RuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store already holding `rules`.
    pub fn with_rules(rules: impl IntoIterator<Item = Rule>) -> Result<Self, RuleStoreError> {
        let store = Self::new();
        store.replace(rules)?;
        Ok(store)
    }

    /// Builds a new index from `rules` and publishes it.
    ///
    /// On rejection the previously published index stays in place.
    pub fn replace(&self, rules: impl IntoIterator<Item = Rule>) -> Result<(), RuleStoreError> {
        let index = Arc::new(RuleIndex::build(rules)?);
        let count = index.rule_count();
        let scopes = index.scope_ids().len();

        *write(&self.index) = index;
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;

        info!(
            target: "runtime::engine",
            rules = count,
            scopes,
            generation,
            "rule set published"
        );
        Ok(())
    }

    /// Rules for `(scope, action, timing)` in insertion order.
    pub fn lookup(&self, scope: &ScopeId, action: ActionKind, timing: TriggerTiming) -> RuleList {
        self.snapshot().lookup(scope, action, timing)
    }

    /// The currently published index.
    pub fn snapshot(&self) -> Arc<RuleIndex> {
        read(&self.index).clone()
    }

    pub fn scope_ids(&self) -> Vec<ScopeId> {
        self.snapshot().scope_ids()
    }

    pub fn rule_count(&self) -> usize {
        self.snapshot().rule_count()
    }

    /// Number of successful replacements so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reflex_core::{DuplicateRule, RuleKey};

    fn ride_rule(id: &str) -> Rule {
        Rule::builder("S", id, ActionKind::Ride, TriggerTiming::Start, "skillA")
            .build()
            .unwrap()
    }

    #[test]
    fn empty_replace_yields_empty_lookups() {
        let store = RuleStore::with_rules(vec![ride_rule("r1")]).unwrap();
        store.replace(Vec::new()).unwrap();

        let list = store.lookup(&ScopeId::new("S"), ActionKind::Ride, TriggerTiming::Start);
        assert!(list.is_empty());
        assert_eq!(store.rule_count(), 0);
        assert_eq!(store.generation(), 2);
    }

    #[test]
    fn rejected_replace_keeps_previous_index() {
        let store = RuleStore::with_rules(vec![ride_rule("r1")]).unwrap();
        let err = store
            .replace(vec![ride_rule("r2"), ride_rule("r2")])
            .unwrap_err();
        assert_eq!(
            err,
            RuleStoreError::Duplicate(DuplicateRule {
                key: RuleKey::from("S:r2")
            })
        );
        assert_eq!(store.rule_count(), 1);
        assert_eq!(store.generation(), 1);
    }

    #[test]
    fn in_flight_snapshot_survives_replace() {
        let store = RuleStore::with_rules(vec![ride_rule("r1")]).unwrap();
        let held = store.snapshot();
        store.replace(Vec::new()).unwrap();

        assert_eq!(held.rule_count(), 1);
        assert_eq!(store.rule_count(), 0);
    }
}
