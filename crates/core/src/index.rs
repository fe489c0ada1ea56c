//! Three-level rule index: scope → action → timing → ordered rules.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use thiserror::Error;

use crate::{ActionKind, Rule, RuleKey, ScopeId, TriggerTiming};

/// Ordered, shared slice of rules returned by lookups.
pub type RuleList = Arc<[Arc<Rule>]>;

/// Two rules in one set share the same `scope:id` key.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("duplicate rule key {key}")]
pub struct DuplicateRule {
    pub key: RuleKey,
}

/// Immutable lookup structure built once per rule-set reload.
///
/// Leaves keep insertion order so that firing order is deterministic. The
/// index is never mutated after [`build`](Self::build); callers swap whole
/// indexes instead.
#[derive(Debug, Default)]
pub struct RuleIndex {
    scopes: HashMap<ScopeId, HashMap<ActionKind, HashMap<TriggerTiming, RuleList>>>,
    rule_count: usize,
}

impl RuleIndex {
    /// Builds an index, rejecting the whole set if any key repeats.
    pub fn build(rules: impl IntoIterator<Item = Rule>) -> Result<Self, DuplicateRule> {
        let mut seen = HashSet::new();
        let mut staging: HashMap<ScopeId, HashMap<ActionKind, HashMap<TriggerTiming, Vec<Arc<Rule>>>>> =
            HashMap::new();
        let mut rule_count = 0;

        for rule in rules {
            if !seen.insert(rule.key().clone()) {
                return Err(DuplicateRule {
                    key: rule.key().clone(),
                });
            }
            staging
                .entry(rule.scope().clone())
                .or_default()
                .entry(rule.action())
                .or_default()
                .entry(rule.timing())
                .or_default()
                .push(Arc::new(rule));
            rule_count += 1;
        }

        let scopes = staging
            .into_iter()
            .map(|(scope, actions)| {
                let actions = actions
                    .into_iter()
                    .map(|(action, timings)| {
                        let timings = timings
                            .into_iter()
                            .map(|(timing, list)| (timing, RuleList::from(list)))
                            .collect();
                        (action, timings)
                    })
                    .collect();
                (scope, actions)
            })
            .collect();

        Ok(Self { scopes, rule_count })
    }

    /// Rules for `(scope, action, timing)` in insertion order; empty when none match.
    pub fn lookup(&self, scope: &ScopeId, action: ActionKind, timing: TriggerTiming) -> RuleList {
        self.scopes
            .get(scope)
            .and_then(|actions| actions.get(&action))
            .and_then(|timings| timings.get(&timing))
            .cloned()
            .unwrap_or_else(|| RuleList::from(Vec::new()))
    }

    /// Every rule of a scope, across actions and timings, in no particular order.
    pub fn scope_rules(&self, scope: &ScopeId) -> Vec<Arc<Rule>> {
        self.scopes
            .get(scope)
            .map(|actions| {
                actions
                    .values()
                    .flat_map(|timings| timings.values())
                    .flat_map(|list| list.iter().cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn scope_ids(&self) -> Vec<ScopeId> {
        let mut ids: Vec<_> = self.scopes.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn rule_count(&self) -> usize {
        self.rule_count
    }

    pub fn is_empty(&self) -> bool {
        self.rule_count == 0
    }
}
