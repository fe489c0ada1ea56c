//! Validated, immutable rules.
//!
//! A [`Rule`] can only be obtained through [`RuleBuilder::build`] (or
//! [`RuleDef::into_rule`] with the `serde` feature), both of which run the
//! same validation. Once built, a rule never changes; "editing" means
//! building a new rule set and swapping the whole index.

mod error;
mod meta;

#[cfg(feature = "serde")]
mod def;

use std::fmt;
use std::sync::Arc;

pub use error::RuleError;
pub use meta::{CancelPolicy, RuleMeta};

#[cfg(feature = "serde")]
pub use def::{RuleDef, RuleMetaDef};

use crate::{ActionKind, RuleKey, ScopeId, TriggerTiming};

/// Declarative mapping from an (action, timing) observation to an effect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rule {
    scope: ScopeId,
    id: Arc<str>,
    key: RuleKey,
    action: ActionKind,
    timing: TriggerTiming,
    period: u32,
    after_ticks: u32,
    effect: Arc<str>,
    target: Option<Arc<str>>,
    cooldown_ticks: u32,
    condition: Option<Arc<str>>,
    meta: RuleMeta,
}

impl Rule {
    /// Starts building a rule with its required fields.
    pub fn builder(
        scope: impl Into<ScopeId>,
        id: impl AsRef<str>,
        action: ActionKind,
        timing: TriggerTiming,
        effect: impl AsRef<str>,
    ) -> RuleBuilder {
        let scope = scope.into();
        RuleBuilder {
            scope: ScopeId::new(scope.as_str().trim()),
            id: id.as_ref().trim().to_owned(),
            action,
            timing,
            effect: effect.as_ref().trim().to_owned(),
            period: 1,
            after_ticks: 0,
            target: None,
            cooldown_ticks: 0,
            condition: None,
            meta: RuleMeta::default(),
        }
    }

    pub fn scope(&self) -> &ScopeId {
        &self.scope
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// `scope:id`, unique across the whole rule set.
    pub fn key(&self) -> &RuleKey {
        &self.key
    }

    pub fn action(&self) -> ActionKind {
        self.action
    }

    pub fn timing(&self) -> TriggerTiming {
        self.timing
    }

    /// Firing period in ticks; only meaningful for [`TriggerTiming::Tick`].
    pub fn period(&self) -> u32 {
        self.period
    }

    /// Elapsed ticks before firing; only meaningful for [`TriggerTiming::Duration`].
    pub fn after_ticks(&self) -> u32 {
        self.after_ticks
    }

    /// Opaque effect reference handed to the effect invoker.
    pub fn effect(&self) -> &str {
        &self.effect
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn cooldown_ticks(&self) -> u32 {
        self.cooldown_ticks
    }

    pub fn condition(&self) -> Option<&str> {
        self.condition.as_deref()
    }

    pub fn meta(&self) -> &RuleMeta {
        &self.meta
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}/{}] -> {}",
            self.key, self.action, self.timing, self.effect
        )?;
        match self.timing {
            TriggerTiming::Tick => write!(f, " every={}", self.period)?,
            TriggerTiming::Duration => write!(f, " after={}", self.after_ticks)?,
            _ => {}
        }
        if let Some(target) = &self.target {
            write!(f, " target={target}")?;
        }
        if self.cooldown_ticks > 0 {
            write!(f, " cd={}", self.cooldown_ticks)?;
        }
        Ok(())
    }
}

/// Collects rule fields and validates them on [`build`](Self::build).
///
/// Numeric setters take `i64` so out-of-range input from any source reaches
/// validation instead of being clamped or wrapped silently.
#[derive(Clone, Debug)]
pub struct RuleBuilder {
    scope: ScopeId,
    id: String,
    action: ActionKind,
    timing: TriggerTiming,
    effect: String,
    period: i64,
    after_ticks: i64,
    target: Option<String>,
    cooldown_ticks: i64,
    condition: Option<String>,
    meta: RuleMeta,
}

impl RuleBuilder {
    pub fn period(mut self, period: i64) -> Self {
        self.period = period;
        self
    }

    pub fn after_ticks(mut self, after_ticks: i64) -> Self {
        self.after_ticks = after_ticks;
        self
    }

    pub fn target(mut self, selector: impl AsRef<str>) -> Self {
        self.target = Some(selector.as_ref().to_owned());
        self
    }

    pub fn cooldown(mut self, ticks: i64) -> Self {
        self.cooldown_ticks = ticks;
        self
    }

    pub fn condition(mut self, expression: impl AsRef<str>) -> Self {
        self.condition = Some(expression.as_ref().to_owned());
        self
    }

    pub fn meta(mut self, meta: RuleMeta) -> Self {
        self.meta = meta;
        self
    }

    /// Validates the collected fields and produces an immutable rule.
    pub fn build(self) -> Result<Rule, RuleError> {
        if self.scope.as_str().is_empty() {
            return Err(RuleError::EmptyScope);
        }
        if self.id.is_empty() {
            return Err(RuleError::EmptyId {
                scope: self.scope.to_string(),
            });
        }

        let key = RuleKey::new(&self.scope, &self.id);
        if self.effect.is_empty() {
            return Err(RuleError::EmptyEffect {
                key: key.to_string(),
            });
        }

        let period = match self.timing {
            TriggerTiming::Tick if self.period < 1 => {
                return Err(RuleError::InvalidPeriod {
                    key: key.to_string(),
                    period: self.period,
                });
            }
            TriggerTiming::Tick => to_u32(&key, self.timing, self.period)?,
            // Irrelevant outside TICK; keep a harmless divisor.
            _ => 1,
        };

        let after_ticks = match self.timing {
            TriggerTiming::Duration if self.after_ticks <= 0 => {
                return Err(RuleError::InvalidAfterTicks {
                    key: key.to_string(),
                    after: self.after_ticks,
                });
            }
            TriggerTiming::Duration => to_u32(&key, self.timing, self.after_ticks)?,
            _ => 0,
        };

        if self.cooldown_ticks < 0 {
            return Err(RuleError::NegativeCooldown {
                key: key.to_string(),
                cooldown: self.cooldown_ticks,
            });
        }
        let cooldown_ticks = to_u32(&key, self.timing, self.cooldown_ticks)?;

        Ok(Rule {
            scope: self.scope,
            id: Arc::from(self.id),
            key,
            action: self.action,
            timing: self.timing,
            period,
            after_ticks,
            effect: Arc::from(self.effect),
            target: non_blank(self.target),
            cooldown_ticks,
            condition: non_blank(self.condition),
            meta: self.meta,
        })
    }
}

fn to_u32(key: &RuleKey, timing: TriggerTiming, value: i64) -> Result<u32, RuleError> {
    u32::try_from(value).map_err(|_| RuleError::OutOfRange {
        key: key.to_string(),
        timing,
        value,
    })
}

fn non_blank(value: Option<String>) -> Option<Arc<str>> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
        .map(Arc::from)
}
