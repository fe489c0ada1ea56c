//! Deserializable rule records.
//!
//! Hosts that keep rules in files deserialize into [`RuleDef`] with whatever
//! format they use and convert through [`RuleDef::into_rule`]; the runtime
//! itself never touches a serialized format.

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{CancelPolicy, Rule, RuleError, RuleMeta};
use crate::{ActionKind, RuleKey, ScopeId, TriggerTiming};

/// Plain rule record as it appears in a rule file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleDef {
    pub id: String,
    pub action: String,
    pub when: String,
    #[serde(alias = "skill")]
    pub effect: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub every: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<i64>,
    #[serde(alias = "cooldown")]
    pub cd: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require: Option<String>,
    pub meta: RuleMetaDef,
}

/// Metadata block of a [`RuleDef`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleMetaDef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mount: Option<String>,
    #[serde(alias = "boat")]
    pub vehicle_only: bool,
    #[serde(alias = "hover_min_ticks", skip_serializing_if = "Option::is_none")]
    pub min_stable_ticks: Option<i64>,
    pub cancel_event: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_condition: Option<String>,
}

impl RuleDef {
    /// Validates the record and builds a rule in `scope`.
    pub fn into_rule(self, scope: impl Into<ScopeId>) -> Result<Rule, RuleError> {
        let scope = scope.into();
        let key = RuleKey::new(&scope, self.id.trim());

        let action = ActionKind::from_str(self.action.trim()).map_err(|_| {
            RuleError::UnknownAction {
                key: key.to_string(),
                value: self.action.clone(),
            }
        })?;
        let timing = TriggerTiming::from_str(self.when.trim()).map_err(|_| {
            RuleError::UnknownTiming {
                key: key.to_string(),
                value: self.when.clone(),
            }
        })?;

        let meta = self.meta.into_meta(&key)?;

        let mut builder = Rule::builder(scope, &self.id, action, timing, &self.effect)
            .cooldown(self.cd)
            .meta(meta);
        if let Some(every) = self.every {
            builder = builder.period(every);
        } else if timing == TriggerTiming::Tick {
            // A tick rule without an explicit period must be rejected, not defaulted.
            builder = builder.period(0);
        }
        if let Some(after) = self.after {
            builder = builder.after_ticks(after);
        }
        if let Some(target) = self.target {
            builder = builder.target(target);
        }
        if let Some(require) = self.require {
            builder = builder.condition(require);
        }
        builder.build()
    }
}

impl RuleMetaDef {
    fn into_meta(self, key: &RuleKey) -> Result<RuleMeta, RuleError> {
        let min_stable_ticks = match self.min_stable_ticks {
            None => None,
            Some(value) if value < 0 => {
                return Err(RuleError::NegativeStableTicks {
                    key: key.to_string(),
                    value,
                });
            }
            Some(value) => Some(u32::try_from(value).unwrap_or(u32::MAX)),
        };

        let cancel = match self.cancel_condition.map(|c| c.trim().to_owned()) {
            Some(condition) if !condition.is_empty() => {
                CancelPolicy::WhenCondition(Arc::from(condition))
            }
            _ if self.cancel_event => CancelPolicy::Always,
            _ => CancelPolicy::Never,
        };

        Ok(RuleMeta {
            mount_filter: self
                .mount
                .map(|m| m.trim().to_ascii_lowercase())
                .filter(|m| !m.is_empty())
                .map(Arc::from),
            vehicle_only: self.vehicle_only,
            min_stable_ticks,
            cancel,
        })
    }
}
