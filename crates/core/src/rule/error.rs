//! Validation errors raised while constructing rules.

use thiserror::Error;

use crate::TriggerTiming;

/// Reasons a rule definition is rejected before it can reach an index.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("rule scope must not be empty")]
    EmptyScope,

    #[error("rule id must not be empty (scope {scope})")]
    EmptyId { scope: String },

    #[error("rule {key} has no effect reference")]
    EmptyEffect { key: String },

    #[error("rule {key}: tick rules need period >= 1, got {period}")]
    InvalidPeriod { key: String, period: i64 },

    #[error("rule {key}: duration rules need after > 0, got {after}")]
    InvalidAfterTicks { key: String, after: i64 },

    #[error("rule {key}: cooldown must be >= 0, got {cooldown}")]
    NegativeCooldown { key: String, cooldown: i64 },

    #[error("rule {key}: min_stable_ticks must be >= 0, got {value}")]
    NegativeStableTicks { key: String, value: i64 },

    #[error("rule {key}: unknown action '{value}'")]
    UnknownAction { key: String, value: String },

    #[error("rule {key}: unknown timing '{value}'")]
    UnknownTiming { key: String, value: String },

    #[error("rule {key}: value {value} does not fit the {timing} range")]
    OutOfRange {
        key: String,
        timing: TriggerTiming,
        value: i64,
    },
}
