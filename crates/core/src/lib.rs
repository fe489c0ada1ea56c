//! Rule model shared by the dispatcher runtime and hosts.
//!
//! `reflex-core` defines what a rule *is*: the identifiers it is keyed by, the
//! action/timing vocabulary it matches on, its validated construction, and the
//! immutable three-level [`RuleIndex`] that lookups run against. Everything
//! here is plain data; concurrency, clocks and collaborators live in
//! `reflex-runtime`.
pub mod action;
pub mod ids;
pub mod index;
pub mod rule;
pub mod state;

pub use action::{ActionKind, TriggerTiming};
pub use ids::{EntityId, RuleKey, ScopeId};
pub use index::{DuplicateRule, RuleIndex, RuleList};
pub use rule::{CancelPolicy, Rule, RuleBuilder, RuleError, RuleMeta};
pub use state::{StateFlags, StateKind};

#[cfg(feature = "serde")]
pub use rule::{RuleDef, RuleMetaDef};
