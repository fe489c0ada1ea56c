//! Error types surfaced by the runtime.
//!
//! Only construction and lifecycle failures reach callers as [`RuntimeError`].
//! Condition and resolver errors are produced by host collaborators and are
//! logged and contained by the engine.

use thiserror::Error;

use reflex_core::{DuplicateRule, EntityId};

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime requires a {0} before building")]
    MissingCollaborator(&'static str),

    #[error("runtime already started")]
    AlreadyStarted,

    #[error("envelope dispatch channel closed")]
    DispatchChannelClosed,

    #[error("envelope dispatch channel full")]
    DispatchChannelFull,

    #[error("worker join failed")]
    WorkerJoin(#[source] tokio::task::JoinError),

    #[error(transparent)]
    RuleStore(#[from] RuleStoreError),
}

/// Rejection of a rule set by [`RuleStore::replace`](crate::RuleStore::replace).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RuleStoreError {
    #[error(transparent)]
    Duplicate(#[from] DuplicateRule),
}

/// Failure raised by a host condition evaluator.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConditionError {
    #[error("malformed expression `{expression}`: {reason}")]
    Malformed { expression: String, reason: String },

    #[error("unknown placeholder `{0}`")]
    UnknownPlaceholder(String),

    #[error("entity {0} unavailable for evaluation")]
    EntityUnavailable(EntityId),
}

/// Failure raised by a target resolver.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("selector `{0}` is malformed")]
    Malformed(String),

    #[error("resolver backend unavailable: {0}")]
    Unavailable(String),
}
