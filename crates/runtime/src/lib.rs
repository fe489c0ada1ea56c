//! Rule-driven reaction runtime for entity state and actions.
//!
//! A host reports entity actions and state changes; the runtime looks up the
//! rules bound to the entity's scope and invokes their effects, subject to
//! cooldowns, conditions and target selection. A periodic scheduler drives
//! TICK and DURATION rules for entities holding a continuous state and
//! detects hovering from motion samples.
//!
//! Modules are organized by responsibility:
//! - [`runtime`] hosts the orchestrator and builder
//! - [`engine`] evaluates rules against one observation
//! - [`scheduler`] runs the periodic pass over active sessions
//! - [`session`] and [`cooldown`] keep per-entity state
//! - [`targeting`] resolves target selectors
//! - [`host`] defines the collaborator traits a host implements
//! - [`store`] publishes immutable rule indexes
pub mod clock;
pub mod config;
pub mod cooldown;
pub mod engine;
pub mod error;
pub mod handle;
pub mod host;
pub mod runtime;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod sync;
pub mod targeting;

mod workers;

#[cfg(test)]
mod test_support;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::{CooldownConfig, HoverConfig, RuntimeConfig, SchedulerConfig, SessionConfig};
pub use cooldown::{CooldownLedger, CooldownStats};
pub use engine::{EngineStats, RuleEngine, RuleOutcome};
pub use error::{ConditionError, ResolveError, Result, RuleStoreError, RuntimeError};
pub use handle::{ActionEnvelope, RuntimeHandle};
pub use host::{
    ConditionEvaluator, EffectInvoker, EntityOracle, HostBundle, MotionSample, PresenceOracle,
    ScopeClassifier, Vec3,
};
pub use runtime::{Runtime, RuntimeBuilder, RuntimeStats};
pub use scheduler::{HoverTransition, PassReport, SchedulerStats, TickScheduler};
pub use session::{SessionSnapshot, SessionStats, StateSession, StateSessionManager, SweepReport};
pub use store::RuleStore;
pub use targeting::{
    BuiltinResolver, ResolverHealth, ResolverStats, TargetContext, TargetResolver,
    TargetResolverRegistry,
};
