//! Pluggable target-selector resolution.
//!
//! A rule's target selector is an opaque string. Resolvers declare which
//! selectors they understand through [`TargetResolver::supports`] and are
//! consulted in ascending priority order by the [`TargetResolverRegistry`];
//! the first non-empty answer wins.
mod builtin;
mod registry;

pub use builtin::BuiltinResolver;
pub use registry::{ResolverHealth, ResolverStats, TargetResolverRegistry};

use reflex_core::EntityId;

use crate::error::ResolveError;
use crate::host::{EntityOracle, Vec3};
use crate::session::StateSession;

/// Turns a selector string into concrete entities.
pub trait TargetResolver: Send + Sync {
    /// Unique name; registering a second resolver with the same name replaces
    /// the first.
    fn name(&self) -> &str;

    /// Lower values are consulted first.
    fn priority(&self) -> i32 {
        100
    }

    fn supports(&self, selector: &str) -> bool;

    fn resolve(
        &self,
        selector: &str,
        ctx: &TargetContext<'_>,
    ) -> Result<Vec<EntityId>, ResolveError>;

    fn is_healthy(&self) -> bool {
        true
    }
}

/// Everything a resolver may look at for one rule evaluation.
///
/// Built fresh per evaluation and never stored.
#[derive(Clone, Copy)]
pub struct TargetContext<'a> {
    pub entity: EntityId,
    pub attacker: Option<EntityId>,
    pub victim: Option<EntityId>,
    pub vehicle: Option<EntityId>,
    pub mount: Option<EntityId>,
    /// Where the triggering entity was when the rule fired.
    pub location: Option<Vec3>,
    pub entities: &'a dyn EntityOracle,
}

impl<'a> TargetContext<'a> {
    /// Context with no recorded references.
    pub fn bare(entity: EntityId, entities: &'a dyn EntityOracle) -> Self {
        Self {
            entity,
            attacker: None,
            victim: None,
            vehicle: None,
            mount: None,
            location: entities.motion(entity).map(|m| m.position),
            entities,
        }
    }

    /// Context populated from the entity's session references.
    pub fn from_session(session: &StateSession, entities: &'a dyn EntityOracle) -> Self {
        Self {
            attacker: session.last_attacker(),
            victim: session.last_victim(),
            vehicle: session.vehicle(),
            mount: session.mount(),
            ..Self::bare(session.entity(), entities)
        }
    }
}
