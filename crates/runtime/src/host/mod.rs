//! Host collaborator traits.
//!
//! The runtime never owns entity identity or world state. Everything it needs
//! to know about the host (classification, conditions, effects, liveness,
//! motion) goes through the traits here, bundled into a [`HostBundle`] that is
//! injected at build time.
use std::sync::Arc;

use async_trait::async_trait;

use reflex_core::{EntityId, ScopeId};

use crate::error::ConditionError;

/// Resolves which rule scope an entity currently belongs to.
///
/// Caching is the implementor's concern. `None` means "skip this entity".
pub trait ScopeClassifier: Send + Sync {
    fn classify(&self, entity: EntityId) -> Option<ScopeId>;
}

/// Evaluates opaque condition expressions attached to rules.
pub trait ConditionEvaluator: Send + Sync {
    fn evaluate(&self, entity: EntityId, expression: &str) -> Result<bool, ConditionError>;
}

/// Runs the effect a rule points at. Returns `false` on failure; there is no
/// retry contract.
pub trait EffectInvoker: Send + Sync {
    fn invoke(&self, entity: EntityId, effect: &str, targets: &[EntityId]) -> bool;
}

/// Synchronous, cheap queries about live entities.
pub trait EntityOracle: Send + Sync {
    /// True while the entity still exists in the host world.
    fn is_valid(&self, entity: EntityId) -> bool;

    /// True while the entity is observed online (loaded and ticking).
    fn is_online(&self, entity: EntityId) -> bool;

    /// Latest motion sample, if the host tracks one for this entity.
    fn motion(&self, entity: EntityId) -> Option<MotionSample>;

    /// Lowercase kind name ("horse", "boat", ...) used by mount filters.
    fn kind_of(&self, entity: EntityId) -> Option<String>;
}

/// Batched presence confirmation used by the session sweep.
///
/// This is the only call that crosses into the host's own execution context;
/// the caller bounds it with a timeout.
#[async_trait]
pub trait PresenceOracle: Send + Sync {
    /// Returns the subset of `candidates` that are currently absent.
    async fn absent_among(&self, candidates: Vec<EntityId>) -> Vec<EntityId>;
}

/// Three-component vector in host world units.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Squared length of the horizontal (x, z) component.
    pub fn horizontal_len_sq(&self) -> f64 {
        self.x * self.x + self.z * self.z
    }
}

/// One motion observation reported by the host.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MotionSample {
    pub position: Vec3,
    pub velocity: Vec3,
    pub on_ground: bool,
}

/// Every host collaborator the runtime needs, shared behind `Arc`s.
#[derive(Clone)]
pub struct HostBundle {
    pub(crate) classifier: Arc<dyn ScopeClassifier>,
    pub(crate) conditions: Arc<dyn ConditionEvaluator>,
    pub(crate) effects: Arc<dyn EffectInvoker>,
    pub(crate) entities: Arc<dyn EntityOracle>,
    pub(crate) presence: Arc<dyn PresenceOracle>,
}

impl HostBundle {
    pub fn new(
        classifier: Arc<dyn ScopeClassifier>,
        conditions: Arc<dyn ConditionEvaluator>,
        effects: Arc<dyn EffectInvoker>,
        entities: Arc<dyn EntityOracle>,
        presence: Arc<dyn PresenceOracle>,
    ) -> Self {
        Self {
            classifier,
            conditions,
            effects,
            entities,
            presence,
        }
    }

    /// Builds a bundle from one value implementing every collaborator trait.
    pub fn from_host<H>(host: Arc<H>) -> Self
    where
        H: ScopeClassifier
            + ConditionEvaluator
            + EffectInvoker
            + EntityOracle
            + PresenceOracle
            + 'static,
    {
        Self {
            classifier: host.clone(),
            conditions: host.clone(),
            effects: host.clone(),
            entities: host.clone(),
            presence: host,
        }
    }

    pub fn classifier(&self) -> &Arc<dyn ScopeClassifier> {
        &self.classifier
    }

    pub fn entities(&self) -> &Arc<dyn EntityOracle> {
        &self.entities
    }

    pub fn presence(&self) -> &Arc<dyn PresenceOracle> {
        &self.presence
    }
}

impl std::fmt::Debug for HostBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostBundle").finish_non_exhaustive()
    }
}
