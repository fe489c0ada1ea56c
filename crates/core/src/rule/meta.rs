//! Optional per-rule metadata.

use std::sync::Arc;

/// Whether a matching rule asks the host to cancel the underlying event.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum CancelPolicy {
    /// Never suppress.
    #[default]
    Never,
    /// Suppress whenever the rule matches.
    Always,
    /// Suppress only when the expression evaluates true for the entity.
    /// Evaluation errors count as false.
    WhenCondition(Arc<str>),
}

impl CancelPolicy {
    pub fn is_never(&self) -> bool {
        matches!(self, Self::Never)
    }
}

/// Extra filters and flags attached to a rule.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RuleMeta {
    /// Only fire while the entity's current mount is of this host kind.
    pub mount_filter: Option<Arc<str>>,
    /// Only fire while the entity has a current vehicle.
    pub vehicle_only: bool,
    /// Overrides the hover stability requirement for this rule's scope.
    pub min_stable_ticks: Option<u32>,
    pub cancel: CancelPolicy,
}

impl RuleMeta {
    pub fn is_empty(&self) -> bool {
        self.mount_filter.is_none()
            && !self.vehicle_only
            && self.min_stable_ticks.is_none()
            && self.cancel.is_never()
    }

    pub fn with_mount_filter(mut self, kind: impl AsRef<str>) -> Self {
        self.mount_filter = Some(Arc::from(kind.as_ref()));
        self
    }

    pub fn with_vehicle_only(mut self, vehicle_only: bool) -> Self {
        self.vehicle_only = vehicle_only;
        self
    }

    pub fn with_min_stable_ticks(mut self, ticks: u32) -> Self {
        self.min_stable_ticks = Some(ticks);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelPolicy) -> Self {
        self.cancel = cancel;
        self
    }
}
