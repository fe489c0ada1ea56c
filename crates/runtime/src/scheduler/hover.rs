//! Hover detection state machine: OFF -> ACCUMULATING -> ON.

use reflex_core::{StateKind, TriggerTiming};

use crate::config::HoverConfig;
use crate::host::MotionSample;
use crate::session::StateSession;

/// Hover state change produced by one detection step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HoverTransition {
    Started,
    Ended,
}

impl HoverTransition {
    pub fn timing(self) -> TriggerTiming {
        match self {
            Self::Started => TriggerTiming::Start,
            Self::Ended => TriggerTiming::End,
        }
    }
}

/// Airborne, not swimming or gliding, and slow on both axes.
///
/// Horizontal speed is compared squared.
pub(crate) fn detect(config: &HoverConfig, session: &StateSession, sample: &MotionSample) -> bool {
    if sample.on_ground || session.is_on(StateKind::Swimming) || session.is_on(StateKind::Gliding) {
        return false;
    }
    let max_h = config.max_horizontal_speed;
    sample.velocity.y.abs() <= config.max_vertical_speed
        && sample.velocity.horizontal_len_sq() <= max_h * max_h
}

/// Advances the session's hover state by one pass.
///
/// The caller fires the matching HOVER rules and refreshes active membership
/// when a transition is returned.
pub(crate) fn step(
    session: &StateSession,
    detected: bool,
    min_stable: u32,
) -> Option<HoverTransition> {
    let hovering = session.is_on(StateKind::Hovering);
    match (detected, hovering) {
        (true, false) => {
            if session.bump_hover_stable() >= min_stable.max(1) {
                session.set_state(StateKind::Hovering, true);
                Some(HoverTransition::Started)
            } else {
                None
            }
        }
        (false, true) => {
            // Turning the state off also clears the stable counter.
            session.set_state(StateKind::Hovering, false);
            Some(HoverTransition::Ended)
        }
        (false, false) => {
            session.reset_hover_stable();
            None
        }
        (true, true) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::host::Vec3;
    use reflex_core::EntityId;

    fn airborne(vx: f64, vy: f64, vz: f64) -> MotionSample {
        MotionSample {
            position: Vec3::ZERO,
            velocity: Vec3::new(vx, vy, vz),
            on_ground: false,
        }
    }

    #[test]
    fn detection_thresholds_are_inclusive() {
        let config = HoverConfig::default();
        let session = StateSession::new(EntityId(1), ManualClock::shared(1));

        assert!(detect(&config, &session, &airborne(0.0, 0.03, 0.0)));
        assert!(detect(&config, &session, &airborne(0.06, 0.0, 0.0)));
        assert!(!detect(&config, &session, &airborne(0.05, 0.0, 0.05)));
        assert!(!detect(&config, &session, &airborne(0.0, -0.031, 0.0)));

        session.set_state(StateKind::Gliding, true);
        assert!(!detect(&config, &session, &airborne(0.0, 0.0, 0.0)));
    }

    #[test]
    fn step_requires_consecutive_passes() {
        let session = StateSession::new(EntityId(1), ManualClock::shared(1));
        assert_eq!(step(&session, true, 2), None);
        assert_eq!(step(&session, true, 2), Some(HoverTransition::Started));
        assert_eq!(step(&session, true, 2), None);
        assert_eq!(step(&session, false, 2), Some(HoverTransition::Ended));
        assert_eq!(session.hover_stable_passes(), 0);
        assert_eq!(step(&session, false, 2), None);
    }
}
