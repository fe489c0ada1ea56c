//! Action and timing vocabulary rules are matched on.

use crate::state::StateKind;

/// Category of observed behaviour a rule reacts to.
///
/// Names parse case-insensitively from their config spelling
/// (`"anim.play"`, `"inboat"`, ...).
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ActionKind {
    /// Entity struck another entity.
    Attack,
    /// Entity took damage.
    Damaged,
    /// Entity boarded or left a boat-like vehicle.
    InBoat,
    /// Entity mounted or dismounted a non-boat vehicle.
    Ride,
    /// Flight toggled.
    Fly,
    /// Gliding toggled.
    Glide,
    /// Swimming toggled.
    Swim,
    /// Host-independent hover detection (scheduler driven).
    Hover,
    /// A model animation started playing.
    #[strum(serialize = "anim.play")]
    #[cfg_attr(feature = "serde", serde(rename = "anim.play"))]
    AnimPlay,
    /// Main-hand swing.
    Swing,
}

impl ActionKind {
    /// Continuous state this action tracks, if any.
    ///
    /// Discrete actions (`Attack`, `Damaged`, `AnimPlay`, `Swing`) have no
    /// backing state and can only fire with [`TriggerTiming::Instant`] in
    /// practice.
    pub const fn state(self) -> Option<StateKind> {
        match self {
            Self::Fly => Some(StateKind::Flying),
            Self::Glide => Some(StateKind::Gliding),
            Self::Swim => Some(StateKind::Swimming),
            Self::InBoat => Some(StateKind::InBoat),
            Self::Ride => Some(StateKind::Riding),
            Self::Hover => Some(StateKind::Hovering),
            Self::Attack | Self::Damaged | Self::AnimPlay | Self::Swing => None,
        }
    }
}

/// When, relative to a state transition, a rule is evaluated.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TriggerTiming {
    /// Fire as soon as the event is observed.
    Instant,
    /// Fire when a state turns on.
    Start,
    /// Fire when a state turns off.
    End,
    /// Fire periodically while a state is on (every `period` ticks).
    Tick,
    /// Fire once a state has been on for `after_ticks`.
    Duration,
}
