//! Named boolean states tracked per entity session.

use bitflags::bitflags;

use crate::action::ActionKind;

/// One of the fixed named states a session tracks.
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
    strum::AsRefStr,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum StateKind {
    Flying,
    Gliding,
    Swimming,
    InBoat,
    Riding,
    Hovering,
}

impl StateKind {
    /// Number of named states; sizes the per-session timestamp tables.
    pub const COUNT: usize = 6;

    pub const ALL: [StateKind; Self::COUNT] = [
        Self::Flying,
        Self::Gliding,
        Self::Swimming,
        Self::InBoat,
        Self::Riding,
        Self::Hovering,
    ];

    /// Dense index into per-state tables.
    pub const fn index(self) -> usize {
        match self {
            Self::Flying => 0,
            Self::Gliding => 1,
            Self::Swimming => 2,
            Self::InBoat => 3,
            Self::Riding => 4,
            Self::Hovering => 5,
        }
    }

    /// Action whose START/END/TICK/DURATION rules this state drives.
    pub const fn action(self) -> ActionKind {
        match self {
            Self::Flying => ActionKind::Fly,
            Self::Gliding => ActionKind::Glide,
            Self::Swimming => ActionKind::Swim,
            Self::InBoat => ActionKind::InBoat,
            Self::Riding => ActionKind::Ride,
            Self::Hovering => ActionKind::Hover,
        }
    }

    pub const fn flag(self) -> StateFlags {
        match self {
            Self::Flying => StateFlags::FLYING,
            Self::Gliding => StateFlags::GLIDING,
            Self::Swimming => StateFlags::SWIMMING,
            Self::InBoat => StateFlags::IN_BOAT,
            Self::Riding => StateFlags::RIDING,
            Self::Hovering => StateFlags::HOVERING,
        }
    }
}

bitflags! {
    /// Set of named states currently on for a session.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct StateFlags: u8 {
        const FLYING = 1 << 0;
        const GLIDING = 1 << 1;
        const SWIMMING = 1 << 2;
        const IN_BOAT = 1 << 3;
        const RIDING = 1 << 4;
        const HOVERING = 1 << 5;
    }
}

impl StateFlags {
    /// Iterates the named states contained in this set, in `StateKind::ALL` order.
    pub fn kinds(self) -> impl Iterator<Item = StateKind> {
        StateKind::ALL
            .into_iter()
            .filter(move |kind| self.contains(kind.flag()))
    }
}
