//! Per-entity state sessions and the active-session index.
mod manager;
mod state;

pub use manager::{SessionSnapshot, SessionStats, StateSessionManager, SweepReport};
pub use state::StateSession;
