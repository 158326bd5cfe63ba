//! Multi-level game sessions.

mod game;
mod state;

pub use game::{Advance, Game, GameRules, RoundEvent};
pub use state::{ordinal, LevelError, Phase, SessionError, SessionState, MAX_LEVELS};
