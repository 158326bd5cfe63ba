use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Highest level that has an ordinal label.
pub const MAX_LEVELS: u32 = 10;

/// Where the session is in its round lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// No game has been started.
    NotStarted,
    /// Endpoints for the next round are being picked and refined.
    Drawing,
    /// A round is on screen; its distance is pending or unavailable.
    AwaitingGuess,
    /// The true distance is known and a guess can be submitted.
    RoundResolved,
    /// The guess was scored; waiting for the player to move on.
    RoundScored,
    /// The final level was scored.
    GameOver,
}

/// Counters tracked across rounds and games.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub(crate) current_level: u32,
    pub(crate) cumulative_score: u32,
    pub(crate) games_played: u32,
    pub(crate) top_score: u32,
    pub(crate) is_game_over: bool,
}

impl SessionState {
    pub(crate) fn new(top_score: u32) -> Self {
        Self {
            current_level: 1,
            cumulative_score: 0,
            games_played: 0,
            top_score,
            is_game_over: false,
        }
    }

    pub(crate) fn reset_for_new_game(&mut self) {
        self.current_level = 1;
        self.cumulative_score = 0;
        self.games_played += 1;
        self.is_game_over = false;
    }

    /// Level of the active round, starting at 1.
    pub fn current_level(&self) -> u32 {
        self.current_level
    }

    /// Points earned in the current game.
    pub fn cumulative_score(&self) -> u32 {
        self.cumulative_score
    }

    /// Games started in this process.
    pub fn games_played(&self) -> u32 {
        self.games_played
    }

    /// Best final score seen, including previous runs.
    pub fn top_score(&self) -> u32 {
        self.top_score
    }

    /// Whether the last game has finished.
    pub fn is_game_over(&self) -> bool {
        self.is_game_over
    }
}

/// Reasons a player action was ignored. State is unchanged in every case.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    /// No usable number was entered.
    #[error("enter a distance in metres before submitting")]
    MissingGuess,
    /// The route is still being resolved.
    #[error("the route distance is not known yet")]
    DistanceUnknown,
    /// Resolution gave up; the round cannot be scored.
    #[error("the route distance could not be resolved")]
    RouteUnavailable,
    /// No round is currently open for guesses.
    #[error("no round is waiting for a guess")]
    NotAcceptingGuesses,
    /// `advance` was called before the round was scored.
    #[error("the current round has not been scored")]
    NotScored,
}

/// Level outside the labelled range.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("level must be between 1 and {MAX_LEVELS}, got {0}")]
pub struct LevelError(pub u32);

/// English ordinal for a level: `1st`, `2nd`, `3rd`, `4th` … `10th`.
pub fn ordinal(level: u32) -> Result<String, LevelError> {
    match level {
        1 => Ok("1st".to_string()),
        2 => Ok("2nd".to_string()),
        3 => Ok("3rd".to_string()),
        4..=MAX_LEVELS => Ok(format!("{level}th")),
        _ => Err(LevelError(level)),
    }
}
