#![warn(clippy::all, missing_docs)]

//! Core engine for Gu3ss, the drivable-distance guessing game.
//!
//! This crate hosts round generation over a point catalog, route
//! resolution against a directions provider, scoring, the multi-level
//! session state machine, configuration and top-score persistence used
//! by the terminal UI and any future frontends.

pub mod catalog;
pub mod config;
pub mod geo;
pub mod round;
pub mod route;
pub mod scoring;
pub mod session;
pub mod store;

pub use catalog::PointCatalog;
pub use config::AppConfig;
pub use geo::{Bounds, GeoPoint};
pub use round::{Round, RoundGenerator, RoundPoints, RouteStatus};
pub use route::{OpenRouteService, ResolveError, RoutePath, RouteProvider, RouteResolver};
pub use scoring::{evaluate, parse_guess, score, FeedbackTier, GuessResult, Score};
pub use session::{Advance, Game, GameRules, Phase, RoundEvent, SessionError, SessionState};
pub use store::{FileScoreStore, MemoryScoreStore, ScoreStore};
