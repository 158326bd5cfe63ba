use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    catalog::PointCatalog,
    config::AppConfig,
    round::{Round, RoundGenerator, RoundId, RoundPoints, RouteStatus},
    route::{ResolveError, RoutePath, RouteProvider, RouteResolver},
    scoring::{evaluate, GuessResult, MAX_ROUND_POINTS},
    store::{ScoreStore, HIGH_SCORE_KEY},
};

use super::state::{ordinal, LevelError, Phase, SessionError, SessionState};

const ROUND_EVENT_CAPACITY: usize = 16;

/// Fixed parameters of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameRules {
    /// Rounds per game.
    pub level_count: u32,
    /// Retries for each round's scored route.
    pub max_retries: u32,
    /// Retries for the end point refinement.
    pub refine_retries: u32,
}

impl GameRules {
    /// Rules from a loaded configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            level_count: config.game.level_count,
            max_retries: config.routing.max_retries,
            refine_retries: config.routing.refine_retries,
        }
    }
}

/// Progress reported by a round's background task.
#[derive(Debug)]
pub struct RoundEvent {
    round_id: RoundId,
    kind: RoundEventKind,
}

#[derive(Debug)]
enum RoundEventKind {
    Drawn(RoundPoints),
    Resolved(Result<RoutePath, ResolveError>),
}

impl RoundEvent {
    /// Round the work was started for.
    pub fn round_id(&self) -> RoundId {
        self.round_id
    }
}

/// What `advance` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// A new round is being drawn at this level.
    NextLevel(u32),
    /// The last level was played.
    GameOver {
        /// Points earned in the finished game.
        final_score: u32,
        /// Whether the score beat the previous best.
        new_top_score: bool,
    },
}

/// The session state machine and the collaborators it drives.
///
/// Drawing and resolving a round run on a spawned task, so `restart` and
/// `advance` return at once with the phase set to [`Phase::Drawing`].
/// Progress comes back through the receiver returned by [`Game::new`] and
/// must be fed to [`Game::handle_event`] by the owner's event loop.
pub struct Game<P, S> {
    catalog: Arc<PointCatalog>,
    resolver: Arc<RouteResolver<P>>,
    generator: Arc<RoundGenerator<P>>,
    store: S,
    rules: GameRules,
    state: SessionState,
    phase: Phase,
    round: Option<Round>,
    last_result: Option<GuessResult>,
    next_round_id: u64,
    events: mpsc::Sender<RoundEvent>,
}

impl<P: RouteProvider, S: ScoreStore> Game<P, S> {
    /// Create a session, reading the persisted top score from `store`.
    pub fn new(
        catalog: PointCatalog,
        resolver: Arc<RouteResolver<P>>,
        store: S,
        rules: GameRules,
    ) -> (Self, mpsc::Receiver<RoundEvent>) {
        let (events, receiver) = mpsc::channel(ROUND_EVENT_CAPACITY);
        let top_score = load_top_score(&store);
        let game = Self {
            catalog: Arc::new(catalog),
            generator: Arc::new(RoundGenerator::new(resolver.clone(), rules.refine_retries)),
            resolver,
            store,
            rules,
            state: SessionState::new(top_score),
            phase: Phase::NotStarted,
            round: None,
            last_result: None,
            next_round_id: 0,
            events,
        };
        (game, receiver)
    }

    /// Build a session from configuration: catalog file or the Poprad default,
    /// and a resolver using the configured backoff.
    pub fn from_config(
        config: &AppConfig,
        provider: P,
        store: S,
    ) -> Result<(Self, mpsc::Receiver<RoundEvent>)> {
        let catalog = match &config.catalog_path {
            Some(path) => PointCatalog::load(path)?,
            None => PointCatalog::poprad(),
        };
        let resolver = Arc::new(RouteResolver::new(
            provider,
            config.routing.retry_backoff(),
        ));
        Ok(Self::new(
            catalog,
            resolver,
            store,
            GameRules::from_config(config),
        ))
    }

    /// Counters for the current game.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Active round, once its endpoints are drawn.
    pub fn round(&self) -> Option<&Round> {
        self.round.as_ref()
    }

    /// Result of the round that was just scored.
    pub fn last_result(&self) -> Option<&GuessResult> {
        self.last_result.as_ref()
    }

    /// Rules in force.
    pub fn rules(&self) -> GameRules {
        self.rules
    }

    /// Catalog rounds are drawn from.
    pub fn catalog(&self) -> &PointCatalog {
        &self.catalog
    }

    /// Top score persistence.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Ordinal label of the current level.
    pub fn level_label(&self) -> Result<String, LevelError> {
        ordinal(self.state.current_level)
    }

    /// Best possible score for the levels reached so far.
    pub fn max_score(&self) -> u32 {
        self.state.current_level * MAX_ROUND_POINTS
    }

    /// Start a new game from any phase.
    pub fn restart(&mut self) {
        self.state.reset_for_new_game();
        self.last_result = None;
        info!(game = self.state.games_played, "starting game");
        self.begin_round();
    }

    /// Apply progress from a round task. Returns false when the event was
    /// stale or arrived in a phase that no longer expects it.
    pub fn handle_event(&mut self, event: RoundEvent) -> bool {
        let round_id = event.round_id;
        match event.kind {
            RoundEventKind::Drawn(points) => self.install_round(round_id, points),
            RoundEventKind::Resolved(outcome) => self.apply_route(round_id, outcome),
        }
    }

    /// Score a guess against the resolved distance.
    pub fn submit_guess(&mut self, guess: Option<u32>) -> Result<&GuessResult, SessionError> {
        let distance = match (self.phase, self.round.as_ref()) {
            (Phase::RoundResolved, Some(round)) => match round.resolved_route() {
                Some(path) => path.distance_meters(),
                None => return Err(SessionError::DistanceUnknown),
            },
            (Phase::AwaitingGuess, Some(round)) => {
                return Err(match round.route() {
                    RouteStatus::Unavailable => SessionError::RouteUnavailable,
                    _ => SessionError::DistanceUnknown,
                })
            }
            _ => return Err(SessionError::NotAcceptingGuesses),
        };
        let guess = guess.ok_or(SessionError::MissingGuess)?;

        let result = evaluate(distance, guess);
        info!(
            level = self.state.current_level,
            guess,
            distance,
            points = result.points,
            "guess scored"
        );
        self.state.cumulative_score += result.points;
        self.phase = Phase::RoundScored;
        Ok(self.last_result.insert(result))
    }

    /// Move past a scored round: next level, or game over after the last one.
    pub fn advance(&mut self) -> Result<Advance, SessionError> {
        if self.phase != Phase::RoundScored {
            return Err(SessionError::NotScored);
        }
        self.last_result = None;

        if self.state.current_level >= self.rules.level_count {
            return Ok(self.finish());
        }

        self.state.current_level += 1;
        self.begin_round();
        Ok(Advance::NextLevel(self.state.current_level))
    }

    fn finish(&mut self) -> Advance {
        self.phase = Phase::GameOver;
        self.state.is_game_over = true;
        let final_score = self.state.cumulative_score;
        let new_top_score = final_score > self.state.top_score;
        if new_top_score {
            self.state.top_score = final_score;
            if let Err(err) = self.store.set(HIGH_SCORE_KEY, &final_score.to_string()) {
                warn!(error = %err, "failed to persist top score");
            }
        }
        info!(final_score, new_top_score, "game over");
        Advance::GameOver {
            final_score,
            new_top_score,
        }
    }

    fn begin_round(&mut self) {
        self.next_round_id += 1;
        let id = RoundId(self.next_round_id);
        self.round = None;
        self.phase = Phase::Drawing;
        debug!(round = id.0, level = self.state.current_level, "drawing round");

        let generator = self.generator.clone();
        let catalog = self.catalog.clone();
        let resolver = self.resolver.clone();
        let events = self.events.clone();
        let max_retries = self.rules.max_retries;
        tokio::spawn(async move {
            let points = generator.generate(&catalog).await;
            let drawn = RoundEvent {
                round_id: id,
                kind: RoundEventKind::Drawn(points),
            };
            if events.send(drawn).await.is_err() {
                debug!(round = id.0, "round event receiver closed");
                return;
            }

            let outcome = resolver.resolve(points.start, points.end, max_retries).await;
            let resolved = RoundEvent {
                round_id: id,
                kind: RoundEventKind::Resolved(outcome),
            };
            if events.send(resolved).await.is_err() {
                debug!(round = id.0, "round event receiver closed");
            }
        });
    }

    fn install_round(&mut self, id: RoundId, points: RoundPoints) -> bool {
        if self.phase != Phase::Drawing || id != RoundId(self.next_round_id) {
            debug!(round = id.0, current = self.next_round_id, "discarding stale draw");
            return false;
        }
        info!(
            round = id.0,
            level = self.state.current_level,
            start = %points.start,
            end = %points.end,
            "round started"
        );
        self.round = Some(Round::new(id, points));
        self.phase = Phase::AwaitingGuess;
        true
    }

    fn apply_route(&mut self, id: RoundId, outcome: Result<RoutePath, ResolveError>) -> bool {
        let Some(round) = self.round.as_mut() else {
            debug!(round = id.0, "route event without an active round");
            return false;
        };
        if round.id() != id
            || self.phase != Phase::AwaitingGuess
            || *round.route() != RouteStatus::Pending
        {
            debug!(round = id.0, current = round.id().0, "discarding stale route event");
            return false;
        }

        match outcome {
            Ok(path) => {
                info!(
                    round = round.id().0,
                    distance = path.distance_meters(),
                    "route resolved"
                );
                round.set_route(RouteStatus::Resolved(path));
                self.phase = Phase::RoundResolved;
            }
            Err(err) => {
                warn!(round = round.id().0, error = %err, "route distance unavailable");
                round.set_route(RouteStatus::Unavailable);
            }
        }
        true
    }
}

fn load_top_score(store: &impl ScoreStore) -> u32 {
    match store.get(HIGH_SCORE_KEY) {
        Ok(Some(value)) => value.trim().parse().unwrap_or_else(|_| {
            warn!(%value, "ignoring unreadable top score");
            0
        }),
        Ok(None) => 0,
        Err(err) => {
            warn!(error = %err, "failed to read top score");
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::Instant;

    use super::*;
    use crate::{
        geo::{Bounds, GeoPoint},
        route::resolver::tests::{failure, path, ScriptedProvider},
        route::ProviderError,
        store::MemoryScoreStore,
    };

    type ScriptedGame = Game<Arc<ScriptedProvider>, MemoryScoreStore>;

    struct SlowProvider;

    impl RouteProvider for SlowProvider {
        async fn directions(
            &self,
            _start: GeoPoint,
            _end: GeoPoint,
        ) -> Result<RoutePath, ProviderError> {
            tokio::time::sleep(Duration::from_secs(20)).await;
            Ok(path(1200.0, 4))
        }
    }

    fn rules(level_count: u32) -> GameRules {
        GameRules {
            level_count,
            max_retries: 1,
            refine_retries: 0,
        }
    }

    fn catalog() -> PointCatalog {
        let bounds = Bounds::new(GeoPoint::new(48.9, 20.0), GeoPoint::new(49.2, 20.6)).unwrap();
        PointCatalog::new(
            bounds,
            vec![GeoPoint::new(49.05, 20.29), GeoPoint::new(49.06, 20.20)],
        )
        .unwrap()
    }

    /// Each round consumes one refinement response and one scored response.
    fn script(distances: &[f64]) -> Vec<Result<RoutePath, ProviderError>> {
        distances
            .iter()
            .flat_map(|distance| [Ok(path(500.0, 4)), Ok(path(*distance, 3))])
            .collect()
    }

    fn game_with(
        outcomes: Vec<Result<RoutePath, ProviderError>>,
        store: MemoryScoreStore,
        level_count: u32,
    ) -> (ScriptedGame, mpsc::Receiver<RoundEvent>) {
        let provider = Arc::new(ScriptedProvider::new(outcomes));
        let resolver = Arc::new(RouteResolver::new(provider, Duration::ZERO));
        Game::new(catalog(), resolver, store, rules(level_count))
    }

    async fn pump<P: RouteProvider>(
        game: &mut Game<P, MemoryScoreStore>,
        events: &mut mpsc::Receiver<RoundEvent>,
    ) {
        let event = events.recv().await.expect("round event");
        assert!(game.handle_event(event));
    }

    /// Apply the draw and the resolution of the current round.
    async fn play_in(game: &mut ScriptedGame, events: &mut mpsc::Receiver<RoundEvent>) {
        pump(game, events).await;
        assert_eq!(game.phase(), Phase::AwaitingGuess);
        pump(game, events).await;
    }

    #[tokio::test]
    async fn restart_opens_first_round() {
        let (mut game, mut events) = game_with(script(&[1000.0]), MemoryScoreStore::default(), 5);
        assert_eq!(game.phase(), Phase::NotStarted);

        game.restart();
        assert_eq!(game.phase(), Phase::Drawing);
        assert!(game.round().is_none());
        assert_eq!(game.state().games_played(), 1);
        assert_eq!(game.state().current_level(), 1);
        assert_eq!(game.level_label().unwrap(), "1st");
        assert_eq!(game.submit_guess(Some(1000)), Err(SessionError::NotAcceptingGuesses));

        pump(&mut game, &mut events).await;
        assert_eq!(game.phase(), Phase::AwaitingGuess);
        assert_eq!(game.submit_guess(Some(1000)), Err(SessionError::DistanceUnknown));

        pump(&mut game, &mut events).await;
        assert_eq!(game.phase(), Phase::RoundResolved);
        assert_eq!(
            game.round().and_then(|round| round.resolved_route()).map(|p| p.distance_meters()),
            Some(1000)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn restart_returns_before_refinement_finishes() {
        let resolver = Arc::new(RouteResolver::new(SlowProvider, Duration::from_secs(1)));
        let (mut game, mut events) =
            Game::new(catalog(), resolver, MemoryScoreStore::default(), rules(5));

        let began = Instant::now();
        game.restart();
        assert_eq!(began.elapsed(), Duration::ZERO);
        assert_eq!(game.phase(), Phase::Drawing);
        assert!(game.round().is_none());

        pump(&mut game, &mut events).await;
        assert_eq!(game.phase(), Phase::AwaitingGuess);
        assert!(began.elapsed() >= Duration::from_secs(20));

        pump(&mut game, &mut events).await;
        assert_eq!(game.phase(), Phase::RoundResolved);
        assert!(began.elapsed() >= Duration::from_secs(40));
    }

    #[tokio::test]
    async fn rejected_guesses_leave_state_alone() {
        let (mut game, mut events) = game_with(script(&[1000.0]), MemoryScoreStore::default(), 5);
        assert_eq!(game.submit_guess(Some(5)), Err(SessionError::NotAcceptingGuesses));

        game.restart();
        play_in(&mut game, &mut events).await;
        assert_eq!(game.submit_guess(None), Err(SessionError::MissingGuess));
        assert_eq!(game.phase(), Phase::RoundResolved);
        assert_eq!(game.state().cumulative_score(), 0);
        assert_eq!(game.advance(), Err(SessionError::NotScored));

        let result = game.submit_guess(Some(1300)).unwrap().clone();
        assert_eq!(result.points, 1);
        assert_eq!(result.absolute_difference, 300);
        assert_eq!(game.submit_guess(Some(1000)), Err(SessionError::NotAcceptingGuesses));
        assert_eq!(game.state().cumulative_score(), 1);
    }

    #[tokio::test]
    async fn stale_completion_is_discarded() {
        let (mut game, mut events) =
            game_with(script(&[1000.0, 2000.0]), MemoryScoreStore::default(), 5);
        game.restart();
        let first = RoundId(game.next_round_id);
        game.restart();
        let second = RoundId(game.next_round_id);
        assert_ne!(first, second);

        let mut applied = Vec::new();
        for _ in 0..4 {
            let event = events.recv().await.expect("round event");
            let id = event.round_id();
            if game.handle_event(event) {
                applied.push(id);
            }
        }
        assert_eq!(applied, vec![second, second]);
        assert_eq!(game.phase(), Phase::RoundResolved);
        let resolved = game.round().and_then(|round| round.resolved_route()).cloned();
        assert!(resolved.is_some());

        let forged = RoundEvent {
            round_id: first,
            kind: RoundEventKind::Resolved(Ok(path(1.0, 2))),
        };
        assert!(!game.handle_event(forged));
        assert_eq!(
            game.round().and_then(|round| round.resolved_route()).cloned(),
            resolved
        );
        assert_eq!(game.state().games_played(), 2);
    }

    #[tokio::test]
    async fn late_route_event_after_scoring_is_ignored() {
        let (mut game, mut events) = game_with(script(&[1000.0]), MemoryScoreStore::default(), 1);
        game.restart();
        play_in(&mut game, &mut events).await;
        let current = game.round().unwrap().id();
        let scored = game.submit_guess(Some(1000)).unwrap().clone();

        let late = RoundEvent {
            round_id: current,
            kind: RoundEventKind::Resolved(Ok(path(9000.0, 2))),
        };
        assert!(!game.handle_event(late));
        assert_eq!(game.phase(), Phase::RoundScored);
        assert_eq!(game.last_result(), Some(&scored));

        game.advance().unwrap();
        let late = RoundEvent {
            round_id: current,
            kind: RoundEventKind::Resolved(Ok(path(9000.0, 2))),
        };
        assert!(!game.handle_event(late));
        let round = game.round().unwrap();
        let redraw = RoundEvent {
            round_id: current,
            kind: RoundEventKind::Drawn(RoundPoints {
                start: round.start(),
                end: round.end(),
            }),
        };
        assert!(!game.handle_event(redraw));
        assert_eq!(game.phase(), Phase::GameOver);
        assert_eq!(
            game.round().and_then(|round| round.resolved_route()).map(|p| p.distance_meters()),
            Some(1000)
        );
    }

    #[tokio::test]
    async fn exhausted_resolution_blocks_guessing() {
        let outcomes = vec![Ok(path(500.0, 4)), Err(failure()), Err(failure())];
        let (mut game, mut events) = game_with(outcomes, MemoryScoreStore::default(), 5);
        game.restart();
        play_in(&mut game, &mut events).await;

        assert_eq!(game.phase(), Phase::AwaitingGuess);
        assert_eq!(game.round().unwrap().route(), &RouteStatus::Unavailable);
        assert_eq!(game.submit_guess(Some(10)), Err(SessionError::RouteUnavailable));
        assert_eq!(game.state().cumulative_score(), 0);
    }

    #[tokio::test]
    async fn full_game_ends_after_last_level_and_saves_top_score() {
        let distances = [1000.0, 1000.0, 1000.0, 1000.0, 1000.0];
        let (mut game, mut events) = game_with(script(&distances), MemoryScoreStore::default(), 5);
        game.restart();

        let guesses = [1000, 1200, 1300, 2000, 1050];
        let mut outcome = None;
        for (level, guess) in (1..=5).zip(guesses) {
            assert_eq!(game.state().current_level(), level);
            play_in(&mut game, &mut events).await;
            game.submit_guess(Some(guess)).unwrap();
            let before = game.state().cumulative_score();
            outcome = Some(game.advance().unwrap());
            assert_eq!(game.state().cumulative_score(), before);
            if level < 5 {
                assert_eq!(outcome, Some(Advance::NextLevel(level + 1)));
                assert_eq!(game.phase(), Phase::Drawing);
            }
        }

        assert_eq!(
            outcome,
            Some(Advance::GameOver {
                final_score: 14,
                new_top_score: true
            })
        );
        assert_eq!(game.phase(), Phase::GameOver);
        assert!(game.state().is_game_over());
        assert_eq!(game.state().top_score(), 14);
        assert_eq!(game.max_score(), 25);
        assert_eq!(game.store().get(HIGH_SCORE_KEY).unwrap().as_deref(), Some("14"));
        assert_eq!(game.advance(), Err(SessionError::NotScored));
    }

    #[tokio::test]
    async fn lower_score_keeps_stored_top() {
        let store = MemoryScoreStore::default();
        store.set(HIGH_SCORE_KEY, "9").unwrap();
        let (mut game, mut events) = game_with(script(&[1000.0]), store, 1);
        assert_eq!(game.state().top_score(), 9);

        game.restart();
        play_in(&mut game, &mut events).await;
        game.submit_guess(Some(1000)).unwrap();
        assert_eq!(
            game.advance(),
            Ok(Advance::GameOver {
                final_score: 5,
                new_top_score: false
            })
        );
        assert_eq!(game.state().top_score(), 9);
        assert_eq!(game.store().get(HIGH_SCORE_KEY).unwrap().as_deref(), Some("9"));
    }

    #[tokio::test]
    async fn restart_after_game_over_resets_counters() {
        let (mut game, mut events) =
            game_with(script(&[800.0, 800.0]), MemoryScoreStore::default(), 1);
        game.restart();
        play_in(&mut game, &mut events).await;
        game.submit_guess(Some(800)).unwrap();
        game.advance().unwrap();

        game.restart();
        assert_eq!(game.phase(), Phase::Drawing);
        assert_eq!(game.state().cumulative_score(), 0);
        assert_eq!(game.state().current_level(), 1);
        assert_eq!(game.state().games_played(), 2);
        assert_eq!(game.state().top_score(), 5);
        assert!(!game.state().is_game_over());

        play_in(&mut game, &mut events).await;
        assert_eq!(game.phase(), Phase::RoundResolved);
    }

    #[test]
    fn unreadable_top_score_defaults_to_zero() {
        let store = MemoryScoreStore::default();
        store.set(HIGH_SCORE_KEY, "lots").unwrap();
        assert_eq!(load_top_score(&store), 0);
    }
}
