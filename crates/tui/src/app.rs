use std::{io, thread, time::Duration};

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use gu3ss_core::{
    parse_guess, Advance, FileScoreStore, Game, GuessResult, OpenRouteService, Phase,
    RoundEvent, RouteStatus,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame, Terminal,
};
use tokio::sync::mpsc;
use tracing::{debug, info};

const TICK_RATE: Duration = Duration::from_millis(250);
const MAX_GUESS_LEN: usize = 16;

type LiveGame = Game<OpenRouteService, FileScoreStore>;

#[derive(Debug, Clone)]
struct Theme {
    primary_fg: Color,
    accent: Color,
    muted: Color,
    success: Color,
    warning: Color,
    danger: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary_fg: Color::White,
            accent: Color::Cyan,
            muted: Color::DarkGray,
            success: Color::Green,
            warning: Color::Yellow,
            danger: Color::Red,
        }
    }
}

enum AppEvent {
    Input(Event),
    Tick,
}

/// Terminal front end driving a [`Game`].
pub struct Gu3ssApp {
    game: LiveGame,
    round_rx: Option<mpsc::Receiver<RoundEvent>>,
    guess: String,
    status: String,
    should_quit: bool,
    theme: Theme,
    spinner: usize,
}

impl Gu3ssApp {
    pub fn new(game: LiveGame) -> Self {
        Self {
            game,
            round_rx: None,
            guess: String::new(),
            status: "Press Enter to play.".to_string(),
            should_quit: false,
            theme: Theme::default(),
            spinner: 0,
        }
    }

    pub fn attach_rounds(&mut self, receiver: mpsc::Receiver<RoundEvent>) {
        self.round_rx = Some(receiver);
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode().context("failed to enter raw mode")?;
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to create terminal")?;
        terminal.hide_cursor()?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal).await;
        restore_terminal(&mut terminal)?;
        result
    }

    async fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> Result<()> {
        let (event_tx, mut event_rx) = mpsc::channel::<AppEvent>(128);
        spawn_input_thread(event_tx);
        let mut round_rx = self.round_rx.take();

        loop {
            // Levels past the labelled range are a configuration bug; stop loudly.
            let level_label = self.game.level_label()?;
            terminal.draw(|frame| self.draw(frame, &level_label))?;
            if self.should_quit {
                break;
            }

            if let Some(rx) = round_rx.as_mut() {
                let mut rounds_closed = false;
                tokio::select! {
                    maybe_event = event_rx.recv() => {
                        if !self.process_app_event(maybe_event) {
                            break;
                        }
                    }
                    maybe_round = rx.recv() => {
                        match maybe_round {
                            Some(event) => self.handle_round_event(event),
                            None => rounds_closed = true,
                        }
                    }
                }
                if rounds_closed {
                    round_rx = None;
                }
            } else {
                let maybe_event = event_rx.recv().await;
                if !self.process_app_event(maybe_event) {
                    break;
                }
            }

            if self.should_quit {
                break;
            }
        }

        Ok(())
    }

    fn process_app_event(&mut self, maybe_event: Option<AppEvent>) -> bool {
        match maybe_event {
            Some(AppEvent::Input(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                self.handle_key(key);
                true
            }
            Some(AppEvent::Input(_)) => true,
            Some(AppEvent::Tick) => {
                self.spinner = self.spinner.wrapping_add(1);
                true
            }
            None => false,
        }
    }

    fn handle_round_event(&mut self, event: RoundEvent) {
        let round = event.round_id();
        if !self.game.handle_event(event) {
            debug!(?round, "ignored round event");
            return;
        }
        match self.game.round().map(|round| round.route()) {
            Some(RouteStatus::Pending) => {
                self.status = "Resolving the route…".to_string();
            }
            Some(RouteStatus::Resolved(_)) => {
                self.status = "Route found. How far is the drive?".to_string();
            }
            Some(RouteStatus::Unavailable) => {
                self.status =
                    "Could not fetch the route. Press r to start a new game.".to_string();
            }
            None => {}
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Esc
            || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
        {
            self.should_quit = true;
            return;
        }

        match self.game.phase() {
            Phase::NotStarted | Phase::GameOver => match key.code {
                KeyCode::Enter | KeyCode::Char('p') | KeyCode::Char('r') => self.restart(),
                KeyCode::Char('q') => self.should_quit = true,
                _ => {}
            },
            Phase::Drawing => match key.code {
                KeyCode::Char('r') => self.restart(),
                KeyCode::Char('q') => self.should_quit = true,
                _ => {}
            },
            Phase::AwaitingGuess | Phase::RoundResolved => match key.code {
                KeyCode::Enter => self.submit(),
                KeyCode::Backspace => {
                    self.guess.pop();
                }
                KeyCode::Char('r') => self.restart(),
                KeyCode::Char('q') => self.should_quit = true,
                KeyCode::Char(ch) if accepts_guess_char(ch) => {
                    if self.guess.len() < MAX_GUESS_LEN {
                        self.guess.push(ch);
                    }
                }
                _ => {}
            },
            Phase::RoundScored => match key.code {
                KeyCode::Enter | KeyCode::Char('n') => self.advance(),
                KeyCode::Char('r') => self.restart(),
                KeyCode::Char('q') => self.should_quit = true,
                _ => {}
            },
        }
    }

    fn restart(&mut self) {
        self.guess.clear();
        self.game.restart();
        self.status = "Picking two points…".to_string();
    }

    fn submit(&mut self) {
        let parsed = parse_guess(&self.guess);
        match self.game.submit_guess(parsed) {
            Ok(result) => {
                info!(points = result.points, "guess submitted");
                self.status = format!(
                    "You got {} points for this {} Press Enter for the next round.",
                    result.points,
                    result.feedback.reply()
                );
                self.guess.clear();
            }
            Err(err) => self.status = format!("{err}."),
        }
    }

    fn advance(&mut self) {
        match self.game.advance() {
            Ok(Advance::NextLevel(level)) => {
                self.status = format!("Level {level}. Picking two points…");
            }
            Ok(Advance::GameOver {
                final_score,
                new_top_score,
            }) => {
                self.status = if new_top_score {
                    format!("New top score: {final_score}! Press Enter to play again.")
                } else {
                    "Game over. Press Enter to play again.".to_string()
                };
            }
            Err(err) => self.status = format!("{err}."),
        }
    }

    fn draw(&self, frame: &mut Frame, level_label: &str) {
        let area = frame.size();
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(4),
                Constraint::Min(5),
                Constraint::Length(3),
                Constraint::Length(3),
            ])
            .split(area);

        self.render_header(frame, layout[0]);
        self.render_scoreboard(frame, layout[1], level_label);
        self.render_round(frame, layout[2]);
        self.render_prompt(frame, layout[3]);
        self.render_status(frame, layout[4]);
    }

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let title = Line::from(vec![
            Span::styled(
                "GU3SS",
                Style::default()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                "  what is the shortest drivable distance?",
                Style::default().fg(self.theme.muted),
            ),
        ]);
        let paragraph = Paragraph::new(title)
            .block(Block::default().borders(Borders::ALL))
            .alignment(Alignment::Center);
        frame.render_widget(paragraph, area);
    }

    fn render_scoreboard(&self, frame: &mut Frame, area: Rect, level_label: &str) {
        let state = self.game.state();
        let lines = vec![
            Line::from(vec![
                Span::styled(
                    format!("{level_label} level"),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                Span::raw(format!("   {} points", state.cumulative_score())),
            ]),
            Line::from(Span::styled(
                format!("{} is your top", state.top_score()),
                Style::default().fg(self.theme.warning),
            )),
        ];
        let paragraph =
            Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Score"));
        frame.render_widget(paragraph, area);
    }

    fn render_round(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::ALL).title("Round");
        let mut lines = Vec::new();

        match self.game.phase() {
            Phase::NotStarted => {
                lines.push(Line::from("Two points will be picked around the map."));
                lines.push(Line::from("Guess the driving distance between them in metres."));
            }
            Phase::Drawing => {
                lines.push(Line::from(Span::styled(
                    format!("Picking two points {}", self.spinner_frame()),
                    Style::default().fg(self.theme.muted),
                )));
            }
            Phase::GameOver => {
                let state = self.game.state();
                lines.push(Line::from(vec![
                    Span::raw("You got "),
                    Span::styled(
                        state.cumulative_score().to_string(),
                        Style::default()
                            .fg(self.theme.accent)
                            .add_modifier(Modifier::BOLD),
                    ),
                    Span::raw(format!(" points out of {}", self.game.max_score())),
                ]));
            }
            _ => {
                if let Some(round) = self.game.round() {
                    lines.push(Line::from(vec![
                        Span::styled("Start  ", Style::default().fg(self.theme.accent)),
                        Span::raw(round.start().to_string()),
                    ]));
                    lines.push(Line::from(vec![
                        Span::styled("End    ", Style::default().fg(self.theme.success)),
                        Span::raw(round.end().to_string()),
                    ]));
                    lines.push(Line::from(self.route_line(round.route())));
                }
                if let Some(result) = self.game.last_result() {
                    lines.push(Line::from(""));
                    lines.extend(self.result_lines(result));
                }
            }
        }

        let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }

    fn route_line(&self, route: &RouteStatus) -> Span<'static> {
        match route {
            RouteStatus::Pending => Span::styled(
                format!("Resolving route {}", self.spinner_frame()),
                Style::default().fg(self.theme.muted),
            ),
            RouteStatus::Resolved(_) => {
                Span::styled("Route ready", Style::default().fg(self.theme.success))
            }
            RouteStatus::Unavailable => {
                Span::styled("Distance unavailable", Style::default().fg(self.theme.danger))
            }
        }
    }

    fn spinner_frame(&self) -> char {
        const FRAMES: [char; 4] = ['|', '/', '-', '\\'];
        FRAMES[self.spinner % FRAMES.len()]
    }

    fn result_lines(&self, result: &GuessResult) -> Vec<Line<'static>> {
        vec![
            Line::from(format!("Distance is {} meters.", result.true_distance_meters)),
            Line::from(format!(
                "Your guess was {} meters ({} off).",
                result.guess_meters, result.absolute_difference
            )),
            Line::from(Span::styled(
                format!(
                    "You got {} points for this {}",
                    result.points,
                    result.feedback.reply()
                ),
                Style::default()
                    .fg(self.theme.primary_fg)
                    .add_modifier(Modifier::BOLD),
            )),
        ]
    }

    fn render_prompt(&self, frame: &mut Frame, area: Rect) {
        let (title, content) = match self.game.phase() {
            Phase::NotStarted => ("Start", "Enter: play   Esc: quit".to_string()),
            Phase::GameOver => ("Again?", "Enter: play again   Esc: quit".to_string()),
            Phase::RoundScored => ("Next", "Enter: next round   r: restart".to_string()),
            Phase::Drawing => ("Wait", "r: restart   Esc: quit".to_string()),
            Phase::AwaitingGuess | Phase::RoundResolved => {
                ("Your guess (m or km)", format!("{}_", self.guess))
            }
        };
        let paragraph =
            Paragraph::new(content).block(Block::default().borders(Borders::ALL).title(title));
        frame.render_widget(paragraph, area);
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::ALL).title("Status");
        let paragraph = Paragraph::new(Line::from(self.status.clone()))
            .block(block)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }
}

fn accepts_guess_char(ch: char) -> bool {
    ch.is_ascii_digit() || matches!(ch, '.' | ',' | ' ' | 'k' | 'm' | 'K' | 'M')
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor()?;
    Ok(())
}

fn spawn_input_thread(sender: mpsc::Sender<AppEvent>) {
    thread::spawn(move || loop {
        match event::poll(TICK_RATE) {
            Ok(true) => match event::read() {
                Ok(evt) => {
                    if sender.blocking_send(AppEvent::Input(evt)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            },
            Ok(false) => {
                if sender.blocking_send(AppEvent::Tick).is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    });
}
